//! Geo index lookup.
//!
//! Two on-disk layouts are supported behind the [`GeoResolve`] trait: a
//! compact range index (256-byte header, 9-byte entries) and a legacy
//! redirect-record index. The layout is detected when a file is opened.
//! Files are memory-mapped read-only and readers hold no mutable state, so
//! one reader can be shared across any number of tasks.

mod builder;
mod compact;
mod legacy;
mod multi;
mod reader;
mod region;
mod storage;

// Re-export public API
pub use builder::CompactIndexBuilder;
pub use compact::CompactIndex;
pub use legacy::LegacyIndex;
pub use multi::{MultiSourceResolver, Resolution, ResolutionSource};
pub use reader::{detect_format, GeoIndexReader, GeoResolve, IndexFormat};
pub use region::{region_field, region_label, RegionMatcher, UNKNOWN_REGION};
