//! Announced-prefix HTTP source.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use serde_json::Value;

use super::retry::AttemptOutcome;
use crate::asn::Asn;
use crate::config::{HTTP_STATUS_TOO_MANY_REQUESTS, SOURCE_URL_ASN_PLACEHOLDER};
use crate::error_handling::{categorize_reqwest_error, is_gateway_status, FailureType, ScanError};
use crate::prefix::Prefix;

/// Prefixes extracted from one response body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedPrefixes {
    pub prefixes: Vec<Prefix>,
    pub ipv6_dropped: usize,
    pub invalid: usize,
}

/// Extracts IPv4 prefixes from an announcement response.
///
/// Accepts `{"data": {"prefixes": [...]}}` or a top-level `prefixes` array;
/// items may be objects with a `prefix` field or bare strings. IPv6 entries
/// are counted and dropped. Returns `None` when no prefix list is present.
pub fn parse_announced_prefixes(body: &Value) -> Option<ParsedPrefixes> {
    let list = body
        .pointer("/data/prefixes")
        .or_else(|| body.get("prefixes"))?
        .as_array()?;

    let mut parsed = ParsedPrefixes::default();
    for item in list {
        let text = match item {
            Value::String(s) => s.as_str(),
            Value::Object(_) => match item.get("prefix").and_then(Value::as_str) {
                Some(s) => s,
                None => {
                    parsed.invalid += 1;
                    continue;
                }
            },
            _ => {
                parsed.invalid += 1;
                continue;
            }
        };
        if text.contains(':') {
            parsed.ipv6_dropped += 1;
            continue;
        }
        match text.parse::<Prefix>() {
            Ok(prefix) => parsed.prefixes.push(prefix),
            Err(e) => {
                log::debug!("Skipping unparsable prefix {:?}: {}", text, e);
                parsed.invalid += 1;
            }
        }
    }
    Some(parsed)
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// HTTP endpoint returning the prefixes announced by an ASN.
#[derive(Debug, Clone)]
pub struct AnnouncementSource {
    client: reqwest::Client,
    url_template: String,
}

impl AnnouncementSource {
    /// `url_template` must contain `{asn}`; it is replaced by the number.
    pub fn new(client: reqwest::Client, url_template: impl Into<String>) -> Self {
        AnnouncementSource {
            client,
            url_template: url_template.into(),
        }
    }

    /// Checks that the template has the `{asn}` placeholder and expands to
    /// an http(s) URL.
    pub fn validate(&self) -> Result<(), ScanError> {
        if !self.url_template.contains(SOURCE_URL_ASN_PLACEHOLDER) {
            return Err(ScanError::InvalidInput(format!(
                "source URL {:?} has no {} placeholder",
                self.url_template, SOURCE_URL_ASN_PLACEHOLDER
            )));
        }
        let sample = self.url_for(0);
        let parsed = url::Url::parse(&sample)
            .map_err(|e| ScanError::InvalidInput(format!("source URL {:?}: {}", sample, e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ScanError::InvalidInput(format!(
                "unsupported source URL scheme: {}",
                other
            ))),
        }
    }

    pub fn url_for(&self, asn: Asn) -> String {
        self.url_template
            .replace(SOURCE_URL_ASN_PLACEHOLDER, &asn.to_string())
    }

    /// Makes one request and classifies the result.
    ///
    /// Also returns how many IPv6 prefixes were dropped from a good response.
    pub async fn attempt(&self, asn: Asn) -> (AttemptOutcome, usize) {
        let url = self.url_for(asn);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return (transport_outcome(&e), 0),
        };

        let status = response.status().as_u16();
        if status == HTTP_STATUS_TOO_MANY_REQUESTS {
            let wait = retry_after(response.headers());
            return (AttemptOutcome::RateLimited { retry_after: wait }, 0);
        }
        if is_gateway_status(status) {
            return (AttemptOutcome::Gateway(status), 0);
        }
        if !response.status().is_success() {
            return (
                AttemptOutcome::GiveUp {
                    reason: FailureType::AsnUnexpectedStatus,
                    detail: format!("HTTP {} from {}", status, url),
                },
                0,
            );
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => return (transport_outcome(&e), 0),
        };
        match parse_announced_prefixes(&body) {
            Some(parsed) => {
                if parsed.invalid > 0 {
                    log::debug!("AS{}: skipped {} unparsable entries", asn, parsed.invalid);
                }
                (AttemptOutcome::Success(parsed.prefixes), parsed.ipv6_dropped)
            }
            None => (
                AttemptOutcome::GiveUp {
                    reason: FailureType::AsnParseError,
                    detail: format!("no prefix list in response from {}", url),
                },
                0,
            ),
        }
    }
}

fn transport_outcome(error: &reqwest::Error) -> AttemptOutcome {
    match categorize_reqwest_error(error) {
        FailureType::AsnParseError => AttemptOutcome::GiveUp {
            reason: FailureType::AsnParseError,
            detail: error.to_string(),
        },
        _ => AttemptOutcome::Transport(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> AnnouncementSource {
        AnnouncementSource::new(
            reqwest::Client::new(),
            format!("{}/announced?resource=AS{{asn}}", server.uri()),
        )
    }

    #[test]
    fn test_parse_nested_and_filters_ipv6() {
        let body = json!({
            "data": {
                "prefixes": [
                    {"prefix": "111.11.0.0/16", "timelines": []},
                    {"prefix": "2409:8000::/20"},
                    {"prefix": "183.196.0.0/17"},
                    {"prefix": "bogus"},
                    {"other": 1}
                ]
            }
        });
        let parsed = parse_announced_prefixes(&body).expect("list present");
        assert_eq!(
            parsed.prefixes,
            vec![
                "111.11.0.0/16".parse::<Prefix>().expect("p"),
                "183.196.0.0/17".parse().expect("p")
            ]
        );
        assert_eq!(parsed.ipv6_dropped, 1);
        assert_eq!(parsed.invalid, 2);
    }

    #[test]
    fn test_parse_flat_string_list() {
        let body = json!({"prefixes": ["10.0.0.0/8", "::/0"]});
        let parsed = parse_announced_prefixes(&body).expect("list present");
        assert_eq!(parsed.prefixes.len(), 1);
        assert_eq!(parsed.ipv6_dropped, 1);
    }

    #[test]
    fn test_parse_missing_list() {
        assert!(parse_announced_prefixes(&json!({"data": {}})).is_none());
        assert!(parse_announced_prefixes(&json!({"data": {"prefixes": "x"}})).is_none());
    }

    #[test]
    fn test_url_template() {
        let source = AnnouncementSource::new(reqwest::Client::new(), "https://x/?resource=AS{asn}");
        assert_eq!(source.url_for(9808), "https://x/?resource=AS9808");
    }

    #[test]
    fn test_validate_template() {
        let client = reqwest::Client::new();
        assert!(AnnouncementSource::new(client.clone(), "https://x/?resource=AS{asn}")
            .validate()
            .is_ok());
        assert!(AnnouncementSource::new(client.clone(), "https://x/?resource=AS9808")
            .validate()
            .is_err());
        assert!(AnnouncementSource::new(client.clone(), "ftp://x/{asn}")
            .validate()
            .is_err());
        assert!(AnnouncementSource::new(client, "not a url {asn}")
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_attempt_classifies_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("resource", "AS1"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("resource", "AS2"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("resource", "AS3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("resource", "AS4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/announced"))
            .and(query_param("resource", "AS5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"prefixes": [{"prefix": "1.2.0.0/23"}, {"prefix": "2001:db8::/32"}]}
            })))
            .mount(&server)
            .await;

        let source = source_for(&server);
        assert_eq!(
            source.attempt(1).await.0,
            AttemptOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
        assert_eq!(source.attempt(2).await.0, AttemptOutcome::Gateway(502));
        assert!(matches!(
            source.attempt(3).await.0,
            AttemptOutcome::GiveUp {
                reason: FailureType::AsnUnexpectedStatus,
                ..
            }
        ));
        assert!(matches!(
            source.attempt(4).await.0,
            AttemptOutcome::GiveUp {
                reason: FailureType::AsnParseError,
                ..
            }
        ));
        let (outcome, dropped) = source.attempt(5).await;
        assert_eq!(
            outcome,
            AttemptOutcome::Success(vec!["1.2.0.0/23".parse().expect("p")])
        );
        assert_eq!(dropped, 1);
    }

    #[tokio::test]
    async fn test_attempt_connection_refused_is_transport() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);
        let source = AnnouncementSource::new(reqwest::Client::new(), format!("{}/AS{{asn}}", uri));
        assert!(matches!(
            source.attempt(1).await.0,
            AttemptOutcome::Transport(_)
        ));
    }
}
