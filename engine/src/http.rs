//! HTTP page fetching with `reqwest`.
//!
//! A page body is either a bare JSON array of records (a single page), or an
//! object holding a results array and an optional continuation link:
//!
//! ```json
//! { "count": 2, "next": "/api/notes?page=2", "results": [{"id": 1}, {"id": 2}] }
//! ```
//!
//! Relative links are resolved against the URL of the page that carried them.

use crate::{error::Result, Error, Page, RemoteFetcher, RemoteRecord, SyncConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use std::collections::BTreeMap;

/// Default key of the records array in an object body.
pub const DEFAULT_RESULTS_KEY: &str = "results";
/// Default key of the continuation link in an object body.
pub const DEFAULT_NEXT_KEY: &str = "next";

/// Fetches pages over HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    headers: HeaderMap,
    results_key: String,
    next_key: String,
}

impl HttpFetcher {
    /// Create a fetcher sending `headers` with every request.
    pub fn new(headers: &BTreeMap<String, String>) -> Result<Self> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header '{}': {}", name, e)))?;
            map.insert(header, value);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            headers: map,
            results_key: DEFAULT_RESULTS_KEY.to_string(),
            next_key: DEFAULT_NEXT_KEY.to_string(),
        })
    }

    /// Create a fetcher using the headers of `config`.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(&config.headers)
    }

    /// Use a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Override the keys read from object bodies.
    pub fn with_keys(mut self, results: impl Into<String>, next: impl Into<String>) -> Self {
        self.results_key = results.into();
        self.next_key = next.into();
        self
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch_page(&self, locator: &str) -> Result<Page> {
        let url = Url::parse(locator)
            .map_err(|e| Error::transport(locator, format!("invalid url: {}", e)))?;

        let response = self
            .client
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| Error::transport(locator, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(
                locator,
                format!("server returned {}", status),
            ));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::transport(locator, e))?;

        parse_page(&url, body, &self.results_key, &self.next_key)
    }
}

/// Interpret a decoded response body fetched from `base`.
pub fn parse_page(
    base: &Url,
    body: serde_json::Value,
    results_key: &str,
    next_key: &str,
) -> Result<Page> {
    let (items, next) = match body {
        serde_json::Value::Array(items) => (items, None),
        serde_json::Value::Object(mut obj) => {
            let items = match obj.remove(results_key) {
                Some(serde_json::Value::Array(items)) => items,
                Some(_) => {
                    return Err(Error::InvalidPage(format!(
                        "'{}' must be an array",
                        results_key
                    )))
                }
                None => {
                    return Err(Error::InvalidPage(format!(
                        "missing '{}' array",
                        results_key
                    )))
                }
            };

            let next = match obj.remove(next_key) {
                None | Some(serde_json::Value::Null) => None,
                Some(serde_json::Value::String(link)) if link.is_empty() => None,
                Some(serde_json::Value::String(link)) => {
                    let resolved = base.join(&link).map_err(|e| {
                        Error::InvalidPage(format!("bad continuation '{}': {}", link, e))
                    })?;
                    Some(resolved.to_string())
                }
                Some(_) => {
                    return Err(Error::InvalidPage(format!(
                        "'{}' must be a string or null",
                        next_key
                    )))
                }
            };
            (items, next)
        }
        _ => {
            return Err(Error::InvalidPage(
                "expected a JSON array or object".into(),
            ))
        }
    };

    let records = items
        .into_iter()
        .map(RemoteRecord::from_json)
        .collect::<Result<Vec<_>>>()?;

    Ok(Page { records, next })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("http://localhost:3000/api/notes?page=1").unwrap()
    }

    #[test]
    fn array_body_is_single_page() {
        let page = parse_page(&base(), json!([{"id": 1}, {"id": 2}]), "results", "next").unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next, None);
    }

    #[test]
    fn object_body_with_relative_next() {
        let body = json!({
            "count": 3,
            "next": "/api/notes?page=2&limit=2",
            "results": [{"id": 1}, {"id": 2}]
        });
        let page = parse_page(&base(), body, "results", "next").unwrap();

        assert_eq!(page.records.len(), 2);
        assert_eq!(
            page.next.as_deref(),
            Some("http://localhost:3000/api/notes?page=2&limit=2")
        );
    }

    #[test]
    fn absolute_next_is_kept() {
        let body = json!({"next": "https://other.example/p/2", "results": []});
        let page = parse_page(&base(), body, "results", "next").unwrap();
        assert_eq!(page.next.as_deref(), Some("https://other.example/p/2"));
    }

    #[test]
    fn null_next_ends_enumeration() {
        let body = json!({"next": null, "results": [{"id": 1}]});
        let page = parse_page(&base(), body, "results", "next").unwrap();
        assert_eq!(page.next, None);
    }

    #[test]
    fn custom_keys() {
        let body = json!({"items": [{"id": 1}], "continuation": "?page=2"});
        let page = parse_page(&base(), body, "items", "continuation").unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(
            page.next.as_deref(),
            Some("http://localhost:3000/api/notes?page=2")
        );
    }

    #[test]
    fn malformed_bodies() {
        let cases = [
            json!("nope"),
            json!({"results": {"id": 1}}),
            json!({"next": null}),
            json!({"results": [], "next": 5}),
            json!([1, 2]),
        ];
        for body in cases {
            let err = parse_page(&base(), body, "results", "next").unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Schema);
        }
    }

    #[test]
    fn invalid_header_is_config_error() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let err = HttpFetcher::new(&headers).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn invalid_locator_is_transport_error() {
        let fetcher = HttpFetcher::new(&BTreeMap::new()).unwrap();
        let err = fetcher.fetch_page("not a url").await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
