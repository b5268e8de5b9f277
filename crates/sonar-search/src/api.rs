//! Remote search API seam and its reqwest implementation.
//!
//! Both endpoints share the [`HostResults`] envelope. The `results` member is
//! free-form: either an array of string arrays (one per row) or an array of
//! bare strings when a single field was requested.

use crate::error::{Result, SearchError};
use crate::Row;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sonar_core::ApiConfig;
use std::time::Duration;

/// Response envelope of the search endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostResults {
    /// Whether the service flagged the request as failed
    pub error: bool,
    /// Error message; non-empty means the call must stop
    pub errmsg: String,
    /// Echo of the query
    pub query: String,
    /// Page number served
    pub page: u64,
    /// Total number of matches
    pub size: u64,
    /// Row payload
    pub results: Value,
    /// Continuation token (cursor endpoint only); empty at the end
    pub next: String,
}

impl HostResults {
    /// Error message carried by the envelope, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        if !self.errmsg.is_empty() {
            Some(&self.errmsg)
        } else if self.error {
            Some("unknown server error")
        } else {
            None
        }
    }

    /// Decode the `results` payload into rows.
    ///
    /// Returns `None` when the payload is not an array. Non-string cells are
    /// rendered with their JSON text so positional alignment is preserved.
    #[must_use]
    pub fn rows(&self) -> Option<Vec<Row>> {
        let items = self.results.as_array()?;
        let rows = items
            .iter()
            .filter_map(|item| match item {
                Value::Array(cells) => Some(cells.iter().map(cell_text).collect()),
                Value::String(single) => Some(vec![single.clone()]),
                _ => None,
            })
            .collect();
        Some(rows)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Aggregated view of one host (`host/{host}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostStatsData {
    /// Whether the service flagged the request as failed
    pub error: bool,
    /// Error message accompanying `error`
    pub errmsg: String,
    /// Host that was looked up
    pub host: String,
    /// Resolved IP address
    pub ip: String,
    /// Autonomous system number
    pub asn: u64,
    /// Owning organization
    pub org: String,
    /// Country name
    #[serde(rename = "country_name")]
    pub country: String,
    /// ISO country code
    pub country_code: String,
    /// Protocols seen on the host
    #[serde(rename = "protocol")]
    pub protocols: Vec<String>,
    /// Open ports
    #[serde(rename = "port")]
    pub ports: Vec<u16>,
    /// Asset categories
    #[serde(rename = "category")]
    pub categories: Vec<String>,
    /// Detected products
    #[serde(rename = "product")]
    pub products: Vec<String>,
    /// Last time the service refreshed this host
    pub update_time: String,
}

/// Offset-paginated request (`search/all`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchAllRequest {
    /// Opaque query string
    pub query: String,
    /// Rows per page
    pub size: usize,
    /// One-based page number
    pub page: usize,
    /// Effective field list
    pub fields: Vec<String>,
    /// Search beyond the one-year window
    pub full: bool,
}

/// Cursor-paginated request (`search/next`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchNextRequest {
    /// Opaque query string
    pub query: String,
    /// Rows per batch
    pub size: usize,
    /// Effective field list
    pub fields: Vec<String>,
    /// Search beyond the one-year window
    pub full: bool,
    /// Continuation token; empty for the first batch
    pub next: String,
}

/// Access to the remote search service.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// concurrent search call on a client.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Fetch one offset page.
    async fn search_all(&self, request: &SearchAllRequest) -> Result<HostResults>;

    /// Fetch one cursor batch.
    async fn search_next(&self, request: &SearchNextRequest) -> Result<HostResults>;

    /// Fetch the aggregated view of `host`.
    async fn host_stats(&self, host: &str) -> Result<HostStatsData>;
}

/// Encode a query the way the service expects it (`qbase64`).
#[must_use]
pub fn encode_query(query: &str) -> String {
    STANDARD.encode(query.as_bytes())
}

/// reqwest-backed [`SearchApi`].
pub struct HttpSearchApi {
    client: Client,
    base_url: String,
    key: String,
}

impl HttpSearchApi {
    /// Build a client from the `[api]` config section.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/api/v1/{endpoint}", self.base_url);
        tracing::debug!(%url, "fetching");

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        match serde_json::from_slice::<T>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(e) if status.is_success() => Err(SearchError::Decode(e)),
            Err(_) => Err(SearchError::Server {
                message: format!("HTTP {}", status.as_u16()),
                partial: Vec::new(),
            }),
        }
    }
}

#[async_trait]
impl SearchApi for HttpSearchApi {
    async fn search_all(&self, request: &SearchAllRequest) -> Result<HostResults> {
        let params = [
            ("qbase64", encode_query(&request.query)),
            ("size", request.size.to_string()),
            ("page", request.page.to_string()),
            ("fields", request.fields.join(",")),
            ("full", request.full.to_string()),
        ];
        self.get("search/all", &params).await
    }

    async fn search_next(&self, request: &SearchNextRequest) -> Result<HostResults> {
        let params = [
            ("qbase64", encode_query(&request.query)),
            ("size", request.size.to_string()),
            ("fields", request.fields.join(",")),
            ("full", request.full.to_string()),
            ("next", request.next.clone()),
        ];
        self.get("search/next", &params).await
    }

    async fn host_stats(&self, host: &str) -> Result<HostStatsData> {
        self.get(&format!("host/{host}"), &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_query() {
        assert_eq!(encode_query("port=80"), "cG9ydD04MA==");
    }

    #[test]
    fn test_rows_from_string_arrays() {
        let envelope = HostResults {
            results: json!([["1.1.1.1", "80"], ["2.2.2.2", 443]]),
            ..HostResults::default()
        };
        let rows = envelope.rows().expect("array payload");
        assert_eq!(rows[0], vec!["1.1.1.1", "80"]);
        assert_eq!(rows[1], vec!["2.2.2.2", "443"]);
    }

    #[test]
    fn test_rows_from_bare_strings() {
        let envelope = HostResults {
            results: json!(["a.com", "b.com"]),
            ..HostResults::default()
        };
        let rows = envelope.rows().expect("array payload");
        assert_eq!(rows, vec![vec!["a.com".to_string()], vec!["b.com".to_string()]]);
    }

    #[test]
    fn test_rows_non_array_payload() {
        let envelope = HostResults {
            results: json!({"unexpected": true}),
            ..HostResults::default()
        };
        assert!(envelope.rows().is_none());
    }

    #[test]
    fn test_host_stats_deserialize() {
        let body = r#"{
            "error": false,
            "host": "example.com",
            "ip": "93.184.216.34",
            "asn": 15133,
            "org": "EDGECAST",
            "country_name": "United States",
            "country_code": "US",
            "protocol": ["http", "https"],
            "port": [80, 443],
            "category": ["CDN"],
            "product": ["nginx"],
            "update_time": "2024-01-01 00:00:00"
        }"#;
        let stats: HostStatsData = serde_json::from_str(body).expect("parse stats");
        assert_eq!(stats.country, "United States");
        assert_eq!(stats.ports, vec![80, 443]);
        assert_eq!(stats.protocols, vec!["http", "https"]);
        assert_eq!(stats.asn, 15133);

        let sparse: HostStatsData = serde_json::from_str(r#"{"host":"a.com"}"#).unwrap();
        assert!(sparse.ports.is_empty());
        assert!(!sparse.error);
    }

    #[test]
    fn test_envelope_deserialize() {
        let body = r#"{"error":true,"errmsg":"[-4] Params Error","size":0}"#;
        let envelope: HostResults = serde_json::from_str(body).expect("parse envelope");
        assert_eq!(envelope.error_message(), Some("[-4] Params Error"));
        assert!(envelope.next.is_empty());
        assert!(envelope.results.is_null());
    }
}
