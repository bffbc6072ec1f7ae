//! Opsgenie HTTP client
//!
//! Request wrapper with GenieKey auth, offset pagination over `paging.next`,
//! and the bounded poller for async alert requests.

use anyhow::Result;
use reqwest::{Client, Method};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{load_config, OpsgenieConfig};
use crate::types::{Envelope, RequestStatus};

/// Items fetched per page when paginating
pub const PAGE_SIZE: u64 = 100;
/// Default number of poll attempts for async requests
pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;
/// Default delay between poll attempts in milliseconds
pub const DEFAULT_POLL_DELAY_MS: u64 = 500;

/// Opsgenie API surface, abstracted for testability
pub trait OpsgenieApi: Send + Sync {
    /// Issue one authenticated request and return the parsed envelope
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<Envelope>> + Send;
}

/// Opsgenie HTTP client
pub struct OpsgenieClient {
    config: OpsgenieConfig,
    http: Client,
}

impl OpsgenieClient {
    /// Create a new client from settings file and environment
    pub fn new() -> Result<Self> {
        Self::with_config(load_config()?)
    }

    /// Create a client with an explicit config
    pub fn with_config(config: OpsgenieConfig) -> Result<Self> {
        let http = Client::builder().user_agent("genie-cli/0.1.0").build()?;
        Ok(Self { config, http })
    }

    /// Get config reference
    pub fn config(&self) -> &OpsgenieConfig {
        &self.config
    }

    /// Get API key
    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Opsgenie API key not configured"))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<reqwest::Response> {
        let key = self.api_key()?;
        let url = format!("{}{}", self.config.region.base_url(), path);

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("GenieKey {}", key))
            .header("Content-Type", "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            // An empty object means "no body", matching the query handling
            let empty = body.as_object().is_some_and(serde_json::Map::is_empty);
            if !empty {
                request = request.json(&body);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Opsgenie API error ({}): {}",
                status.as_u16(),
                error_message(&body)
            );
        }

        Ok(response)
    }

    /// Issue a request and return the raw response body (iCal export)
    pub async fn request_text(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
    ) -> Result<String> {
        let response = self.send(method, path, None, query).await?;
        response.text().await.map_err(Into::into)
    }

    /// Connectivity self-test against the configured region
    pub async fn verify(&self) -> Result<()> {
        self.request(
            Method::GET,
            "/users",
            None,
            &[("limit".to_string(), "1".to_string())],
        )
        .await?;
        Ok(())
    }
}

impl OpsgenieApi for OpsgenieClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<Envelope> {
        let response = self.send(method, path, body, query).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Envelope::default());
        }
        serde_json::from_str(&text).map_err(|e| {
            anyhow::anyhow!("Parse error: {}: {}", e, &text[..text.len().min(200)])
        })
    }
}

/// Extract the upstream `message` field from an error body, falling back to
/// the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Fetch every page of a list endpoint
///
/// Pages are `PAGE_SIZE` items at increasing offsets; iteration stops only
/// when the response carries no `paging.next` cursor, not on short pages.
pub async fn fetch_all(
    api: &impl OpsgenieApi,
    method: Method,
    path: &str,
    body: Option<Value>,
    query: &[(String, String)],
) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut offset: u64 = 0;

    let mut query: Vec<(String, String)> = query.to_vec();
    query.push(("limit".to_string(), PAGE_SIZE.to_string()));
    query.push(("offset".to_string(), offset.to_string()));
    let offset_slot = query.len() - 1;

    loop {
        query[offset_slot].1 = offset.to_string();
        let envelope = api
            .request(method.clone(), path, body.clone(), &query)
            .await?;

        let has_next = envelope.has_next_page();
        if let Some(Value::Array(page)) = envelope.data {
            items.extend(page);
        }
        offset += PAGE_SIZE;

        if !has_next {
            break;
        }
    }

    Ok(items)
}

/// Poll an async alert request until it completes
///
/// Returns the first status whose `isSuccess` is present; after
/// `max_attempts` probes spaced `delay_ms` apart, fails with the elapsed
/// bound in the message.
pub async fn wait_for_completion(
    api: &impl OpsgenieApi,
    request_id: &str,
    max_attempts: u32,
    delay_ms: u64,
) -> Result<RequestStatus> {
    let path = format!("/alerts/requests/{}", request_id);
    let mut attempts = 0;

    while attempts < max_attempts {
        let envelope = api.request(Method::GET, &path, None, &[]).await?;

        if let Some(data) = envelope.data {
            if data.get("isSuccess").is_some_and(|v| !v.is_null()) {
                return serde_json::from_value(data)
                    .map_err(|e| anyhow::anyhow!("Unexpected request status payload: {}", e));
            }
        }

        sleep(Duration::from_millis(delay_ms)).await;
        attempts += 1;
    }

    anyhow::bail!(
        "Request {} did not complete within {}ms",
        request_id,
        u64::from(max_attempts) * delay_ms
    )
}

/// Fail unless an API key is configured
pub fn ensure_configured(client: &OpsgenieClient) -> Result<()> {
    if !client.config().is_configured() {
        anyhow::bail!(
            "Opsgenie not configured. Run: genie auth <api-key>\n\
             Or set the OPSGENIE_API_KEY environment variable."
        );
    }
    Ok(())
}

/// Verify the configured key against the region's user endpoint
pub async fn cmd_verify() -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    client.verify().await?;
    println!(
        "Opsgenie API key verified against {} ({}).",
        client.config().region,
        client.config().region.base_url()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Paging;
    use serde_json::json;
    use std::sync::Mutex;

    /// Scripted API double recording every request
    struct MockApi {
        responses: Mutex<Vec<Envelope>>,
        calls: Mutex<Vec<(String, String, Vec<(String, String)>)>>,
    }

    impl MockApi {
        fn new(responses: Vec<Envelope>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String, Vec<(String, String)>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl OpsgenieApi for MockApi {
        async fn request(
            &self,
            method: Method,
            path: &str,
            _body: Option<Value>,
            query: &[(String, String)],
        ) -> Result<Envelope> {
            self.calls.lock().unwrap().push((
                method.to_string(),
                path.to_string(),
                query.to_vec(),
            ));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Envelope::default())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    fn page(start: u64, count: u64, next: bool) -> Envelope {
        Envelope {
            data: Some(Value::Array(
                (start..start + count).map(|i| json!({"id": i})).collect(),
            )),
            paging: next.then(|| Paging {
                next: Some("https://api.opsgenie.com/v2/alerts?offset=next".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn query_param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn fetch_all_accumulates_three_pages_in_order() {
        let api = MockApi::new(vec![
            page(0, 100, true),
            page(100, 100, true),
            page(200, 100, false),
        ]);

        let items = fetch_all(&api, Method::GET, "/alerts", None, &[])
            .await
            .unwrap();

        assert_eq!(items.len(), 300);
        assert_eq!(items[0]["id"], 0);
        assert_eq!(items[299]["id"], 299);

        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        for (i, expected_offset) in ["0", "100", "200"].iter().enumerate() {
            assert_eq!(calls[i].1, "/alerts");
            assert_eq!(query_param(&calls[i].2, "limit"), Some("100"));
            assert_eq!(query_param(&calls[i].2, "offset"), Some(*expected_offset));
        }
    }

    #[tokio::test]
    async fn fetch_all_stops_on_missing_cursor_even_with_full_page() {
        let api = MockApi::new(vec![page(0, 100, false)]);

        let items = fetch_all(&api, Method::GET, "/alerts", None, &[])
            .await
            .unwrap();

        assert_eq!(items.len(), 100);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn fetch_all_ignores_non_array_data() {
        let envelope = Envelope {
            data: Some(json!({"heartbeats": []})),
            ..Default::default()
        };
        let api = MockApi::new(vec![envelope]);

        let items = fetch_all(&api, Method::GET, "/heartbeats", None, &[])
            .await
            .unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn fetch_all_preserves_caller_query() {
        let api = MockApi::new(vec![page(0, 1, false)]);
        let query = vec![("query".to_string(), "status=open".to_string())];

        fetch_all(&api, Method::GET, "/alerts", None, &query)
            .await
            .unwrap();

        let calls = api.calls();
        assert_eq!(query_param(&calls[0].2, "query"), Some("status=open"));
        assert_eq!(query_param(&calls[0].2, "limit"), Some("100"));
    }

    fn pending() -> Envelope {
        Envelope {
            data: Some(json!({})),
            ..Default::default()
        }
    }

    fn resolved() -> Envelope {
        Envelope {
            data: Some(json!({
                "isSuccess": true,
                "action": "Create",
                "processedAt": "2026-01-01T00:00:00Z",
                "integrationId": "int-1",
                "success": true,
                "alertId": "a1"
            })),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn poller_resolves_on_third_attempt() {
        let api = MockApi::new(vec![pending(), pending(), resolved()]);

        let status = wait_for_completion(&api, "req-1", 10, 1).await.unwrap();

        assert!(status.is_success);
        assert_eq!(status.alert_id.as_deref(), Some("a1"));
        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].1, "/alerts/requests/req-1");
    }

    #[tokio::test]
    async fn poller_times_out_after_max_attempts() {
        let api = MockApi::new(vec![]);

        let err = wait_for_completion(&api, "req-2", 3, 2).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Request req-2 did not complete within 6ms"
        );
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test]
    async fn poller_treats_null_is_success_as_pending() {
        let null_status = Envelope {
            data: Some(json!({"isSuccess": null})),
            ..Default::default()
        };
        let api = MockApi::new(vec![null_status, resolved()]);

        let status = wait_for_completion(&api, "req-3", 5, 1).await.unwrap();

        assert!(status.is_success);
        assert_eq!(api.calls().len(), 2);
    }

    #[test]
    fn error_message_extracts_upstream_message() {
        let body = r#"{"message": "Key format is not valid!", "took": 0.0}"#;
        assert_eq!(error_message(body), "Key format is not valid!");
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("service unavailable"), "service unavailable");
    }

    #[test]
    fn error_message_falls_back_when_message_missing() {
        let body = r#"{"error": "nope"}"#;
        assert_eq!(error_message(body), body);
    }

    #[test]
    fn client_with_config_builds() {
        let client = OpsgenieClient::with_config(OpsgenieConfig::default()).unwrap();
        assert!(!client.config().is_configured());
    }

    #[test]
    fn api_key_errors_when_unset() {
        let client = OpsgenieClient::with_config(OpsgenieConfig::default()).unwrap();
        assert!(client.api_key().is_err());
    }

    #[test]
    fn ensure_configured_rejects_missing_key() {
        let client = OpsgenieClient::with_config(OpsgenieConfig::default()).unwrap();
        let err = ensure_configured(&client).unwrap_err();
        assert!(err.to_string().contains("genie auth"));
    }

    #[test]
    fn ensure_configured_accepts_key() {
        let config = OpsgenieConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let client = OpsgenieClient::with_config(config).unwrap();
        assert!(ensure_configured(&client).is_ok());
    }
}
