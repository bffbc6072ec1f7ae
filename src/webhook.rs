//! Webhook receiver
//!
//! Opsgenie delivers webhooks to a URL configured manually in its Webhook
//! integration. `genie webhook listen` receives those POSTs, filters them
//! against a configured event list, and emits one flattened event object
//! per accepted payload.

use anyhow::{Context, Result};
use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::SecondsFormat;
use clap::Subcommand;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::fields::parse_tags;
use crate::util::{print_info, Notices};

/// Payload sections copied into the flattened output when present
const PASSTHROUGH_KEYS: [&str; 14] = [
    "alert",
    "incident",
    "source",
    "integrationName",
    "integrationId",
    "escalation",
    "data",
    "responders",
    "tags",
    "user",
    "note",
    "schedule",
    "onCall",
    "heartbeat",
];

/// Webhook subcommands
#[derive(Debug, Subcommand)]
pub enum WebhookCommand {
    /// Receive Opsgenie webhook events
    Listen {
        /// Port to bind on
        #[arg(short, long, default_value = "8585")]
        port: u16,

        /// Comma-separated event names to accept (empty accepts all)
        #[arg(long)]
        events: Option<String>,
    },
}

/// Shared listener state
struct ListenerState {
    events: Vec<String>,
    notices: Arc<Notices>,
}

/// Run a webhook command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: WebhookCommand, notices: Arc<Notices>) -> Result<()> {
    match cmd {
        WebhookCommand::Listen { port, events } => listen(port, events.as_deref(), notices).await,
    }
}

/// Serve the receiver until interrupted
async fn listen(port: u16, events: Option<&str>, notices: Arc<Notices>) -> Result<()> {
    let events = events.map(parse_tags).unwrap_or_default();
    if events.is_empty() {
        print_info("accepting all event types");
    } else {
        print_info(&format!("accepting events: {}", events.join(", ")));
    }

    let state = Arc::new(ListenerState { events, notices });
    let app = Router::new()
        .route("/webhook", post(handle_webhook))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind webhook listener on port {}", port))?;
    print_info(&format!("listening on http://{}/webhook", addr));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Webhook server failed")?;

    Ok(())
}

/// Handle one inbound event
async fn handle_webhook(
    State(state): State<Arc<ListenerState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.notices.licensing();

    let action = extract_action(&body);
    if !event_allowed(&state.events, &action) {
        return Json(json!({
            "status": "ignored",
            "message": "Event type not configured"
        }));
    }

    let timestamp = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let output = reshape(&body, headers_to_value(&headers), &timestamp);
    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());

    Json(output)
}

/// Action named by the payload, falling back to the nested alert action
fn extract_action(body: &Value) -> String {
    body.get("action")
        .and_then(Value::as_str)
        .or_else(|| {
            body.get("alert")
                .and_then(|alert| alert.get("action"))
                .and_then(Value::as_str)
        })
        .unwrap_or("")
        .to_string()
}

/// An empty configured list accepts every event
fn event_allowed(events: &[String], action: &str) -> bool {
    events.is_empty() || events.iter().any(|event| event == action)
}

/// Flatten a payload into the output object: action, timestamp, original
/// headers, then whichever known sections are present
fn reshape(body: &Value, headers: Value, timestamp: &str) -> Value {
    let mut output = Map::new();
    output.insert("action".to_string(), json!(extract_action(body)));
    output.insert("timestamp".to_string(), json!(timestamp));
    output.insert("headers".to_string(), headers);

    for key in PASSTHROUGH_KEYS {
        if let Some(value) = body.get(key) {
            output.insert(key.to_string(), value.clone());
        }
    }

    Value::Object(output)
}

/// Render request headers as a JSON object
fn headers_to_value(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        map.insert(
            name.as_str().to_string(),
            json!(value.to_str().unwrap_or("")),
        );
    }
    Value::Object(map)
}
