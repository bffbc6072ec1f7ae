//! Heartbeat operations
//!
//! Heartbeats are addressed by name, not ID.

use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::parse_tags;
use crate::types::{Envelope, Priority};

/// Heartbeat subcommands
#[derive(Debug, Subcommand)]
pub enum HeartbeatCommand {
    /// Create a heartbeat
    Create {
        /// Heartbeat name
        name: String,

        /// Expected ping interval
        #[arg(long)]
        interval: u64,

        /// Interval unit (minutes, hours, days)
        #[arg(long)]
        interval_unit: String,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Whether the heartbeat is active
        #[arg(long)]
        enabled: Option<bool>,

        /// Owner team ID
        #[arg(long)]
        owner_team: Option<String>,

        /// Message of the alert raised on expiry
        #[arg(long)]
        alert_message: Option<String>,

        /// Priority of the alert raised on expiry
        #[arg(long, value_enum)]
        alert_priority: Option<Priority>,

        /// Comma-separated tags of the alert raised on expiry
        #[arg(long)]
        alert_tags: Option<String>,
    },

    /// Show heartbeat details
    Get {
        /// Heartbeat name
        name: String,
    },

    /// List heartbeats
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of heartbeats to return
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// Update a heartbeat (only supplied fields are sent)
    Update {
        /// Heartbeat name
        name: String,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Expected ping interval
        #[arg(long)]
        interval: Option<u64>,

        /// Interval unit (minutes, hours, days)
        #[arg(long)]
        interval_unit: Option<String>,

        /// Whether the heartbeat is active
        #[arg(long)]
        enabled: Option<bool>,

        /// Owner team ID
        #[arg(long)]
        owner_team: Option<String>,

        /// Message of the alert raised on expiry
        #[arg(long)]
        alert_message: Option<String>,

        /// Priority of the alert raised on expiry
        #[arg(long, value_enum)]
        alert_priority: Option<Priority>,

        /// Comma-separated tags of the alert raised on expiry
        #[arg(long)]
        alert_tags: Option<String>,
    },

    /// Delete a heartbeat
    Delete {
        /// Heartbeat name
        name: String,
    },

    /// Enable a heartbeat
    Enable {
        /// Heartbeat name
        name: String,
    },

    /// Disable a heartbeat
    Disable {
        /// Heartbeat name
        name: String,
    },

    /// Send a ping
    Ping {
        /// Heartbeat name
        name: String,
    },
}

/// Run a heartbeat command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: HeartbeatCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        HeartbeatCommand::Create {
            name,
            interval,
            interval_unit,
            description,
            enabled,
            owner_team,
            alert_message,
            alert_priority,
            alert_tags,
        } => {
            let body = build_create_body(
                &name,
                interval,
                &interval_unit,
                description.as_deref(),
                enabled,
                owner_team.as_deref(),
                alert_message.as_deref(),
                alert_priority,
                alert_tags.as_deref(),
            );
            let envelope = client
                .request(Method::POST, "/heartbeats", Some(body), &[])
                .await?;
            display::output_data(&envelope)
        }
        HeartbeatCommand::Get { name } => {
            let path = format!("/heartbeats/{}", name);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        HeartbeatCommand::List { all, limit } => cmd_list(&client, all, limit).await,
        HeartbeatCommand::Update {
            name,
            description,
            interval,
            interval_unit,
            enabled,
            owner_team,
            alert_message,
            alert_priority,
            alert_tags,
        } => {
            let body = build_update_body(
                description.as_deref(),
                interval,
                interval_unit.as_deref(),
                enabled,
                owner_team.as_deref(),
                alert_message.as_deref(),
                alert_priority,
                alert_tags.as_deref(),
            );
            let path = format!("/heartbeats/{}", name);
            let envelope = client.request(Method::PATCH, &path, Some(body), &[]).await?;
            display::output_data(&envelope)
        }
        HeartbeatCommand::Delete { name } => {
            let path = format!("/heartbeats/{}", name);
            let envelope = client.request(Method::DELETE, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        HeartbeatCommand::Enable { name } => {
            let path = format!("/heartbeats/{}/enable", name);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        HeartbeatCommand::Disable { name } => {
            let path = format!("/heartbeats/{}/disable", name);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        HeartbeatCommand::Ping { name } => {
            let path = format!("/heartbeats/{}/ping", name);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
    }
}

/// List heartbeats; the single-page response nests the list under
/// `data.heartbeats`
async fn cmd_list(client: &OpsgenieClient, all: bool, limit: u64) -> Result<()> {
    if all {
        let items = fetch_all(client, Method::GET, "/heartbeats", None, &[]).await?;
        display::output_items(&items)
    } else {
        let query = vec![("limit".to_string(), limit.to_string())];
        let envelope = client
            .request(Method::GET, "/heartbeats", None, &query)
            .await?;
        display::output_value(&unwrap_heartbeats(&envelope))
    }
}

/// Dig the heartbeat list out of a single-page response
fn unwrap_heartbeats(envelope: &Envelope) -> Value {
    match &envelope.data {
        Some(data) => data.get("heartbeats").cloned().unwrap_or_else(|| data.clone()),
        None => Value::Array(Vec::new()),
    }
}

/// Build the create-heartbeat request body
#[allow(clippy::too_many_arguments)]
fn build_create_body(
    name: &str,
    interval: u64,
    interval_unit: &str,
    description: Option<&str>,
    enabled: Option<bool>,
    owner_team: Option<&str>,
    alert_message: Option<&str>,
    alert_priority: Option<Priority>,
    alert_tags: Option<&str>,
) -> Value {
    let mut body = Map::new();
    body.insert("name".to_string(), json!(name));
    body.insert("interval".to_string(), json!(interval));
    body.insert("intervalUnit".to_string(), json!(interval_unit));
    insert_optional_fields(
        &mut body,
        description,
        enabled,
        owner_team,
        alert_message,
        alert_priority,
        alert_tags,
    );
    Value::Object(body)
}

/// Build a partial heartbeat update body
#[allow(clippy::too_many_arguments)]
fn build_update_body(
    description: Option<&str>,
    interval: Option<u64>,
    interval_unit: Option<&str>,
    enabled: Option<bool>,
    owner_team: Option<&str>,
    alert_message: Option<&str>,
    alert_priority: Option<Priority>,
    alert_tags: Option<&str>,
) -> Value {
    let mut body = Map::new();
    if let Some(interval) = interval {
        body.insert("interval".to_string(), json!(interval));
    }
    if let Some(unit) = interval_unit {
        body.insert("intervalUnit".to_string(), json!(unit));
    }
    insert_optional_fields(
        &mut body,
        description,
        enabled,
        owner_team,
        alert_message,
        alert_priority,
        alert_tags,
    );
    Value::Object(body)
}

fn insert_optional_fields(
    body: &mut Map<String, Value>,
    description: Option<&str>,
    enabled: Option<bool>,
    owner_team: Option<&str>,
    alert_message: Option<&str>,
    alert_priority: Option<Priority>,
    alert_tags: Option<&str>,
) {
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(enabled) = enabled {
        body.insert("enabled".to_string(), json!(enabled));
    }
    if let Some(team) = owner_team {
        body.insert("ownerTeam".to_string(), json!({ "id": team }));
    }
    if let Some(message) = alert_message {
        body.insert("alertMessage".to_string(), json!(message));
    }
    if let Some(priority) = alert_priority {
        body.insert("alertPriority".to_string(), json!(priority.as_str()));
    }
    if let Some(tags) = alert_tags {
        body.insert("alertTags".to_string(), json!(parse_tags(tags)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_minimal() {
        let body = build_create_body(
            "nightly-backup",
            24,
            "hours",
            None,
            None,
            None,
            None,
            None,
            None,
        );
        assert_eq!(
            body,
            json!({"name": "nightly-backup", "interval": 24, "intervalUnit": "hours"})
        );
    }

    #[test]
    fn create_body_with_alert_settings() {
        let body = build_create_body(
            "nightly-backup",
            24,
            "hours",
            Some("backup job"),
            Some(true),
            Some("t1"),
            Some("backup missed"),
            Some(Priority::P3),
            Some("backup,cron"),
        );
        assert_eq!(body["alertMessage"], "backup missed");
        assert_eq!(body["alertPriority"], "P3");
        assert_eq!(body["alertTags"], json!(["backup", "cron"]));
        assert_eq!(body["ownerTeam"], json!({"id": "t1"}));
    }

    #[test]
    fn update_body_is_partial() {
        let body = build_update_body(None, Some(12), None, Some(false), None, None, None, None);
        assert_eq!(body, json!({"interval": 12, "enabled": false}));
    }

    #[test]
    fn unwrap_heartbeats_digs_nested_list() {
        let envelope: Envelope = serde_json::from_value(json!({
            "data": {"heartbeats": [{"name": "a"}, {"name": "b"}]}
        }))
        .unwrap();
        let list = unwrap_heartbeats(&envelope);
        assert_eq!(list.as_array().unwrap().len(), 2);
    }

    #[test]
    fn unwrap_heartbeats_falls_back_to_data() {
        let envelope: Envelope =
            serde_json::from_value(json!({"data": [{"name": "a"}]})).unwrap();
        let list = unwrap_heartbeats(&envelope);
        assert_eq!(list, json!([{"name": "a"}]));
    }

    #[test]
    fn unwrap_heartbeats_empty_without_data() {
        assert_eq!(unwrap_heartbeats(&Envelope::default()), json!([]));
    }
}
