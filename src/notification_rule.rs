//! Notification rule operations
//!
//! Notification rules belong to a user; every command takes `--user-id`.

use anyhow::Result;
use clap::{Args, Subcommand};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::parse_json_arg;

/// Optional notification-rule fields shared by create and update
#[derive(Debug, Default, Args)]
pub struct RuleFields {
    /// Criteria as JSON {type, conditions}
    #[arg(long)]
    pub criteria: Option<String>,

    /// Notification times as a JSON array (schedule rules)
    #[arg(long)]
    pub notification_time: Option<String>,

    /// Time restriction as JSON
    #[arg(long)]
    pub time_restriction: Option<String>,

    /// Schedules as a JSON array of {id|name}
    #[arg(long)]
    pub schedules: Option<String>,

    /// Repeat settings as JSON {loopAfter, enabled}
    #[arg(long)]
    pub repeat: Option<String>,

    /// Rule order
    #[arg(long)]
    pub order: Option<u64>,

    /// Whether the rule is active
    #[arg(long)]
    pub enabled: Option<bool>,
}

/// Notification rule subcommands
#[derive(Debug, Subcommand)]
pub enum NotificationRuleCommand {
    /// Create a notification rule
    Create {
        /// Owner user ID or username
        #[arg(long)]
        user_id: String,

        /// Rule name
        name: String,

        /// Action the rule reacts to (create-alert, closed-alert, ...)
        #[arg(long)]
        action_type: String,

        /// Notification steps as a JSON array
        #[arg(long)]
        steps: String,

        #[command(flatten)]
        fields: RuleFields,
    },

    /// Show notification rule details
    Get {
        /// Owner user ID or username
        #[arg(long)]
        user_id: String,

        /// Rule ID
        rule: String,
    },

    /// List notification rules of a user
    List {
        /// Owner user ID or username
        #[arg(long)]
        user_id: String,

        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of rules to return
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// Update a notification rule (only supplied fields are sent)
    Update {
        /// Owner user ID or username
        #[arg(long)]
        user_id: String,

        /// Rule ID
        rule: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New action type
        #[arg(long)]
        action_type: Option<String>,

        /// Notification steps as a JSON array
        #[arg(long)]
        steps: Option<String>,

        #[command(flatten)]
        fields: RuleFields,
    },

    /// Delete a notification rule
    Delete {
        /// Owner user ID or username
        #[arg(long)]
        user_id: String,

        /// Rule ID
        rule: String,
    },

    /// Enable a notification rule
    Enable {
        /// Owner user ID or username
        #[arg(long)]
        user_id: String,

        /// Rule ID
        rule: String,
    },

    /// Disable a notification rule
    Disable {
        /// Owner user ID or username
        #[arg(long)]
        user_id: String,

        /// Rule ID
        rule: String,
    },
}

/// Run a notification rule command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: NotificationRuleCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        NotificationRuleCommand::Create {
            user_id,
            name,
            action_type,
            steps,
            fields,
        } => {
            let mut body = build_fields_body(&fields)?;
            body.insert("name".to_string(), json!(name));
            body.insert("actionType".to_string(), json!(action_type));
            body.insert("steps".to_string(), parse_json_arg("steps", &steps)?);
            let path = base_path(&user_id);
            let envelope = client
                .request(Method::POST, &path, Some(Value::Object(body)), &[])
                .await?;
            display::output_data(&envelope)
        }
        NotificationRuleCommand::Get { user_id, rule } => {
            let path = format!("{}/{}", base_path(&user_id), rule);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        NotificationRuleCommand::List {
            user_id,
            all,
            limit,
        } => {
            let path = base_path(&user_id);
            if all {
                let items = fetch_all(&client, Method::GET, &path, None, &[]).await?;
                display::output_items(&items)
            } else {
                let query = vec![("limit".to_string(), limit.to_string())];
                let envelope = client.request(Method::GET, &path, None, &query).await?;
                display::output_data(&envelope)
            }
        }
        NotificationRuleCommand::Update {
            user_id,
            rule,
            name,
            action_type,
            steps,
            fields,
        } => {
            let mut body = build_fields_body(&fields)?;
            if let Some(name) = name {
                body.insert("name".to_string(), json!(name));
            }
            if let Some(action_type) = action_type {
                body.insert("actionType".to_string(), json!(action_type));
            }
            if let Some(raw) = steps {
                body.insert("steps".to_string(), parse_json_arg("steps", &raw)?);
            }
            let path = format!("{}/{}", base_path(&user_id), rule);
            let envelope = client
                .request(Method::PATCH, &path, Some(Value::Object(body)), &[])
                .await?;
            display::output_data(&envelope)
        }
        NotificationRuleCommand::Delete { user_id, rule } => {
            let path = format!("{}/{}", base_path(&user_id), rule);
            let envelope = client.request(Method::DELETE, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        NotificationRuleCommand::Enable { user_id, rule } => {
            let path = format!("{}/{}/enable", base_path(&user_id), rule);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        NotificationRuleCommand::Disable { user_id, rule } => {
            let path = format!("{}/{}/disable", base_path(&user_id), rule);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
    }
}

/// Rules are nested under their owner
fn base_path(user_id: &str) -> String {
    format!("/users/{}/notification-rules", user_id)
}

/// Map the shared optional fields into a request body
fn build_fields_body(fields: &RuleFields) -> Result<Map<String, Value>> {
    let mut body = Map::new();

    if let Some(raw) = &fields.criteria {
        body.insert("criteria".to_string(), parse_json_arg("criteria", raw)?);
    }
    if let Some(raw) = &fields.notification_time {
        body.insert(
            "notificationTime".to_string(),
            parse_json_arg("notification-time", raw)?,
        );
    }
    if let Some(raw) = &fields.time_restriction {
        body.insert(
            "timeRestriction".to_string(),
            parse_json_arg("time-restriction", raw)?,
        );
    }
    if let Some(raw) = &fields.schedules {
        body.insert("schedules".to_string(), parse_json_arg("schedules", raw)?);
    }
    if let Some(raw) = &fields.repeat {
        body.insert("repeat".to_string(), parse_json_arg("repeat", raw)?);
    }
    if let Some(order) = fields.order {
        body.insert("order".to_string(), json!(order));
    }
    if let Some(enabled) = fields.enabled {
        body.insert("enabled".to_string(), json!(enabled));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_nests_under_user() {
        assert_eq!(base_path("u1"), "/users/u1/notification-rules");
    }

    #[test]
    fn fields_body_empty_by_default() {
        assert!(build_fields_body(&RuleFields::default()).unwrap().is_empty());
    }

    #[test]
    fn fields_body_parses_json_fields() {
        let fields = RuleFields {
            criteria: Some(r#"{"type": "match-all"}"#.to_string()),
            schedules: Some(r#"[{"id": "s1"}]"#.to_string()),
            repeat: Some(r#"{"loopAfter": 5, "enabled": true}"#.to_string()),
            order: Some(1),
            enabled: Some(true),
            ..Default::default()
        };
        let body = build_fields_body(&fields).unwrap();
        assert_eq!(body["criteria"]["type"], "match-all");
        assert_eq!(body["schedules"][0]["id"], "s1");
        assert_eq!(body["repeat"]["loopAfter"], 5);
        assert_eq!(body["order"], 1);
        assert_eq!(body["enabled"], json!(true));
    }

    #[test]
    fn fields_body_rejects_bad_json() {
        let fields = RuleFields {
            criteria: Some("{oops".to_string()),
            ..Default::default()
        };
        assert!(build_fields_body(&fields).is_err());
    }
}
