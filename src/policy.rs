//! Alert and notification policy operations
//!
//! Policies live either globally or under a team; `--team-id` switches the
//! base path.

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::{parse_json_arg, parse_tags};
use crate::types::Priority;

/// Kind of policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyType {
    Alert,
    Notification,
}

impl PolicyType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Notification => "notification",
        }
    }
}

/// Optional policy fields shared by create and update
#[derive(Debug, Default, Args)]
pub struct PolicyFields {
    /// Description of the policy itself
    #[arg(long)]
    pub policy_description: Option<String>,

    /// Whether the policy is active
    #[arg(long)]
    pub enabled: Option<bool>,

    /// Filter type (match-all, match-any-condition, match-all-conditions)
    #[arg(long)]
    pub filter_type: Option<String>,

    /// Filter conditions as a JSON array
    #[arg(long)]
    pub filter_conditions: Option<String>,

    /// Time restrictions as JSON
    #[arg(long)]
    pub time_restrictions: Option<String>,

    /// Alert message override
    #[arg(long)]
    pub message: Option<String>,

    /// Alert alias override
    #[arg(long)]
    pub alias: Option<String>,

    /// Alert description override
    #[arg(long)]
    pub alert_description: Option<String>,

    /// Alert entity override
    #[arg(long)]
    pub entity: Option<String>,

    /// Alert source override
    #[arg(long)]
    pub source: Option<String>,

    /// Comma-separated custom action names
    #[arg(long)]
    pub actions: Option<String>,

    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,

    /// Priority override
    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    /// Responders as a JSON array
    #[arg(long)]
    pub responders: Option<String>,

    /// Continue evaluating later policies
    #[arg(long)]
    pub continue_policy: Option<bool>,

    /// Suppress the alert entirely
    #[arg(long)]
    pub suppress: Option<bool>,

    /// Discard the original actions
    #[arg(long)]
    pub ignore_original_actions: Option<bool>,

    /// Discard the original details
    #[arg(long)]
    pub ignore_original_details: Option<bool>,

    /// Discard the original responders
    #[arg(long)]
    pub ignore_original_responders: Option<bool>,

    /// Discard the original tags
    #[arg(long)]
    pub ignore_original_tags: Option<bool>,
}

/// Policy subcommands
#[derive(Debug, Subcommand)]
pub enum PolicyCommand {
    /// Create a policy
    Create {
        /// Policy name
        name: String,

        /// Policy type
        #[arg(long, value_enum)]
        policy_type: PolicyType,

        /// Owner team ID (global policy when absent)
        #[arg(long)]
        team_id: Option<String>,

        #[command(flatten)]
        fields: PolicyFields,
    },

    /// Show policy details
    Get {
        /// Policy ID
        policy: String,

        /// Owner team ID (global policy when absent)
        #[arg(long)]
        team_id: Option<String>,
    },

    /// List policies of a type
    List {
        /// Policy type
        #[arg(long, value_enum)]
        policy_type: PolicyType,

        /// Owner team ID (global policies when absent)
        #[arg(long)]
        team_id: Option<String>,

        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of policies to return
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// Replace policy fields (PUT semantics upstream)
    Update {
        /// Policy ID
        policy: String,

        /// Owner team ID (global policy when absent)
        #[arg(long)]
        team_id: Option<String>,

        /// New name
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        fields: PolicyFields,
    },

    /// Delete a policy
    Delete {
        /// Policy ID
        policy: String,

        /// Owner team ID (global policy when absent)
        #[arg(long)]
        team_id: Option<String>,
    },

    /// Enable a policy
    Enable {
        /// Policy ID
        policy: String,

        /// Owner team ID (global policy when absent)
        #[arg(long)]
        team_id: Option<String>,
    },

    /// Disable a policy
    Disable {
        /// Policy ID
        policy: String,

        /// Owner team ID (global policy when absent)
        #[arg(long)]
        team_id: Option<String>,
    },

    /// Move a policy to a new position in evaluation order
    ChangeOrder {
        /// Policy ID
        policy: String,

        /// Target position
        #[arg(long)]
        target_index: u64,

        /// Owner team ID (global policy when absent)
        #[arg(long)]
        team_id: Option<String>,
    },
}

/// Run a policy command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: PolicyCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        PolicyCommand::Create {
            name,
            policy_type,
            team_id,
            fields,
        } => {
            let mut body = build_fields_body(&fields)?;
            body.insert("name".to_string(), json!(name));
            body.insert("type".to_string(), json!(policy_type.as_str()));
            let path = base_path(team_id.as_deref());
            let envelope = client
                .request(Method::POST, &path, Some(Value::Object(body)), &[])
                .await?;
            display::output_data(&envelope)
        }
        PolicyCommand::Get { policy, team_id } => {
            let path = format!("{}/{}", base_path(team_id.as_deref()), policy);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        PolicyCommand::List {
            policy_type,
            team_id,
            all,
            limit,
        } => {
            let path = base_path(team_id.as_deref());
            let mut query = vec![("type".to_string(), policy_type.as_str().to_string())];

            if all {
                let items = fetch_all(&client, Method::GET, &path, None, &query).await?;
                display::output_items(&items)
            } else {
                query.push(("limit".to_string(), limit.to_string()));
                let envelope = client.request(Method::GET, &path, None, &query).await?;
                display::output_data(&envelope)
            }
        }
        PolicyCommand::Update {
            policy,
            team_id,
            name,
            fields,
        } => {
            let mut body = build_fields_body(&fields)?;
            if let Some(name) = name {
                body.insert("name".to_string(), json!(name));
            }
            let path = format!("{}/{}", base_path(team_id.as_deref()), policy);
            let envelope = client
                .request(Method::PUT, &path, Some(Value::Object(body)), &[])
                .await?;
            display::output_data(&envelope)
        }
        PolicyCommand::Delete { policy, team_id } => {
            let path = format!("{}/{}", base_path(team_id.as_deref()), policy);
            let envelope = client.request(Method::DELETE, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        PolicyCommand::Enable { policy, team_id } => {
            let path = format!("{}/{}/enable", base_path(team_id.as_deref()), policy);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        PolicyCommand::Disable { policy, team_id } => {
            let path = format!("{}/{}/disable", base_path(team_id.as_deref()), policy);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        PolicyCommand::ChangeOrder {
            policy,
            target_index,
            team_id,
        } => {
            let body = json!({ "targetIndex": target_index });
            let path = format!("{}/{}/change-order", base_path(team_id.as_deref()), policy);
            let envelope = client.request(Method::POST, &path, Some(body), &[]).await?;
            display::output_envelope(&envelope)
        }
    }
}

/// Team policies live under the team, global ones at the root
fn base_path(team_id: Option<&str>) -> String {
    match team_id {
        Some(team_id) if !team_id.is_empty() => format!("/teams/{}/policies", team_id),
        _ => "/policies".to_string(),
    }
}

/// Map the shared optional fields into a request body
fn build_fields_body(fields: &PolicyFields) -> Result<Map<String, Value>> {
    let mut body = Map::new();

    if let Some(description) = &fields.policy_description {
        body.insert("policyDescription".to_string(), json!(description));
    }
    if let Some(enabled) = fields.enabled {
        body.insert("enabled".to_string(), json!(enabled));
    }
    if let Some(filter) = build_filter(
        fields.filter_type.as_deref(),
        fields.filter_conditions.as_deref(),
    )? {
        body.insert("filter".to_string(), filter);
    }
    if let Some(raw) = &fields.time_restrictions {
        body.insert(
            "timeRestrictions".to_string(),
            parse_json_arg("time-restrictions", raw)?,
        );
    }
    if let Some(message) = &fields.message {
        body.insert("message".to_string(), json!(message));
    }
    if let Some(alias) = &fields.alias {
        body.insert("alias".to_string(), json!(alias));
    }
    if let Some(description) = &fields.alert_description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(entity) = &fields.entity {
        body.insert("entity".to_string(), json!(entity));
    }
    if let Some(source) = &fields.source {
        body.insert("source".to_string(), json!(source));
    }
    if let Some(actions) = &fields.actions {
        body.insert("actions".to_string(), json!(parse_tags(actions)));
    }
    if let Some(tags) = &fields.tags {
        body.insert("tags".to_string(), json!(parse_tags(tags)));
    }
    if let Some(priority) = fields.priority {
        body.insert("priority".to_string(), json!(priority.as_str()));
    }
    if let Some(raw) = &fields.responders {
        body.insert("responders".to_string(), parse_json_arg("responders", raw)?);
    }
    if let Some(continue_policy) = fields.continue_policy {
        body.insert("continue".to_string(), json!(continue_policy));
    }
    if let Some(suppress) = fields.suppress {
        body.insert("suppress".to_string(), json!(suppress));
    }
    if let Some(flag) = fields.ignore_original_actions {
        body.insert("ignoreOriginalActions".to_string(), json!(flag));
    }
    if let Some(flag) = fields.ignore_original_details {
        body.insert("ignoreOriginalDetails".to_string(), json!(flag));
    }
    if let Some(flag) = fields.ignore_original_responders {
        body.insert("ignoreOriginalResponders".to_string(), json!(flag));
    }
    if let Some(flag) = fields.ignore_original_tags {
        body.insert("ignoreOriginalTags".to_string(), json!(flag));
    }

    Ok(body)
}

/// Assemble the filter object; conditions without an explicit type default
/// to match-all-conditions
fn build_filter(filter_type: Option<&str>, conditions: Option<&str>) -> Result<Option<Value>> {
    let mut filter = Map::new();

    if let Some(filter_type) = filter_type {
        filter.insert("type".to_string(), json!(filter_type));
    }
    if let Some(raw) = conditions {
        if !filter.contains_key("type") {
            filter.insert("type".to_string(), json!("match-all-conditions"));
        }
        filter.insert(
            "conditions".to_string(),
            parse_json_arg("filter-conditions", raw)?,
        );
    }

    if filter.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Value::Object(filter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_global_and_team() {
        assert_eq!(base_path(None), "/policies");
        assert_eq!(base_path(Some("")), "/policies");
        assert_eq!(base_path(Some("t1")), "/teams/t1/policies");
    }

    #[test]
    fn fields_body_empty_by_default() {
        let body = build_fields_body(&PolicyFields::default()).unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn fields_body_maps_overrides() {
        let fields = PolicyFields {
            message: Some("override".to_string()),
            tags: Some("a,b".to_string()),
            priority: Some(Priority::P4),
            continue_policy: Some(true),
            suppress: Some(false),
            ignore_original_tags: Some(true),
            ..Default::default()
        };
        let body = build_fields_body(&fields).unwrap();
        assert_eq!(body["message"], "override");
        assert_eq!(body["tags"], json!(["a", "b"]));
        assert_eq!(body["priority"], "P4");
        assert_eq!(body["continue"], json!(true));
        assert_eq!(body["suppress"], json!(false));
        assert_eq!(body["ignoreOriginalTags"], json!(true));
    }

    #[test]
    fn filter_absent_without_inputs() {
        assert!(build_filter(None, None).unwrap().is_none());
    }

    #[test]
    fn filter_type_only() {
        let filter = build_filter(Some("match-all"), None).unwrap().unwrap();
        assert_eq!(filter, json!({"type": "match-all"}));
    }

    #[test]
    fn filter_conditions_default_type() {
        let filter = build_filter(None, Some(r#"[{"field": "priority"}]"#))
            .unwrap()
            .unwrap();
        assert_eq!(filter["type"], "match-all-conditions");
        assert_eq!(filter["conditions"][0]["field"], "priority");
    }

    #[test]
    fn filter_explicit_type_kept_with_conditions() {
        let filter = build_filter(Some("match-any-condition"), Some("[]"))
            .unwrap()
            .unwrap();
        assert_eq!(filter["type"], "match-any-condition");
    }

    #[test]
    fn filter_rejects_bad_conditions() {
        assert!(build_filter(None, Some("{oops")).is_err());
    }

    #[test]
    fn fields_body_parses_responders_raw() {
        let fields = PolicyFields {
            responders: Some(r#"[{"type": "team", "id": "t1"}]"#.to_string()),
            ..Default::default()
        };
        let body = build_fields_body(&fields).unwrap();
        assert_eq!(body["responders"][0]["id"], "t1");
    }
}
