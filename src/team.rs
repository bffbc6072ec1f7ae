//! Team operations

use anyhow::Result;
use clap::{Args, Subcommand};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::{build_identifier_query, parse_json_arg};
use crate::types::IdentifierType;

/// Team to act on
#[derive(Debug, Args)]
pub struct TeamTarget {
    /// Team ID or name
    pub team: String,

    /// How to interpret the team identifier
    #[arg(long, value_enum, default_value_t = IdentifierType::Id)]
    pub identifier_type: IdentifierType,
}

/// Team subcommands
#[derive(Debug, Subcommand)]
pub enum TeamCommand {
    /// Create a team
    Create {
        /// Team name
        name: String,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Members as a JSON array of {user: {id|username}, role}
        #[arg(long)]
        members: Option<String>,
    },

    /// Show team details
    Get {
        #[command(flatten)]
        target: TeamTarget,
    },

    /// List teams
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of teams to return
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// Update a team (only supplied fields are sent)
    Update {
        #[command(flatten)]
        target: TeamTarget,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Members as a JSON array of {user: {id|username}, role}
        #[arg(long)]
        members: Option<String>,
    },

    /// Delete a team
    Delete {
        #[command(flatten)]
        target: TeamTarget,
    },

    /// List team members
    Members {
        #[command(flatten)]
        target: TeamTarget,
    },

    /// Add a member to a team
    AddMember {
        #[command(flatten)]
        target: TeamTarget,

        /// User ID
        #[arg(long)]
        user_id: String,

        /// Member role (user, admin)
        #[arg(long, default_value = "user")]
        role: String,
    },

    /// Remove a member from a team
    RemoveMember {
        #[command(flatten)]
        target: TeamTarget,

        /// User ID
        #[arg(long)]
        user_id: String,
    },

    /// Show the team audit log
    Logs {
        #[command(flatten)]
        target: TeamTarget,

        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of log entries to return
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// List routing rules
    RoutingRules {
        #[command(flatten)]
        target: TeamTarget,
    },

    /// Create a routing rule
    CreateRoutingRule {
        #[command(flatten)]
        target: TeamTarget,

        /// Rule name
        name: String,

        /// Notify target as JSON {type, id|name}
        #[arg(long)]
        notify: String,

        /// Criteria as JSON {type, conditions}
        #[arg(long)]
        criteria: Option<String>,

        /// Timezone of the rule
        #[arg(long)]
        timezone: Option<String>,

        /// Time restriction as JSON
        #[arg(long)]
        time_restriction: Option<String>,

        /// Rule order
        #[arg(long)]
        order: Option<u64>,
    },

    /// Delete a routing rule
    DeleteRoutingRule {
        #[command(flatten)]
        target: TeamTarget,

        /// Routing rule ID
        rule_id: String,
    },
}

/// Run a team command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: TeamCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        TeamCommand::Create {
            name,
            description,
            members,
        } => {
            let body = build_create_body(&name, description.as_deref(), members.as_deref())?;
            let envelope = client
                .request(Method::POST, "/teams", Some(body), &[])
                .await?;
            display::output_data(&envelope)
        }
        TeamCommand::Get { target } => {
            let envelope = get_team(&client, &target).await?;
            display::output_data(&envelope)
        }
        TeamCommand::List { all, limit } => cmd_list(&client, all, limit).await,
        TeamCommand::Update {
            target,
            name,
            description,
            members,
        } => {
            let body =
                build_update_body(name.as_deref(), description.as_deref(), members.as_deref())?;
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/teams/{}", target.team);
            let envelope = client
                .request(Method::PATCH, &path, Some(body), &query)
                .await?;
            display::output_data(&envelope)
        }
        TeamCommand::Delete { target } => {
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/teams/{}", target.team);
            let envelope = client.request(Method::DELETE, &path, None, &query).await?;
            display::output_envelope(&envelope)
        }
        TeamCommand::Members { target } => cmd_members(&client, &target).await,
        TeamCommand::AddMember {
            target,
            user_id,
            role,
        } => {
            let body = json!({ "user": { "id": user_id }, "role": role });
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/teams/{}/members", target.team);
            let envelope = client
                .request(Method::POST, &path, Some(body), &query)
                .await?;
            display::output_envelope(&envelope)
        }
        TeamCommand::RemoveMember { target, user_id } => {
            let mut query = build_identifier_query(target.identifier_type);
            query.push(("memberId".to_string(), user_id.clone()));
            let path = format!("/teams/{}/members/{}", target.team, user_id);
            let envelope = client.request(Method::DELETE, &path, None, &query).await?;
            display::output_envelope(&envelope)
        }
        TeamCommand::Logs { target, all, limit } => cmd_logs(&client, &target, all, limit).await,
        TeamCommand::RoutingRules { target } => {
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/teams/{}/routing-rules", target.team);
            let envelope = client.request(Method::GET, &path, None, &query).await?;
            display::output_data(&envelope)
        }
        TeamCommand::CreateRoutingRule {
            target,
            name,
            notify,
            criteria,
            timezone,
            time_restriction,
            order,
        } => {
            let body = build_routing_rule_body(
                &name,
                &notify,
                criteria.as_deref(),
                timezone.as_deref(),
                time_restriction.as_deref(),
                order,
            )?;
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/teams/{}/routing-rules", target.team);
            let envelope = client
                .request(Method::POST, &path, Some(body), &query)
                .await?;
            display::output_data(&envelope)
        }
        TeamCommand::DeleteRoutingRule { target, rule_id } => {
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/teams/{}/routing-rules/{}", target.team, rule_id);
            let envelope = client.request(Method::DELETE, &path, None, &query).await?;
            display::output_envelope(&envelope)
        }
    }
}

async fn get_team(
    client: &OpsgenieClient,
    target: &TeamTarget,
) -> Result<crate::types::Envelope> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/teams/{}", target.team);
    client.request(Method::GET, &path, None, &query).await
}

/// List teams
async fn cmd_list(client: &OpsgenieClient, all: bool, limit: u64) -> Result<()> {
    if all {
        let items = fetch_all(client, Method::GET, "/teams", None, &[]).await?;
        display::output_items(&items)
    } else {
        let query = vec![("limit".to_string(), limit.to_string())];
        let envelope = client.request(Method::GET, "/teams", None, &query).await?;
        display::output_data(&envelope)
    }
}

/// Show the members of a team (read from the team payload)
async fn cmd_members(client: &OpsgenieClient, target: &TeamTarget) -> Result<()> {
    let envelope = get_team(client, target).await?;
    let members = envelope
        .data
        .as_ref()
        .and_then(|data| data.get("members"))
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    display::output_value(&members)
}

/// Show the team audit log
async fn cmd_logs(client: &OpsgenieClient, target: &TeamTarget, all: bool, limit: u64) -> Result<()> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/teams/{}/logs", target.team);

    if all {
        let items = fetch_all(client, Method::GET, &path, None, &query).await?;
        display::output_items(&items)
    } else {
        let mut query = query;
        query.push(("limit".to_string(), limit.to_string()));
        let envelope = client.request(Method::GET, &path, None, &query).await?;
        display::output_data(&envelope)
    }
}

/// Build the create-team request body
fn build_create_body(
    name: &str,
    description: Option<&str>,
    members: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    body.insert("name".to_string(), json!(name));
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(raw) = members {
        body.insert("members".to_string(), parse_json_arg("members", raw)?);
    }
    Ok(Value::Object(body))
}

/// Build a partial team update body
fn build_update_body(
    name: Option<&str>,
    description: Option<&str>,
    members: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    if let Some(name) = name {
        body.insert("name".to_string(), json!(name));
    }
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(raw) = members {
        body.insert("members".to_string(), parse_json_arg("members", raw)?);
    }
    Ok(Value::Object(body))
}

/// Build a routing-rule creation body
fn build_routing_rule_body(
    name: &str,
    notify: &str,
    criteria: Option<&str>,
    timezone: Option<&str>,
    time_restriction: Option<&str>,
    order: Option<u64>,
) -> Result<Value> {
    let mut body = Map::new();
    body.insert("name".to_string(), json!(name));
    body.insert("notify".to_string(), parse_json_arg("notify", notify)?);
    if let Some(raw) = criteria {
        body.insert("criteria".to_string(), parse_json_arg("criteria", raw)?);
    }
    if let Some(timezone) = timezone {
        body.insert("timezone".to_string(), json!(timezone));
    }
    if let Some(raw) = time_restriction {
        body.insert(
            "timeRestriction".to_string(),
            parse_json_arg("time-restriction", raw)?,
        );
    }
    if let Some(order) = order {
        body.insert("order".to_string(), json!(order));
    }
    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_minimal() {
        let body = build_create_body("SRE", None, None).unwrap();
        assert_eq!(body, json!({"name": "SRE"}));
    }

    #[test]
    fn create_body_with_members() {
        let members = r#"[{"user": {"id": "u1"}, "role": "admin"}]"#;
        let body = build_create_body("SRE", Some("on-call team"), Some(members)).unwrap();
        assert_eq!(body["description"], "on-call team");
        assert_eq!(body["members"][0]["role"], "admin");
    }

    #[test]
    fn create_body_rejects_bad_members_json() {
        assert!(build_create_body("SRE", None, Some("oops")).is_err());
    }

    #[test]
    fn update_body_is_partial() {
        let body = build_update_body(None, Some("renamed"), None).unwrap();
        assert_eq!(body, json!({"description": "renamed"}));
    }

    #[test]
    fn update_body_empty_when_nothing_supplied() {
        let body = build_update_body(None, None, None).unwrap();
        assert_eq!(body, json!({}));
    }

    #[test]
    fn routing_rule_body_requires_valid_notify() {
        assert!(build_routing_rule_body("r", "{bad", None, None, None, None).is_err());
    }

    #[test]
    fn routing_rule_body_full() {
        let body = build_routing_rule_body(
            "after-hours",
            r#"{"type": "schedule", "id": "s1"}"#,
            Some(r#"{"type": "match-all"}"#),
            Some("Europe/Warsaw"),
            Some(r#"{"type": "time-of-day"}"#),
            Some(2),
        )
        .unwrap();
        assert_eq!(body["notify"]["type"], "schedule");
        assert_eq!(body["criteria"]["type"], "match-all");
        assert_eq!(body["timezone"], "Europe/Warsaw");
        assert_eq!(body["timeRestriction"]["type"], "time-of-day");
        assert_eq!(body["order"], 2);
    }
}
