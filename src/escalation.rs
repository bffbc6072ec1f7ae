//! Escalation operations

use anyhow::Result;
use clap::{Args, Subcommand};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::{build_identifier_query, parse_json_arg};
use crate::types::IdentifierType;

/// Escalation to act on
#[derive(Debug, Args)]
pub struct EscalationTarget {
    /// Escalation ID or name
    pub escalation: String,

    /// How to interpret the escalation identifier
    #[arg(long, value_enum, default_value_t = IdentifierType::Id)]
    pub identifier_type: IdentifierType,
}

/// Escalation subcommands
#[derive(Debug, Subcommand)]
pub enum EscalationCommand {
    /// Create an escalation
    Create {
        /// Escalation name
        name: String,

        /// Rules as a JSON array of {condition, notifyType, delay, recipient}
        #[arg(long)]
        rules: String,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Owner team ID
        #[arg(long)]
        owner_team: Option<String>,

        /// Repeat settings as JSON {waitInterval, count, ...}
        #[arg(long)]
        repeat: Option<String>,
    },

    /// Show escalation details
    Get {
        #[command(flatten)]
        target: EscalationTarget,
    },

    /// List escalations
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of escalations to return
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// Update an escalation (only supplied fields are sent)
    Update {
        #[command(flatten)]
        target: EscalationTarget,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Rules as a JSON array
        #[arg(long)]
        rules: Option<String>,

        /// Owner team ID
        #[arg(long)]
        owner_team: Option<String>,

        /// Repeat settings as JSON
        #[arg(long)]
        repeat: Option<String>,
    },

    /// Delete an escalation
    Delete {
        #[command(flatten)]
        target: EscalationTarget,
    },
}

/// Run an escalation command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: EscalationCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        EscalationCommand::Create {
            name,
            rules,
            description,
            owner_team,
            repeat,
        } => {
            let body = build_create_body(
                &name,
                &rules,
                description.as_deref(),
                owner_team.as_deref(),
                repeat.as_deref(),
            )?;
            let envelope = client
                .request(Method::POST, "/escalations", Some(body), &[])
                .await?;
            display::output_data(&envelope)
        }
        EscalationCommand::Get { target } => {
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/escalations/{}", target.escalation);
            let envelope = client.request(Method::GET, &path, None, &query).await?;
            display::output_data(&envelope)
        }
        EscalationCommand::List { all, limit } => {
            if all {
                let items = fetch_all(&client, Method::GET, "/escalations", None, &[]).await?;
                display::output_items(&items)
            } else {
                let query = vec![("limit".to_string(), limit.to_string())];
                let envelope = client
                    .request(Method::GET, "/escalations", None, &query)
                    .await?;
                display::output_data(&envelope)
            }
        }
        EscalationCommand::Update {
            target,
            name,
            description,
            rules,
            owner_team,
            repeat,
        } => {
            let body = build_update_body(
                name.as_deref(),
                description.as_deref(),
                rules.as_deref(),
                owner_team.as_deref(),
                repeat.as_deref(),
            )?;
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/escalations/{}", target.escalation);
            let envelope = client
                .request(Method::PATCH, &path, Some(body), &query)
                .await?;
            display::output_data(&envelope)
        }
        EscalationCommand::Delete { target } => {
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/escalations/{}", target.escalation);
            let envelope = client.request(Method::DELETE, &path, None, &query).await?;
            display::output_envelope(&envelope)
        }
    }
}

/// Build the create-escalation request body
fn build_create_body(
    name: &str,
    rules: &str,
    description: Option<&str>,
    owner_team: Option<&str>,
    repeat: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    body.insert("name".to_string(), json!(name));
    body.insert("rules".to_string(), parse_json_arg("rules", rules)?);
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(team) = owner_team {
        body.insert("ownerTeam".to_string(), json!({ "id": team }));
    }
    if let Some(raw) = repeat {
        body.insert("repeat".to_string(), parse_json_arg("repeat", raw)?);
    }
    Ok(Value::Object(body))
}

/// Build a partial escalation update body
fn build_update_body(
    name: Option<&str>,
    description: Option<&str>,
    rules: Option<&str>,
    owner_team: Option<&str>,
    repeat: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    if let Some(name) = name {
        body.insert("name".to_string(), json!(name));
    }
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(raw) = rules {
        body.insert("rules".to_string(), parse_json_arg("rules", raw)?);
    }
    if let Some(team) = owner_team {
        body.insert("ownerTeam".to_string(), json!({ "id": team }));
    }
    if let Some(raw) = repeat {
        body.insert("repeat".to_string(), parse_json_arg("repeat", raw)?);
    }
    Ok(Value::Object(body))
}
