//! Maintenance window operations

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::{format_date_to_iso, parse_json_arg};

/// How the maintenance window is bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeType {
    /// A fixed number of minutes from now
    For,
    /// An explicit start/end window
    Schedule,
}

impl TimeType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::For => "for",
            Self::Schedule => "schedule",
        }
    }
}

/// Maintenance subcommands
#[derive(Debug, Subcommand)]
pub enum MaintenanceCommand {
    /// Create a maintenance window
    Create {
        /// Description of the window
        description: String,

        /// Window type
        #[arg(long, value_enum)]
        time_type: TimeType,

        /// Rules as a JSON array of {state, entity}
        #[arg(long)]
        rules: String,

        /// Duration in minutes (time type `for`)
        #[arg(long, required_if_eq("time_type", "for"))]
        for_minutes: Option<u64>,

        /// Window start (time type `schedule`)
        #[arg(long, required_if_eq("time_type", "schedule"))]
        start_date: Option<String>,

        /// Window end (time type `schedule`)
        #[arg(long, required_if_eq("time_type", "schedule"))]
        end_date: Option<String>,
    },

    /// Show maintenance details
    Get {
        /// Maintenance ID
        maintenance: String,
    },

    /// List maintenance windows
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of windows to return
        #[arg(short, long, default_value = "20")]
        limit: u64,

        /// Filter by window type (past, non-expired)
        #[arg(long = "type")]
        window_type: Option<String>,
    },

    /// Update a maintenance window (only supplied fields are sent)
    Update {
        /// Maintenance ID
        maintenance: String,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Rules as a JSON array
        #[arg(long)]
        rules: Option<String>,

        /// Time settings as JSON
        #[arg(long)]
        time: Option<String>,
    },

    /// Delete a maintenance window
    Delete {
        /// Maintenance ID
        maintenance: String,
    },

    /// Cancel an ongoing maintenance window
    Cancel {
        /// Maintenance ID
        maintenance: String,
    },
}

/// Run a maintenance command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: MaintenanceCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        MaintenanceCommand::Create {
            description,
            time_type,
            rules,
            for_minutes,
            start_date,
            end_date,
        } => {
            let body = build_create_body(
                &description,
                time_type,
                &rules,
                for_minutes,
                start_date.as_deref(),
                end_date.as_deref(),
            )?;
            let envelope = client
                .request(Method::POST, "/maintenance", Some(body), &[])
                .await?;
            display::output_data(&envelope)
        }
        MaintenanceCommand::Get { maintenance } => {
            let path = format!("/maintenance/{}", maintenance);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        MaintenanceCommand::List {
            all,
            limit,
            window_type,
        } => {
            let mut query = Vec::new();
            if let Some(value) = window_type {
                query.push(("type".to_string(), value));
            }

            if all {
                let items = fetch_all(&client, Method::GET, "/maintenance", None, &query).await?;
                display::output_items(&items)
            } else {
                query.push(("limit".to_string(), limit.to_string()));
                let envelope = client
                    .request(Method::GET, "/maintenance", None, &query)
                    .await?;
                display::output_data(&envelope)
            }
        }
        MaintenanceCommand::Update {
            maintenance,
            description,
            rules,
            time,
        } => {
            let body =
                build_update_body(description.as_deref(), rules.as_deref(), time.as_deref())?;
            let path = format!("/maintenance/{}", maintenance);
            let envelope = client.request(Method::PATCH, &path, Some(body), &[]).await?;
            display::output_data(&envelope)
        }
        MaintenanceCommand::Delete { maintenance } => {
            let path = format!("/maintenance/{}", maintenance);
            let envelope = client.request(Method::DELETE, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        MaintenanceCommand::Cancel { maintenance } => {
            let path = format!("/maintenance/{}/cancel", maintenance);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
    }
}

/// Build the create-maintenance body; the time object depends on the type
fn build_create_body(
    description: &str,
    time_type: TimeType,
    rules: &str,
    for_minutes: Option<u64>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<Value> {
    let mut time = Map::new();
    time.insert("type".to_string(), json!(time_type.as_str()));
    match time_type {
        TimeType::For => {
            if let Some(minutes) = for_minutes {
                time.insert("forMinutes".to_string(), json!(minutes));
            }
        }
        TimeType::Schedule => {
            if let Some(start) = start_date {
                time.insert("startDate".to_string(), json!(format_date_to_iso(start)?));
            }
            if let Some(end) = end_date {
                time.insert("endDate".to_string(), json!(format_date_to_iso(end)?));
            }
        }
    }

    let mut body = Map::new();
    body.insert("description".to_string(), json!(description));
    body.insert("time".to_string(), Value::Object(time));
    body.insert("rules".to_string(), parse_json_arg("rules", rules)?);
    Ok(Value::Object(body))
}

/// Build a partial maintenance update body
fn build_update_body(
    description: Option<&str>,
    rules: Option<&str>,
    time: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(raw) = rules {
        body.insert("rules".to_string(), parse_json_arg("rules", raw)?);
    }
    if let Some(raw) = time {
        body.insert("time".to_string(), parse_json_arg("time", raw)?);
    }
    Ok(Value::Object(body))
}
