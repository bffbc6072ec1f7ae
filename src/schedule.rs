//! Schedule operations

use anyhow::Result;
use clap::{Args, Subcommand};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::{build_identifier_query, format_date_to_iso, parse_json_arg};
use crate::types::IdentifierType;

/// Schedule to act on
#[derive(Debug, Args)]
pub struct ScheduleTarget {
    /// Schedule ID or name
    pub schedule: String,

    /// How to interpret the schedule identifier
    #[arg(long, value_enum, default_value_t = IdentifierType::Id)]
    pub identifier_type: IdentifierType,
}

/// Options shared by the on-call lookups
#[derive(Debug, Default, Args)]
pub struct OnCallArgs {
    /// Return a flat list of recipient names
    #[arg(long)]
    pub flat: Option<bool>,

    /// Point in time to resolve the rotation at
    #[arg(long)]
    pub date: Option<String>,
}

/// Schedule subcommands
#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// Create a schedule
    Create {
        /// Schedule name
        name: String,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Timezone of the schedule
        #[arg(long)]
        timezone: Option<String>,

        /// Whether the schedule is active
        #[arg(long)]
        enabled: Option<bool>,

        /// Owner team ID
        #[arg(long)]
        owner_team: Option<String>,

        /// Rotations as a JSON array
        #[arg(long)]
        rotations: Option<String>,
    },

    /// Show schedule details
    Get {
        #[command(flatten)]
        target: ScheduleTarget,
    },

    /// List schedules
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of schedules to return
        #[arg(short, long, default_value = "20")]
        limit: u64,

        /// Expand nested entities (e.g. rotation)
        #[arg(long)]
        expand: Option<String>,
    },

    /// Update a schedule (only supplied fields are sent)
    Update {
        #[command(flatten)]
        target: ScheduleTarget,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Timezone
        #[arg(long)]
        timezone: Option<String>,

        /// Whether the schedule is active
        #[arg(long)]
        enabled: Option<bool>,

        /// Owner team ID
        #[arg(long)]
        owner_team: Option<String>,

        /// Rotations as a JSON array
        #[arg(long)]
        rotations: Option<String>,
    },

    /// Delete a schedule
    Delete {
        #[command(flatten)]
        target: ScheduleTarget,
    },

    /// Show who is on call now
    OnCalls {
        #[command(flatten)]
        target: ScheduleTarget,

        #[command(flatten)]
        options: OnCallArgs,
    },

    /// Show the next on-call rotation
    NextOnCalls {
        #[command(flatten)]
        target: ScheduleTarget,

        #[command(flatten)]
        options: OnCallArgs,
    },

    /// Show the schedule timeline
    Timeline {
        #[command(flatten)]
        target: ScheduleTarget,

        /// Number of interval units to cover
        #[arg(long)]
        interval: Option<u64>,

        /// Interval unit (days, weeks, months)
        #[arg(long)]
        interval_unit: Option<String>,

        /// Start of the timeline window
        #[arg(long)]
        date: Option<String>,
    },

    /// Export the schedule as iCal
    ExportIcal {
        #[command(flatten)]
        target: ScheduleTarget,
    },
}

/// Run a schedule command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: ScheduleCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        ScheduleCommand::Create {
            name,
            description,
            timezone,
            enabled,
            owner_team,
            rotations,
        } => {
            let body = build_schedule_body(
                Some(&name),
                description.as_deref(),
                timezone.as_deref(),
                enabled,
                owner_team.as_deref(),
                rotations.as_deref(),
            )?;
            let envelope = client
                .request(Method::POST, "/schedules", Some(body), &[])
                .await?;
            display::output_data(&envelope)
        }
        ScheduleCommand::Get { target } => {
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/schedules/{}", target.schedule);
            let envelope = client.request(Method::GET, &path, None, &query).await?;
            display::output_data(&envelope)
        }
        ScheduleCommand::List { all, limit, expand } => {
            cmd_list(&client, all, limit, expand.as_deref()).await
        }
        ScheduleCommand::Update {
            target,
            name,
            description,
            timezone,
            enabled,
            owner_team,
            rotations,
        } => {
            let body = build_schedule_body(
                name.as_deref(),
                description.as_deref(),
                timezone.as_deref(),
                enabled,
                owner_team.as_deref(),
                rotations.as_deref(),
            )?;
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/schedules/{}", target.schedule);
            let envelope = client
                .request(Method::PATCH, &path, Some(body), &query)
                .await?;
            display::output_data(&envelope)
        }
        ScheduleCommand::Delete { target } => {
            let query = build_identifier_query(target.identifier_type);
            let path = format!("/schedules/{}", target.schedule);
            let envelope = client.request(Method::DELETE, &path, None, &query).await?;
            display::output_envelope(&envelope)
        }
        ScheduleCommand::OnCalls { target, options } => {
            cmd_on_calls(&client, &target, &options, "on-calls").await
        }
        ScheduleCommand::NextOnCalls { target, options } => {
            cmd_on_calls(&client, &target, &options, "next-on-calls").await
        }
        ScheduleCommand::Timeline {
            target,
            interval,
            interval_unit,
            date,
        } => cmd_timeline(&client, &target, interval, interval_unit.as_deref(), date.as_deref()).await,
        ScheduleCommand::ExportIcal { target } => cmd_export_ical(&client, &target).await,
    }
}

/// List schedules
async fn cmd_list(
    client: &OpsgenieClient,
    all: bool,
    limit: u64,
    expand: Option<&str>,
) -> Result<()> {
    let mut query = Vec::new();
    if let Some(expand) = expand {
        query.push(("expand".to_string(), expand.to_string()));
    }

    if all {
        let items = fetch_all(client, Method::GET, "/schedules", None, &query).await?;
        display::output_items(&items)
    } else {
        query.push(("limit".to_string(), limit.to_string()));
        let envelope = client.request(Method::GET, "/schedules", None, &query).await?;
        display::output_data(&envelope)
    }
}

/// Resolve current or next on-call participants
async fn cmd_on_calls(
    client: &OpsgenieClient,
    target: &ScheduleTarget,
    options: &OnCallArgs,
    suffix: &str,
) -> Result<()> {
    let query = build_on_call_query(target.identifier_type, options)?;
    let path = format!("/schedules/{}/{}", target.schedule, suffix);
    let envelope = client.request(Method::GET, &path, None, &query).await?;
    display::output_data(&envelope)
}

/// Show the schedule timeline
async fn cmd_timeline(
    client: &OpsgenieClient,
    target: &ScheduleTarget,
    interval: Option<u64>,
    interval_unit: Option<&str>,
    date: Option<&str>,
) -> Result<()> {
    let mut query = build_identifier_query(target.identifier_type);
    if let Some(interval) = interval {
        query.push(("interval".to_string(), interval.to_string()));
    }
    if let Some(unit) = interval_unit {
        query.push(("intervalUnit".to_string(), unit.to_string()));
    }
    if let Some(date) = date {
        query.push(("date".to_string(), format_date_to_iso(date)?));
    }

    let path = format!("/schedules/{}/timeline", target.schedule);
    let envelope = client.request(Method::GET, &path, None, &query).await?;
    display::output_data(&envelope)
}

/// Export the schedule as raw iCal text
async fn cmd_export_ical(client: &OpsgenieClient, target: &ScheduleTarget) -> Result<()> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/schedules/{}.ics", target.schedule);
    let ical = client.request_text(Method::GET, &path, &query).await?;
    println!("{ical}");
    Ok(())
}

/// Body shared by schedule create and update; create passes the name
fn build_schedule_body(
    name: Option<&str>,
    description: Option<&str>,
    timezone: Option<&str>,
    enabled: Option<bool>,
    owner_team: Option<&str>,
    rotations: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    if let Some(name) = name {
        body.insert("name".to_string(), json!(name));
    }
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(timezone) = timezone {
        body.insert("timezone".to_string(), json!(timezone));
    }
    if let Some(enabled) = enabled {
        body.insert("enabled".to_string(), json!(enabled));
    }
    if let Some(team) = owner_team {
        body.insert("ownerTeam".to_string(), json!({ "id": team }));
    }
    if let Some(raw) = rotations {
        body.insert("rotations".to_string(), parse_json_arg("rotations", raw)?);
    }
    Ok(Value::Object(body))
}

/// On-call lookups combine the identifier hint with flat/date options
fn build_on_call_query(
    identifier_type: IdentifierType,
    options: &OnCallArgs,
) -> Result<Vec<(String, String)>> {
    let mut query = build_identifier_query(identifier_type);
    if let Some(flat) = options.flat {
        query.push(("flat".to_string(), flat.to_string()));
    }
    if let Some(date) = &options.date {
        query.push(("date".to_string(), format_date_to_iso(date)?));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_body_create_shape() {
        let body = build_schedule_body(
            Some("weekly"),
            Some("primary rotation"),
            Some("Europe/Warsaw"),
            Some(true),
            Some("t1"),
            Some(r#"[{"name": "rot1", "type": "weekly", "length": 1}]"#),
        )
        .unwrap();
        assert_eq!(body["name"], "weekly");
        assert_eq!(body["ownerTeam"], json!({"id": "t1"}));
        assert_eq!(body["rotations"][0]["type"], "weekly");
        assert_eq!(body["enabled"], json!(true));
    }

    #[test]
    fn schedule_body_update_is_partial() {
        let body = build_schedule_body(None, None, None, Some(false), None, None).unwrap();
        assert_eq!(body, json!({"enabled": false}));
    }

    #[test]
    fn schedule_body_rejects_bad_rotations() {
        assert!(build_schedule_body(Some("s"), None, None, None, None, Some("[oops")).is_err());
    }

    #[test]
    fn on_call_query_combines_identifier_and_options() {
        let options = OnCallArgs {
            flat: Some(true),
            date: Some("2026-03-01".to_string()),
        };
        let query = build_on_call_query(IdentifierType::Name, &options).unwrap();
        assert_eq!(
            query,
            vec![
                ("identifierType".to_string(), "name".to_string()),
                ("flat".to_string(), "true".to_string()),
                ("date".to_string(), "2026-03-01T00:00:00.000Z".to_string()),
            ]
        );
    }

    #[test]
    fn on_call_query_defaults_are_empty() {
        let query = build_on_call_query(IdentifierType::Id, &OnCallArgs::default()).unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn on_call_query_rejects_bad_date() {
        let options = OnCallArgs {
            flat: None,
            date: Some("next tuesday".to_string()),
        };
        assert!(build_on_call_query(IdentifierType::Id, &options).is_err());
    }
}
