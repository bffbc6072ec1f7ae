//! Incident operations

use anyhow::Result;
use clap::{Args, Subcommand};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::{
    build_identifier_query, parse_detail_flag, parse_details, parse_json_arg,
    parse_responders_arg, parse_tags,
};
use crate::types::{DetailEntry, IdentifierType, OutputFormat, Priority, ResponderType};

/// Incident to act on
#[derive(Debug, Args)]
pub struct IncidentTarget {
    /// Incident ID or tiny ID
    pub incident: String,

    /// How to interpret the incident identifier
    #[arg(long, value_enum, default_value_t = IdentifierType::Id)]
    pub identifier_type: IdentifierType,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Incident message
    #[arg(short, long)]
    pub message: String,

    /// Detailed description
    #[arg(long)]
    pub description: Option<String>,

    /// Responders as a JSON array of {type, id|name|username}
    #[arg(long)]
    pub responders: Option<String>,

    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,

    /// Custom detail as key=value (repeatable)
    #[arg(long = "detail", value_name = "KEY=VALUE")]
    pub details: Vec<String>,

    /// Priority (P1-P5)
    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    /// Comma-separated impacted service IDs
    #[arg(long)]
    pub impacted_services: Option<String>,

    /// Whether stakeholders are notified
    #[arg(long)]
    pub notify_stakeholders: Option<bool>,

    /// Status page entry as JSON {title, detail}
    #[arg(long)]
    pub status_page_entry: Option<String>,
}

/// Incident subcommands
#[derive(Debug, Subcommand)]
pub enum IncidentCommand {
    /// Create an incident
    Create(CreateArgs),

    /// Show incident details
    Get {
        #[command(flatten)]
        target: IncidentTarget,
    },

    /// List incidents
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of incidents to return
        #[arg(short, long, default_value = "20")]
        limit: u64,

        /// Search query (Opsgenie query syntax)
        #[arg(short, long)]
        query: Option<String>,

        /// Sort field
        #[arg(long)]
        sort: Option<String>,

        /// Sort order (asc, desc)
        #[arg(long)]
        order: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Close an incident
    Close {
        #[command(flatten)]
        target: IncidentTarget,

        /// Additional note
        #[arg(long)]
        note: Option<String>,
    },

    /// Resolve an incident
    Resolve {
        #[command(flatten)]
        target: IncidentTarget,

        /// Additional note
        #[arg(long)]
        note: Option<String>,
    },

    /// Add a responder to an incident
    AddResponder {
        #[command(flatten)]
        target: IncidentTarget,

        /// Responder kind
        #[arg(long, value_enum)]
        responder_type: ResponderType,

        /// Responder ID
        #[arg(long)]
        responder_id: String,

        /// Additional note
        #[arg(long)]
        note: Option<String>,
    },

    /// Append a note to the incident timeline
    AddNote {
        #[command(flatten)]
        target: IncidentTarget,

        /// Note text
        note: String,
    },

    /// Add tags to an incident
    AddTags {
        #[command(flatten)]
        target: IncidentTarget,

        /// Comma-separated tags
        tags: String,

        /// Additional note
        #[arg(long)]
        note: Option<String>,
    },

    /// Remove tags from an incident
    RemoveTags {
        #[command(flatten)]
        target: IncidentTarget,

        /// Comma-separated tags
        tags: String,

        /// Additional note
        #[arg(long)]
        note: Option<String>,
    },

    /// Show the incident timeline
    Timeline {
        #[command(flatten)]
        target: IncidentTarget,

        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of entries to return
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// Delete a timeline entry
    DeleteTimelineEntry {
        #[command(flatten)]
        target: IncidentTarget,

        /// Timeline entry ID
        entry_id: String,
    },
}

/// Run an incident command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: IncidentCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        IncidentCommand::Create(args) => cmd_create(&client, args).await,
        IncidentCommand::Get { target } => cmd_get(&client, &target).await,
        IncidentCommand::List {
            all,
            limit,
            query,
            sort,
            order,
            json,
        } => cmd_list(&client, all, limit, query, sort, order, json).await,
        IncidentCommand::Close { target, note } => {
            post_action(&client, &target, "close", note_body(note.as_deref())).await
        }
        IncidentCommand::Resolve { target, note } => {
            post_action(&client, &target, "resolve", note_body(note.as_deref())).await
        }
        IncidentCommand::AddResponder {
            target,
            responder_type,
            responder_id,
            note,
        } => {
            let mut body = note_body(note.as_deref());
            body["responder"] = json!({
                "type": responder_type.as_str(),
                "id": responder_id,
            });
            post_action(&client, &target, "responders", body).await
        }
        IncidentCommand::AddNote { target, note } => {
            post_action(&client, &target, "timeline", json!({ "note": note })).await
        }
        IncidentCommand::AddTags { target, tags, note } => {
            let mut body = note_body(note.as_deref());
            body["tags"] = json!(parse_tags(&tags));
            post_action(&client, &target, "tags", body).await
        }
        IncidentCommand::RemoveTags { target, tags, note } => {
            cmd_remove_tags(&client, &target, &tags, note.as_deref()).await
        }
        IncidentCommand::Timeline { target, all, limit } => {
            cmd_timeline(&client, &target, all, limit).await
        }
        IncidentCommand::DeleteTimelineEntry { target, entry_id } => {
            cmd_delete_timeline_entry(&client, &target, &entry_id).await
        }
    }
}

/// Create an incident
async fn cmd_create(client: &OpsgenieClient, args: CreateArgs) -> Result<()> {
    let body = build_create_body(&args)?;
    let envelope = client
        .request(Method::POST, "/incidents/create", Some(body), &[])
        .await?;
    display::output_envelope(&envelope)
}

/// Show incident details
async fn cmd_get(client: &OpsgenieClient, target: &IncidentTarget) -> Result<()> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/incidents/{}", target.incident);
    let envelope = client.request(Method::GET, &path, None, &query).await?;
    display::output_data(&envelope)
}

/// List incidents
async fn cmd_list(
    client: &OpsgenieClient,
    all: bool,
    limit: u64,
    raw_query: Option<String>,
    sort: Option<String>,
    order: Option<String>,
    json: bool,
) -> Result<()> {
    let query = build_list_query(raw_query.as_deref(), sort.as_deref(), order.as_deref());
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    if all {
        let items = fetch_all(client, Method::GET, "/incidents", None, &query).await?;
        display::output_incidents(&items, format)
    } else {
        let mut query = query;
        query.push(("limit".to_string(), limit.to_string()));
        let envelope = client.request(Method::GET, "/incidents", None, &query).await?;
        let items = match envelope.data {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        display::output_incidents(&items, format)
    }
}

/// Remove tags; tags and note travel as query parameters
async fn cmd_remove_tags(
    client: &OpsgenieClient,
    target: &IncidentTarget,
    tags: &str,
    note: Option<&str>,
) -> Result<()> {
    let mut query = build_identifier_query(target.identifier_type);
    query.push(("tags".to_string(), tags.to_string()));
    if let Some(note) = note {
        query.push(("note".to_string(), note.to_string()));
    }
    let path = format!("/incidents/{}/tags", target.incident);
    let envelope = client.request(Method::DELETE, &path, None, &query).await?;
    display::output_envelope(&envelope)
}

/// Show the incident timeline
async fn cmd_timeline(
    client: &OpsgenieClient,
    target: &IncidentTarget,
    all: bool,
    limit: u64,
) -> Result<()> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/incidents/{}/timeline", target.incident);

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

/// Delete one timeline entry
async fn cmd_delete_timeline_entry(
    client: &OpsgenieClient,
    target: &IncidentTarget,
    entry_id: &str,
) -> Result<()> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/incidents/{}/timeline/{}", target.incident, entry_id);
    let envelope = client.request(Method::DELETE, &path, None, &query).await?;
    display::output_envelope(&envelope)
}

/// POST an incident action and print the acknowledgement envelope
async fn post_action(
    client: &OpsgenieClient,
    target: &IncidentTarget,
    suffix: &str,
    body: Value,
) -> Result<()> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/incidents/{}/{}", target.incident, suffix);
    let envelope = client.request(Method::POST, &path, Some(body), &query).await?;
    display::output_envelope(&envelope)
}

/// Body carrying just an optional note
fn note_body(note: Option<&str>) -> Value {
    let mut body = Map::new();
    if let Some(note) = note {
        body.insert("note".to_string(), json!(note));
    }
    Value::Object(body)
}

/// Build the create-incident request body
fn build_create_body(args: &CreateArgs) -> Result<Value> {
    let mut body = Map::new();
    body.insert("message".to_string(), json!(args.message));

    if let Some(description) = &args.description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(raw) = &args.responders {
        body.insert(
            "responders".to_string(),
            serde_json::to_value(parse_responders_arg("responders", raw)?)?,
        );
    }
    if let Some(tags) = &args.tags {
        body.insert("tags".to_string(), json!(parse_tags(tags)));
    }
    if !args.details.is_empty() {
        let entries: Vec<DetailEntry> = args.details.iter().map(|s| parse_detail_flag(s)).collect();
        body.insert("details".to_string(), Value::Object(parse_details(&entries)));
    }
    if let Some(priority) = args.priority {
        body.insert("priority".to_string(), json!(priority.as_str()));
    }
    if let Some(services) = &args.impacted_services {
        body.insert("impactedServices".to_string(), json!(parse_tags(services)));
    }
    if let Some(notify) = args.notify_stakeholders {
        body.insert("notifyStakeholders".to_string(), json!(notify));
    }
    if let Some(raw) = &args.status_page_entry {
        body.insert(
            "statusPageEntry".to_string(),
            parse_json_arg("status-page-entry", raw)?,
        );
    }

    Ok(Value::Object(body))
}

/// Build the incident list query
fn build_list_query(
    raw_query: Option<&str>,
    sort: Option<&str>,
    order: Option<&str>,
) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if let Some(value) = raw_query {
        query.push(("query".to_string(), value.to_string()));
    }
    if let Some(value) = sort {
        query.push(("sort".to_string(), value.to_string()));
    }
    if let Some(value) = order {
        query.push(("order".to_string(), value.to_string()));
    }
    query
}
