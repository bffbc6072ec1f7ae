//! Alert operations
//!
//! Alert mutations are asynchronous on the Opsgenie side: the API answers
//! with a `requestId` whose outcome can be probed or awaited via
//! `request-status`.

use anyhow::Result;
use clap::{Args, Subcommand};
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{
    ensure_configured, fetch_all, wait_for_completion, OpsgenieApi, OpsgenieClient,
    DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_DELAY_MS,
};
use crate::display;
use crate::fields::{
    build_alert_query, build_identifier_query, format_date_to_iso, parse_detail_flag,
    parse_details, parse_responders_arg, parse_tags, AlertFilters,
};
use crate::types::{DetailEntry, IdentifierType, OutputFormat, Priority, ResponderType};

/// Alert to act on
#[derive(Debug, Args)]
pub struct AlertTarget {
    /// Alert ID, alias, or tiny ID
    pub alert: String,

    /// How to interpret the alert identifier
    #[arg(long, value_enum, default_value_t = IdentifierType::Id)]
    pub identifier_type: IdentifierType,
}

/// Attribution fields accepted by alert actions
#[derive(Debug, Default, Args)]
pub struct ActionFields {
    /// Display name of the request owner
    #[arg(long)]
    pub user: Option<String>,

    /// Source of the action
    #[arg(long)]
    pub source: Option<String>,

    /// Additional note
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Alert message
    #[arg(short, long)]
    pub message: String,

    /// Client-defined alias, used for deduplication
    #[arg(long)]
    pub alias: Option<String>,

    /// Detailed description
    #[arg(long)]
    pub description: Option<String>,

    /// Responders as a JSON array of {type, id|name|username}
    #[arg(long)]
    pub responders: Option<String>,

    /// Visibility list, same shape as --responders
    #[arg(long)]
    pub visible_to: Option<String>,

    /// Comma-separated custom action names
    #[arg(long)]
    pub actions: Option<String>,

    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,

    /// Custom detail as key=value (repeatable)
    #[arg(long = "detail", value_name = "KEY=VALUE")]
    pub details: Vec<String>,

    /// Entity the alert is about
    #[arg(long)]
    pub entity: Option<String>,

    /// Source of the alert
    #[arg(long)]
    pub source: Option<String>,

    /// Priority (P1-P5)
    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    /// Display name of the request owner
    #[arg(long)]
    pub user: Option<String>,

    /// Note attached on creation
    #[arg(long)]
    pub note: Option<String>,

    /// Poll the returned request until it completes
    #[arg(long)]
    pub wait: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Fetch every page
    #[arg(long, conflicts_with = "limit")]
    pub all: bool,

    /// Maximum number of alerts to return
    #[arg(short, long, default_value = "20")]
    pub limit: u64,

    /// Raw search query (Opsgenie query syntax)
    #[arg(short, long)]
    pub query: Option<String>,

    /// Filter by status (open, closed)
    #[arg(long, conflicts_with = "query")]
    pub status: Option<String>,

    /// Filter by priority
    #[arg(long, value_enum, conflicts_with = "query")]
    pub priority: Option<Priority>,

    /// Comma-separated tag filter
    #[arg(long, conflicts_with = "query")]
    pub tag: Option<String>,

    /// Only alerts created before this date
    #[arg(long, conflicts_with = "query")]
    pub created_before: Option<String>,

    /// Only alerts created at or after this date
    #[arg(long, conflicts_with = "query")]
    pub created_after: Option<String>,

    /// Identifier of a saved search
    #[arg(long)]
    pub search_identifier: Option<String>,

    /// Type of the saved-search identifier (id, name)
    #[arg(long)]
    pub search_identifier_type: Option<String>,

    /// Sort field
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort order (asc, desc)
    #[arg(long)]
    pub order: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Alert subcommands
#[derive(Debug, Subcommand)]
pub enum AlertCommand {
    /// Create an alert
    Create(CreateArgs),

    /// Show alert details
    Get {
        #[command(flatten)]
        target: AlertTarget,
    },

    /// List alerts
    List(ListArgs),

    /// Close an alert
    Close {
        #[command(flatten)]
        target: AlertTarget,
        #[command(flatten)]
        fields: ActionFields,
    },

    /// Acknowledge an alert
    #[command(alias = "ack")]
    Acknowledge {
        #[command(flatten)]
        target: AlertTarget,
        #[command(flatten)]
        fields: ActionFields,
    },

    /// Remove an acknowledgement
    #[command(alias = "unack")]
    Unacknowledge {
        #[command(flatten)]
        target: AlertTarget,
        #[command(flatten)]
        fields: ActionFields,
    },

    /// Snooze an alert until a given time
    Snooze {
        #[command(flatten)]
        target: AlertTarget,

        /// End of the snooze window
        #[arg(long)]
        end_time: String,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Escalate an alert to an escalation
    Escalate {
        #[command(flatten)]
        target: AlertTarget,

        /// Escalation ID
        #[arg(long)]
        escalation_id: String,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Assign ownership of an alert
    Assign {
        #[command(flatten)]
        target: AlertTarget,

        /// Username of the new owner
        #[arg(long)]
        owner: String,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Add a team to an alert
    AddTeam {
        #[command(flatten)]
        target: AlertTarget,

        /// Team ID
        #[arg(long)]
        team_id: String,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Add a responder to an alert
    AddResponder {
        #[command(flatten)]
        target: AlertTarget,

        /// Responder kind
        #[arg(long, value_enum)]
        responder_type: ResponderType,

        /// Responder ID
        #[arg(long)]
        responder_id: String,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Add a note to an alert
    AddNote {
        #[command(flatten)]
        target: AlertTarget,

        /// Note text
        note: String,

        /// Display name of the request owner
        #[arg(long)]
        user: Option<String>,

        /// Source of the action
        #[arg(long)]
        source: Option<String>,
    },

    /// Add tags to an alert
    AddTags {
        #[command(flatten)]
        target: AlertTarget,

        /// Comma-separated tags
        tags: String,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Remove tags from an alert
    RemoveTags {
        #[command(flatten)]
        target: AlertTarget,

        /// Comma-separated tags
        tags: String,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Add custom details to an alert
    AddDetails {
        #[command(flatten)]
        target: AlertTarget,

        /// Detail as key=value (repeatable)
        #[arg(long = "detail", value_name = "KEY=VALUE", required = true)]
        details: Vec<String>,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Run a custom action on an alert
    ExecuteAction {
        #[command(flatten)]
        target: AlertTarget,

        /// Action name
        action: String,

        #[command(flatten)]
        fields: ActionFields,
    },

    /// Check or await the status of an async alert request
    RequestStatus {
        /// Request ID returned by an alert mutation
        request_id: String,

        /// Poll until the request completes
        #[arg(long)]
        wait: bool,

        /// Maximum poll attempts
        #[arg(long, default_value_t = DEFAULT_POLL_ATTEMPTS)]
        max_attempts: u32,

        /// Delay between attempts in milliseconds
        #[arg(long, default_value_t = DEFAULT_POLL_DELAY_MS)]
        delay_ms: u64,
    },
}

/// Run an alert command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: AlertCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        AlertCommand::Create(args) => cmd_create(&client, args).await,
        AlertCommand::Get { target } => cmd_get(&client, &target).await,
        AlertCommand::List(args) => cmd_list(&client, args).await,
        AlertCommand::Close { target, fields } => {
            post_action(&client, &target, "close", action_body(&fields)).await
        }
        AlertCommand::Acknowledge { target, fields } => {
            post_action(&client, &target, "acknowledge", action_body(&fields)).await
        }
        AlertCommand::Unacknowledge { target, fields } => {
            post_action(&client, &target, "unacknowledge", action_body(&fields)).await
        }
        AlertCommand::Snooze {
            target,
            end_time,
            fields,
        } => {
            let mut body = action_body(&fields);
            body["endTime"] = json!(format_date_to_iso(&end_time)?);
            post_action(&client, &target, "snooze", body).await
        }
        AlertCommand::Escalate {
            target,
            escalation_id,
            fields,
        } => {
            let mut body = action_body(&fields);
            body["escalation"] = json!({ "id": escalation_id });
            post_action(&client, &target, "escalate", body).await
        }
        AlertCommand::Assign {
            target,
            owner,
            fields,
        } => {
            let mut body = action_body(&fields);
            body["owner"] = json!({ "username": owner });
            post_action(&client, &target, "assign", body).await
        }
        AlertCommand::AddTeam {
            target,
            team_id,
            fields,
        } => {
            let mut body = action_body(&fields);
            body["team"] = json!({ "id": team_id });
            post_action(&client, &target, "teams", body).await
        }
        AlertCommand::AddResponder {
            target,
            responder_type,
            responder_id,
            fields,
        } => {
            let mut body = action_body(&fields);
            body["responder"] = json!({
                "type": responder_type.as_str(),
                "id": responder_id,
            });
            post_action(&client, &target, "responders", body).await
        }
        AlertCommand::AddNote {
            target,
            note,
            user,
            source,
        } => {
            let mut body = json!({ "note": note });
            if let Some(user) = user {
                body["user"] = json!(user);
            }
            if let Some(source) = source {
                body["source"] = json!(source);
            }
            post_action(&client, &target, "notes", body).await
        }
        AlertCommand::AddTags {
            target,
            tags,
            fields,
        } => {
            let mut body = action_body(&fields);
            body["tags"] = json!(parse_tags(&tags));
            post_action(&client, &target, "tags", body).await
        }
        AlertCommand::RemoveTags {
            target,
            tags,
            fields,
        } => cmd_remove_tags(&client, &target, &tags, &fields).await,
        AlertCommand::AddDetails {
            target,
            details,
            fields,
        } => {
            let entries: Vec<DetailEntry> = details.iter().map(|s| parse_detail_flag(s)).collect();
            let mut body = action_body(&fields);
            body["details"] = Value::Object(parse_details(&entries));
            post_action(&client, &target, "details", body).await
        }
        AlertCommand::ExecuteAction {
            target,
            action,
            fields,
        } => {
            let suffix = format!("actions/{}", action);
            post_action(&client, &target, &suffix, action_body(&fields)).await
        }
        AlertCommand::RequestStatus {
            request_id,
            wait,
            max_attempts,
            delay_ms,
        } => cmd_request_status(&client, &request_id, wait, max_attempts, delay_ms).await,
    }
}

/// Create an alert
async fn cmd_create(client: &OpsgenieClient, args: CreateArgs) -> Result<()> {
    let body = build_create_body(&args)?;
    let envelope = client
        .request(Method::POST, "/alerts", Some(body), &[])
        .await?;

    if args.wait {
        if let Some(request_id) = envelope.request_id.as_deref() {
            let status = wait_for_completion(
                client,
                request_id,
                DEFAULT_POLL_ATTEMPTS,
                DEFAULT_POLL_DELAY_MS,
            )
            .await?;
            return display::output_request_status(&status);
        }
    }

    display::output_envelope(&envelope)
}

/// Show alert details
async fn cmd_get(client: &OpsgenieClient, target: &AlertTarget) -> Result<()> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/alerts/{}", target.alert);
    let envelope = client.request(Method::GET, &path, None, &query).await?;
    display::output_data(&envelope)
}

/// List alerts
async fn cmd_list(client: &OpsgenieClient, args: ListArgs) -> Result<()> {
    let query = build_list_query(&args)?;
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    if args.all {
        let items = fetch_all(client, Method::GET, "/alerts", None, &query).await?;
        display::output_alerts(&items, format)
    } else {
        let mut query = query;
        query.push(("limit".to_string(), args.limit.to_string()));
        let envelope = client.request(Method::GET, "/alerts", None, &query).await?;
        let items = match envelope.data {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        display::output_alerts(&items, format)
    }
}

/// Remove tags; this endpoint takes everything as query parameters
async fn cmd_remove_tags(
    client: &OpsgenieClient,
    target: &AlertTarget,
    tags: &str,
    fields: &ActionFields,
) -> Result<()> {
    let query = build_remove_tags_query(target, tags, fields);
    let path = format!("/alerts/{}/tags", target.alert);
    let envelope = client.request(Method::DELETE, &path, None, &query).await?;
    display::output_envelope(&envelope)
}

/// Probe or await an async request
async fn cmd_request_status(
    client: &OpsgenieClient,
    request_id: &str,
    wait: bool,
    max_attempts: u32,
    delay_ms: u64,
) -> Result<()> {
    if wait {
        let status = wait_for_completion(client, request_id, max_attempts, delay_ms).await?;
        return display::output_request_status(&status);
    }

    let path = format!("/alerts/requests/{}", request_id);
    let envelope = client.request(Method::GET, &path, None, &[]).await?;
    display::output_data(&envelope)
}

/// POST an alert action and print the acknowledgement envelope
async fn post_action(
    client: &OpsgenieClient,
    target: &AlertTarget,
    suffix: &str,
    body: Value,
) -> Result<()> {
    let query = build_identifier_query(target.identifier_type);
    let path = format!("/alerts/{}/{}", target.alert, suffix);
    let envelope = client.request(Method::POST, &path, Some(body), &query).await?;
    display::output_envelope(&envelope)
}

/// Body shared by alert actions: user/source/note when present
fn action_body(fields: &ActionFields) -> Value {
    let mut body = Map::new();
    if let Some(user) = &fields.user {
        body.insert("user".to_string(), json!(user));
    }
    if let Some(source) = &fields.source {
        body.insert("source".to_string(), json!(source));
    }
    if let Some(note) = &fields.note {
        body.insert("note".to_string(), json!(note));
    }
    Value::Object(body)
}

/// Build the create-alert request body
fn build_create_body(args: &CreateArgs) -> Result<Value> {
    let mut body = Map::new();
    body.insert("message".to_string(), json!(args.message));

    if let Some(alias) = &args.alias {
        body.insert("alias".to_string(), json!(alias));
    }
    if let Some(description) = &args.description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(raw) = &args.responders {
        body.insert(
            "responders".to_string(),
            serde_json::to_value(parse_responders_arg("responders", raw)?)?,
        );
    }
    if let Some(raw) = &args.visible_to {
        body.insert(
            "visibleTo".to_string(),
            serde_json::to_value(parse_responders_arg("visible-to", raw)?)?,
        );
    }
    if let Some(actions) = &args.actions {
        body.insert("actions".to_string(), json!(parse_tags(actions)));
    }
    if let Some(tags) = &args.tags {
        body.insert("tags".to_string(), json!(parse_tags(tags)));
    }
    if !args.details.is_empty() {
        let entries: Vec<DetailEntry> = args.details.iter().map(|s| parse_detail_flag(s)).collect();
        body.insert("details".to_string(), Value::Object(parse_details(&entries)));
    }
    if let Some(entity) = &args.entity {
        body.insert("entity".to_string(), json!(entity));
    }
    if let Some(source) = &args.source {
        body.insert("source".to_string(), json!(source));
    }
    if let Some(priority) = args.priority {
        body.insert("priority".to_string(), json!(priority.as_str()));
    }
    if let Some(user) = &args.user {
        body.insert("user".to_string(), json!(user));
    }
    if let Some(note) = &args.note {
        body.insert("note".to_string(), json!(note));
    }

    Ok(Value::Object(body))
}

/// Build the alert list query
fn build_list_query(args: &ListArgs) -> Result<Vec<(String, String)>> {
    let mut query = Vec::new();

    if let Some(raw) = &args.query {
        query.push(("query".to_string(), raw.clone()));
    } else {
        let filters = AlertFilters {
            status: args.status.clone(),
            priority: args.priority,
            tags: args.tag.clone(),
            created_before: args.created_before.clone(),
            created_after: args.created_after.clone(),
        };
        if !filters.is_empty() {
            query.push(("query".to_string(), build_alert_query(&filters)?));
        }
    }
    if let Some(value) = &args.search_identifier {
        query.push(("searchIdentifier".to_string(), value.clone()));
    }
    if let Some(value) = &args.search_identifier_type {
        query.push(("searchIdentifierType".to_string(), value.clone()));
    }
    if let Some(value) = &args.sort {
        query.push(("sort".to_string(), value.clone()));
    }
    if let Some(value) = &args.order {
        query.push(("order".to_string(), value.clone()));
    }

    Ok(query)
}

/// Remove-tags sends the tag list and attribution as query parameters
fn build_remove_tags_query(
    target: &AlertTarget,
    tags: &str,
    fields: &ActionFields,
) -> Vec<(String, String)> {
    let mut query = build_identifier_query(target.identifier_type);
    query.push(("tags".to_string(), tags.to_string()));
    if let Some(user) = &fields.user {
        query.push(("user".to_string(), user.clone()));
    }
    if let Some(source) = &fields.source {
        query.push(("source".to_string(), source.clone()));
    }
    if let Some(note) = &fields.note {
        query.push(("note".to_string(), note.clone()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(identifier_type: IdentifierType) -> AlertTarget {
        AlertTarget {
            alert: "a-1".to_string(),
            identifier_type,
        }
    }

    fn create_args() -> CreateArgs {
        CreateArgs {
            message: "CPU high".to_string(),
            alias: None,
            description: None,
            responders: None,
            visible_to: None,
            actions: None,
            tags: None,
            details: Vec::new(),
            entity: None,
            source: None,
            priority: None,
            user: None,
            note: None,
            wait: false,
        }
    }

    #[test]
    fn action_body_empty_fields_is_empty_object() {
        let body = action_body(&ActionFields::default());
        assert_eq!(body, json!({}));
    }

    #[test]
    fn action_body_includes_present_fields() {
        let fields = ActionFields {
            user: Some("jane".to_string()),
            source: None,
            note: Some("handled".to_string()),
        };
        let body = action_body(&fields);
        assert_eq!(body, json!({"user": "jane", "note": "handled"}));
    }

    #[test]
    fn create_body_minimal() {
        let body = build_create_body(&create_args()).unwrap();
        assert_eq!(body, json!({"message": "CPU high"}));
    }

    #[test]
    fn create_body_full() {
        let mut args = create_args();
        args.alias = Some("cpu-host1".to_string());
        args.description = Some("load".to_string());
        args.responders = Some(r#"[{"type":"team","name":"SRE"}]"#.to_string());
        args.visible_to = Some(r#"[{"type":"user","username":"jane@example.com"}]"#.to_string());
        args.actions = Some("restart,ping".to_string());
        args.tags = Some("prod, db".to_string());
        args.details = vec!["host=web-1".to_string(), "rack=c2".to_string()];
        args.entity = Some("web-1".to_string());
        args.source = Some("monitor".to_string());
        args.priority = Some(Priority::P1);
        args.user = Some("jane".to_string());
        args.note = Some("first".to_string());

        let body = build_create_body(&args).unwrap();
        assert_eq!(body["alias"], "cpu-host1");
        assert_eq!(body["responders"], json!([{"type": "team", "name": "SRE"}]));
        assert_eq!(
            body["visibleTo"],
            json!([{"type": "user", "username": "jane@example.com"}])
        );
        assert_eq!(body["actions"], json!(["restart", "ping"]));
        assert_eq!(body["tags"], json!(["prod", "db"]));
        assert_eq!(body["details"], json!({"host": "web-1", "rack": "c2"}));
        assert_eq!(body["priority"], "P1");
        assert_eq!(body["note"], "first");
    }

    #[test]
    fn create_body_rejects_bad_responders_json() {
        let mut args = create_args();
        args.responders = Some("not-json".to_string());
        assert!(build_create_body(&args).is_err());
    }

    fn list_args() -> ListArgs {
        ListArgs {
            all: false,
            limit: 20,
            query: None,
            status: None,
            priority: None,
            tag: None,
            created_before: None,
            created_after: None,
            search_identifier: None,
            search_identifier_type: None,
            sort: None,
            order: None,
            json: false,
        }
    }

    #[test]
    fn list_query_empty_by_default() {
        assert!(build_list_query(&list_args()).unwrap().is_empty());
    }

    #[test]
    fn list_query_uses_raw_query_verbatim() {
        let mut args = list_args();
        args.query = Some("status=open AND tag=prod".to_string());
        let query = build_list_query(&args).unwrap();
        assert_eq!(
            query,
            vec![(
                "query".to_string(),
                "status=open AND tag=prod".to_string()
            )]
        );
    }

    #[test]
    fn list_query_composes_filters() {
        let mut args = list_args();
        args.status = Some("open".to_string());
        args.priority = Some(Priority::P2);
        let query = build_list_query(&args).unwrap();
        assert_eq!(query[0].1, "status=open AND priority=P2");
    }

    #[test]
    fn list_query_includes_sort_and_order() {
        let mut args = list_args();
        args.sort = Some("createdAt".to_string());
        args.order = Some("desc".to_string());
        let query = build_list_query(&args).unwrap();
        assert_eq!(query[0], ("sort".to_string(), "createdAt".to_string()));
        assert_eq!(query[1], ("order".to_string(), "desc".to_string()));
    }

    #[test]
    fn remove_tags_query_carries_everything() {
        let fields = ActionFields {
            user: Some("jane".to_string()),
            source: Some("cli".to_string()),
            note: Some("cleanup".to_string()),
        };
        let query = build_remove_tags_query(&target(IdentifierType::Alias), "a,b", &fields);
        assert_eq!(
            query,
            vec![
                ("identifierType".to_string(), "alias".to_string()),
                ("tags".to_string(), "a,b".to_string()),
                ("user".to_string(), "jane".to_string()),
                ("source".to_string(), "cli".to_string()),
                ("note".to_string(), "cleanup".to_string()),
            ]
        );
    }

    #[test]
    fn remove_tags_query_id_identifier_sends_no_hint() {
        let query = build_remove_tags_query(&target(IdentifierType::Id), "a", &ActionFields::default());
        assert_eq!(query, vec![("tags".to_string(), "a".to_string())]);
    }
}
