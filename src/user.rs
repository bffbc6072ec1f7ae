//! User operations
//!
//! Users are addressed directly by ID or username; no identifier-type hint
//! applies here.

use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::{format_date_to_iso, parse_json_arg, parse_tags};

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create a user
    Create {
        /// Username (email address)
        username: String,

        /// Full name
        #[arg(long)]
        full_name: String,

        /// Role name (Admin, User, or a custom role)
        #[arg(long)]
        role: String,

        /// Skype username
        #[arg(long)]
        skype_username: Option<String>,

        /// Time zone (e.g. Europe/Warsaw)
        #[arg(long)]
        time_zone: Option<String>,

        /// Locale (e.g. en_US)
        #[arg(long)]
        locale: Option<String>,

        /// Address as JSON {country, state, city, line, zipCode}
        #[arg(long)]
        user_address: Option<String>,

        /// Skip the invitation email
        #[arg(long)]
        invitation_disabled: Option<bool>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Show user details
    Get {
        /// User ID or username
        user: String,
    },

    /// List users
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of users to return
        #[arg(short, long, default_value = "20")]
        limit: u64,

        /// Search query
        #[arg(short, long)]
        query: Option<String>,

        /// Sort field
        #[arg(long)]
        sort: Option<String>,

        /// Sort order (asc, desc)
        #[arg(long)]
        order: Option<String>,
    },

    /// Update a user (only supplied fields are sent)
    Update {
        /// User ID or username
        user: String,

        /// New full name
        #[arg(long)]
        full_name: Option<String>,

        /// New role name
        #[arg(long)]
        role: Option<String>,

        /// Skype username
        #[arg(long)]
        skype_username: Option<String>,

        /// Time zone
        #[arg(long)]
        time_zone: Option<String>,

        /// Locale
        #[arg(long)]
        locale: Option<String>,

        /// Address as JSON
        #[arg(long)]
        user_address: Option<String>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Delete a user
    Delete {
        /// User ID or username
        user: String,
    },

    /// List the teams of a user
    Teams {
        /// User ID or username
        user: String,
    },

    /// List forwarding rules of a user
    ForwardingRules {
        /// User ID or username
        user: String,
    },

    /// Create a forwarding rule
    CreateForwardingRule {
        /// User ID or username
        user: String,

        /// User receiving the forwarded notifications
        #[arg(long)]
        to_user_id: String,

        /// Start of the forwarding window
        #[arg(long)]
        start_date: String,

        /// End of the forwarding window
        #[arg(long)]
        end_date: String,

        /// Rule alias
        #[arg(long)]
        alias: Option<String>,
    },

    /// Delete a forwarding rule
    DeleteForwardingRule {
        /// User ID or username
        user: String,

        /// Forwarding rule ID
        rule_id: String,
    },

    /// List contact methods of a user
    Contacts {
        /// User ID or username
        user: String,
    },

    /// Add a contact method
    AddContact {
        /// User ID or username
        user: String,

        /// Contact method (email, sms, voice)
        #[arg(long)]
        method: String,

        /// Address the method points at
        #[arg(long)]
        to: String,
    },

    /// Delete a contact method
    DeleteContact {
        /// User ID or username
        user: String,

        /// Contact ID
        contact_id: String,
    },
}

/// Run a user command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: UserCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        UserCommand::Create {
            username,
            full_name,
            role,
            skype_username,
            time_zone,
            locale,
            user_address,
            invitation_disabled,
            tags,
        } => {
            let body = build_create_body(
                &username,
                &full_name,
                &role,
                skype_username.as_deref(),
                time_zone.as_deref(),
                locale.as_deref(),
                user_address.as_deref(),
                invitation_disabled,
                tags.as_deref(),
            )?;
            let envelope = client
                .request(Method::POST, "/users", Some(body), &[])
                .await?;
            display::output_data(&envelope)
        }
        UserCommand::Get { user } => {
            let path = format!("/users/{}", user);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        UserCommand::List {
            all,
            limit,
            query,
            sort,
            order,
        } => cmd_list(&client, all, limit, query, sort, order).await,
        UserCommand::Update {
            user,
            full_name,
            role,
            skype_username,
            time_zone,
            locale,
            user_address,
            tags,
        } => {
            let body = build_update_body(
                full_name.as_deref(),
                role.as_deref(),
                skype_username.as_deref(),
                time_zone.as_deref(),
                locale.as_deref(),
                user_address.as_deref(),
                tags.as_deref(),
            )?;
            let path = format!("/users/{}", user);
            let envelope = client.request(Method::PATCH, &path, Some(body), &[]).await?;
            display::output_data(&envelope)
        }
        UserCommand::Delete { user } => {
            let path = format!("/users/{}", user);
            let envelope = client.request(Method::DELETE, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        UserCommand::Teams { user } => {
            let path = format!("/users/{}/teams", user);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        UserCommand::ForwardingRules { user } => {
            let path = format!("/users/{}/forwarding-rules", user);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        UserCommand::CreateForwardingRule {
            user,
            to_user_id,
            start_date,
            end_date,
            alias,
        } => {
            let body =
                build_forwarding_rule_body(&to_user_id, &start_date, &end_date, alias.as_deref())?;
            let path = format!("/users/{}/forwarding-rules", user);
            let envelope = client.request(Method::POST, &path, Some(body), &[]).await?;
            display::output_data(&envelope)
        }
        UserCommand::DeleteForwardingRule { user, rule_id } => {
            let path = format!("/users/{}/forwarding-rules/{}", user, rule_id);
            let envelope = client.request(Method::DELETE, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        UserCommand::Contacts { user } => {
            let path = format!("/users/{}/contacts", user);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        UserCommand::AddContact { user, method, to } => {
            let body = json!({ "method": method, "to": to });
            let path = format!("/users/{}/contacts", user);
            let envelope = client.request(Method::POST, &path, Some(body), &[]).await?;
            display::output_data(&envelope)
        }
        UserCommand::DeleteContact { user, contact_id } => {
            let path = format!("/users/{}/contacts/{}", user, contact_id);
            let envelope = client.request(Method::DELETE, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
    }
}

/// List users
async fn cmd_list(
    client: &OpsgenieClient,
    all: bool,
    limit: u64,
    raw_query: Option<String>,
    sort: Option<String>,
    order: Option<String>,
) -> Result<()> {
    let mut query = Vec::new();
    if let Some(value) = raw_query {
        query.push(("query".to_string(), value));
    }
    if let Some(value) = sort {
        query.push(("sort".to_string(), value));
    }
    if let Some(value) = order {
        query.push(("order".to_string(), value));
    }

    if all {
        let items = fetch_all(client, Method::GET, "/users", None, &query).await?;
        display::output_items(&items)
    } else {
        query.push(("limit".to_string(), limit.to_string()));
        let envelope = client.request(Method::GET, "/users", None, &query).await?;
        display::output_data(&envelope)
    }
}

/// Build the create-user request body
#[allow(clippy::too_many_arguments)]
fn build_create_body(
    username: &str,
    full_name: &str,
    role: &str,
    skype_username: Option<&str>,
    time_zone: Option<&str>,
    locale: Option<&str>,
    user_address: Option<&str>,
    invitation_disabled: Option<bool>,
    tags: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    body.insert("username".to_string(), json!(username));
    body.insert("fullName".to_string(), json!(full_name));
    body.insert("role".to_string(), json!({ "name": role }));

    if let Some(skype) = skype_username {
        body.insert("skypeUsername".to_string(), json!(skype));
    }
    if let Some(tz) = time_zone {
        body.insert("timeZone".to_string(), json!(tz));
    }
    if let Some(locale) = locale {
        body.insert("locale".to_string(), json!(locale));
    }
    if let Some(raw) = user_address {
        body.insert(
            "userAddress".to_string(),
            parse_json_arg("user-address", raw)?,
        );
    }
    if let Some(disabled) = invitation_disabled {
        body.insert("invitationDisabled".to_string(), json!(disabled));
    }
    if let Some(tags) = tags {
        body.insert("tags".to_string(), json!(parse_tags(tags)));
    }

    Ok(Value::Object(body))
}

/// Build a partial user update body
fn build_update_body(
    full_name: Option<&str>,
    role: Option<&str>,
    skype_username: Option<&str>,
    time_zone: Option<&str>,
    locale: Option<&str>,
    user_address: Option<&str>,
    tags: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    if let Some(full_name) = full_name {
        body.insert("fullName".to_string(), json!(full_name));
    }
    if let Some(role) = role {
        body.insert("role".to_string(), json!({ "name": role }));
    }
    if let Some(skype) = skype_username {
        body.insert("skypeUsername".to_string(), json!(skype));
    }
    if let Some(tz) = time_zone {
        body.insert("timeZone".to_string(), json!(tz));
    }
    if let Some(locale) = locale {
        body.insert("locale".to_string(), json!(locale));
    }
    if let Some(raw) = user_address {
        body.insert(
            "userAddress".to_string(),
            parse_json_arg("user-address", raw)?,
        );
    }
    if let Some(tags) = tags {
        body.insert("tags".to_string(), json!(parse_tags(tags)));
    }
    Ok(Value::Object(body))
}

/// Build a forwarding-rule body with normalized dates
fn build_forwarding_rule_body(
    to_user_id: &str,
    start_date: &str,
    end_date: &str,
    alias: Option<&str>,
) -> Result<Value> {
    let mut body = Map::new();
    body.insert("toUser".to_string(), json!({ "id": to_user_id }));
    body.insert("startDate".to_string(), json!(format_date_to_iso(start_date)?));
    body.insert("endDate".to_string(), json!(format_date_to_iso(end_date)?));
    if let Some(alias) = alias {
        body.insert("alias".to_string(), json!(alias));
    }
    Ok(Value::Object(body))
}
