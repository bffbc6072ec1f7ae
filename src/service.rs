//! Service operations

use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;
use crate::fields::parse_tags;

/// Service subcommands
#[derive(Debug, Subcommand)]
pub enum ServiceCommand {
    /// Create a service
    Create {
        /// Service name
        name: String,

        /// Owner team ID
        #[arg(long)]
        team_id: String,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Visibility (TEAM_MEMBERS, OPSGENIE_USERS)
        #[arg(long)]
        visibility: Option<String>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Show service details
    Get {
        /// Service ID
        service: String,
    },

    /// List services
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of services to return
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

    /// Update a service (only supplied fields are sent)
    Update {
        /// Service ID
        service: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Visibility
        #[arg(long)]
        visibility: Option<String>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Delete a service
    Delete {
        /// Service ID
        service: String,
    },
}

/// Run a service command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: ServiceCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        ServiceCommand::Create {
            name,
            team_id,
            description,
            visibility,
            tags,
        } => {
            let body = build_create_body(
                &name,
                &team_id,
                description.as_deref(),
                visibility.as_deref(),
                tags.as_deref(),
            );
            let envelope = client
                .request(Method::POST, "/services", Some(body), &[])
                .await?;
            display::output_data(&envelope)
        }
        ServiceCommand::Get { service } => {
            let path = format!("/services/{}", service);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        ServiceCommand::List {
            all,
            limit,
            query,
            sort,
            order,
        } => {
            let mut list_query = Vec::new();
            if let Some(value) = query {
                list_query.push(("query".to_string(), value));
            }
            if let Some(value) = sort {
                list_query.push(("sort".to_string(), value));
            }
            if let Some(value) = order {
                list_query.push(("order".to_string(), value));
            }

            if all {
                let items = fetch_all(&client, Method::GET, "/services", None, &list_query).await?;
                display::output_items(&items)
            } else {
                list_query.push(("limit".to_string(), limit.to_string()));
                let envelope = client
                    .request(Method::GET, "/services", None, &list_query)
                    .await?;
                display::output_data(&envelope)
            }
        }
        ServiceCommand::Update {
            service,
            name,
            description,
            visibility,
            tags,
        } => {
            let body = build_update_body(
                name.as_deref(),
                description.as_deref(),
                visibility.as_deref(),
                tags.as_deref(),
            );
            let path = format!("/services/{}", service);
            let envelope = client.request(Method::PATCH, &path, Some(body), &[]).await?;
            display::output_data(&envelope)
        }
        ServiceCommand::Delete { service } => {
            let path = format!("/services/{}", service);
            let envelope = client.request(Method::DELETE, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
    }
}

/// Build the create-service request body
fn build_create_body(
    name: &str,
    team_id: &str,
    description: Option<&str>,
    visibility: Option<&str>,
    tags: Option<&str>,
) -> Value {
    let mut body = Map::new();
    body.insert("name".to_string(), json!(name));
    body.insert("teamId".to_string(), json!(team_id));
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(visibility) = visibility {
        body.insert("visibility".to_string(), json!(visibility));
    }
    if let Some(tags) = tags {
        body.insert("tags".to_string(), json!(parse_tags(tags)));
    }
    Value::Object(body)
}

/// Build a partial service update body
fn build_update_body(
    name: Option<&str>,
    description: Option<&str>,
    visibility: Option<&str>,
    tags: Option<&str>,
) -> Value {
    let mut body = Map::new();
    if let Some(name) = name {
        body.insert("name".to_string(), json!(name));
    }
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(visibility) = visibility {
        body.insert("visibility".to_string(), json!(visibility));
    }
    if let Some(tags) = tags {
        body.insert("tags".to_string(), json!(parse_tags(tags)));
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_requires_name_and_team() {
        let body = build_create_body("checkout", "t1", None, None, None);
        assert_eq!(body, json!({"name": "checkout", "teamId": "t1"}));
    }

    #[test]
    fn create_body_full() {
        let body = build_create_body(
            "checkout",
            "t1",
            Some("payment path"),
            Some("OPSGENIE_USERS"),
            Some("prod, payments"),
        );
        assert_eq!(body["visibility"], "OPSGENIE_USERS");
        assert_eq!(body["tags"], json!(["prod", "payments"]));
    }

    #[test]
    fn update_body_is_partial() {
        let body = build_update_body(None, None, Some("TEAM_MEMBERS"), None);
        assert_eq!(body, json!({"visibility": "TEAM_MEMBERS"}));
    }
}
