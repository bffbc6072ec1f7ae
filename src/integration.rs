//! Integration operations
//!
//! Integrations are created in the Opsgenie UI; the API only inspects and
//! toggles them.

use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;
use serde_json::json;

use crate::client::{ensure_configured, fetch_all, OpsgenieApi, OpsgenieClient};
use crate::display;

/// Integration subcommands
#[derive(Debug, Subcommand)]
pub enum IntegrationCommand {
    /// Show integration details
    Get {
        /// Integration ID
        integration: String,
    },

    /// List integrations
    List {
        /// Fetch every page
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Maximum number of integrations to return
        #[arg(short, long, default_value = "20")]
        limit: u64,

        /// Filter by integration type (e.g. API, Webhook)
        #[arg(long = "type")]
        integration_type: Option<String>,

        /// Filter by owner team ID
        #[arg(long)]
        team_id: Option<String>,
    },

    /// Enable an integration
    Enable {
        /// Integration ID
        integration: String,
    },

    /// Disable an integration
    Disable {
        /// Integration ID
        integration: String,
    },

    /// Validate an inbound integration's authentication
    Authenticate {
        /// Integration ID
        integration: String,

        /// Integration type
        #[arg(long = "type")]
        integration_type: String,
    },

    /// List the actions of an integration
    Actions {
        /// Integration ID
        integration: String,
    },
}

/// Run an integration command
#[cfg(not(tarpaulin_include))]
pub async fn run(cmd: IntegrationCommand) -> Result<()> {
    let client = OpsgenieClient::new()?;
    ensure_configured(&client)?;

    match cmd {
        IntegrationCommand::Get { integration } => {
            let path = format!("/integrations/{}", integration);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
        IntegrationCommand::List {
            all,
            limit,
            integration_type,
            team_id,
        } => {
            let query = build_list_query(integration_type.as_deref(), team_id.as_deref());

            if all {
                let items = fetch_all(&client, Method::GET, "/integrations", None, &query).await?;
                display::output_items(&items)
            } else {
                let mut query = query;
                query.push(("limit".to_string(), limit.to_string()));
                let envelope = client
                    .request(Method::GET, "/integrations", None, &query)
                    .await?;
                display::output_data(&envelope)
            }
        }
        IntegrationCommand::Enable { integration } => {
            let path = format!("/integrations/{}/enable", integration);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        IntegrationCommand::Disable { integration } => {
            let path = format!("/integrations/{}/disable", integration);
            let envelope = client.request(Method::POST, &path, None, &[]).await?;
            display::output_envelope(&envelope)
        }
        IntegrationCommand::Authenticate {
            integration,
            integration_type,
        } => {
            let body = json!({ "type": integration_type });
            let path = format!("/integrations/{}/authenticate", integration);
            let envelope = client.request(Method::POST, &path, Some(body), &[]).await?;
            display::output_envelope(&envelope)
        }
        IntegrationCommand::Actions { integration } => {
            let path = format!("/integrations/{}/actions", integration);
            let envelope = client.request(Method::GET, &path, None, &[]).await?;
            display::output_data(&envelope)
        }
    }
}

/// Build the integration list query
fn build_list_query(
    integration_type: Option<&str>,
    team_id: Option<&str>,
) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if let Some(value) = integration_type {
        query.push(("type".to_string(), value.to_string()));
    }
    if let Some(value) = team_id {
        query.push(("teamId".to_string(), value.to_string()));
    }
    query
}
