mod alert;
mod cli;
mod client;
mod config;
mod display;
mod escalation;
mod fields;
mod heartbeat;
mod incident;
mod integration;
mod maintenance;
mod notification_rule;
mod policy;
mod schedule;
mod service;
mod team;
mod types;
mod user;
mod util;
mod webhook;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use util::Notices;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        cli::print_root_help();
        return Ok(());
    };

    let notices = Arc::new(Notices::default());
    notices.licensing();

    match command {
        Command::Alert { cmd } => alert::run(cmd).await,
        Command::Incident { cmd } => incident::run(cmd).await,
        Command::Team { cmd } => team::run(cmd).await,
        Command::User { cmd } => user::run(cmd).await,
        Command::Schedule { cmd } => schedule::run(cmd).await,
        Command::Escalation { cmd } => escalation::run(cmd).await,
        Command::Integration { cmd } => integration::run(cmd).await,
        Command::Service { cmd } => service::run(cmd).await,
        Command::Maintenance { cmd } => maintenance::run(cmd).await,
        Command::Heartbeat { cmd } => heartbeat::run(cmd).await,
        Command::Policy { cmd } => policy::run(cmd).await,
        Command::NotificationRule { cmd } => notification_rule::run(cmd).await,
        Command::Webhook { cmd } => webhook::run(cmd, notices.clone()).await,
        Command::Config => config::cmd_config(),
        Command::Auth { api_key, region } => config::cmd_auth(&api_key, region),
        Command::Verify => client::cmd_verify().await,
    }
}
