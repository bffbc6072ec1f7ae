//! Root CLI definition

use clap::{CommandFactory, Parser, Subcommand};

use crate::alert::AlertCommand;
use crate::config::Region;
use crate::escalation::EscalationCommand;
use crate::heartbeat::HeartbeatCommand;
use crate::incident::IncidentCommand;
use crate::integration::IntegrationCommand;
use crate::maintenance::MaintenanceCommand;
use crate::notification_rule::NotificationRuleCommand;
use crate::policy::PolicyCommand;
use crate::schedule::ScheduleCommand;
use crate::service::ServiceCommand;
use crate::team::TeamCommand;
use crate::user::UserCommand;
use crate::webhook::WebhookCommand;

#[derive(Parser)]
#[command(name = "genie")]
#[command(about = "Opsgenie CLI", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Alerts (create, list, acknowledge, close)
    Alert {
        #[command(subcommand)]
        cmd: AlertCommand,
    },

    /// Incidents (create, resolve, timeline)
    Incident {
        #[command(subcommand)]
        cmd: IncidentCommand,
    },

    /// Teams (members, routing rules, audit logs)
    Team {
        #[command(subcommand)]
        cmd: TeamCommand,
    },

    /// Users (contacts, forwarding rules)
    User {
        #[command(subcommand)]
        cmd: UserCommand,
    },

    /// On-call schedules (rotations, timelines, iCal export)
    Schedule {
        #[command(subcommand)]
        cmd: ScheduleCommand,
    },

    /// Escalations
    Escalation {
        #[command(subcommand)]
        cmd: EscalationCommand,
    },

    /// Integrations (enable, disable, actions)
    Integration {
        #[command(subcommand)]
        cmd: IntegrationCommand,
    },

    /// Services
    Service {
        #[command(subcommand)]
        cmd: ServiceCommand,
    },

    /// Maintenance windows
    Maintenance {
        #[command(subcommand)]
        cmd: MaintenanceCommand,
    },

    /// Heartbeats (ping, enable, disable)
    Heartbeat {
        #[command(subcommand)]
        cmd: HeartbeatCommand,
    },

    /// Alert and notification policies
    Policy {
        #[command(subcommand)]
        cmd: PolicyCommand,
    },

    /// Per-user notification rules
    #[command(alias = "nr")]
    NotificationRule {
        #[command(subcommand)]
        cmd: NotificationRuleCommand,
    },

    /// Webhook receiver (reshapes inbound Opsgenie events)
    Webhook {
        #[command(subcommand)]
        cmd: WebhookCommand,
    },

    /// Show configuration status
    Config,

    /// Save API key and region
    Auth {
        /// API key (GenieKey)
        api_key: String,

        /// Account region
        #[arg(long, value_enum)]
        region: Option<Region>,
    },

    /// Verify the configured API key against the API
    Verify,
}

/// Print top-level help (bare `genie` invocation)
pub fn print_root_help() {
    let _ = Cli::command().print_help();
    println!();
}
