//! Output formatting

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use owo_colors::OwoColorize;
use serde_json::Value;

use crate::config::OpsgenieConfig;
use crate::types::{Alert, Envelope, Incident, OutputFormat, RequestStatus};

/// Color for an alert status string
fn alert_status_color(status: &str, acknowledged: bool) -> Color {
    match status {
        "open" if acknowledged => Color::Yellow,
        "open" => Color::Red,
        "closed" => Color::Green,
        _ => Color::White,
    }
}

/// Color for an incident status string
fn incident_status_color(status: &str) -> Color {
    match status {
        "open" => Color::Red,
        "resolved" => Color::Yellow,
        "closed" => Color::Green,
        _ => Color::White,
    }
}

/// Format relative time from ISO8601 timestamp
fn time_ago(timestamp: &str) -> String {
    let Ok(dt) = chrono::DateTime::parse_from_rfc3339(timestamp) else {
        return timestamp.to_string();
    };

    let now = chrono::Utc::now();
    let duration = now.signed_duration_since(dt);

    if duration.num_days() > 0 {
        format!("{}d ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m ago", duration.num_minutes())
    } else {
        "just now".to_string()
    }
}

/// Truncate string to max length
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}

/// Mask an API key down to its last four characters
fn mask_key(key: &str) -> String {
    if key.len() <= 4 {
        "****".to_string()
    } else {
        format!("****{}", &key[key.len() - 4..])
    }
}

/// Show configuration status
pub fn output_config_status(config: &OpsgenieConfig) {
    println!("Opsgenie configuration");
    match &config.api_key {
        Some(key) => println!("  API key: {} ({})", "configured".green(), mask_key(key)),
        None => println!("  API key: {}", "not configured".red()),
    }
    println!(
        "  Region:  {} ({})",
        config.region,
        config.region.base_url()
    );
}

/// Print an arbitrary payload as pretty JSON
pub fn output_value(value: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{json}");
    Ok(())
}

/// Print the `data` payload of an envelope, or `null` when absent
pub fn output_data(envelope: &Envelope) -> Result<()> {
    output_value(envelope.data.as_ref().unwrap_or(&Value::Null))
}

/// Print a full envelope (action endpoints return only acknowledgement
/// metadata, which lives outside `data`)
pub fn output_envelope(envelope: &Envelope) -> Result<()> {
    let json = serde_json::to_value(envelope).context("Failed to serialize response")?;
    output_value(&json)
}

/// Print a list of raw items as a JSON array
pub fn output_items(items: &[Value]) -> Result<()> {
    output_value(&Value::Array(items.to_vec()))
}

/// Print a completed request status
pub fn output_request_status(status: &RequestStatus) -> Result<()> {
    let json = serde_json::to_value(status).context("Failed to serialize request status")?;
    output_value(&json)
}

/// Output alerts list
pub fn output_alerts(items: &[Value], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No alerts found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["#", "Status", "Pri", "Message", "Owner", "Tags", "Created"]);

            for item in items {
                let alert: Alert = serde_json::from_value(item.clone()).unwrap_or_default();
                let status_text = if alert.acknowledged {
                    "acked".to_string()
                } else {
                    alert.status.clone()
                };

                table.add_row(vec![
                    Cell::new(&alert.tiny_id).fg(Color::Cyan),
                    Cell::new(&status_text)
                        .fg(alert_status_color(&alert.status, alert.acknowledged)),
                    Cell::new(&alert.priority),
                    Cell::new(truncate(&alert.message, 48)),
                    Cell::new(truncate(&alert.owner, 20)),
                    Cell::new(truncate(&alert.tags.join(","), 24)),
                    Cell::new(time_ago(&alert.created_at)),
                ]);
            }

            println!("{table}");
            println!("\n{} alerts", items.len());
        }
        OutputFormat::Json => output_items(items)?,
    }
    Ok(())
}

/// Output incidents list
pub fn output_incidents(items: &[Value], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No incidents found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["#", "Status", "Pri", "Message", "Team", "Created"]);

            for item in items {
                let incident: Incident = serde_json::from_value(item.clone()).unwrap_or_default();

                table.add_row(vec![
                    Cell::new(&incident.tiny_id).fg(Color::Cyan),
                    Cell::new(&incident.status).fg(incident_status_color(&incident.status)),
                    Cell::new(&incident.priority),
                    Cell::new(truncate(&incident.message, 48)),
                    Cell::new(truncate(&incident.owner_team, 24)),
                    Cell::new(time_ago(&incident.created_at)),
                ]);
            }

            println!("{table}");
            println!("\n{} incidents", items.len());
        }
        OutputFormat::Json => output_items(items)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncate_short_string_unchanged() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn truncate_long_string_adds_ellipsis() {
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }

    #[test]
    fn mask_key_keeps_last_four() {
        assert_eq!(mask_key("abcdef123456"), "****3456");
    }

    #[test]
    fn mask_key_short_keys_fully_masked() {
        assert_eq!(mask_key("abc"), "****");
    }

    #[test]
    fn time_ago_passes_through_invalid_timestamps() {
        assert_eq!(time_ago("not-a-time"), "not-a-time");
    }

    #[test]
    fn time_ago_days() {
        let past = chrono::Utc::now() - chrono::Duration::days(3);
        assert_eq!(time_ago(&past.to_rfc3339()), "3d ago");
    }

    #[test]
    fn time_ago_just_now() {
        let now = chrono::Utc::now().to_rfc3339();
        assert_eq!(time_ago(&now), "just now");
    }

    #[test]
    fn alert_status_colors() {
        assert_eq!(alert_status_color("open", false), Color::Red);
        assert_eq!(alert_status_color("open", true), Color::Yellow);
        assert_eq!(alert_status_color("closed", false), Color::Green);
        assert_eq!(alert_status_color("snoozed", false), Color::White);
    }

    #[test]
    fn incident_status_colors() {
        assert_eq!(incident_status_color("open"), Color::Red);
        assert_eq!(incident_status_color("resolved"), Color::Yellow);
        assert_eq!(incident_status_color("closed"), Color::Green);
    }

    #[test]
    fn output_alerts_json_and_table_run() {
        let items = vec![json!({
            "id": "a1",
            "tinyId": "12",
            "message": "CPU high",
            "status": "open",
            "acknowledged": false,
            "priority": "P2",
            "tags": ["prod"],
            "createdAt": "2026-01-01T00:00:00Z"
        })];
        assert!(output_alerts(&items, OutputFormat::Json).is_ok());
        assert!(output_alerts(&items, OutputFormat::Table).is_ok());
        assert!(output_alerts(&[], OutputFormat::Table).is_ok());
    }

    #[test]
    fn output_incidents_json_and_table_run() {
        let items = vec![json!({
            "id": "i1",
            "tinyId": "7",
            "message": "API outage",
            "status": "resolved",
            "priority": "P1",
            "createdAt": "2026-01-01T00:00:00Z"
        })];
        assert!(output_incidents(&items, OutputFormat::Json).is_ok());
        assert!(output_incidents(&items, OutputFormat::Table).is_ok());
    }

    #[test]
    fn output_data_handles_missing_payload() {
        assert!(output_data(&Envelope::default()).is_ok());
    }
}
