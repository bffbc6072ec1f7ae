//! Pure mappers from flag/JSON input to Opsgenie wire shapes

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::types::{DetailEntry, IdentifierType, Priority, Responder, ResponderInput};

/// Map responder inputs to wire form
///
/// Keeps the first non-empty identifier in id > name > username order. An
/// entry carrying none of the three still emits a type-only responder.
pub fn parse_responders(inputs: &[ResponderInput]) -> Vec<Responder> {
    inputs
        .iter()
        .map(|input| {
            let mut responder = Responder {
                kind: input.kind,
                id: None,
                name: None,
                username: None,
            };

            if let Some(id) = non_empty(&input.id) {
                responder.id = Some(id);
            } else if let Some(name) = non_empty(&input.name) {
                responder.name = Some(name);
            } else if let Some(username) = non_empty(&input.username) {
                responder.username = Some(username);
            }

            responder
        })
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(String::from)
}

/// Split a comma-separated tag list, trimming and dropping empty segments
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

/// Reduce key/value entries into a details map
///
/// Entries without a key or without a value are skipped; a later duplicate
/// key overwrites the earlier one.
pub fn parse_details(entries: &[DetailEntry]) -> serde_json::Map<String, Value> {
    let mut details = serde_json::Map::new();

    for entry in entries {
        let Some(key) = entry.key.as_deref().filter(|k| !k.is_empty()) else {
            continue;
        };
        let Some(value) = entry.value.clone() else {
            continue;
        };
        details.insert(key.to_string(), value);
    }

    details
}

/// Query parameters telling the API how to read an identifier
///
/// `id` is the API default and sends nothing.
pub fn build_identifier_query(identifier_type: IdentifierType) -> Vec<(String, String)> {
    match identifier_type {
        IdentifierType::Id => Vec::new(),
        other => vec![("identifierType".to_string(), other.as_str().to_string())],
    }
}

/// Validate a date string and normalize it to ISO-8601 with millisecond
/// precision and a `Z` offset
pub fn format_date_to_iso(input: &str) -> Result<String> {
    parse_date(input)
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| anyhow::anyhow!("Invalid date format: {}", input))
}

fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

/// Filters composing an alert search query
#[derive(Debug, Clone, Default)]
pub struct AlertFilters {
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<String>,
    pub created_before: Option<String>,
    pub created_after: Option<String>,
}

impl AlertFilters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.created_before.is_none()
            && self.created_after.is_none()
    }
}

/// Compose an alert search query string from individual filters
pub fn build_alert_query(filters: &AlertFilters) -> Result<String> {
    let mut parts = Vec::new();

    if let Some(status) = &filters.status {
        parts.push(format!("status={}", status));
    }
    if let Some(priority) = filters.priority {
        parts.push(format!("priority={}", priority.as_str()));
    }
    if let Some(tags) = &filters.tags {
        for tag in parse_tags(tags) {
            parts.push(format!("tag={}", tag));
        }
    }
    if let Some(before) = &filters.created_before {
        parts.push(format!("createdAt<{}", format_date_to_iso(before)?));
    }
    if let Some(after) = &filters.created_after {
        parts.push(format!("createdAt>={}", format_date_to_iso(after)?));
    }

    Ok(parts.join(" AND "))
}

/// Parse a JSON argument, naming the flag in the error
pub fn parse_json_arg(flag: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Invalid JSON for --{}", flag))
}

/// Parse a JSON array of responder inputs, as given to `--responders`
pub fn parse_responders_arg(flag: &str, raw: &str) -> Result<Vec<Responder>> {
    let inputs: Vec<ResponderInput> =
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON for --{}", flag))?;
    Ok(parse_responders(&inputs))
}

/// Parse a `key=value` detail flag; a missing `=` keeps the whole input as
/// the key with an empty value
pub fn parse_detail_flag(raw: &str) -> DetailEntry {
    match raw.split_once('=') {
        Some((key, value)) => DetailEntry {
            key: Some(key.to_string()),
            value: Some(Value::String(value.to_string())),
        },
        None => DetailEntry {
            key: Some(raw.to_string()),
            value: Some(Value::String(String::new())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponderType;
    use serde_json::json;

    fn responder_input(raw: Value) -> ResponderInput {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn parse_tags_splits_trims_and_drops_empties() {
        assert_eq!(parse_tags("tag1, ,tag2,"), vec!["tag1", "tag2"]);
    }

    #[test]
    fn parse_tags_empty_string() {
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn parse_tags_preserves_order_and_duplicates() {
        assert_eq!(parse_tags("b,a,b"), vec!["b", "a", "b"]);
    }

    #[test]
    fn parse_responders_prefers_id_over_name_and_username() {
        let inputs = vec![responder_input(json!({
            "type": "team",
            "id": "t1",
            "name": "Engineering",
            "username": "someone"
        }))];
        let responders = parse_responders(&inputs);
        assert_eq!(responders.len(), 1);
        assert_eq!(responders[0].id.as_deref(), Some("t1"));
        assert!(responders[0].name.is_none());
        assert!(responders[0].username.is_none());
    }

    #[test]
    fn parse_responders_falls_back_to_name_then_username() {
        let inputs = vec![
            responder_input(json!({"type": "team", "name": "Engineering"})),
            responder_input(json!({"type": "user", "username": "jane@example.com"})),
        ];
        let responders = parse_responders(&inputs);
        assert_eq!(responders[0].name.as_deref(), Some("Engineering"));
        assert_eq!(responders[1].username.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn parse_responders_empty_string_identifier_loses() {
        let inputs = vec![responder_input(json!({
            "type": "user",
            "id": "",
            "username": "jane@example.com"
        }))];
        let responders = parse_responders(&inputs);
        assert!(responders[0].id.is_none());
        assert_eq!(responders[0].username.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn parse_responders_no_identifier_emits_type_only_entry() {
        let inputs = vec![responder_input(json!({"type": "schedule"}))];
        let responders = parse_responders(&inputs);
        assert_eq!(responders[0].kind, ResponderType::Schedule);
        assert_eq!(
            serde_json::to_value(&responders[0]).unwrap(),
            json!({"type": "schedule"})
        );
    }

    #[test]
    fn parse_details_skips_entries_without_key() {
        let entries = vec![
            DetailEntry {
                key: Some("a".to_string()),
                value: Some(json!("1")),
            },
            DetailEntry {
                key: None,
                value: Some(json!("2")),
            },
        ];
        let details = parse_details(&entries);
        assert_eq!(details.len(), 1);
        assert_eq!(details["a"], json!("1"));
    }

    #[test]
    fn parse_details_skips_entries_without_value() {
        let entries = vec![DetailEntry {
            key: Some("a".to_string()),
            value: None,
        }];
        assert!(parse_details(&entries).is_empty());
    }

    #[test]
    fn parse_details_keeps_explicit_null_values() {
        let entries = vec![DetailEntry {
            key: Some("a".to_string()),
            value: Some(Value::Null),
        }];
        let details = parse_details(&entries);
        assert_eq!(details["a"], Value::Null);
    }

    #[test]
    fn parse_details_later_duplicate_wins() {
        let entries = vec![
            DetailEntry {
                key: Some("env".to_string()),
                value: Some(json!("staging")),
            },
            DetailEntry {
                key: Some("env".to_string()),
                value: Some(json!("prod")),
            },
        ];
        let details = parse_details(&entries);
        assert_eq!(details["env"], json!("prod"));
    }

    #[test]
    fn build_identifier_query_id_is_empty() {
        assert!(build_identifier_query(IdentifierType::Id).is_empty());
    }

    #[test]
    fn build_identifier_query_other_types() {
        for (identifier_type, expected) in [
            (IdentifierType::Alias, "alias"),
            (IdentifierType::Name, "name"),
            (IdentifierType::Tiny, "tiny"),
        ] {
            let query = build_identifier_query(identifier_type);
            assert_eq!(
                query,
                vec![("identifierType".to_string(), expected.to_string())]
            );
        }
    }

    #[test]
    fn format_date_rejects_empty_string() {
        let err = format_date_to_iso("").unwrap_err();
        assert!(err.to_string().contains("Invalid date format"));
    }

    #[test]
    fn format_date_rejects_garbage() {
        let err = format_date_to_iso("not-a-date").unwrap_err();
        assert_eq!(err.to_string(), "Invalid date format: not-a-date");
    }

    #[test]
    fn format_date_is_idempotent_on_its_output() {
        let input = "2024-01-15T10:30:00.000Z";
        assert_eq!(format_date_to_iso(input).unwrap(), input);
    }

    #[test]
    fn format_date_normalizes_offset_to_utc() {
        let result = format_date_to_iso("2024-01-15T12:30:00+02:00").unwrap();
        assert_eq!(result, "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn format_date_accepts_bare_date() {
        let result = format_date_to_iso("2024-01-15").unwrap();
        assert_eq!(result, "2024-01-15T00:00:00.000Z");
    }

    #[test]
    fn format_date_accepts_space_separated_datetime() {
        let result = format_date_to_iso("2024-01-15 10:30:00").unwrap();
        assert_eq!(result, "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn build_alert_query_empty_filters() {
        let query = build_alert_query(&AlertFilters::default()).unwrap();
        assert!(query.is_empty());
        assert!(AlertFilters::default().is_empty());
    }

    #[test]
    fn build_alert_query_joins_with_and() {
        let filters = AlertFilters {
            status: Some("open".to_string()),
            priority: Some(Priority::P1),
            tags: Some("prod, db".to_string()),
            ..Default::default()
        };
        let query = build_alert_query(&filters).unwrap();
        assert_eq!(query, "status=open AND priority=P1 AND tag=prod AND tag=db");
    }

    #[test]
    fn build_alert_query_normalizes_dates() {
        let filters = AlertFilters {
            created_after: Some("2024-01-15".to_string()),
            ..Default::default()
        };
        let query = build_alert_query(&filters).unwrap();
        assert_eq!(query, "createdAt>=2024-01-15T00:00:00.000Z");
    }

    #[test]
    fn build_alert_query_propagates_date_errors() {
        let filters = AlertFilters {
            created_before: Some("yesterday-ish".to_string()),
            ..Default::default()
        };
        assert!(build_alert_query(&filters).is_err());
    }

    #[test]
    fn parse_json_arg_names_flag_in_error() {
        let err = parse_json_arg("rules", "{not json").unwrap_err();
        assert!(format!("{:#}", err).contains("--rules"));
    }

    #[test]
    fn parse_json_arg_returns_value() {
        let value = parse_json_arg("rules", r#"[{"a":1}]"#).unwrap();
        assert_eq!(value, json!([{"a": 1}]));
    }

    #[test]
    fn parse_responders_arg_parses_and_maps() {
        let raw = r#"[{"type":"team","name":"SRE"}]"#;
        let responders = parse_responders_arg("responders", raw).unwrap();
        assert_eq!(responders[0].name.as_deref(), Some("SRE"));
    }

    #[test]
    fn parse_responders_arg_rejects_bad_json() {
        assert!(parse_responders_arg("responders", "nope").is_err());
    }

    #[test]
    fn parse_detail_flag_splits_on_first_equals() {
        let entry = parse_detail_flag("region=us-east-1=primary");
        assert_eq!(entry.key.as_deref(), Some("region"));
        assert_eq!(entry.value, Some(json!("us-east-1=primary")));
    }

    #[test]
    fn parse_detail_flag_without_equals_keeps_key() {
        let entry = parse_detail_flag("standalone");
        assert_eq!(entry.key.as_deref(), Some("standalone"));
        assert_eq!(entry.value, Some(json!("")));
    }

    #[test]
    fn parse_detail_flag_empty_key_is_skipped_by_parse_details() {
        let entry = parse_detail_flag("=value");
        assert!(parse_details(&[entry]).is_empty());
    }
}
