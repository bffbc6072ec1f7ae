//! Opsgenie credentials and region configuration
//!
//! Loads configuration from `~/.config/genie/settings.toml` with
//! `OPSGENIE_API_KEY` / `OPSGENIE_REGION` environment overrides.

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::display;
use crate::util::print_success;

/// Hosting region of the Opsgenie account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Region {
    /// US (api.opsgenie.com)
    #[default]
    #[serde(rename = "US")]
    Us,
    /// EU (api.eu.opsgenie.com)
    #[serde(rename = "EU")]
    Eu,
}

impl Region {
    /// Versioned API base URL for the region
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Us => "https://api.opsgenie.com/v2",
            Self::Eu => "https://api.eu.opsgenie.com/v2",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::Eu => "EU",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opsgenie configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpsgenieConfig {
    /// API key (GenieKey)
    pub api_key: Option<String>,
    /// Account region, selects the base URL
    #[serde(default)]
    pub region: Region,
}

impl OpsgenieConfig {
    /// Check if configured with an API key
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Settings file structure
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    opsgenie: Option<OpsgenieConfig>,
}

/// Get path to config file
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".config").join("genie").join("settings.toml"))
}

/// Load Opsgenie config from settings file and environment
pub fn load_config() -> Result<OpsgenieConfig> {
    let mut config = OpsgenieConfig::default();

    // Load from settings file
    if let Some(path) = config_path() {
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            config = parse_config(&contents)?;
        }
    }

    // Override with environment variables
    if let Ok(key) = std::env::var("OPSGENIE_API_KEY") {
        config.api_key = Some(key);
    }
    if let Ok(region) = std::env::var("OPSGENIE_REGION") {
        if let Some(region) = parse_region(&region) {
            config.region = region;
        }
    }

    Ok(config)
}

/// Parse config from TOML string
fn parse_config(contents: &str) -> Result<OpsgenieConfig> {
    let settings: SettingsFile = toml::from_str(contents)?;
    Ok(settings.opsgenie.unwrap_or_default())
}

/// Parse a region name, case-insensitively
fn parse_region(value: &str) -> Option<Region> {
    match value.trim().to_ascii_uppercase().as_str() {
        "US" => Some(Region::Us),
        "EU" => Some(Region::Eu),
        _ => None,
    }
}

/// Save API key and region to the config file
pub fn save_config(api_key: &str, region: Region) -> Result<()> {
    let path = config_path().ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?;

    // Read existing or create new
    let contents = if path.exists() {
        fs::read_to_string(&path)?
    } else {
        String::new()
    };

    let output = update_settings_toml(&contents, api_key, region)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&path, output)?;
    Ok(())
}

/// Update TOML settings with new key and region, preserving other sections
fn update_settings_toml(contents: &str, api_key: &str, region: Region) -> Result<String> {
    let mut doc: toml::Value =
        toml::from_str(contents).unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()));

    let table = doc
        .as_table_mut()
        .ok_or_else(|| anyhow::anyhow!("Config is not a table"))?;

    if !table.contains_key("opsgenie") {
        table.insert(
            "opsgenie".to_string(),
            toml::Value::Table(toml::map::Map::new()),
        );
    }

    let opsgenie = table
        .get_mut("opsgenie")
        .and_then(|v| v.as_table_mut())
        .ok_or_else(|| anyhow::anyhow!("opsgenie section is not a table"))?;

    opsgenie.insert(
        "api_key".to_string(),
        toml::Value::String(api_key.to_string()),
    );
    opsgenie.insert(
        "region".to_string(),
        toml::Value::String(region.as_str().to_string()),
    );

    toml::to_string_pretty(&doc).map_err(Into::into)
}

/// Show config status
pub fn cmd_config() -> Result<()> {
    let config = load_config()?;
    display::output_config_status(&config);
    Ok(())
}

/// Save API key (and optionally the region)
pub fn cmd_auth(api_key: &str, region: Option<Region>) -> Result<()> {
    let current = load_config()?;
    let region = region.unwrap_or(current.region);
    save_config(api_key, region)?;
    print_success(&format!("Opsgenie API key saved ({} region)", region));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_base_urls() {
        assert_eq!(Region::Us.base_url(), "https://api.opsgenie.com/v2");
        assert_eq!(Region::Eu.base_url(), "https://api.eu.opsgenie.com/v2");
    }

    #[test]
    fn region_default_is_us() {
        assert_eq!(Region::default(), Region::Us);
    }

    #[test]
    fn parse_region_accepts_known_values() {
        assert_eq!(parse_region("US"), Some(Region::Us));
        assert_eq!(parse_region("eu"), Some(Region::Eu));
        assert_eq!(parse_region(" Eu "), Some(Region::Eu));
        assert_eq!(parse_region("APAC"), None);
    }

    #[test]
    fn config_is_configured_with_key() {
        let config = OpsgenieConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(config.is_configured());
    }

    #[test]
    fn config_is_not_configured_without_key() {
        assert!(!OpsgenieConfig::default().is_configured());
    }

    #[test]
    fn parse_config_empty() {
        let config = parse_config("").unwrap();
        assert!(!config.is_configured());
        assert_eq!(config.region, Region::Us);
    }

    #[test]
    fn parse_config_with_opsgenie_section() {
        let toml = r#"
[opsgenie]
api_key = "test-key"
region = "EU"
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.region, Region::Eu);
    }

    #[test]
    fn parse_config_region_defaults_to_us() {
        let toml = r#"
[opsgenie]
api_key = "test-key"
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.region, Region::Us);
    }

    #[test]
    fn parse_config_other_sections_ignored() {
        let toml = r#"
[pagerduty]
api_token = "pd-token"

[opsgenie]
api_key = "og-key"
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("og-key"));
    }

    #[test]
    fn parse_config_invalid_toml() {
        assert!(parse_config("this is not valid [[[toml").is_err());
    }

    #[test]
    fn parse_config_wrong_type_for_section() {
        assert!(parse_config(r#"opsgenie = "not a table""#).is_err());
    }

    #[test]
    fn update_settings_toml_empty() {
        let result = update_settings_toml("", "new-key", Region::Us).unwrap();
        assert!(result.contains("[opsgenie]"));
        assert!(result.contains("api_key = \"new-key\""));
        assert!(result.contains("region = \"US\""));
    }

    #[test]
    fn update_settings_toml_replaces_existing_key() {
        let existing = r#"
[opsgenie]
api_key = "old-key"
region = "EU"
"#;
        let result = update_settings_toml(existing, "new-key", Region::Eu).unwrap();
        assert!(result.contains("api_key = \"new-key\""));
        assert!(!result.contains("old-key"));
        assert!(result.contains("region = \"EU\""));
    }

    #[test]
    fn update_settings_toml_preserves_other_sections() {
        let existing = r#"
[jira]
site = "https://example.atlassian.net"
"#;
        let result = update_settings_toml(existing, "og-key", Region::Us).unwrap();
        assert!(result.contains("example.atlassian.net"));
        assert!(result.contains("og-key"));
    }

    #[test]
    fn update_settings_toml_invalid_existing_starts_fresh() {
        let result = update_settings_toml("not [[[toml", "key", Region::Us);
        assert!(result.is_ok());
        assert!(result.unwrap().contains("api_key"));
    }

    #[test]
    fn config_serialize_round_trip() {
        let config = OpsgenieConfig {
            api_key: Some("key".to_string()),
            region: Region::Eu,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"EU\""));
        let back: OpsgenieConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.region, Region::Eu);
    }

    #[test]
    fn load_config_returns_ok_without_file() {
        assert!(load_config().is_ok());
    }
}
