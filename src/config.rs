//! refjanitor.yaml configuration
//!
//! Every field has a default, so an empty file (or no file) is valid.

use crate::cite::{CitationSynthesizer, DEFAULT_DATE_FORMAT};
use crate::error::Error;
use crate::markup::{PatternMarkup, DEFAULT_CLEANUP_TEMPLATE};
use crate::pipeline::DEFAULT_SUMMARY_PREFIX;
use crate::title::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "refjanitor.yaml";

/// Root of refjanitor.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    pub wiki: WikiSettings,
    pub resolver: ResolverSettings,
    pub citation: CitationSettings,
    /// Maintenance templates removed by the upgrader
    pub cleanup_templates: Vec<String>,
    /// Prepended to every edit comment
    pub summary_prefix: String,
}

/// Where and how the bot edits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiSettings {
    pub api_url: String,
    /// Bot-password login name (e.g. `AsteraBot@janitor`)
    pub username: Option<String>,
    /// Page that receives one line per saved edit
    pub log_page: Option<String>,
    /// Namespace filter for category members (0 = articles)
    pub namespace: Option<i64>,
    /// Pause after each successful save
    pub edit_delay_secs: u64,
    pub user_agent: String,
}

/// Title fetching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub timeout_secs: u64,
    /// Pause after each fetch
    pub delay_secs: u64,
    pub user_agent: String,
}

/// Citation rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationSettings {
    /// chrono format string for access-date
    pub date_format: String,
    /// Extra news domains, checked after the built-in list
    pub news_domains: Vec<String>,
    /// Escape `|`, `{` and `}` in fetched titles
    pub escape_titles: bool,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            wiki: WikiSettings::default(),
            resolver: ResolverSettings::default(),
            citation: CitationSettings::default(),
            cleanup_templates: vec![DEFAULT_CLEANUP_TEMPLATE.to_string()],
            summary_prefix: DEFAULT_SUMMARY_PREFIX.to_string(),
        }
    }
}

impl Default for WikiSettings {
    fn default() -> Self {
        Self {
            api_url: "https://test.wikipedia.org/w/api.php".to_string(),
            username: None,
            log_page: None,
            namespace: Some(0),
            edit_delay_secs: 10,
            user_agent: format!("refjanitor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let defaults = ResolverConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            delay_secs: defaults.delay.as_secs(),
            user_agent: defaults.user_agent,
        }
    }
}

impl Default for CitationSettings {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            news_domains: Vec::new(),
            escape_titles: false,
        }
    }
}

impl JanitorConfig {
    /// Load an explicit config file, or `refjanitor.yaml` from the current
    /// directory when present, or the defaults.
    ///
    /// A file that exists but does not parse is an error, never a silent
    /// fallback.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            timeout: Duration::from_secs(self.resolver.timeout_secs),
            delay: Duration::from_secs(self.resolver.delay_secs),
            user_agent: self.resolver.user_agent.clone(),
        }
    }

    pub fn synthesizer(&self) -> CitationSynthesizer {
        CitationSynthesizer::new(
            &self.citation.news_domains,
            &self.citation.date_format,
            self.citation.escape_titles,
        )
    }

    pub fn markup(&self) -> PatternMarkup {
        PatternMarkup::new(&self.cleanup_templates)
    }

    pub fn edit_delay(&self) -> Duration {
        Duration::from_secs(self.wiki.edit_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cite::CitationKind;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = JanitorConfig::default();
        assert_eq!(config.resolver.timeout_secs, 10);
        assert_eq!(config.resolver.delay_secs, 5);
        assert_eq!(config.resolver.user_agent, "SimpleJanitorBot");
        assert_eq!(config.cleanup_templates, vec!["Cleanup bare URLs".to_string()]);
        assert_eq!(config.summary_prefix, "Bot: ");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
wiki:
  api_url: https://en.wikipedia.org/w/api.php
  log_page: User:AsteraBot/log
citation:
  news_domains: [localpaper.example]
"#;
        let config = JanitorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.wiki.api_url, "https://en.wikipedia.org/w/api.php");
        assert_eq!(config.wiki.log_page.as_deref(), Some("User:AsteraBot/log"));
        assert_eq!(config.wiki.edit_delay_secs, 10);
        assert_eq!(config.citation.date_format, "%Y-%m-%d");
        assert_eq!(
            config.synthesizer().kind_for("https://localpaper.example/story"),
            CitationKind::News
        );
    }

    #[test]
    fn test_empty_yaml() {
        let config = JanitorConfig::from_yaml("\n").unwrap();
        assert_eq!(config.resolver.timeout_secs, 10);
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(JanitorConfig::from_yaml("wiki: [not, a, map]").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(JanitorConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("refjanitor.yaml");
        fs::write(&path, "resolver:\n  delay_secs: 0\n  timeout_secs: 3\n").unwrap();

        let config = JanitorConfig::load(Some(&path)).unwrap();
        let resolver = config.resolver_config();
        assert_eq!(resolver.delay, Duration::ZERO);
        assert_eq!(resolver.timeout, Duration::from_secs(3));
    }
}
