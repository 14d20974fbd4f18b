//! Pipeline configuration: environment-driven runtime knobs plus the
//! declarative source registry and rule tables at the workspace root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use grantwatch_adapters::FoundationTarget;
use serde::Deserialize;

use crate::classify::{FunderRegistry, TagTables};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workspace_root: PathBuf,
    pub data_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    /// Hard cap for one adapter's whole fetch; a slow source never blocks
    /// the others past this.
    pub source_timeout_secs: u64,
    /// Fixed pause between requests inside one adapter's fetch loop.
    pub request_delay_ms: u64,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            workspace_root: env_path("GRANTWATCH_WORKSPACE_ROOT", "."),
            data_dir: env_path("GRANTWATCH_DATA_DIR", "./data"),
            artifacts_dir: env_path("GRANTWATCH_ARTIFACTS_DIR", "./artifacts"),
            reports_dir: env_path("GRANTWATCH_REPORTS_DIR", "./reports"),
            user_agent: std::env::var("GRANTWATCH_USER_AGENT")
                .unwrap_or_else(|_| "grantwatch-bot/0.1".to_string()),
            http_timeout_secs: env_u64("GRANTWATCH_HTTP_TIMEOUT_SECS", 20),
            source_timeout_secs: env_u64("GRANTWATCH_SOURCE_TIMEOUT_SECS", 120),
            request_delay_ms: env_u64("GRANTWATCH_REQUEST_DELAY_MS", 1000),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("grants.json")
    }
}

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    pub display_name: String,
    pub enabled: bool,
    pub mode: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub targets: Vec<FoundationTarget>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Declarative rule data the classifier and extraction engine consume.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub tags: TagTables,
    pub funders: FunderRegistry,
    pub relevance: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RelevanceFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    keywords: Vec<String>,
}

pub fn load_source_registry(workspace_root: &Path) -> Result<SourceRegistry> {
    read_yaml(&workspace_root.join("sources.yaml"))
}

pub fn load_rules(workspace_root: &Path) -> Result<RuleSet> {
    let rules_dir = workspace_root.join("rules");
    let tags: TagTables = read_yaml(&rules_dir.join("tags.yaml"))?;
    let funders: FunderRegistry = read_yaml(&rules_dir.join("funders.yaml"))?;
    let relevance: RelevanceFile = read_yaml(&rules_dir.join("relevance.yaml"))?;
    Ok(RuleSet {
        tags,
        funders,
        relevance: relevance.keywords,
    })
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .canonicalize()
            .expect("workspace root")
    }

    #[test]
    fn checked_in_registry_parses_and_covers_every_source() {
        let registry = load_source_registry(&workspace_root()).expect("registry");
        let ids: Vec<_> = registry.sources.iter().map(|s| s.source_id.as_str()).collect();
        assert!(ids.contains(&"grants-gov"));
        assert!(ids.contains(&"ny-grants-gateway"));
        assert!(ids.contains(&"foundation-sites"));
    }

    #[test]
    fn checked_in_rule_tables_parse() {
        let rules = load_rules(&workspace_root()).expect("rules");
        assert!(!rules.relevance.is_empty());
        assert!(!rules.tags.geography.rules.is_empty());
        assert!(!rules.funders.government_keywords.is_empty());
        assert_eq!(rules.tags.geography.default, "National");
        assert_eq!(rules.tags.topic.default, "Other");
    }
}
