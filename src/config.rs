//! Configuration loaded from `<state dir>/config.toml`
//!
//! Every section is optional. A missing file or section falls back to
//! defaults; a file that exists but does not parse is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{Language, SymbolKind};

/// Environment variable that overrides the state directory
pub const STATE_DIR_ENV: &str = "SYMJUMP_HOME";

/// Config file name inside the state directory
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub recency: RecencyConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    /// Extra pattern rules appended to the builtin catalog
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
}

/// Which text-search backend runs the patterns
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// ripgrep when it can be found, builtin otherwise
    #[default]
    Auto,
    Ripgrep,
    Builtin,
}

/// `[search]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub backend: SearchBackend,

    /// ripgrep executable (name on PATH or absolute path)
    #[serde(default = "default_rg_path")]
    pub rg_path: String,

    /// Ceiling on a single pattern invocation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Output read from a single invocation before it is cut off
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Files larger than this are not searched
    #[serde(default = "default_max_filesize_bytes")]
    pub max_filesize_bytes: u64,

    /// Pattern invocations running at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_rg_path() -> String {
    "rg".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_output_bytes() -> usize {
    10 * 1024 * 1024 // 10 MB
}

fn default_max_filesize_bytes() -> u64 {
    1024 * 1024 // 1 MB
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::Auto,
            rg_path: default_rg_path(),
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            max_filesize_bytes: default_max_filesize_bytes(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// `[recency]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecencyConfig {
    /// Entries kept before the oldest are evicted
    pub max_entries: usize,
    /// Per-hour decay of the recency component
    pub decay_factor: f64,
    /// Age (hours) after which recency stops decaying
    pub max_age_hours: f64,
    /// Access count at which frequency saturates
    pub frequency_cap: u64,
    /// Share of recency in the score; frequency gets the rest
    pub recency_weight: f64,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            decay_factor: 0.9,
            max_age_hours: 48.0,
            frequency_cap: 50,
            recency_weight: 0.7,
        }
    }
}

impl RecencyConfig {
    /// Reject values that would push scores outside 0..=100
    pub fn validate(&self) -> Result<()> {
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            anyhow::bail!("recency.decay_factor must be in (0, 1], got {}", self.decay_factor);
        }
        if !(self.max_age_hours.is_finite() && self.max_age_hours >= 0.0) {
            anyhow::bail!("recency.max_age_hours must be a non-negative number, got {}", self.max_age_hours);
        }
        if !(0.0..=1.0).contains(&self.recency_weight) {
            anyhow::bail!("recency.recency_weight must be in [0, 1], got {}", self.recency_weight);
        }
        Ok(())
    }
}

/// `[ranking]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    pub fuzzy_weight: f64,
    pub recency_weight: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            fuzzy_weight: 0.6,
            recency_weight: 0.4,
        }
    }
}

impl RankingConfig {
    /// Both weights non-negative and summing to at most 1
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [("fuzzy_weight", self.fuzzy_weight), ("recency_weight", self.recency_weight)] {
            if !(0.0..=1.0).contains(&weight) {
                anyhow::bail!("ranking.{} must be in [0, 1], got {}", name, weight);
            }
        }
        if self.fuzzy_weight + self.recency_weight > 1.0 + 1e-9 {
            anyhow::bail!(
                "ranking weights must sum to at most 1, got {} + {}",
                self.fuzzy_weight,
                self.recency_weight
            );
        }
        Ok(())
    }
}

/// A `[[patterns]]` entry: a user-supplied pattern rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub kind: SymbolKind,

    /// Language whose keywords are rejected (defaults to a generic set)
    #[serde(default)]
    pub language: Option<Language>,

    pub globs: Vec<String>,

    pub patterns: Vec<String>,

    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Resolve the state directory: explicit override, `$SYMJUMP_HOME`, then `~/.symjump`
pub fn state_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }

    if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".symjump"))
}

/// Load config from `<state_dir>/config.toml`
pub fn load_config(state_dir: &Path) -> Result<Config> {
    let config_path = state_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        log::debug!("No config.toml found at {}, using defaults", config_path.display());
        return Ok(Config::default());
    }

    let config_str = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    parse_config(&config_str)
        .with_context(|| format!("Failed to parse {}", config_path.display()))
}

/// Parse config from TOML text
pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text)?;
    config.recency.validate()?;
    config.ranking.validate()?;
    log::debug!(
        "Loaded config: backend={:?}, {} user pattern rules",
        config.search.backend,
        config.patterns.len()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path()).unwrap();
        assert_eq!(config.search.timeout_secs, 10);
        assert_eq!(config.search.max_output_bytes, 10 * 1024 * 1024);
        assert_eq!(config.recency.max_entries, 1000);
        assert_eq!(config.ranking, RankingConfig::default());
        assert!(config.patterns.is_empty());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = parse_config(
            r#"
[search]
backend = "builtin"

[recency]
max_entries = 10
"#,
        )
        .unwrap();
        assert_eq!(config.search.backend, SearchBackend::Builtin);
        assert_eq!(config.search.rg_path, "rg");
        assert_eq!(config.recency.max_entries, 10);
        assert_eq!(config.recency.decay_factor, 0.9);
    }

    #[test]
    fn test_user_patterns() {
        let config = parse_config(
            r#"
[[patterns]]
kind = "function"
globs = ["*.lua"]
patterns = ['^\s*function\s+([A-Za-z_]\w*)']
ignore = ["init"]
"#,
        )
        .unwrap();
        assert_eq!(config.patterns.len(), 1);
        assert_eq!(config.patterns[0].kind, SymbolKind::Function);
        assert_eq!(config.patterns[0].language, None);
        assert_eq!(config.patterns[0].ignore, vec!["init".to_string()]);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "[search\nbackend=").unwrap();
        let err = load_config(temp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn test_out_of_range_weights_are_rejected() {
        for text in [
            "[recency]\ndecay_factor = 1.5",
            "[recency]\ndecay_factor = 0.0",
            "[recency]\nmax_age_hours = -1.0",
            "[recency]\nrecency_weight = 1.2",
            "[ranking]\nfuzzy_weight = -0.1",
            "[ranking]\nfuzzy_weight = 0.8\nrecency_weight = 0.4",
        ] {
            assert!(parse_config(text).is_err(), "accepted: {}", text);
        }

        let config = parse_config("[recency]\ndecay_factor = 1.0\n\n[ranking]\nfuzzy_weight = 1.0\nrecency_weight = 0.0")
            .unwrap();
        assert_eq!(config.recency.decay_factor, 1.0);
        assert_eq!(config.ranking.fuzzy_weight, 1.0);
    }

    #[test]
    fn test_explicit_state_dir_wins() {
        let dir = state_dir(Some(Path::new("/tmp/sj-state"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/sj-state"));
    }
}
