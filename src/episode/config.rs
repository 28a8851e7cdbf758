//! Episode configuration, loadable from YAML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Knobs for one episode. Every field has a default so a partial YAML
/// file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Hypotheses drafted per episode.
    pub slate_size: usize,
    /// Drafting cycles per lineage before it is exhausted.
    pub max_rounds: u32,
    /// Minimum novelty score for acceptance, 1-10.
    pub novelty_threshold: u8,
    /// Passages requested per retrieval.
    pub retrieval_k: usize,
    /// Character budget for passages embedded in a prompt.
    pub passage_budget: usize,
    /// Per-call timeout for model and retrieval calls.
    pub call_timeout_secs: u64,
    /// Retries for retryable provider failures, per call.
    pub provider_retries: u32,
    /// Retries before retrieval degrades to ungrounded.
    pub retrieval_retries: u32,
    /// Extra attempts to reformat malformed structured output.
    pub reformat_retries: u32,
    /// Ceiling on concurrent in-flight model calls across lineages.
    pub max_concurrent_calls: usize,
    /// Initial backoff, doubled per retry.
    pub backoff_ms: u64,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            slate_size: 3,
            max_rounds: 3,
            novelty_threshold: 7,
            retrieval_k: 5,
            passage_budget: 4000,
            call_timeout_secs: 60,
            provider_retries: 2,
            retrieval_retries: 2,
            reformat_retries: 1,
            max_concurrent_calls: 2,
            backoff_ms: 250,
        }
    }
}

impl EpisodeConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slate_size == 0 {
            return Err(ConfigError::Invalid("slate_size must be at least 1".into()));
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::Invalid("max_rounds must be at least 1".into()));
        }
        if !(1..=10).contains(&self.novelty_threshold) {
            return Err(ConfigError::Invalid(
                "novelty_threshold must be in 1..=10".into(),
            ));
        }
        if self.retrieval_k == 0 {
            return Err(ConfigError::Invalid("retrieval_k must be at least 1".into()));
        }
        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_calls must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        EpisodeConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "slate_size: 5\nnovelty_threshold: 8").unwrap();

        let config = EpisodeConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.slate_size, 5);
        assert_eq!(config.novelty_threshold, 8);
        assert_eq!(config.max_rounds, EpisodeConfig::default().max_rounds);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let config = EpisodeConfig {
            novelty_threshold: 11,
            ..EpisodeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_rounds_is_rejected() {
        let config = EpisodeConfig {
            max_rounds: 0,
            ..EpisodeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
