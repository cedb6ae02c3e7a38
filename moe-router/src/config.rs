//! Configuration for the prediction router.

use config::{Config as ConfigLoader, Environment, File, FileFormat};
use predict_common::BackendKind;
use serde::Deserialize;

use crate::routing::RoutingStrategy;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub strategy: RoutingStrategy,
    /// Number of routing decisions kept for statistics.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_stats_window")]
    pub stats_window: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            history_capacity: default_history_capacity(),
            stats_window: default_stats_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Default cap on concurrent predictions in a batch.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for BackendToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Per-backend enablement. Every backend is enabled unless switched off.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendsConfig {
    #[serde(default)]
    pub reinforcement_learned: BackendToggle,
    #[serde(default)]
    pub stacked_ensemble: BackendToggle,
    #[serde(default)]
    pub gradient_boosted: BackendToggle,
    #[serde(default)]
    pub sequence_model: BackendToggle,
    #[serde(default)]
    pub baseline_linear: BackendToggle,
}

impl BackendsConfig {
    pub fn is_enabled(&self, kind: BackendKind) -> bool {
        let toggle = match kind {
            BackendKind::ReinforcementLearned => &self.reinforcement_learned,
            BackendKind::StackedEnsemble => &self.stacked_ensemble,
            BackendKind::GradientBoosted => &self.gradient_boosted,
            BackendKind::SequenceModel => &self.sequence_model,
            BackendKind::BaselineLinear => &self.baseline_linear,
        };
        toggle.enabled
    }

    /// Enabled backends in tier order.
    pub fn enabled_kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    /// Upper bound on one readiness probe. A probe that takes longer counts as not ready.
    #[serde(default = "default_readiness_timeout")]
    pub timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_readiness_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PersistenceConfig {
    /// SQLite database path. No persistence when unset.
    #[serde(default)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_history_capacity() -> usize {
    crate::routing::DEFAULT_HISTORY_CAPACITY
}
fn default_stats_window() -> usize {
    crate::routing::DEFAULT_STATS_WINDOW
}
fn default_max_concurrent() -> usize {
    5
}
fn default_readiness_timeout() -> u64 {
    2000
}
fn default_event_capacity() -> usize {
    256
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (MOE__SECTION__KEY format)
    /// 2. The given file, or `moe-router.toml` if present
    /// 3. Built-in defaults
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name("moe-router").required(false),
        };

        let config: Config = ConfigLoader::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("MOE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = ConfigLoader::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.max_concurrent == 0 {
            return Err(ConfigError::Invalid("batch.max_concurrent must be at least 1".into()));
        }
        if self.routing.history_capacity == 0 {
            return Err(ConfigError::Invalid("routing.history_capacity must be at least 1".into()));
        }
        if self.routing.stats_window == 0 {
            return Err(ConfigError::Invalid("routing.stats_window must be at least 1".into()));
        }
        if self.backends.enabled_kinds().is_empty() {
            tracing::warn!("All backends are disabled, every prediction will fail");
        }
        Ok(())
    }
}
