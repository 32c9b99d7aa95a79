//! Configuration types and loading
//!
//! Loaded from YAML with a fallback chain: explicit path, project-local
//! `.autonomy.yml`, user config, built-in defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::ModelRole;
use crate::phases::{DimensionalProfile, PhaseKind};

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,

    pub thresholds: ThresholdConfig,

    pub supervisor: SupervisorConfig,

    pub bus: BusConfig,

    pub conversation: ConversationConfig,

    pub polytope: PolytopeConfig,

    /// Meta-phases (tool/prompt/role design) stay off unless set
    #[serde(rename = "meta-phases-enabled")]
    pub meta_phases_enabled: bool,

    /// Environment variable holding the optional patch-push credential
    #[serde(rename = "push-token-env")]
    pub push_token_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            thresholds: ThresholdConfig::default(),
            supervisor: SupervisorConfig::default(),
            bus: BusConfig::default(),
            conversation: ConversationConfig::default(),
            polytope: PolytopeConfig::default(),
            meta_phases_enabled: false,
            push_token_env: "AUTONOMY_PUSH_TOKEN".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with the fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".autonomy.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("autonomy").join("autonomy.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Selection weights as a fixed-size array, padded/truncated to 7
    pub fn selection_weights(&self) -> [f32; 7] {
        let mut weights = [1.0_f32; 7];
        for (slot, value) in weights.iter_mut().zip(self.polytope.weights.iter()) {
            *slot = *value;
        }
        weights
    }

    /// Optional credential for publishing the patch archive, read from the
    /// configured environment variable
    pub fn push_token(&self) -> Option<String> {
        std::env::var(&self.push_token_env).ok().filter(|t| !t.is_empty())
    }

    /// Per-phase profile, honoring configured overrides
    pub fn profile_for(&self, phase: PhaseKind) -> DimensionalProfile {
        self.polytope
            .profiles
            .get(phase.name())
            .copied()
            .unwrap_or_else(|| crate::phases::default_profile(phase))
    }
}

/// Model server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Fallback host list, tried in order
    pub hosts: Vec<String>,

    /// Environment variable that overrides `hosts` (comma-separated)
    #[serde(rename = "hosts-env")]
    pub hosts_env: String,

    pub models: ModelRoles,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["http://localhost:8420".to_string()],
            hosts_env: "AUTONOMY_MODEL_HOSTS".to_string(),
            models: ModelRoles::default(),
            timeout_ms: 300_000,
            max_tokens: 16384,
        }
    }
}

impl LlmConfig {
    /// Concrete model name for a specialist role
    pub fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Arbiter => &self.models.arbiter,
            ModelRole::Coder => &self.models.coder,
            ModelRole::Reasoner => &self.models.reasoner,
            ModelRole::Analyst => &self.models.analyst,
            ModelRole::Interpreter => &self.models.interpreter,
        }
    }
}

/// Model names per specialist role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRoles {
    pub arbiter: String,
    pub coder: String,
    pub reasoner: String,
    pub analyst: String,
    pub interpreter: String,
}

impl Default for ModelRoles {
    fn default() -> Self {
        Self {
            arbiter: "arbiter-large".to_string(),
            coder: "specialist-coder".to_string(),
            reasoner: "specialist-reasoner".to_string(),
            analyst: "specialist-analyst".to_string(),
            interpreter: "toolcall-interpreter".to_string(),
        }
    }
}

/// Loop-detection and scheduling thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Consecutive no-effect executions before a phase forces a transition
    #[serde(rename = "no-update-threshold")]
    pub no_update_threshold: u32,

    /// History entries the coordinator scans for identical runs
    #[serde(rename = "history-window")]
    pub history_window: usize,

    /// QA runs once this many tasks await validation (integration stage)
    #[serde(rename = "qa-batch-size")]
    pub qa_batch_size: usize,

    /// Refactoring cadence in iterations (consolidation stage)
    #[serde(rename = "refactor-interval")]
    pub refactor_interval: u32,

    /// Identical failures before the pattern detector flags a streak
    #[serde(rename = "failure-streak")]
    pub failure_streak: usize,

    /// How long a blacklisted phase stays out of consideration
    #[serde(rename = "blacklist-cooldown-ms")]
    pub blacklist_cooldown_ms: i64,

    /// Attempts before a task is declared too complex and blocked
    #[serde(rename = "max-task-attempts")]
    pub max_task_attempts: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            no_update_threshold: 3,
            history_window: 5,
            qa_batch_size: 5,
            refactor_interval: 5,
            failure_streak: 3,
            blacklist_cooldown_ms: 10 * 60 * 1000,
            max_task_attempts: 3,
        }
    }
}

/// Child process supervision timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    #[serde(rename = "stop-timeout-ms")]
    pub stop_timeout_ms: u64,

    #[serde(rename = "kill-timeout-ms")]
    pub kill_timeout_ms: u64,

    #[serde(rename = "log-max-bytes")]
    pub log_max_bytes: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: 5_000,
            kill_timeout_ms: 2_000,
            log_max_bytes: 1024 * 1024,
        }
    }
}

/// Message bus sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    #[serde(rename = "history-cap")]
    pub history_cap: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { history_cap: 500 }
    }
}

/// Conversation pruning sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Prune once a thread exceeds this many messages
    #[serde(rename = "max-messages")]
    pub max_messages: usize,

    /// Most recent exchanges kept verbatim when pruning
    #[serde(rename = "keep-recent")]
    pub keep_recent: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_messages: 30,
            keep_recent: 8,
        }
    }
}

/// Polytopic selection tuning; axis values are configuration, not law
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolytopeConfig {
    /// Per-axis weights; missing entries default to 1.0
    pub weights: Vec<f32>,

    /// Per-phase profile overrides, keyed by phase name
    pub profiles: BTreeMap<String, DimensionalProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.thresholds.no_update_threshold, 3);
        assert_eq!(config.thresholds.history_window, 5);
        assert_eq!(config.thresholds.qa_batch_size, 5);
        assert!(!config.meta_phases_enabled);
    }

    #[test]
    fn test_selection_weights_padded() {
        let mut config = Config::default();
        config.polytope.weights = vec![2.0, 3.0];
        let weights = config.selection_weights();
        assert_eq!(weights[0], 2.0);
        assert_eq!(weights[1], 3.0);
        assert_eq!(weights[6], 1.0);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.llm.timeout_ms, config.llm.timeout_ms);
        assert_eq!(back.thresholds.history_window, config.thresholds.history_window);
    }

    #[test]
    fn test_partial_yaml_takes_defaults() {
        let yaml = "thresholds:\n  no-update-threshold: 7\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.thresholds.no_update_threshold, 7);
        // Everything else falls back to defaults
        assert_eq!(config.thresholds.history_window, 5);
        assert!(!config.llm.hosts.is_empty());
    }

    #[test]
    fn test_profile_override() {
        let yaml = r#"
polytope:
  profiles:
    coding:
      temporal: 0.1
      functional: 0.1
      data: 0.1
      state: 0.1
      error: 0.1
      context: 0.1
      integration: 0.1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let profile = config.profile_for(PhaseKind::Coding);
        assert_eq!(profile.temporal, 0.1);
        // Non-overridden phases use the built-in table
        let planning = config.profile_for(PhaseKind::Planning);
        assert_ne!(planning.temporal, 0.1);
    }

    #[test]
    fn test_model_for_roles() {
        let config = LlmConfig::default();
        assert_eq!(config.model_for(ModelRole::Coder), "specialist-coder");
        assert_eq!(config.model_for(ModelRole::Interpreter), "toolcall-interpreter");
    }
}
