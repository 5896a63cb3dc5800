// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// SkyMarshal configuration manifest
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Orchestration timing (per-agent timeout, revision retry policy)
// - Arbitration policy (criteria weights, normalization ceilings)
// - LLM endpoint for the agent adapter
// - Decision storage location

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::policy::ArbitrationPolicy;

pub const API_VERSION: &str = "skymarshal/v1";
pub const KIND: &str = "SkyMarshalConfig";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkyMarshalConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: SkyMarshalSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SkyMarshalSpec {
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    #[serde(default)]
    pub arbitration: ArbitrationPolicy,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Deadline for each individual agent invocation
    #[serde(with = "humantime_serde", default = "default_agent_timeout")]
    pub agent_timeout: Duration,

    /// Re-invoke agents that failed in Phase 1 once during the revision round
    #[serde(default)]
    pub retry_unavailable_in_revision: bool,

    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint, e.g. https://api.openai.com/v1
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Resolve `env:VAR` indirection for the API key
    pub fn resolved_api_key(&self) -> anyhow::Result<String> {
        match self.api_key.as_deref() {
            Some(key) if key.starts_with("env:") => {
                let var = &key["env:".len()..];
                std::env::var(var)
                    .map_err(|_| anyhow::anyhow!("Environment variable '{}' is not set", var))
            }
            Some(key) => Ok(key.to_string()),
            None => Ok(String::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_decision_dir")]
    pub decision_dir: PathBuf,
}

fn default_agent_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_event_bus_capacity() -> usize {
    1000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_decision_dir() -> PathBuf {
    PathBuf::from("./decisions")
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            agent_timeout: default_agent_timeout(),
            retry_unavailable_in_revision: false,
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            decision_dir: default_decision_dir(),
        }
    }
}

impl Default for SkyMarshalConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "skymarshal".to_string(),
                version: None,
                labels: HashMap::new(),
            },
            spec: SkyMarshalSpec::default(),
        }
    }
}

impl SkyMarshalConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SKYMARSHAL_CONFIG_PATH environment variable
    /// 2. ./skymarshal.yaml (working directory)
    /// 3. ~/.skymarshal/config.yaml (user home)
    /// 4. /etc/skymarshal/config.yaml (Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SKYMARSHAL_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./skymarshal.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".skymarshal").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/skymarshal/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SKYMARSHAL_AGENT_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(timeout) => {
                    tracing::info!("Environment override: SKYMARSHAL_AGENT_TIMEOUT={}", val);
                    self.spec.orchestration.agent_timeout = timeout;
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid value for SKYMARSHAL_AGENT_TIMEOUT: '{}' ({}). Ignoring.",
                        val,
                        e
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("SKYMARSHAL_DECISION_DIR") {
            tracing::info!("Environment override: SKYMARSHAL_DECISION_DIR={}", val);
            self.spec.storage.decision_dir = PathBuf::from(val);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.orchestration.agent_timeout.is_zero() {
            anyhow::bail!("spec.orchestration.agent_timeout must be greater than zero");
        }

        if self.spec.orchestration.event_bus_capacity == 0 {
            anyhow::bail!("spec.orchestration.event_bus_capacity must be greater than zero");
        }

        self.spec
            .arbitration
            .validate()
            .map_err(|e| anyhow::anyhow!("spec.arbitration: {}", e))?;

        if let Some(llm) = &self.spec.llm {
            if llm.endpoint.is_empty() {
                anyhow::bail!("spec.llm.endpoint cannot be empty");
            }
            if llm.model.is_empty() {
                anyhow::bail!("spec.llm.model cannot be empty");
            }
        }

        Ok(())
    }
}
