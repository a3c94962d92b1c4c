//! Agent configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tessera_core::EngineConfig;

/// Full configuration for a Tessera agent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    /// Who this agent is.
    #[serde(default)]
    pub agent: AgentSection,

    /// Retry, timeout and event bus settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Display name, used as the invitation name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Endpoint the agent registers on the link network.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_name() -> String {
    "Alice".into()
}
fn default_endpoint() -> String {
    "127.0.0.1:5800".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            endpoint: default_endpoint(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl AgentConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields or a missing file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save the config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agent.name.trim().is_empty() {
            anyhow::bail!("agent.name must not be empty");
        }
        if self.agent.endpoint.trim().is_empty() {
            anyhow::bail!("agent.endpoint must not be empty");
        }
        self.engine.validate()?;
        Ok(())
    }
}
