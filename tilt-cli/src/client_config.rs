use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tilt::sensor::SensorConfig;
use tilt::session::SessionConfig;
use tilt::transport::TransportConfig;

/// Everything the controller needs, loadable from one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub signaling_url: String,
    pub identity_path: PathBuf,
    pub sensor: SensorConfig,
    pub transport: TransportConfig,
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:8080/ws".to_owned(),
            identity_path: PathBuf::from(".tilt/identity.json"),
            sensor: SensorConfig::default(),
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Read the config file, or fall back to defaults when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
