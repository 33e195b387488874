//! Recorded signal scenarios.

use std::path::Path;

use serde::Deserialize;
use tokio::fs;
use tracing::instrument;

use crate::{
    MetricsError,
    timing::{signal::HostSignal, vitals::HostCapabilities},
};

/// Host capabilities plus the signals observed during one load cycle.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScenarioDocument {
    /// Epoch milliseconds of the recorded navigation start.
    #[serde(default)]
    pub time_origin: f64,
    #[serde(default)]
    pub capabilities: HostCapabilities,
    #[serde(default, rename = "signal")]
    pub signals: Vec<HostSignal>,
}

impl ScenarioDocument {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, MetricsError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|err| MetricsError::Io(format!("{}: {err}", path.display())))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, MetricsError> {
        toml::from_str(raw)
            .map_err(|err| MetricsError::Scenario(format!("invalid scenario document: {err}")))
    }
}
