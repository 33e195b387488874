//! Configuration loading and validation utilities.

use std::{collections::HashSet, path::PathBuf};

use clap::Parser;
use serde::Deserialize;
use tokio::fs;
use tracing::instrument;

use crate::{ElementHandle, ElementKind, LoadingMode, MetricsError, Rect, TrackedElement};

/// Command-line arguments used to bootstrap a replay.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Load, paint, and viewport timing replay for image grids")]
pub struct CliArgs {
    /// Location of the policy document.
    #[arg(long, value_name = "PATH", default_value = "policy.toml")]
    pub policy: PathBuf,
    /// Location of the item catalog.
    #[arg(long, value_name = "PATH", default_value = "catalog.toml")]
    pub catalog: PathBuf,
    /// Recorded host signals to replay.
    #[arg(long, value_name = "PATH", default_value = "scenario.toml")]
    pub scenario: PathBuf,
    /// Loading strategy override.
    #[arg(long, value_enum, env = "PAINTSCOPE_MODE")]
    pub mode: Option<LoadingMode>,
    /// Bounded signal channel capacity.
    #[arg(long, value_name = "CAPACITY", env = "PAINTSCOPE_CHANNEL_CAPACITY")]
    pub channel_capacity: Option<u32>,
    /// Intersection log entries kept per element.
    #[arg(long, value_name = "ENTRIES", env = "PAINTSCOPE_LOG_CAPACITY")]
    pub log_capacity: Option<usize>,
}

/// Membership rules for the large contentful set.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct LcsPolicy {
    /// Fraction of the largest member's area a member must reach.
    pub threshold: f64,
    /// Containers survive next to images only above this multiple of the largest image.
    pub container_multiplier: f64,
}

impl Default for LcsPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            container_multiplier: 1.5,
        }
    }
}

impl LcsPolicy {
    pub fn validate(&self) -> Result<(), MetricsError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(MetricsError::Config(format!(
                "lcs threshold {} must lie in (0, 1]",
                self.threshold
            )));
        }
        if !(self.container_multiplier >= 1.0) {
            return Err(MetricsError::Config(format!(
                "container multiplier {} must be at least 1",
                self.container_multiplier
            )));
        }
        Ok(())
    }
}

/// Bounds applied to paint detection.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct DetectionPolicy {
    /// Paint deltas at or above this bound are detection anomalies.
    pub max_paint_delta_ms: f64,
    /// Frame polling gives up this long after load.
    pub poll_budget_ms: f64,
    /// Tick period for live frame polling.
    pub frame_interval_ms: u64,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            max_paint_delta_ms: 10_000.0,
            poll_budget_ms: 10_000.0,
            frame_interval_ms: 16,
        }
    }
}

/// Default runtime settings provided by policy authors.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RuntimeDefaults {
    pub mode: LoadingMode,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub channel_capacity: u32,
    pub log_capacity: usize,
    pub settle_timeout_ms: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct PolicyDocument {
    #[serde(default)]
    pub lcs: LcsPolicy,
    #[serde(default)]
    pub detection: DetectionPolicy,
    pub defaults: RuntimeDefaults,
}

/// Items rendered into the grid, in creation order.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Catalog {
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub handle: ElementHandle,
    #[serde(default)]
    pub kind: ElementKind,
    pub image: String,
    #[serde(default)]
    pub placeholder: Option<String>,
}

impl Catalog {
    pub fn validate(&self, mode: LoadingMode) -> Result<(), MetricsError> {
        if self.items.is_empty() {
            return Err(MetricsError::Config("catalog has no items".to_string()));
        }
        let mut seen = HashSet::new();
        for item in &self.items {
            if !seen.insert(item.handle.as_str()) {
                return Err(MetricsError::Config(format!(
                    "duplicate catalog handle '{}'",
                    item.handle
                )));
            }
            if item.image.trim().is_empty() {
                return Err(MetricsError::Config(format!(
                    "item '{}' missing image source",
                    item.handle
                )));
            }
            if mode == LoadingMode::Lqip
                && item.kind == ElementKind::Image
                && item.placeholder.as_deref().is_none_or(|p| p.trim().is_empty())
            {
                return Err(MetricsError::Config(format!(
                    "item '{}' needs a placeholder in lqip mode",
                    item.handle
                )));
            }
        }
        Ok(())
    }

    /// Assigns stable indices in catalog order.
    pub fn tracked_elements(&self, mode: LoadingMode) -> Vec<TrackedElement> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| TrackedElement {
                index,
                handle: item.handle.clone(),
                kind: item.kind,
                mode,
            })
            .collect()
    }
}

/// Derived runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub mode: LoadingMode,
    pub viewport: Rect,
    pub channel_capacity: u32,
    pub log_capacity: usize,
    pub settle_timeout_ms: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: LoadingMode::Standard,
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
            channel_capacity: 64,
            log_capacity: 20,
            settle_timeout_ms: 15_000.0,
        }
    }
}

/// Fully merged configuration set.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cli: CliArgs,
    pub lcs: LcsPolicy,
    pub detection: DetectionPolicy,
    pub catalog: Catalog,
    pub elements: Vec<TrackedElement>,
    pub runtime: RuntimeConfig,
    pub scenario_path: PathBuf,
}

impl AppConfig {
    #[instrument(skip_all)]
    pub async fn load(cli: CliArgs) -> Result<Self, MetricsError> {
        let policy_raw = fs::read_to_string(&cli.policy)
            .await
            .map_err(|err| MetricsError::Config(format!("failed to read policy: {err}")))?;
        let catalog_raw = fs::read_to_string(&cli.catalog)
            .await
            .map_err(|err| MetricsError::Config(format!("failed to read catalog: {err}")))?;
        Self::from_documents(cli, &policy_raw, &catalog_raw)
    }

    /// Merges already-read policy and catalog documents with CLI overrides.
    pub fn from_documents(
        cli: CliArgs,
        policy_raw: &str,
        catalog_raw: &str,
    ) -> Result<Self, MetricsError> {
        let policy_doc: PolicyDocument = toml::from_str(policy_raw)
            .map_err(|err| MetricsError::Config(format!("invalid policy document: {err}")))?;
        policy_doc.lcs.validate()?;
        if !(policy_doc.detection.max_paint_delta_ms > 0.0) {
            return Err(MetricsError::Config(
                "max_paint_delta_ms must be positive".to_string(),
            ));
        }
        if !(policy_doc.detection.poll_budget_ms > 0.0) {
            return Err(MetricsError::Config(
                "poll_budget_ms must be positive".to_string(),
            ));
        }

        let catalog: Catalog = toml::from_str(catalog_raw)
            .map_err(|err| MetricsError::Config(format!("invalid catalog document: {err}")))?;

        let defaults = policy_doc.defaults;
        let mode = cli.mode.unwrap_or(defaults.mode);
        catalog.validate(mode)?;

        if !(defaults.viewport_width > 0.0 && defaults.viewport_height > 0.0) {
            return Err(MetricsError::Config(format!(
                "viewport {}x{} must be non-empty",
                defaults.viewport_width, defaults.viewport_height
            )));
        }
        let log_capacity = cli.log_capacity.unwrap_or(defaults.log_capacity);
        if log_capacity == 0 {
            return Err(MetricsError::Config(
                "log capacity must be positive".to_string(),
            ));
        }
        let channel_capacity = cli
            .channel_capacity
            .unwrap_or(defaults.channel_capacity)
            .max(1);

        let runtime = RuntimeConfig {
            mode,
            viewport: Rect::new(0.0, 0.0, defaults.viewport_width, defaults.viewport_height),
            channel_capacity,
            log_capacity,
            settle_timeout_ms: defaults.settle_timeout_ms.max(0.0),
        };

        Ok(Self {
            elements: catalog.tracked_elements(mode),
            scenario_path: cli.scenario.clone(),
            cli,
            lcs: policy_doc.lcs,
            detection: policy_doc.detection,
            catalog,
            runtime,
        })
    }
}
