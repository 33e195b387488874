//! Core library for paintscope.
//!
//! The crate reconciles load, paint, and viewport signals for a grid of
//! tracked images into one record per element and phase, maintains the large
//! contentful set, and collects the native paint metrics the records are
//! compared against. Host signals arrive through the replay pipeline used by
//! the CLI application, or directly through [`timing::coordinator::CycleCoordinator`].

pub mod config;
pub mod pipeline;
pub mod timing;

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

/// Milliseconds relative to navigation start.
pub type Millis = f64;

/// Stable index assigned to a tracked element when it is created.
pub type ElementIndex = usize;

/// Deduplication key shared by load and paint records.
pub type PaintKey = (ElementIndex, Phase);

/// Opaque reference to an element in the host document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Whether an element is an image or a block wrapping other content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    #[default]
    Image,
    Container,
}

/// Loading phase an image goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Single full-resolution load.
    Standard,
    /// Blurred placeholder shown first in LQIP mode.
    LowRes,
    /// Full-resolution swap-in for LQIP mode.
    HighRes,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Standard => "standard",
            Phase::LowRes => "low-res",
            Phase::HighRes => "high-res",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = MetricsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "standard" => Ok(Phase::Standard),
            "low-res" => Ok(Phase::LowRes),
            "high-res" => Ok(Phase::HighRes),
            other => Err(MetricsError::Scenario(format!("unknown phase '{other}'"))),
        }
    }
}

/// Image loading strategy applied to every item of a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LoadingMode {
    #[default]
    Standard,
    Lqip,
}

impl LoadingMode {
    /// Phases each image goes through, in load order.
    pub fn phases(self) -> &'static [Phase] {
        match self {
            LoadingMode::Standard => &[Phase::Standard],
            LoadingMode::Lqip => &[Phase::LowRes, Phase::HighRes],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoadingMode::Standard => "standard",
            LoadingMode::Lqip => "lqip",
        }
    }
}

impl Display for LoadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A visual element under observation for one load cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedElement {
    pub index: ElementIndex,
    pub handle: ElementHandle,
    pub kind: ElementKind,
    pub mode: LoadingMode,
}

impl TrackedElement {
    pub fn phases(&self) -> &'static [Phase] {
        self.mode.phases()
    }
}

/// How a paint instant was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionMethod {
    /// Frame-by-frame polling of rendered and intrinsic dimensions.
    AnimationFrame,
    /// Render time reported by the host's element timing signal.
    ElementTiming,
}

impl DetectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::AnimationFrame => "animation-frame",
            DetectionMethod::ElementTiming => "element-timing",
        }
    }
}

impl Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRecord {
    pub element_index: ElementIndex,
    pub timestamp: Millis,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaintRecord {
    pub element_index: ElementIndex,
    pub phase: Phase,
    pub load_time: Millis,
    pub paint_time: Millis,
    pub delta: Millis,
    pub method: DetectionMethod,
}

impl PaintRecord {
    pub fn key(&self) -> PaintKey {
        (self.element_index, self.phase)
    }
}

/// First transition of an element into the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportRecord {
    pub element_index: ElementIndex,
    pub first_intersection: Millis,
    pub ratio: f64,
}

/// Axis-aligned box in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Rect {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in square pixels; degenerate boxes have zero area.
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlapping region of two boxes, if they overlap at all.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right > left && bottom > top {
            Some(Rect::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }
}

/// Debug record of a single visibility transition.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionLogEntry {
    pub timestamp: Millis,
    pub element_index: ElementIndex,
    pub is_intersecting: bool,
    pub ratio: f64,
    pub rect: Rect,
}

/// Errors surfaced by configuration, replay, and task orchestration.
///
/// Detection anomalies and missing host capabilities are not errors; they are
/// logged where they are observed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("I/O failure: {0}")]
    Io(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("scenario error: {0}")]
    Scenario(String),
    #[error("signal channel closed: {0}")]
    Channel(String),
    #[error("task join failure: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for MetricsError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

/// Replays the configured scenario through one load cycle and returns its report.
#[instrument(skip_all, fields(mode = %config.runtime.mode))]
pub async fn run(config: config::AppConfig) -> Result<timing::report::CycleReport, MetricsError> {
    let scenario = pipeline::replay::ScenarioDocument::load(&config.scenario_path).await?;
    let report = pipeline::execute_cycle(&config, scenario).await?;
    info!(
        paints = report.snapshot.paints.len(),
        lcs_members = report.lcs.elements.len(),
        "load cycle complete"
    );
    Ok(report)
}
