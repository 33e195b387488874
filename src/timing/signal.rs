//! Signals a host environment reports to the coordinator.

use serde::Deserialize;

use crate::{ElementHandle, ElementIndex, Millis, Phase, Rect};

use super::{
    estimator::{ElementTimingEntry, FrameSample},
    lcs::EmbeddedImage,
    vitals::VisibleElement,
};

/// Frame sample for one polled element phase.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElementSample {
    pub index: ElementIndex,
    pub phase: Phase,
    pub sample: FrameSample,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HostSignal {
    /// Load event of one image phase.
    Load {
        index: ElementIndex,
        phase: Phase,
        #[serde(default)]
        at: Option<Millis>,
    },
    LoadError {
        index: ElementIndex,
        phase: Phase,
        reason: String,
    },
    /// Layout box of a tracked element and any images it wraps.
    Layout {
        index: ElementIndex,
        rect: Rect,
        #[serde(default)]
        embedded: Vec<EmbeddedImage>,
    },
    /// Animation frame with the dimensions of the elements being polled.
    Frame {
        at: Millis,
        #[serde(default)]
        samples: Vec<ElementSample>,
    },
    ElementTiming {
        #[serde(flatten)]
        entry: ElementTimingEntry,
    },
    Intersection {
        index: ElementIndex,
        is_intersecting: bool,
        ratio: f64,
        rect: Rect,
        #[serde(default)]
        at: Option<Millis>,
    },
    PaintEntry {
        name: String,
        start_time: Millis,
    },
    LargestPaint {
        start_time: Millis,
        size: f64,
        #[serde(default)]
        handle: Option<ElementHandle>,
    },
    LayoutShift {
        at: Millis,
        value: f64,
        #[serde(default)]
        had_recent_input: bool,
    },
    /// Manual scan of visible element boxes.
    VisibleScan {
        at: Millis,
        #[serde(default)]
        elements: Vec<VisibleElement>,
    },
    /// The host considers the cycle done.
    Settle,
}

impl HostSignal {
    /// Host time the signal was observed at, when it carries one.
    pub fn timestamp(&self) -> Option<Millis> {
        match self {
            HostSignal::Load { at, .. } | HostSignal::Intersection { at, .. } => *at,
            HostSignal::Frame { at, .. }
            | HostSignal::LayoutShift { at, .. }
            | HostSignal::VisibleScan { at, .. } => Some(*at),
            HostSignal::ElementTiming { entry } => Some(entry.paint_time()),
            HostSignal::PaintEntry { start_time, .. }
            | HostSignal::LargestPaint { start_time, .. } => Some(*start_time),
            HostSignal::LoadError { .. } | HostSignal::Layout { .. } | HostSignal::Settle => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostSignal::Load { .. } => "load",
            HostSignal::LoadError { .. } => "load-error",
            HostSignal::Layout { .. } => "layout",
            HostSignal::Frame { .. } => "frame",
            HostSignal::ElementTiming { .. } => "element-timing",
            HostSignal::Intersection { .. } => "intersection",
            HostSignal::PaintEntry { .. } => "paint-entry",
            HostSignal::LargestPaint { .. } => "largest-paint",
            HostSignal::LayoutShift { .. } => "layout-shift",
            HostSignal::VisibleScan { .. } => "visible-scan",
            HostSignal::Settle => "settle",
        }
    }
}
