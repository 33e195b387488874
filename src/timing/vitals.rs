//! Native paint metrics and their fallbacks.

use serde::Deserialize;
use tracing::debug;

use crate::{ElementHandle, ElementKind, Millis, Rect};

/// Paint entry name that carries first contentful paint.
pub const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// Shifts further apart than this start a new session window.
pub const SHIFT_SESSION_GAP_MS: f64 = 1_000.0;

/// Longest span a single session window may cover.
pub const SHIFT_SESSION_MAX_MS: f64 = 5_000.0;

/// Timing signals the host environment exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    pub element_timing: bool,
    pub largest_contentful_paint: bool,
    pub layout_shift: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            element_timing: true,
            largest_contentful_paint: true,
            layout_shift: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcpSource {
    Native,
    ManualScan,
}

/// Largest painted content region and when it painted.
#[derive(Debug, Clone, PartialEq)]
pub struct LargestPaint {
    pub start_time: Millis,
    pub size: f64,
    pub handle: Option<ElementHandle>,
    pub source: LcpSource,
}

/// Element box reported by a manual visibility scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisibleElement {
    pub handle: ElementHandle,
    #[serde(default)]
    pub kind: ElementKind,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ShiftSession {
    start: Millis,
    last: Millis,
    value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VitalsSummary {
    pub fcp: Option<Millis>,
    pub lcp: Option<LargestPaint>,
    /// `None` when the host cannot report layout shifts.
    pub cls: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct VitalsCollector {
    capabilities: HostCapabilities,
    fcp: Option<Millis>,
    lcp: Option<LargestPaint>,
    session: Option<ShiftSession>,
    cls: f64,
}

impl VitalsCollector {
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            fcp: None,
            lcp: None,
            session: None,
            cls: 0.0,
        }
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// Records a paint timing entry; only the first contentful paint is kept.
    pub fn record_paint_entry(&mut self, name: &str, start_time: Millis) {
        if name != FIRST_CONTENTFUL_PAINT {
            debug!(name, "paint entry ignored");
            return;
        }
        if self.fcp.is_none() {
            self.fcp = Some(start_time);
        }
    }

    /// Records a largest-paint report; smaller reports than the current one are ignored.
    pub fn record_largest_paint(&mut self, entry: LargestPaint) -> bool {
        if let Some(current) = &self.lcp {
            if entry.size < current.size {
                return false;
            }
        }
        debug!(size = entry.size, start_time = entry.start_time, source = ?entry.source, "largest paint updated");
        self.lcp = Some(entry);
        true
    }

    /// Scans visible boxes for the largest clipped area when native reports are unavailable.
    pub fn scan_visible(
        &mut self,
        at: Millis,
        elements: &[VisibleElement],
        viewport: &Rect,
    ) -> Option<LargestPaint> {
        if self.capabilities.largest_contentful_paint {
            debug!("native largest paint available; manual scan skipped");
            return None;
        }
        let (handle, size) = elements
            .iter()
            .filter_map(|element| {
                element
                    .rect
                    .intersection(viewport)
                    .map(|visible| (&element.handle, visible.area()))
            })
            .filter(|(_, size)| *size > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        let entry = LargestPaint {
            start_time: at,
            size,
            handle: Some(handle.clone()),
            source: LcpSource::ManualScan,
        };
        self.record_largest_paint(entry.clone()).then_some(entry)
    }

    /// Accumulates a layout shift into session windows.
    pub fn record_layout_shift(&mut self, at: Millis, value: f64, had_recent_input: bool) {
        if had_recent_input || !(value > 0.0) {
            return;
        }
        let session = match self.session {
            Some(current)
                if at - current.last < SHIFT_SESSION_GAP_MS
                    && at - current.start < SHIFT_SESSION_MAX_MS =>
            {
                ShiftSession {
                    last: at,
                    value: current.value + value,
                    ..current
                }
            }
            _ => ShiftSession {
                start: at,
                last: at,
                value,
            },
        };
        self.cls = self.cls.max(session.value);
        self.session = Some(session);
    }

    pub fn summary(&self) -> VitalsSummary {
        VitalsSummary {
            fcp: self.fcp,
            lcp: self.lcp.clone(),
            cls: self.capabilities.layout_shift.then_some(self.cls),
        }
    }
}
