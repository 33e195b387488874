//! Paint-time estimation from frame polling and native element timing.

use std::{
    fmt::{self, Display},
    str::FromStr,
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, instrument};

use crate::{
    DetectionMethod, ElementIndex, MetricsError, Millis, PaintKey, PaintRecord, Phase,
};

use super::clock::NavigationClock;

/// Rendered and intrinsic dimensions of an element at one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct FrameSample {
    #[serde(default)]
    pub rendered_width: f64,
    #[serde(default)]
    pub rendered_height: f64,
    #[serde(default)]
    pub natural_width: f64,
    #[serde(default)]
    pub natural_height: f64,
}

impl FrameSample {
    /// Pre-load dimensions every element starts from.
    pub const BASELINE: FrameSample = FrameSample {
        rendered_width: 0.0,
        rendered_height: 0.0,
        natural_width: 0.0,
        natural_height: 0.0,
    };

    /// True once the rendered box left the baseline or intrinsic size is known.
    pub fn indicates_paint(&self) -> bool {
        let rendered_changed = self.rendered_width != Self::BASELINE.rendered_width
            || self.rendered_height != Self::BASELINE.rendered_height;
        let natural_known = self.natural_width > 0.0 && self.natural_height > 0.0;
        rendered_changed || natural_known
    }
}

/// Paint observation produced by one detection method.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintCandidate {
    pub element_index: ElementIndex,
    pub phase: Phase,
    pub load_time: Millis,
    pub paint_time: Millis,
    pub method: DetectionMethod,
}

impl PaintCandidate {
    pub fn key(&self) -> PaintKey {
        (self.element_index, self.phase)
    }

    pub fn delta(&self) -> Millis {
        self.paint_time - self.load_time
    }

    pub fn to_record(&self) -> PaintRecord {
        PaintRecord {
            element_index: self.element_index,
            phase: self.phase,
            load_time: self.load_time,
            paint_time: self.paint_time,
            delta: self.delta(),
            method: self.method,
        }
    }
}

/// Result of polling one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pending,
    Painted(PaintCandidate),
    /// Budget exhausted; no candidate is emitted.
    Expired,
}

/// Bounded per-frame paint check armed when an element finishes loading.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePoller {
    element_index: ElementIndex,
    phase: Phase,
    load_time: Millis,
    deadline: Millis,
    frames_polled: u32,
}

impl FramePoller {
    pub fn arm(element_index: ElementIndex, phase: Phase, load_time: Millis, budget_ms: f64) -> Self {
        Self {
            element_index,
            phase,
            load_time,
            deadline: load_time + budget_ms,
            frames_polled: 0,
        }
    }

    pub fn key(&self) -> PaintKey {
        (self.element_index, self.phase)
    }

    pub fn deadline(&self) -> Millis {
        self.deadline
    }

    pub fn frames_polled(&self) -> u32 {
        self.frames_polled
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now > self.deadline
    }

    /// Checks one frame; the first frame that shows paint is the paint instant.
    pub fn poll(&mut self, sample: &FrameSample, now: Millis) -> PollOutcome {
        if self.is_expired(now) {
            return PollOutcome::Expired;
        }
        self.frames_polled = self.frames_polled.saturating_add(1);
        if sample.indicates_paint() {
            PollOutcome::Painted(PaintCandidate {
                element_index: self.element_index,
                phase: self.phase,
                load_time: self.load_time,
                paint_time: now,
                method: DetectionMethod::AnimationFrame,
            })
        } else {
            PollOutcome::Pending
        }
    }
}

/// Host frame scheduling primitive.
#[async_trait]
pub trait FrameTicker: Send {
    /// Waits for the next frame and returns its navigation-relative time.
    async fn next_frame(&mut self) -> Millis;
}

/// Reads the current dimensions of the polled element.
pub trait PaintProbe: Send + Sync {
    fn sample(&self) -> FrameSample;
}

/// Frame ticker backed by a tokio interval.
pub struct IntervalTicker {
    interval: Interval,
    clock: NavigationClock,
}

impl IntervalTicker {
    pub fn new(clock: NavigationClock, frame_interval_ms: u64) -> Self {
        let mut interval = tokio::time::interval(Duration::from_millis(frame_interval_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, clock }
    }
}

#[async_trait]
impl FrameTicker for IntervalTicker {
    async fn next_frame(&mut self) -> Millis {
        self.interval.tick().await;
        self.clock.relative_now()
    }
}

/// Polls `probe` once per frame until paint is seen or the poller expires.
#[instrument(skip_all, fields(index = poller.element_index, phase = %poller.phase))]
pub async fn poll_for_paint<T, P>(
    ticker: &mut T,
    probe: &P,
    mut poller: FramePoller,
) -> Option<PaintCandidate>
where
    T: FrameTicker + ?Sized,
    P: PaintProbe + ?Sized,
{
    loop {
        let now = ticker.next_frame().await;
        match poller.poll(&probe.sample(), now) {
            PollOutcome::Pending => continue,
            PollOutcome::Painted(candidate) => {
                debug!(
                    paint_time = candidate.paint_time,
                    frames = poller.frames_polled(),
                    "paint detected"
                );
                return Some(candidate);
            }
            PollOutcome::Expired => {
                debug!(deadline = poller.deadline(), "paint polling budget exhausted");
                return None;
            }
        }
    }
}

const ELEMENT_TIMING_PREFIX: &str = "item-";

/// Element-timing identifier attached to a tracked image, `item-{index}-{phase}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementTimingId {
    pub index: ElementIndex,
    pub phase: Phase,
}

impl Display for ElementTimingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ELEMENT_TIMING_PREFIX}{}-{}", self.index, self.phase)
    }
}

impl FromStr for ElementTimingId {
    type Err = MetricsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || MetricsError::Scenario(format!("invalid element timing id '{value}'"));
        let rest = value.strip_prefix(ELEMENT_TIMING_PREFIX).ok_or_else(invalid)?;
        let (index, phase) = rest.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            index: index.parse().map_err(|_| invalid())?,
            phase: phase.parse()?,
        })
    }
}

/// Render report from the host's element timing signal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElementTimingEntry {
    pub identifier: String,
    #[serde(default)]
    pub render_time: Millis,
    #[serde(default)]
    pub load_time: Millis,
}

impl ElementTimingEntry {
    /// Render time, or load time when the host withheld render time.
    pub fn paint_time(&self) -> Millis {
        if self.render_time > 0.0 {
            self.render_time
        } else {
            self.load_time
        }
    }
}

/// Translates an element timing report into a candidate for the same key.
///
/// `recorded_load` is the load time the aggregator holds for the key, which
/// takes precedence over the load time carried by the entry.
pub fn translate_element_timing(
    entry: &ElementTimingEntry,
    recorded_load: impl FnOnce(PaintKey) -> Option<Millis>,
) -> Option<PaintCandidate> {
    let id = match entry.identifier.parse::<ElementTimingId>() {
        Ok(id) => id,
        Err(error) => {
            debug!(%error, "element timing entry for untracked element");
            return None;
        }
    };
    let load_time = recorded_load((id.index, id.phase)).unwrap_or(entry.load_time);
    Some(PaintCandidate {
        element_index: id.index,
        phase: id.phase,
        load_time,
        paint_time: entry.paint_time(),
        method: DetectionMethod::ElementTiming,
    })
}
