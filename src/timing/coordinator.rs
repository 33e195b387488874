//! Composition root wiring the clock, aggregator, LCS tracker, and native metrics.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::{
    ElementIndex, IntersectionLogEntry, Millis, PaintKey, Phase, Rect, TrackedElement,
    config::{AppConfig, DetectionPolicy, LcsPolicy, RuntimeConfig},
};

use super::{
    aggregator::{MetricsAggregator, MetricsSnapshot},
    clock::NavigationClock,
    estimator::{self, ElementTimingEntry, FramePoller, PaintCandidate, PollOutcome},
    event_log::{DEBUG_TAIL, IntersectionLog},
    events::{EventBus, MetricsEvent},
    lcs::{ContentRef, EmbeddedImage, LcsEntry, LcsState, LcsTracker},
    report::CycleReport,
    signal::{ElementSample, HostSignal},
    vitals::{HostCapabilities, LargestPaint, LcpSource, VitalsCollector},
};

#[derive(Debug, Clone)]
struct ElementGeometry {
    rect: Rect,
    embedded: Vec<EmbeddedImage>,
}

/// State owned by a single load cycle and discarded on reset.
#[derive(Debug)]
struct CycleState {
    aggregator: MetricsAggregator,
    lcs: LcsTracker,
    log: IntersectionLog,
    vitals: VitalsCollector,
    pollers: HashMap<PaintKey, FramePoller>,
    geometry: HashMap<ElementIndex, ElementGeometry>,
    started_at: Millis,
    finalized: Option<Arc<MetricsSnapshot>>,
}

/// Single writer applying host signals to the cycle's records.
pub struct CycleCoordinator {
    clock: NavigationClock,
    elements: Vec<TrackedElement>,
    lcs_policy: LcsPolicy,
    detection: DetectionPolicy,
    runtime: RuntimeConfig,
    capabilities: HostCapabilities,
    bus: EventBus,
    cycle: u64,
    state: CycleState,
}

impl CycleCoordinator {
    pub fn new(
        clock: NavigationClock,
        elements: Vec<TrackedElement>,
        lcs_policy: LcsPolicy,
        detection: DetectionPolicy,
        runtime: RuntimeConfig,
    ) -> Self {
        let capabilities = HostCapabilities::default();
        let state = CycleState::start(
            &clock,
            &elements,
            lcs_policy,
            detection,
            &runtime,
            capabilities,
        );
        Self {
            clock,
            elements,
            lcs_policy,
            detection,
            runtime,
            capabilities,
            bus: EventBus::default(),
            cycle: 1,
            state,
        }
    }

    pub fn from_config(config: &AppConfig, clock: NavigationClock) -> Self {
        Self::new(
            clock,
            config.elements.clone(),
            config.lcs,
            config.detection,
            config.runtime.clone(),
        )
    }

    /// Declares which native signals the host provides; restarts the current cycle.
    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self.state = self.fresh_state();
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricsEvent> {
        self.bus.subscribe()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn clock(&self) -> &NavigationClock {
        &self.clock
    }

    pub fn elements(&self) -> &[TrackedElement] {
        &self.elements
    }

    pub fn is_finalized(&self) -> bool {
        self.state.finalized.is_some()
    }

    pub fn pending_pollers(&self) -> usize {
        self.state.pollers.len()
    }

    pub fn lcs_state(&self) -> LcsState {
        self.state.lcs.state()
    }

    pub fn intersection_log(&self) -> &IntersectionLog {
        &self.state.log
    }

    pub fn vitals(&self) -> &VitalsCollector {
        &self.state.vitals
    }

    pub fn snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.state.finalized.clone()
    }

    fn fresh_state(&self) -> CycleState {
        CycleState::start(
            &self.clock,
            &self.elements,
            self.lcs_policy,
            self.detection,
            &self.runtime,
            self.capabilities,
        )
    }

    /// Discards every record and starts the next cycle.
    pub fn reset(&mut self) {
        self.state = self.fresh_state();
        self.cycle += 1;
        info!(cycle = self.cycle, "load cycle reset");
    }

    /// Applies one host signal to completion.
    pub fn handle(&mut self, signal: HostSignal) {
        if self.is_finalized() {
            debug!(signal = signal.name(), "signal after finalization ignored");
            return;
        }
        match signal {
            HostSignal::Load { index, phase, at } => self.on_load(index, phase, at),
            HostSignal::LoadError {
                index,
                phase,
                reason,
            } => self.state.aggregator.record_load_failure(index, phase, reason),
            HostSignal::Layout {
                index,
                rect,
                embedded,
            } => self.on_layout(index, rect, embedded),
            HostSignal::Frame { at, samples } => self.on_frame(at, &samples),
            HostSignal::ElementTiming { entry } => self.on_element_timing(&entry),
            HostSignal::Intersection {
                index,
                is_intersecting,
                ratio,
                rect,
                at,
            } => self.on_intersection(index, is_intersecting, ratio, rect, at),
            HostSignal::PaintEntry { name, start_time } => {
                self.state.vitals.record_paint_entry(&name, start_time)
            }
            HostSignal::LargestPaint {
                start_time,
                size,
                handle,
            } => {
                if !self.capabilities.largest_contentful_paint {
                    debug!("largest paint reported by a host declared without it");
                }
                self.state.vitals.record_largest_paint(LargestPaint {
                    start_time,
                    size,
                    handle,
                    source: LcpSource::Native,
                });
            }
            HostSignal::LayoutShift {
                at,
                value,
                had_recent_input,
            } => self
                .state
                .vitals
                .record_layout_shift(at, value, had_recent_input),
            HostSignal::VisibleScan { at, elements } => {
                self.state
                    .vitals
                    .scan_visible(at, &elements, &self.runtime.viewport);
            }
            HostSignal::Settle => {
                self.finalize();
            }
        }
    }

    fn timestamp_or_now(&self, at: Option<Millis>) -> Millis {
        at.unwrap_or_else(|| self.clock.relative_now())
    }

    fn on_load(&mut self, index: ElementIndex, phase: Phase, at: Option<Millis>) {
        let timestamp = self.timestamp_or_now(at);
        if !self.state.aggregator.record_load(index, phase, timestamp) {
            return;
        }
        let poller = FramePoller::arm(index, phase, timestamp, self.detection.poll_budget_ms);
        debug!(index, %phase, deadline = poller.deadline(), "paint polling armed");
        self.state.pollers.insert(poller.key(), poller);
    }

    fn on_layout(&mut self, index: ElementIndex, rect: Rect, embedded: Vec<EmbeddedImage>) {
        if index >= self.elements.len() {
            warn!(index, "layout reported for untracked element");
            return;
        }
        self.state
            .geometry
            .insert(index, ElementGeometry { rect, embedded });
    }

    fn on_frame(&mut self, at: Millis, samples: &[ElementSample]) {
        let mut painted = Vec::new();
        for sample in samples {
            let key = (sample.index, sample.phase);
            let Some(poller) = self.state.pollers.get_mut(&key) else {
                continue;
            };
            match poller.poll(&sample.sample, at) {
                PollOutcome::Pending => {}
                PollOutcome::Painted(candidate) => {
                    self.state.pollers.remove(&key);
                    painted.push(candidate);
                }
                PollOutcome::Expired => {
                    debug!(index = key.0, phase = %key.1, "paint polling budget exhausted");
                    self.state.pollers.remove(&key);
                }
            }
        }
        // Pollers the host stopped sampling still honor their deadline.
        self.state.pollers.retain(|key, poller| {
            let expired = poller.is_expired(at);
            if expired {
                debug!(index = key.0, phase = %key.1, "paint polling budget exhausted");
            }
            !expired
        });
        for candidate in painted {
            self.accept_candidate(candidate);
        }

        if at - self.state.started_at >= self.runtime.settle_timeout_ms {
            info!(at, "settle timeout reached; finalizing cycle");
            self.finalize();
        } else {
            self.finalize_if_complete();
        }
    }

    fn on_element_timing(&mut self, entry: &ElementTimingEntry) {
        if !self.capabilities.element_timing {
            debug!("element timing reported by a host declared without it");
        }
        let aggregator = &self.state.aggregator;
        let candidate = estimator::translate_element_timing(entry, |(index, phase)| {
            aggregator.load_time(index, phase)
        });
        if let Some(candidate) = candidate {
            self.accept_candidate(candidate);
        }
    }

    fn on_intersection(
        &mut self,
        index: ElementIndex,
        is_intersecting: bool,
        ratio: f64,
        rect: Rect,
        at: Option<Millis>,
    ) {
        if index >= self.elements.len() {
            warn!(index, "intersection reported for untracked element");
            return;
        }
        let timestamp = self.timestamp_or_now(at);
        let entry = IntersectionLogEntry {
            timestamp,
            element_index: index,
            is_intersecting,
            ratio,
            rect,
        };
        self.state.log.record(entry.clone());
        if is_intersecting {
            self.state
                .aggregator
                .record_viewport_entry(index, ratio, timestamp);
        }
        self.bus.publish(MetricsEvent::ViewportTransition(entry));
    }

    /// Records a paint candidate and feeds the first one per key into the set.
    fn accept_candidate(&mut self, candidate: PaintCandidate) {
        let index = candidate.element_index;
        let record = candidate.to_record();
        if !self.state.aggregator.record_paint_candidate(candidate) {
            return;
        }
        let Some(element) = self.elements.get(index) else {
            return;
        };
        let Some(geometry) = self.state.geometry.get(&index) else {
            debug!(index, "no layout for painted element; lcs skipped");
            return;
        };
        let visible = geometry
            .rect
            .intersection(&self.runtime.viewport)
            .unwrap_or_default();
        let embedded: Vec<EmbeddedImage> = geometry
            .embedded
            .iter()
            .filter_map(|image| {
                image
                    .rect
                    .intersection(&self.runtime.viewport)
                    .map(|rect| EmbeddedImage {
                        handle: image.handle.clone(),
                        rect,
                    })
            })
            .collect();
        let entry = LcsEntry::resolve(
            ContentRef::new(element.handle.clone(), element.kind),
            &visible,
            &embedded,
            record,
        );
        if self.state.lcs.update(entry) {
            self.bus.publish(MetricsEvent::LcsChanged(self.state.lcs.state()));
        }
    }

    fn finalize_if_complete(&mut self) {
        if self.state.aggregator.is_complete() && self.state.pollers.is_empty() {
            self.finalize();
        }
    }

    /// Terminates the cycle and publishes its snapshot once.
    #[instrument(skip_all, fields(cycle = self.cycle))]
    pub fn finalize(&mut self) -> Arc<MetricsSnapshot> {
        if let Some(snapshot) = &self.state.finalized {
            return snapshot.clone();
        }
        let snapshot = self.state.aggregator.finalize();
        self.state.pollers.clear();
        self.state.finalized = Some(snapshot.clone());
        info!(
            loads = snapshot.loads.len(),
            expected = self.state.aggregator.expected_loads(),
            paints = snapshot.paints.len(),
            anomalies = snapshot.discarded_anomalies,
            "load cycle finalized"
        );
        self.bus.publish(MetricsEvent::Finalized(snapshot.clone()));
        snapshot
    }

    /// Finalizes the cycle if needed and projects it for presentation.
    pub fn finish(&mut self) -> CycleReport {
        let snapshot = self.finalize();
        let intersection_tail = (0..self.elements.len())
            .map(|index| {
                let tail = self
                    .state
                    .log
                    .latest(index, DEBUG_TAIL)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>();
                (index, tail)
            })
            .filter(|(_, tail)| !tail.is_empty())
            .collect::<BTreeMap<_, _>>();
        CycleReport {
            cycle: self.cycle,
            mode: self.runtime.mode,
            elements: self.elements.clone(),
            snapshot,
            lcs: self.state.lcs.state(),
            vitals: self.state.vitals.summary(),
            intersection_tail,
        }
    }
}

impl CycleState {
    fn start(
        clock: &NavigationClock,
        elements: &[TrackedElement],
        lcs_policy: LcsPolicy,
        detection: DetectionPolicy,
        runtime: &RuntimeConfig,
        capabilities: HostCapabilities,
    ) -> Self {
        Self {
            aggregator: MetricsAggregator::new(elements, detection),
            lcs: LcsTracker::new(lcs_policy),
            log: IntersectionLog::new(runtime.log_capacity),
            vitals: VitalsCollector::new(capabilities),
            pollers: HashMap::new(),
            geometry: HashMap::new(),
            started_at: clock.relative_now(),
            finalized: None,
        }
    }
}
