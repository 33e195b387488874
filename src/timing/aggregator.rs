//! Per-cycle collection of load, paint, and viewport records.

use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use tracing::{debug, info, warn};

use crate::{
    ElementIndex, LoadRecord, Millis, PaintKey, PaintRecord, Phase, TrackedElement,
    ViewportRecord, config::DetectionPolicy,
};

use super::{estimator::PaintCandidate, policy};

/// Load that never completed for an element phase.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub element_index: ElementIndex,
    pub phase: Phase,
    pub reason: String,
}

/// Immutable result of a finalized cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub loads: Vec<LoadRecord>,
    pub paints: Vec<PaintRecord>,
    pub viewports: Vec<ViewportRecord>,
    pub failures: Vec<LoadFailure>,
    /// Candidates dropped for exceeding the paint delta bound.
    pub discarded_anomalies: usize,
    /// Admissible candidates dropped because their key was already painted.
    pub discarded_duplicates: usize,
}

impl MetricsSnapshot {
    pub fn load_for(&self, index: ElementIndex, phase: Phase) -> Option<&LoadRecord> {
        self.loads
            .iter()
            .find(|record| record.element_index == index && record.phase == phase)
    }

    pub fn paint_for(&self, index: ElementIndex, phase: Phase) -> Option<&PaintRecord> {
        self.paints.iter().find(|record| record.key() == (index, phase))
    }

    pub fn viewport_for(&self, index: ElementIndex) -> Option<&ViewportRecord> {
        self.viewports
            .iter()
            .find(|record| record.element_index == index)
    }
}

/// Drops anomalous candidates, then keeps the first candidate per key.
///
/// Applying it to its own output yields the same records.
pub fn reconcile(
    detection: &DetectionPolicy,
    candidates: &[PaintCandidate],
) -> (Vec<PaintRecord>, usize, usize) {
    let mut seen = HashSet::new();
    let mut paints = Vec::new();
    let mut anomalies = 0;
    let mut duplicates = 0;
    for candidate in candidates {
        if !policy::is_admissible(detection, candidate) {
            anomalies += 1;
            continue;
        }
        if seen.insert(candidate.key()) {
            paints.push(candidate.to_record());
        } else {
            duplicates += 1;
        }
    }
    (paints, anomalies, duplicates)
}

/// Owner of the record collections for the current cycle.
#[derive(Debug)]
pub struct MetricsAggregator {
    detection: DetectionPolicy,
    expected: BTreeSet<PaintKey>,
    loads: Vec<LoadRecord>,
    candidates: Vec<PaintCandidate>,
    viewports: Vec<ViewportRecord>,
    failures: Vec<LoadFailure>,
    finalized: Option<Arc<MetricsSnapshot>>,
}

impl MetricsAggregator {
    pub fn new(elements: &[TrackedElement], detection: DetectionPolicy) -> Self {
        let expected = elements
            .iter()
            .flat_map(|element| {
                element
                    .phases()
                    .iter()
                    .map(move |phase| (element.index, *phase))
            })
            .collect();
        Self {
            detection,
            expected,
            loads: Vec::new(),
            candidates: Vec::new(),
            viewports: Vec::new(),
            failures: Vec::new(),
            finalized: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    fn accepts_mutation(&self, operation: &'static str) -> bool {
        if self.is_finalized() {
            warn!(operation, "cycle already finalized; ignoring update");
            return false;
        }
        true
    }

    fn is_tracked(&self, index: ElementIndex, phase: Phase) -> bool {
        self.expected.contains(&(index, phase))
    }

    fn is_tracked_element(&self, index: ElementIndex) -> bool {
        self.expected.iter().any(|(tracked, _)| *tracked == index)
    }

    /// Appends a load record; returns false when the record was ignored.
    pub fn record_load(&mut self, index: ElementIndex, phase: Phase, timestamp: Millis) -> bool {
        if !self.accepts_mutation("record_load") {
            return false;
        }
        if !self.is_tracked(index, phase) {
            warn!(index, %phase, "load reported for untracked element phase");
            return false;
        }
        if self.load_time(index, phase).is_some() {
            debug!(index, %phase, "duplicate load event ignored");
            return false;
        }
        self.loads.push(LoadRecord {
            element_index: index,
            timestamp,
            phase,
        });
        if self.is_complete() {
            info!(loads = self.loads.len(), "all expected loads recorded");
        }
        true
    }

    pub fn load_time(&self, index: ElementIndex, phase: Phase) -> Option<Millis> {
        self.loads
            .iter()
            .find(|record| record.element_index == index && record.phase == phase)
            .map(|record| record.timestamp)
    }

    pub fn record_load_failure(&mut self, index: ElementIndex, phase: Phase, reason: String) {
        if !self.accepts_mutation("record_load_failure") {
            return;
        }
        warn!(index, %phase, %reason, "image failed to load");
        self.failures.push(LoadFailure {
            element_index: index,
            phase,
            reason,
        });
    }

    /// Appends a paint candidate.
    ///
    /// Returns true when this is the first admissible candidate for its key,
    /// which is the one that survives finalization.
    pub fn record_paint_candidate(&mut self, candidate: PaintCandidate) -> bool {
        if !self.accepts_mutation("record_paint_candidate") {
            return false;
        }
        if !self.is_tracked(candidate.element_index, candidate.phase) {
            warn!(
                index = candidate.element_index,
                phase = %candidate.phase,
                "paint reported for untracked element phase"
            );
            return false;
        }
        let decision = policy::evaluate(&self.detection, &candidate);
        let admissible = policy::admit(&decision, &candidate);
        let first = admissible
            && !self.candidates.iter().any(|existing| {
                existing.key() == candidate.key()
                    && policy::is_admissible(&self.detection, existing)
            });
        debug!(
            index = candidate.element_index,
            phase = %candidate.phase,
            method = %candidate.method,
            delta = candidate.delta(),
            first,
            "paint candidate recorded"
        );
        self.candidates.push(candidate);
        first
    }

    /// Stores the first intersection of an element; later entries are ignored.
    pub fn record_viewport_entry(
        &mut self,
        index: ElementIndex,
        ratio: f64,
        timestamp: Millis,
    ) -> bool {
        if !self.accepts_mutation("record_viewport_entry") {
            return false;
        }
        if !self.is_tracked_element(index) {
            warn!(index, "viewport entry reported for untracked element");
            return false;
        }
        if self
            .viewports
            .iter()
            .any(|record| record.element_index == index)
        {
            return false;
        }
        self.viewports.push(ViewportRecord {
            element_index: index,
            first_intersection: timestamp,
            ratio: ratio.clamp(0.0, 1.0),
        });
        true
    }

    /// Every expected (element, phase) pair has a load record.
    pub fn is_complete(&self) -> bool {
        self.expected
            .iter()
            .all(|(index, phase)| self.load_time(*index, *phase).is_some())
    }

    pub fn expected_loads(&self) -> usize {
        self.expected.len()
    }

    pub fn recorded_loads(&self) -> usize {
        self.loads.len()
    }

    /// Produces the terminal snapshot of the cycle. Repeated calls return the same snapshot.
    pub fn finalize(&mut self) -> Arc<MetricsSnapshot> {
        if let Some(snapshot) = &self.finalized {
            return snapshot.clone();
        }
        let (paints, discarded_anomalies, discarded_duplicates) =
            reconcile(&self.detection, &self.candidates);
        let snapshot = Arc::new(MetricsSnapshot {
            loads: self.loads.clone(),
            paints,
            viewports: self.viewports.clone(),
            failures: self.failures.clone(),
            discarded_anomalies,
            discarded_duplicates,
        });
        self.finalized = Some(snapshot.clone());
        snapshot
    }
}
