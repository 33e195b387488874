//! Presentation projection of a finished cycle.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    sync::Arc,
};

use crate::{ElementIndex, IntersectionLogEntry, LoadingMode, Millis, TrackedElement};

use super::{aggregator::MetricsSnapshot, lcs::LcsState, vitals::VitalsSummary};

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub mode: LoadingMode,
    pub elements: Vec<TrackedElement>,
    pub snapshot: Arc<MetricsSnapshot>,
    pub lcs: LcsState,
    pub vitals: VitalsSummary,
    /// Most recent visibility transitions per element.
    pub intersection_tail: BTreeMap<ElementIndex, Vec<IntersectionLogEntry>>,
}

impl CycleReport {
    /// LCS completion relative to the native largest paint; positive when the set finished later.
    pub fn lcs_vs_lcp(&self) -> Option<Millis> {
        let lcs = self.lcs.last_paint_time?;
        let lcp = self.vitals.lcp.as_ref()?.start_time;
        Some(lcs - lcp)
    }
}

fn millis(value: Option<Millis>) -> String {
    value.map_or_else(|| "-".to_string(), |ms| format!("{ms:.1}ms"))
}

impl Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cycle {} ({} mode)", self.cycle, self.mode)?;
        for element in &self.elements {
            for phase in element.phases() {
                let load = self
                    .snapshot
                    .load_for(element.index, *phase)
                    .map(|record| record.timestamp);
                let paint = self.snapshot.paint_for(element.index, *phase);
                writeln!(
                    f,
                    "  #{:<3} {:<20} {:<9} load={:<10} paint={:<10} delta={:<10} via={}",
                    element.index,
                    element.handle,
                    phase,
                    millis(load),
                    millis(paint.map(|record| record.paint_time)),
                    millis(paint.map(|record| record.delta)),
                    paint.map_or("-", |record| record.method.as_str()),
                )?;
            }
            if let Some(viewport) = self.snapshot.viewport_for(element.index) {
                writeln!(
                    f,
                    "       in viewport at {} (ratio {:.2})",
                    millis(Some(viewport.first_intersection)),
                    viewport.ratio
                )?;
            }
        }
        if !self.snapshot.failures.is_empty() {
            writeln!(f, "load failures: {}", self.snapshot.failures.len())?;
        }
        if self.snapshot.discarded_anomalies > 0 {
            writeln!(
                f,
                "discarded detection anomalies: {}",
                self.snapshot.discarded_anomalies
            )?;
        }
        writeln!(
            f,
            "lcs (threshold {:.2}): {} member(s), last paint {}",
            self.lcs.threshold,
            self.lcs.elements.len(),
            millis(self.lcs.last_paint_time)
        )?;
        for entry in &self.lcs.elements {
            write!(f, "  {}", entry.element.handle)?;
            if entry.effective.handle != entry.element.handle {
                write!(f, " via {}", entry.effective.handle)?;
            }
            writeln!(
                f,
                " ({:.0}px²) painted {}",
                entry.area,
                millis(Some(entry.paint_time))
            )?;
        }
        writeln!(
            f,
            "fcp {}  lcp {}  cls {}",
            millis(self.vitals.fcp),
            millis(self.vitals.lcp.as_ref().map(|lcp| lcp.start_time)),
            self.vitals
                .cls
                .map_or_else(|| "-".to_string(), |cls| format!("{cls:.3}"))
        )?;
        if let Some(difference) = self.lcs_vs_lcp() {
            writeln!(f, "lcs - lcp = {difference:+.1}ms")?;
        }
        Ok(())
    }
}
