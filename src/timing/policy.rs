//! Sanity checks applied to paint candidates before they count.

use tracing::warn;

use crate::config::DetectionPolicy;

use super::estimator::PaintCandidate;

/// Result of a policy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Evaluates a candidate's paint delta against the detection bounds.
pub fn evaluate(detection: &DetectionPolicy, candidate: &PaintCandidate) -> PolicyDecision {
    let delta = candidate.delta();
    if !delta.is_finite() {
        return PolicyDecision::deny("paint delta is not finite");
    }
    if delta >= detection.max_paint_delta_ms {
        return PolicyDecision::deny(format!(
            "paint delta {delta:.1}ms reaches the {:.0}ms sanity bound",
            detection.max_paint_delta_ms
        ));
    }
    PolicyDecision::allow()
}

/// Logs a denied decision as a detection anomaly and reports whether it passed.
pub fn admit(decision: &PolicyDecision, candidate: &PaintCandidate) -> bool {
    if decision.allowed {
        return true;
    }
    warn!(
        index = candidate.element_index,
        phase = %candidate.phase,
        method = %candidate.method,
        reason = decision.reason.as_deref().unwrap_or("policy violation"),
        "discarding paint detection anomaly"
    );
    false
}

/// Pure admissibility check without logging.
pub fn is_admissible(detection: &DetectionPolicy, candidate: &PaintCandidate) -> bool {
    evaluate(detection, candidate).allowed
}
