use paintscope::{
    DetectionMethod, Phase,
    config::DetectionPolicy,
    timing::{estimator::PaintCandidate, policy},
};

fn candidate(load_time: f64, paint_time: f64) -> PaintCandidate {
    PaintCandidate {
        element_index: 0,
        phase: Phase::Standard,
        load_time,
        paint_time,
        method: DetectionMethod::AnimationFrame,
    }
}

#[test]
fn policy_allows_plausible_delta() {
    let decision = policy::evaluate(&DetectionPolicy::default(), &candidate(1000.0, 1016.0));
    assert!(decision.allowed);
    assert!(decision.reason.is_none());
}

#[test]
fn policy_blocks_delta_beyond_bound() {
    let decision = policy::evaluate(&DetectionPolicy::default(), &candidate(1000.0, 12_000.0));
    assert!(!decision.allowed);
    assert!(decision.reason.expect("reason").contains("sanity bound"));
}

#[test]
fn policy_bound_is_exclusive() {
    let detection = DetectionPolicy::default();
    assert!(!policy::is_admissible(&detection, &candidate(0.0, 10_000.0)));
    assert!(policy::is_admissible(&detection, &candidate(0.0, 9_999.9)));
}

#[test]
fn policy_rejects_non_finite_delta() {
    let decision = policy::evaluate(&DetectionPolicy::default(), &candidate(0.0, f64::NAN));
    assert!(!decision.allowed);
}
