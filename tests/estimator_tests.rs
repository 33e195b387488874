use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use paintscope::{
    DetectionMethod, Millis, Phase,
    timing::{
        clock::NavigationClock,
        estimator::{
            ElementTimingEntry, ElementTimingId, FramePoller, FrameSample, FrameTicker,
            IntervalTicker, PaintProbe, PollOutcome, poll_for_paint, translate_element_timing,
        },
    },
};

struct SteppingTicker {
    now: Millis,
    step: Millis,
}

#[async_trait]
impl FrameTicker for SteppingTicker {
    async fn next_frame(&mut self) -> Millis {
        self.now += self.step;
        self.now
    }
}

/// Reports baseline dimensions until `paint_after` samples were taken.
struct DelayedProbe {
    samples: AtomicUsize,
    paint_after: usize,
}

impl PaintProbe for DelayedProbe {
    fn sample(&self) -> FrameSample {
        let taken = self.samples.fetch_add(1, Ordering::SeqCst);
        if taken >= self.paint_after {
            FrameSample {
                rendered_width: 320.0,
                rendered_height: 240.0,
                ..FrameSample::BASELINE
            }
        } else {
            FrameSample::BASELINE
        }
    }
}

#[test]
fn baseline_sample_is_not_paint() {
    assert!(!FrameSample::BASELINE.indicates_paint());
    let natural_only = FrameSample {
        natural_width: 800.0,
        natural_height: 600.0,
        ..FrameSample::BASELINE
    };
    assert!(natural_only.indicates_paint());
    let half_known = FrameSample {
        natural_width: 800.0,
        ..FrameSample::BASELINE
    };
    assert!(!half_known.indicates_paint());
}

#[test]
fn poller_reports_first_painted_frame() {
    let mut poller = FramePoller::arm(4, Phase::HighRes, 1000.0, 10_000.0);
    assert_eq!(poller.poll(&FrameSample::BASELINE, 1016.0), PollOutcome::Pending);
    let painted = FrameSample {
        rendered_width: 1.0,
        ..FrameSample::BASELINE
    };
    match poller.poll(&painted, 1033.0) {
        PollOutcome::Painted(candidate) => {
            assert_eq!(candidate.key(), (4, Phase::HighRes));
            assert_eq!(candidate.delta(), 33.0);
            assert_eq!(candidate.method, DetectionMethod::AnimationFrame);
        }
        other => panic!("expected paint, got {other:?}"),
    }
    assert_eq!(poller.frames_polled(), 2);
}

#[test]
fn poller_expires_after_budget() {
    let mut poller = FramePoller::arm(0, Phase::Standard, 0.0, 10_000.0);
    let painted = FrameSample {
        rendered_width: 10.0,
        rendered_height: 10.0,
        ..FrameSample::BASELINE
    };
    assert_eq!(poller.poll(&painted, 10_016.0), PollOutcome::Expired);
    assert!(poller.is_expired(10_000.1));
    assert!(!poller.is_expired(10_000.0));
}

#[tokio::test]
async fn polling_loop_detects_paint() {
    let mut ticker = SteppingTicker {
        now: 100.0,
        step: 16.0,
    };
    let probe = DelayedProbe {
        samples: AtomicUsize::new(0),
        paint_after: 3,
    };
    let poller = FramePoller::arm(1, Phase::Standard, 100.0, 10_000.0);
    let candidate = poll_for_paint(&mut ticker, &probe, poller)
        .await
        .expect("paint detected");
    assert_eq!(candidate.paint_time, 164.0);
    assert_eq!(candidate.delta(), 64.0);
}

#[tokio::test]
async fn polling_loop_stops_silently_at_deadline() {
    let mut ticker = SteppingTicker {
        now: 0.0,
        step: 1_000.0,
    };
    let probe = DelayedProbe {
        samples: AtomicUsize::new(0),
        paint_after: usize::MAX,
    };
    let poller = FramePoller::arm(1, Phase::Standard, 0.0, 10_000.0);
    assert!(poll_for_paint(&mut ticker, &probe, poller).await.is_none());
    assert_eq!(probe.samples.load(Ordering::SeqCst), 11);
}

#[tokio::test]
async fn interval_ticker_drives_live_polling() {
    let clock = NavigationClock::system();
    let start = clock.relative_now();
    let mut ticker = IntervalTicker::new(clock, 2);
    let probe = DelayedProbe {
        samples: AtomicUsize::new(0),
        paint_after: 2,
    };
    let poller = FramePoller::arm(0, Phase::Standard, start, 10_000.0);
    let candidate = poll_for_paint(&mut ticker, &probe, poller)
        .await
        .expect("paint detected");
    assert!(candidate.paint_time >= start);
    assert_eq!(probe.samples.load(Ordering::SeqCst), 3);
}

#[test]
fn element_timing_ids_round_trip_through_text() {
    let id = ElementTimingId {
        index: 12,
        phase: Phase::LowRes,
    };
    assert_eq!(id.to_string(), "item-12-low-res");
    assert_eq!("item-12-low-res".parse::<ElementTimingId>().expect("parse"), id);
    assert!("hero-banner".parse::<ElementTimingId>().is_err());
    assert!("item-x-standard".parse::<ElementTimingId>().is_err());
    assert!("item-3-medium".parse::<ElementTimingId>().is_err());
}

#[test]
fn element_timing_prefers_recorded_load_time() {
    let entry = ElementTimingEntry {
        identifier: "item-2-standard".into(),
        render_time: 540.0,
        load_time: 480.0,
    };
    let candidate = translate_element_timing(&entry, |key| {
        assert_eq!(key, (2, Phase::Standard));
        Some(500.0)
    })
    .expect("candidate");
    assert_eq!(candidate.load_time, 500.0);
    assert_eq!(candidate.paint_time, 540.0);
    assert_eq!(candidate.method, DetectionMethod::ElementTiming);

    let unrecorded = translate_element_timing(&entry, |_| None).expect("candidate");
    assert_eq!(unrecorded.load_time, 480.0);
}

#[test]
fn element_timing_without_render_time_uses_load_time() {
    let entry = ElementTimingEntry {
        identifier: "item-0-standard".into(),
        render_time: 0.0,
        load_time: 300.0,
    };
    assert_eq!(entry.paint_time(), 300.0);
    assert!(
        translate_element_timing(
            &ElementTimingEntry {
                identifier: "logo".into(),
                ..entry
            },
            |_| None
        )
        .is_none()
    );
}
