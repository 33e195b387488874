use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use paintscope::{
    DetectionMethod, ElementHandle, ElementKind, LoadingMode, Phase, TrackedElement,
    config::{DetectionPolicy, LcsPolicy, RuntimeConfig},
    pipeline::{self, live::spawn_paint_watch},
    timing::{
        clock::NavigationClock,
        coordinator::CycleCoordinator,
        estimator::{FrameSample, PaintProbe},
        signal::HostSignal,
    },
};

/// Reports the element as painted from the `paint_after`-th sample on.
struct CountingProbe {
    samples: AtomicUsize,
    paint_after: usize,
}

impl PaintProbe for CountingProbe {
    fn sample(&self) -> FrameSample {
        if self.samples.fetch_add(1, Ordering::SeqCst) >= self.paint_after {
            FrameSample {
                natural_width: 640.0,
                natural_height: 480.0,
                ..FrameSample::BASELINE
            }
        } else {
            FrameSample::BASELINE
        }
    }
}

fn fast_detection() -> DetectionPolicy {
    DetectionPolicy {
        frame_interval_ms: 2,
        ..DetectionPolicy::default()
    }
}

#[tokio::test]
async fn paint_watch_feeds_painted_frame_to_coordinator() {
    let clock = NavigationClock::system();
    let detection = fast_detection();
    let mut coordinator = CycleCoordinator::new(
        clock.clone(),
        vec![TrackedElement {
            index: 0,
            handle: ElementHandle::new("hero"),
            kind: ElementKind::Image,
            mode: LoadingMode::Standard,
        }],
        LcsPolicy::default(),
        detection,
        RuntimeConfig::default(),
    );
    let load_time = clock.relative_now();
    coordinator.handle(HostSignal::Load {
        index: 0,
        phase: Phase::Standard,
        at: Some(load_time),
    });

    let (tx, mut rx) = pipeline::channel(4);
    let probe = Arc::new(CountingProbe {
        samples: AtomicUsize::new(0),
        paint_after: 2,
    });
    let watch = spawn_paint_watch(
        clock.clone(),
        &detection,
        (0, Phase::Standard),
        load_time,
        probe.clone(),
        tx,
    );
    let signal = rx.recv().await.expect("painted frame");
    watch.await.expect("join").expect("watch");
    assert!(matches!(signal, HostSignal::Frame { .. }));
    coordinator.handle(signal);

    let snapshot = coordinator.snapshot().expect("cycle complete");
    assert_eq!(snapshot.paints.len(), 1);
    let paint = &snapshot.paints[0];
    assert_eq!(paint.method, DetectionMethod::AnimationFrame);
    assert!(paint.paint_time >= load_time);
    assert!(probe.samples.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn paint_watch_sends_nothing_past_its_budget() {
    let clock = NavigationClock::system();
    let detection = DetectionPolicy {
        poll_budget_ms: 5.0,
        ..fast_detection()
    };
    let (tx, mut rx) = pipeline::channel(1);
    let probe = Arc::new(CountingProbe {
        samples: AtomicUsize::new(0),
        paint_after: usize::MAX,
    });
    let watch = spawn_paint_watch(
        clock.clone(),
        &detection,
        (3, Phase::HighRes),
        clock.relative_now(),
        probe,
        tx,
    );
    watch.await.expect("join").expect("watch");
    assert!(rx.recv().await.is_none());
}
