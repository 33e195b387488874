use criterion::{Criterion, criterion_group, criterion_main};
use paintscope::{
    DetectionMethod, ElementHandle, ElementKind, Phase,
    config::DetectionPolicy,
    timing::{
        aggregator::reconcile,
        estimator::PaintCandidate,
        lcs::{ContentRef, LcsEntry, LcsTracker},
    },
};

fn entries(count: usize) -> Vec<LcsEntry> {
    (0..count)
        .map(|step| {
            // Areas wander upward so membership is recomputed regularly.
            let area = 1_000.0 + ((step * 7919) % 500) as f64 + step as f64 * 3.0;
            LcsEntry::new(
                ContentRef::new(ElementHandle::new(format!("e{step}")), ElementKind::Image),
                area,
                step as f64 * 16.0,
            )
        })
        .collect()
}

fn candidates(count: usize) -> Vec<PaintCandidate> {
    (0..count)
        .map(|step| PaintCandidate {
            element_index: step / 2,
            phase: Phase::Standard,
            load_time: 0.0,
            paint_time: if step % 11 == 0 { 12_000.0 } else { 16.0 },
            method: if step % 2 == 0 {
                DetectionMethod::AnimationFrame
            } else {
                DetectionMethod::ElementTiming
            },
        })
        .collect()
}

fn bench_lcs_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("lcs_update");
    for &count in &[16usize, 64, 256] {
        let input = entries(count);
        group.bench_function(format!("elements_{count}"), |b| {
            b.iter(|| {
                let mut tracker = LcsTracker::default();
                for entry in &input {
                    tracker.update(entry.clone());
                }
                tracker.len()
            })
        });
    }
    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let detection = DetectionPolicy::default();
    let input = candidates(512);
    c.bench_function("reconcile_512", |b| b.iter(|| reconcile(&detection, &input)));
}

criterion_group!(benches, bench_lcs_updates, bench_reconcile);
criterion_main!(benches);
