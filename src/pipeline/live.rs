//! Live paint watching for hosts that can be probed for element dimensions.
//!
//! A watch polls one loaded element phase on the configured frame interval and
//! reports the painted frame to the coordinator as a regular frame signal.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    MetricsError, Millis, PaintKey,
    config::DetectionPolicy,
    timing::{
        clock::NavigationClock,
        estimator::{FramePoller, IntervalTicker, PaintProbe, poll_for_paint},
        signal::{ElementSample, HostSignal},
    },
};

use super::SignalSender;

/// Spawns a frame-driven paint watch for an element phase that just loaded.
///
/// Nothing is sent when the polling budget runs out before paint is seen.
pub fn spawn_paint_watch<P>(
    clock: NavigationClock,
    detection: &DetectionPolicy,
    key: PaintKey,
    load_time: Millis,
    probe: Arc<P>,
    output: SignalSender,
) -> JoinHandle<Result<(), MetricsError>>
where
    P: PaintProbe + ?Sized + 'static,
{
    let (index, phase) = key;
    let poller = FramePoller::arm(index, phase, load_time, detection.poll_budget_ms);
    let frame_interval_ms = detection.frame_interval_ms;
    tokio::spawn(async move {
        let mut ticker = IntervalTicker::new(clock, frame_interval_ms);
        let Some(candidate) = poll_for_paint(&mut ticker, probe.as_ref(), poller).await else {
            debug!(index, %phase, "no paint before the polling deadline");
            return Ok(());
        };
        let signal = HostSignal::Frame {
            at: candidate.paint_time,
            samples: vec![ElementSample {
                index,
                phase,
                sample: probe.sample(),
            }],
        };
        output.send(signal).await.map_err(|_| {
            MetricsError::Channel(format!("coordinator dropped before paint of element {index}"))
        })
    })
}
