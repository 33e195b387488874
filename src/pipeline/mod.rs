//! Signal pipeline feeding host signals into the coordinator.
//!
//! Signals travel over a bounded channel to a single consumer that owns the
//! coordinator, so every signal is applied to completion before the next one
//! is read.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, instrument};

use crate::{
    MetricsError,
    config::AppConfig,
    timing::{
        clock::{ManualClock, NavigationClock},
        coordinator::CycleCoordinator,
        report::CycleReport,
        signal::HostSignal,
    },
};

pub mod live;
pub mod replay;

use replay::ScenarioDocument;

/// Sender type alias for the signal channel.
pub type SignalSender = mpsc::Sender<HostSignal>;
/// Receiver type alias for the signal channel.
pub type SignalReceiver = mpsc::Receiver<HostSignal>;

/// Creates a bounded channel between a signal source and the coordinator.
pub fn channel(capacity: usize) -> (SignalSender, SignalReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Spawns a task that emits recorded signals in order.
pub fn spawn_source(
    signals: Vec<HostSignal>,
    output: SignalSender,
) -> JoinHandle<Result<(), MetricsError>> {
    tokio::spawn(async move {
        for signal in signals {
            let name = signal.name();
            output.send(signal).await.map_err(|_| {
                MetricsError::Channel(format!("coordinator dropped before '{name}' signal"))
            })?;
        }
        Ok(())
    })
}

/// Applies every received signal to the coordinator, advancing the replay clock first.
#[instrument(skip_all, fields(cycle = coordinator.cycle()))]
pub async fn run_cycle(
    mut coordinator: CycleCoordinator,
    clock: Arc<ManualClock>,
    signals: Vec<HostSignal>,
    capacity: usize,
) -> Result<CycleReport, MetricsError> {
    let (tx, mut rx) = channel(capacity);
    let source = spawn_source(signals, tx);

    while let Some(signal) = rx.recv().await {
        if let Some(at) = signal.timestamp() {
            clock.advance_to(at);
        }
        debug!(signal = signal.name(), "applying host signal");
        coordinator.handle(signal);
    }

    source.await.map_err(MetricsError::from)??;

    if !coordinator.is_finalized() {
        info!(
            pending_pollers = coordinator.pending_pollers(),
            "signal stream ended before the cycle settled"
        );
    }
    Ok(coordinator.finish())
}

/// Replays a scenario through a fresh coordinator built from the configuration.
#[instrument(skip_all)]
pub async fn execute_cycle(
    config: &AppConfig,
    scenario: ScenarioDocument,
) -> Result<CycleReport, MetricsError> {
    let clock = Arc::new(ManualClock::with_time_origin(scenario.time_origin));
    let coordinator = CycleCoordinator::from_config(config, NavigationClock::new(clock.clone()))
        .with_capabilities(scenario.capabilities);
    run_cycle(
        coordinator,
        clock,
        scenario.signals,
        config.runtime.channel_capacity as usize,
    )
    .await
}
