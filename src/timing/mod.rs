//! Timing reconciliation components for one load cycle.

pub mod aggregator;
pub mod clock;
pub mod coordinator;
pub mod estimator;
pub mod event_log;
pub mod events;
pub mod lcs;
pub mod policy;
pub mod report;
pub mod signal;
pub mod vitals;
