//! Navigation-start reference clock.
//!
//! Every timestamp stored in a record is relative to navigation start so it
//! can be compared directly with natively reported paint entries.

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use tracing::debug;

use crate::Millis;

/// Offset subtracted from the wall clock when no navigation timing exists.
pub const NAVIGATION_FALLBACK_OFFSET_MS: f64 = 50.0;

/// Host clock readings.
pub trait ClockSource: Send + Sync {
    /// Monotonic milliseconds since the source started.
    fn now_ms(&self) -> Millis;

    /// High-resolution epoch time of the source's zero point.
    fn time_origin(&self) -> Option<f64>;

    /// Epoch navigation start from the legacy navigation timing field.
    fn legacy_navigation_start(&self) -> Option<f64> {
        None
    }

    /// Current wall-clock epoch milliseconds.
    fn epoch_now_ms(&self) -> f64;
}

/// Process clock backed by [`Instant`] and [`SystemTime`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
    origin_epoch_ms: f64,
}

impl SystemClock {
    pub fn new() -> Self {
        let origin_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or_default();
        Self {
            started: Instant::now(),
            origin_epoch_ms,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now_ms(&self) -> Millis {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn time_origin(&self) -> Option<f64> {
        Some(self.origin_epoch_ms)
    }

    fn epoch_now_ms(&self) -> f64 {
        self.origin_epoch_ms + self.now_ms()
    }
}

/// Manually advanced clock used for replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Millis>,
    epoch_base_ms: f64,
    time_origin: Option<f64>,
    legacy_navigation_start: Option<f64>,
}

impl ManualClock {
    /// Clock whose zero point is a known time origin.
    pub fn with_time_origin(epoch_ms: f64) -> Self {
        Self {
            now: Mutex::new(0.0),
            epoch_base_ms: epoch_ms,
            time_origin: Some(epoch_ms),
            legacy_navigation_start: None,
        }
    }

    /// Clock that only exposes legacy navigation timing.
    pub fn with_legacy_navigation_start(epoch_base_ms: f64, navigation_start: f64) -> Self {
        Self {
            now: Mutex::new(0.0),
            epoch_base_ms,
            time_origin: None,
            legacy_navigation_start: Some(navigation_start),
        }
    }

    /// Clock exposing neither navigation reference.
    pub fn without_navigation_timing(epoch_base_ms: f64) -> Self {
        Self {
            now: Mutex::new(0.0),
            epoch_base_ms,
            time_origin: None,
            legacy_navigation_start: None,
        }
    }

    /// Moves the clock forward; earlier readings are ignored.
    pub fn advance_to(&self, now: Millis) {
        let mut guard = self.now.lock().expect("manual clock mutex poisoned");
        if now > *guard {
            *guard = now;
        }
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> Millis {
        *self.now.lock().expect("manual clock mutex poisoned")
    }

    fn time_origin(&self) -> Option<f64> {
        self.time_origin
    }

    fn legacy_navigation_start(&self) -> Option<f64> {
        self.legacy_navigation_start
    }

    fn epoch_now_ms(&self) -> f64 {
        self.epoch_base_ms + self.now_ms()
    }
}

/// Source that supplied the navigation start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOrigin {
    TimeOrigin,
    LegacyTiming,
    Fallback,
}

/// Clock translating monotonic readings into navigation-relative times.
#[derive(Clone)]
pub struct NavigationClock {
    source: Arc<dyn ClockSource>,
    navigation_start: f64,
    origin: NavigationOrigin,
    skew: f64,
}

impl NavigationClock {
    /// Captures navigation start once from the best available reference.
    pub fn new(source: Arc<dyn ClockSource>) -> Self {
        let now = source.now_ms();
        let epoch_now = source.epoch_now_ms();
        let (navigation_start, origin) = if let Some(origin) = source.time_origin() {
            (origin, NavigationOrigin::TimeOrigin)
        } else if let Some(start) = source.legacy_navigation_start() {
            (start, NavigationOrigin::LegacyTiming)
        } else {
            (
                epoch_now - NAVIGATION_FALLBACK_OFFSET_MS,
                NavigationOrigin::Fallback,
            )
        };
        // Monotonic zero coincides with the time origin; other references need
        // the distance between the source's zero point and navigation start.
        let skew = match origin {
            NavigationOrigin::TimeOrigin => 0.0,
            _ => (epoch_now - now) - navigation_start,
        };
        debug!(?origin, navigation_start, "navigation start captured");
        Self {
            source,
            navigation_start,
            origin,
            skew,
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }

    /// Epoch milliseconds of navigation start.
    pub fn navigation_start(&self) -> f64 {
        self.navigation_start
    }

    pub fn origin(&self) -> NavigationOrigin {
        self.origin
    }

    /// Monotonic milliseconds since the source started.
    pub fn now(&self) -> Millis {
        self.source.now_ms()
    }

    /// Milliseconds elapsed since navigation start.
    pub fn relative_now(&self) -> Millis {
        self.to_relative(self.now())
    }

    /// Converts a monotonic reading from the same source.
    pub fn to_relative(&self, monotonic: Millis) -> Millis {
        monotonic + self.skew
    }
}

impl fmt::Debug for NavigationClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationClock")
            .field("navigation_start", &self.navigation_start)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
