//! Playback position contract and a simulated clock for headless sessions.

use parking_lot::Mutex;
use std::sync::Arc;
use vodstream_common::TimeRanges;

/// Playback layer as seen by the orchestrator.
pub trait Playback: Send {
    /// Current position in seconds.
    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, secs: f64);
}

/// Outcome of advancing a [`SimulatedPlayback`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// Position moved; fire a time update.
    Advanced(f64),
    /// Nothing buffered at the position; fire a waiting signal.
    Waiting,
}

/// Clock that only advances through buffered data.
#[derive(Debug, Clone)]
pub struct SimulatedPlayback {
    position: f64,
    rate: f64,
}

impl SimulatedPlayback {
    /// `rate` is media seconds per wall-clock second.
    pub fn new(rate: f64) -> Self {
        Self {
            position: 0.0,
            rate,
        }
    }

    /// Move forward by `elapsed_secs * rate`, stopping at the end of the
    /// buffered range that holds the current position.
    pub fn advance(&mut self, elapsed_secs: f64, buffered: &TimeRanges) -> Tick {
        let Some(range) = buffered.range_containing(self.position) else {
            return Tick::Waiting;
        };
        let target = (self.position + elapsed_secs * self.rate).min(range.end);
        if target <= self.position {
            return Tick::Waiting;
        }
        self.position = target;
        Tick::Advanced(target)
    }
}

impl Playback for SimulatedPlayback {
    fn current_time(&self) -> f64 {
        self.position
    }

    fn set_current_time(&mut self, secs: f64) {
        self.position = secs.max(0.0);
    }
}

/// Shared playback, so a driver can keep advancing the clock it handed over.
impl<P: Playback> Playback for Arc<Mutex<P>> {
    fn current_time(&self) -> f64 {
        self.lock().current_time()
    }

    fn set_current_time(&mut self, secs: f64) {
        self.lock().set_current_time(secs);
    }
}
