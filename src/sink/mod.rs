//! Playback sink contract.
//!
//! The sink owns per-track buffer endpoints, accepts init and media
//! fragments from the [`PreSource`], and reports what it holds as buffered
//! time ranges.

mod dir;

pub use dir::DirSink;

use parking_lot::Mutex;
use std::sync::Arc;
use vodstream_common::{Result, TimeRanges};

use crate::remux::PreSource;

pub trait MediaSink: Send {
    /// Create endpoints for every initialized track that lacks one.
    fn add_source_endpoints(&mut self, source: &PreSource) -> Result<()>;

    fn has_endpoints(&self) -> bool;

    /// Drain queued fragments into the endpoints. Returns fragments written.
    fn append(&mut self, source: &mut PreSource) -> Result<usize>;

    fn end_of_stream(&mut self);

    /// Buffered ranges in seconds.
    fn buffered_ranges(&self) -> TimeRanges;

    fn seek(&mut self, _time_secs: f64) {}
}

impl<S: MediaSink> MediaSink for Arc<Mutex<S>> {
    fn add_source_endpoints(&mut self, source: &PreSource) -> Result<()> {
        self.lock().add_source_endpoints(source)
    }

    fn has_endpoints(&self) -> bool {
        self.lock().has_endpoints()
    }

    fn append(&mut self, source: &mut PreSource) -> Result<usize> {
        self.lock().append(source)
    }

    fn end_of_stream(&mut self) {
        self.lock().end_of_stream();
    }

    fn buffered_ranges(&self) -> TimeRanges {
        self.lock().buffered_ranges()
    }

    fn seek(&mut self, time_secs: f64) {
        self.lock().seek(time_secs);
    }
}
