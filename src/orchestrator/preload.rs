//! Preload policy: what to fetch next given the playback position and the
//! buffered ranges.

use vodstream_media::Segment;

use super::Orchestrator;

/// Convert a playback position to registry milliseconds.
///
/// Floors, so `secs_to_ms(t) < start_ms` holds exactly when
/// `t * 1000.0 < start_ms as f64` for any whole-millisecond start.
pub(crate) fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).floor() as u64
    } else {
        0
    }
}

impl Orchestrator {
    /// Issue at most one segment fetch so that roughly `preload_time`
    /// seconds are buffered ahead of `time_secs`.
    pub(super) fn preload(&mut self, time_secs: f64) {
        if self.segment.loader.is_loading() {
            return;
        }
        // The segment loader stays idle until the decryptor exists.
        if self.key.is_some() && self.decryptor.is_none() {
            return;
        }
        let Some(preload_time) = self.preload_time else {
            return;
        };

        let buffered = self.sink.buffered_ranges();
        let mut time = time_secs.floor();
        if time == 0.0 {
            if let Some(first) = buffered.first() {
                time = first.end;
            }
        }

        let candidate = match buffered.range_containing(time) {
            None => self
                .playlist
                .lookup(secs_to_ms(time + self.config.lookup_bias_secs))
                .cloned(),
            Some(range) if range.end < time + preload_time => self.next_after_buffer(range.end),
            Some(_) => None,
        };

        if let Some(segment) = candidate {
            if !segment.is_downloading() && !segment.is_downloaded() {
                self.fetch_segment(&segment.url);
            }
        }
    }

    /// The segment following the buffered window ending at `buffered_end`.
    ///
    /// Starts from the last downloaded segment (falling back to whatever
    /// covers `buffered_end`) and steps forward in small increments until a
    /// segment with a later start turns up.
    fn next_after_buffer(&self, buffered_end: f64) -> Option<Segment> {
        let anchor = self
            .playlist
            .last_downloaded()
            .or_else(|| self.playlist.lookup(secs_to_ms(buffered_end)))?;
        if !anchor.is_downloaded() {
            return Some(anchor.clone());
        }

        let mut cursor = anchor.end_ms();
        for _ in 0..self.config.skip_max_iterations {
            cursor += self.config.skip_step_ms;
            match self.playlist.lookup(cursor) {
                None => return None,
                Some(next) if next.start_ms > anchor.start_ms => return Some(next.clone()),
                Some(_) => {}
            }
        }
        None
    }

    fn fetch_segment(&mut self, url: &str) {
        self.playlist.mark_downloading(url);
        tracing::debug!(url, tag = %self.segment.tag, "Fetching segment");
        self.segment.loader.start(url);
    }
}
