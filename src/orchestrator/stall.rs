//! Stall recovery and end-of-stream detection.

use super::{secs_to_ms, Orchestrator};
use crate::events::PlayerEvent;

impl Orchestrator {
    /// Jump the playhead over a small gap to the next buffered range.
    ///
    /// Applies only when the position is outside every range (ends
    /// inclusive) and the next range starts within `stall_tolerance_secs`.
    pub(super) fn realign_to_buffer(&mut self) {
        let buffered = self.sink.buffered_ranges();
        let now = self.playback.current_time();
        if buffered.iter().any(|r| r.start <= now && now <= r.end) {
            return;
        }
        if let Some(start) = buffered.next_start_after(now) {
            if start - now < self.config.stall_tolerance_secs {
                tracing::debug!(from = now, to = start, "Skipping buffer gap");
                self.playback.set_current_time(start);
            }
        }
    }

    pub(super) fn check_end_of_stream(&mut self) {
        self.realign_to_buffer();
        if self.playlist.is_empty() || self.ended {
            return;
        }

        let now_ms = secs_to_ms(self.playback.current_time());
        if self.playlist.start_times().any(|start| now_ms < start) {
            return;
        }
        let finished = self
            .playlist
            .lookup(now_ms)
            .map_or(true, |segment| segment.is_downloaded());
        if !finished {
            return;
        }

        tracing::info!(position_ms = now_ms, "End of stream");
        self.ended = true;
        self.sink.end_of_stream();
        self.events.broadcast(PlayerEvent::Ended);
    }
}
