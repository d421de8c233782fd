//! Headless session driver.
//!
//! Wires the orchestrator to HTTP loaders and a simulated playback clock,
//! then runs until the stream ends, a fatal error the orchestrator does not
//! retry is reported, or the caller cancels.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use vodstream_common::HlsError;

use crate::config::Config;
use crate::demux::PassthroughDemuxer;
use crate::events::{EventBus, PlayerEvent, Signal};
use crate::loader::HttpLoaderFactory;
use crate::manifest::M3u8Parser;
use crate::orchestrator::{Components, Orchestrator};
use crate::playback::{Playback, SimulatedPlayback, Tick};
use crate::remux::PassthroughRemuxer;
use crate::sink::MediaSink;

/// Default interval between playback clock ticks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// How a session finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ended,
    Failed(HlsError),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: Outcome,
    pub position_secs: f64,
    pub segments: usize,
    pub segments_downloaded: usize,
}

pub struct Session {
    orchestrator: Orchestrator,
    playback: Arc<Mutex<SimulatedPlayback>>,
    signals: mpsc::UnboundedReceiver<Signal>,
    events: broadcast::Receiver<PlayerEvent>,
    tick: Duration,
}

impl Session {
    /// Must be called from within a tokio runtime.
    pub fn new(config: &Config, sink: Box<dyn MediaSink>, bus: Arc<EventBus>) -> anyhow::Result<Self> {
        let (tx, signals) = mpsc::unbounded_channel();
        let loaders = HttpLoaderFactory::new(&config.http, tx)?;
        let playback = Arc::new(Mutex::new(SimulatedPlayback::new(
            config.output.playback_rate,
        )));

        let components = Components {
            loaders: Box::new(loaders),
            parser: Box::new(M3u8Parser),
            demuxer: Box::new(PassthroughDemuxer::new()),
            remuxer: Box::new(PassthroughRemuxer::new()),
            sink,
            playback: Box::new(playback.clone()),
        };
        let events = bus.subscribe();
        let orchestrator = Orchestrator::new(config.player.clone(), components, bus);

        Ok(Self {
            orchestrator,
            playback,
            signals,
            events,
            tick: DEFAULT_TICK,
        })
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Play `url` to completion or until `shutdown` resolves.
    pub async fn run(mut self, url: &str, shutdown: impl Future<Output = ()>) -> SessionReport {
        tracing::info!(session = %self.orchestrator.session(), url, "Session started");
        tokio::pin!(shutdown);

        self.orchestrator.load(url);

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        let outcome = loop {
            if let Some(outcome) = self.poll_events() {
                break outcome;
            }

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!("Session cancelled");
                    break Outcome::Cancelled;
                }
                signal = self.signals.recv() => match signal {
                    Some(signal) => self.orchestrator.handle(signal),
                    None => {
                        tracing::warn!("Loader channel closed");
                        break Outcome::Cancelled;
                    }
                },
                _ = ticker.tick() => {
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    last_tick = Instant::now();
                    self.on_tick(elapsed);
                }
            }
        };

        let report = SessionReport {
            outcome,
            position_secs: self.playback.current_time(),
            segments: self.orchestrator.playlist().len(),
            segments_downloaded: self
                .orchestrator
                .playlist()
                .iter()
                .filter(|s| s.is_downloaded())
                .count(),
        };
        self.orchestrator.destroy();
        tracing::info!(
            outcome = ?report.outcome,
            position_secs = report.position_secs,
            "Session finished"
        );
        report
    }

    fn on_tick(&mut self, elapsed_secs: f64) {
        let buffered = self.orchestrator.sink().buffered_ranges();
        let tick = self.playback.lock().advance(elapsed_secs, &buffered);
        match tick {
            Tick::Advanced(position) => {
                tracing::trace!(position, "Time update");
                self.orchestrator.on_time_update();
            }
            Tick::Waiting => self.orchestrator.on_waiting(),
        }
    }

    /// Check broadcast events for a terminal condition.
    fn poll_events(&mut self) -> Option<Outcome> {
        loop {
            match self.events.try_recv() {
                Ok(PlayerEvent::Ended) => return Some(Outcome::Ended),
                Ok(PlayerEvent::Error(error)) if error.fatal && !error.kind.is_retried() => {
                    return Some(Outcome::Failed(error));
                }
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
