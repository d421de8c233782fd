//! Vodstream - segmented video-on-demand playback core
//!
//! This library crate exposes the orchestrator, its collaborator contracts
//! and the stock implementations used by the `vodstream` binary.

pub mod config;
pub mod decrypt;
pub mod demux;
pub mod events;
pub mod loader;
pub mod manifest;
pub mod orchestrator;
pub mod playback;
pub mod remux;
pub mod session;
pub mod sink;
