use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Retry budget, restored after every successful load.
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    /// Prefetch lookahead. Unset means the manifest target duration.
    #[serde(default)]
    pub preload_time_secs: Option<f64>,

    /// Lookahead when neither the config nor the manifest provides one.
    #[serde(default = "default_fallback_preload")]
    pub fallback_preload_secs: f64,

    /// Maximum gap before a buffered range that a stall snaps across.
    #[serde(default = "default_stall_tolerance")]
    pub stall_tolerance_secs: f64,

    /// Forward bias applied to segment lookup when nothing is buffered.
    #[serde(default = "default_lookup_bias")]
    pub lookup_bias_secs: f64,

    /// Step used when walking past already-downloaded segments.
    #[serde(default = "default_skip_step")]
    pub skip_step_ms: u64,

    #[serde(default = "default_skip_max_iterations")]
    pub skip_max_iterations: u32,
}

fn default_retry_times() -> u32 {
    3
}
fn default_fallback_preload() -> f64 {
    5.0
}
fn default_stall_tolerance() -> f64 {
    3.0
}
fn default_lookup_bias() -> f64 {
    0.5
}
fn default_skip_step() -> u64 {
    10
}
fn default_skip_max_iterations() -> u32 {
    1000
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            retry_times: default_retry_times(),
            preload_time_secs: None,
            fallback_preload_secs: default_fallback_preload(),
            stall_tolerance_secs: default_stall_tolerance(),
            lookup_bias_secs: default_lookup_bias(),
            skip_step_ms: default_skip_step(),
            skip_max_iterations: default_skip_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("vodstream/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory the `fetch` command writes segments into.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Simulated playback speed for `fetch` (media seconds per second).
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./vodstream-out")
}
fn default_playback_rate() -> f64 {
    8.0
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            playback_rate: default_playback_rate(),
        }
    }
}
