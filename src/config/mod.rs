//! TOML configuration.

mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    let expanded = shellexpand::tilde(&config.output.dir.to_string_lossy()).into_owned();
    config.output.dir = expanded.into();

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./vodstream.toml",
        "~/.config/vodstream/config.toml",
        "/etc/vodstream/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Hard errors only; questionable values are reported by [`Config::validate`].
fn validate_config(config: &Config) -> Result<()> {
    let player = &config.player;

    if player.skip_step_ms == 0 {
        anyhow::bail!("player.skip_step_ms cannot be 0");
    }
    if player.fallback_preload_secs <= 0.0 {
        anyhow::bail!("player.fallback_preload_secs must be positive");
    }
    if let Some(preload) = player.preload_time_secs {
        if preload <= 0.0 {
            anyhow::bail!("player.preload_time_secs must be positive");
        }
    }
    if config.output.playback_rate <= 0.0 {
        anyhow::bail!("output.playback_rate must be positive");
    }

    Ok(())
}

impl Config {
    /// Non-fatal findings worth showing to the user.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let player = &self.player;

        if player.retry_times == 0 {
            warnings.push("player.retry_times is 0: failed manifest loads are never retried".into());
        }
        if player.stall_tolerance_secs > 10.0 {
            warnings.push(format!(
                "player.stall_tolerance_secs = {} may skip over real gaps",
                player.stall_tolerance_secs
            ));
        }
        if !(0.0..1.0).contains(&player.lookup_bias_secs) {
            warnings.push(format!(
                "player.lookup_bias_secs = {} is outside [0, 1)",
                player.lookup_bias_secs
            ));
        }
        if player.skip_max_iterations == 0 {
            warnings.push("player.skip_max_iterations is 0: downloaded segments are never skipped".into());
        }
        if self.http.timeout_secs == 0 {
            warnings.push("http.timeout_secs is 0: every request will time out".into());
        }

        warnings
    }
}
