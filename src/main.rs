mod cli;

use vodstream::config;
use vodstream::events::EventBus;
use vodstream::session::{Outcome, Session};
use vodstream::sink::DirSink;
use vodstream_media::hls::parse_media_playlist;
use vodstream_media::SegmentDescriptor;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vodstream=trace,vodstream_media=trace,vodstream_common=debug,reqwest=debug".to_string()
        } else {
            "vodstream=info,vodstream_media=info,reqwest=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch { url, out, rate } => fetch(&url, out, rate, cli.config.as_deref()),
        Commands::Inspect { source, json } => inspect(&source, json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vodstream {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn fetch(
    url: &str,
    out: Option<PathBuf>,
    rate: Option<f64>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(out) = out {
        config.output.dir = out;
    }
    if let Some(rate) = rate {
        config.output.playback_rate = rate;
    }
    for warning in config.validate() {
        tracing::warn!("Config: {}", warning);
    }

    std::fs::create_dir_all(&config.output.dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output.dir.display()
        )
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    let (report, bytes_written) = rt.block_on(async {
        let sink = Arc::new(Mutex::new(DirSink::new(&config.output.dir)));
        let bus = Arc::new(EventBus::default());
        let session = Session::new(&config, Box::new(sink.clone()), bus)?;

        let shutdown = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let report = session.run(url, shutdown).await;
        let bytes_written = sink.lock().bytes_written();
        anyhow::Ok((report, bytes_written))
    })?;

    println!("Output: {}", config.output.dir.display());
    println!(
        "Segments: {}/{} downloaded",
        report.segments_downloaded, report.segments
    );
    println!("Position: {:.3}s", report.position_secs);
    println!("Written: {} bytes", bytes_written);

    match report.outcome {
        Outcome::Ended => {
            println!("✓ Stream ended");
            Ok(())
        }
        Outcome::Cancelled => {
            println!("Cancelled");
            Ok(())
        }
        Outcome::Failed(error) => anyhow::bail!("Playback failed: {}", error),
    }
}

#[derive(Serialize)]
struct InspectOutput {
    target_duration_ms: u64,
    duration_ms: u64,
    media_sequence: u64,
    ended: bool,
    encryption: Option<String>,
    segments: Vec<SegmentDescriptor>,
}

fn inspect(source: &str, json: bool) -> Result<()> {
    let (text, base) = if source.starts_with("http://") || source.starts_with("https://") {
        let base = Url::parse(source).with_context(|| format!("Invalid URL: {}", source))?;
        let rt = tokio::runtime::Runtime::new()?;
        let text = rt
            .block_on(async { reqwest::get(source).await?.error_for_status()?.text().await })
            .with_context(|| format!("Failed to fetch {}", source))?;
        (text, Some(base))
    } else {
        let path = Path::new(source);
        if !path.exists() {
            anyhow::bail!("File does not exist: {:?}", path);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        (text, None)
    };

    let playlist = parse_media_playlist(&text, base.as_ref())?;
    let manifest = playlist.to_manifest();
    let encryption = manifest.encrypt.as_ref().map(|e| match &e.uri {
        Some(uri) => format!("{} ({})", e.method, uri),
        None => e.method.to_string(),
    });

    if json {
        let output = InspectOutput {
            target_duration_ms: manifest.target_duration_ms,
            duration_ms: manifest.duration_ms,
            media_sequence: playlist.media_sequence,
            ended: manifest.ended,
            encryption,
            segments: manifest.segments,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let secs = manifest.duration_ms / 1000;
    println!("Target duration: {}s", playlist.target_duration);
    println!(
        "Duration: {:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    );
    println!("Media sequence: {}", playlist.media_sequence);
    println!("Ended: {}", manifest.ended);
    if let Some(encryption) = encryption {
        println!("Encryption: {}", encryption);
    }

    println!("\nSegments: {}", manifest.segments.len());
    for (i, segment) in manifest.segments.iter().enumerate() {
        println!(
            "  [{}] {:>8}ms +{:>6}ms  {}",
            i, segment.start_ms, segment.duration_ms, segment.url
        );
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Retry times: {}", config.player.retry_times);
    match config.player.preload_time_secs {
        Some(secs) => println!("  Preload: {}s", secs),
        None => println!(
            "  Preload: target duration (fallback {}s)",
            config.player.fallback_preload_secs
        ),
    }
    println!("  Stall tolerance: {}s", config.player.stall_tolerance_secs);
    println!("  HTTP timeout: {}s", config.http.timeout_secs);
    println!("  Output dir: {}", config.output.dir.display());

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    Ok(())
}
