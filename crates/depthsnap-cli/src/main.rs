use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use depthsnap_core::{CaptureConfig, CaptureError, CaptureSession, ImageFileSink};
use depthsnap_hw::sim::{SimConfig, SimulatedDevice};
use depthsnap_hw::ChannelKind;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "depthsnap", about = "Capture synchronized stills from a depth-camera rig")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture color, infrared and depth stills
    Capture {
        #[command(flatten)]
        session: SessionArgs,
        /// Number of captures to attempt
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
        /// Print a JSON report per capture
        #[arg(long)]
        json: bool,
        /// Milliseconds between availability checks
        #[arg(long, default_value_t = 100)]
        poll_interval_ms: u64,
        /// Give up if the sensor is not available after this many seconds
        #[arg(long)]
        wait_timeout_secs: Option<u64>,
        /// Create missing output directories
        #[arg(long)]
        create_dirs: bool,
    },
    /// Initialize the sensor and report availability
    Status {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    no_color: bool,
    #[arg(long)]
    no_infrared: bool,
    #[arg(long)]
    no_depth: bool,
    #[arg(long)]
    color_output: Option<PathBuf>,
    #[arg(long)]
    infrared_output: Option<PathBuf>,
    #[arg(long)]
    depth_output: Option<PathBuf>,
    /// Stop polling for a bundle after this many attempts (0 = never)
    #[arg(long)]
    max_polls: Option<u64>,
    /// Simulated sensor: bundle becomes ready on this poll
    #[arg(long, default_value_t = 1)]
    ready_after: u32,
}

impl SessionArgs {
    /// File, then `DEPTHSNAP_*` environment, then command-line flags.
    fn capture_config(&self) -> Result<CaptureConfig> {
        let mut config = match &self.config {
            Some(path) => CaptureConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => CaptureConfig::default(),
        };
        config.apply_env();

        if self.no_color {
            config.channels.color = false;
        }
        if self.no_infrared {
            config.channels.infrared = false;
        }
        if self.no_depth {
            config.channels.depth = false;
        }
        for (kind, path) in [
            (ChannelKind::Color, &self.color_output),
            (ChannelKind::Infrared, &self.infrared_output),
            (ChannelKind::Depth, &self.depth_output),
        ] {
            if let Some(path) = path {
                config.set_output(kind, path.clone());
            }
        }
        if let Some(max) = self.max_polls {
            config.acquire.max_polls = (max > 0).then_some(max);
        }
        Ok(config)
    }

    fn device(&self) -> SimulatedDevice {
        SimulatedDevice::new(SimConfig {
            ready_after_polls: self.ready_after,
            ..SimConfig::default()
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Capture {
            session,
            count,
            json,
            poll_interval_ms,
            wait_timeout_secs,
            create_dirs,
        } => {
            let config = session.capture_config()?;
            let sink = ImageFileSink::new().create_dirs(create_dirs);
            let mut capture = CaptureSession::new(session.device(), sink, config);
            capture.initialize().context("sensor initialization")?;

            let checks = capture.wait_until_available(
                Duration::from_millis(poll_interval_ms),
                wait_timeout_secs.map(Duration::from_secs),
            )?;
            tracing::info!(checks, "sensor available");

            let mut succeeded = 0u32;
            for attempt in 1..=count {
                match capture.capture() {
                    Ok(report) => {
                        if report.succeeded() {
                            succeeded += 1;
                        }
                        if json {
                            println!("{}", serde_json::to_string(&report.summary())?);
                        }
                    }
                    Err(err @ CaptureError::Acquire(_)) => {
                        tracing::warn!(attempt, error = %err, "capture skipped");
                    }
                    Err(err) => return Err(err).context("capture"),
                }
            }

            println!("{succeeded} of {count} captures succeeded");
            if succeeded < count {
                bail!("{} captures failed", count - succeeded);
            }
        }
        Commands::Status { session } => {
            let config = session.capture_config()?;
            let mut capture = CaptureSession::new(session.device(), ImageFileSink::new(), config);
            match capture.initialize() {
                Ok(()) => {
                    println!("sensor: initialized");
                    println!("channels: {}", capture.selection());
                    for kind in capture.selection().iter() {
                        println!("  {kind}: {}", capture.config().output_for(kind).display());
                    }
                    let available = if capture.check_available() { "yes" } else { "no" };
                    println!("available: {available}");
                }
                Err(err) => println!("sensor: {err}"),
            }
        }
    }

    Ok(())
}
