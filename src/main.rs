//! visionary - command-line client for Visionary time-of-flight cameras
//!
//! Reads device identification and variables over CoLa and grabs frames from
//! the blob stream.

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use visionary_client::{
    Camera, CameraConfig, ClientError, Control, Frame, Framing, ProtocolHandler, TcpTransport,
};

#[derive(Parser)]
#[command(name = "visionary")]
#[command(about = "Command-line client for Visionary time-of-flight cameras")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "VISIONARY_CONFIG")]
    config: Option<PathBuf>,

    /// Device address (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Control port (overrides config)
    #[arg(long)]
    control_port: Option<u16>,

    /// Stream port (overrides config)
    #[arg(long)]
    stream_port: Option<u16>,

    /// Control framing: cola2 or colab (overrides config)
    #[arg(long)]
    protocol: Option<Framing>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print device name and firmware version
    Ident,

    /// Read a variable and print its raw value as hex
    ReadVariable {
        /// Variable name
        name: String,
    },

    /// Grab frames and print a summary per frame
    Grab {
        /// Number of frames
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Print summaries as JSON lines
        #[arg(long)]
        json: bool,

        /// Free-running acquisition instead of single-step triggering
        #[arg(long)]
        continuous: bool,

        /// Skip CRC verification of binary segments
        #[arg(long)]
        no_crc: bool,
    },

    /// Print the effective configuration as JSON
    ShowConfig,
}

/// Per-frame statistics printed by `grab`.
#[derive(Debug, Serialize)]
struct FrameSummary {
    frame_number: u32,
    blob_id: u16,
    width: u32,
    height: u32,
    timestamp_ms: u64,
    quality: u8,
    status: u8,
    valid_pixels: usize,
    min_distance_mm: Option<f32>,
    max_distance_mm: Option<f32>,
    mean_distance_mm: Option<f32>,
    mean_intensity: Option<f32>,
}

impl FrameSummary {
    fn new(frame: &Frame) -> Self {
        let distances: Vec<f32> = frame
            .distance_mm()
            .into_iter()
            .filter(|d| *d > 0.0)
            .collect();
        let mean = |values: &[f32]| {
            (!values.is_empty()).then(|| values.iter().sum::<f32>() / values.len() as f32)
        };
        let intensity: Vec<f32> = frame.intensity().iter().map(|&v| f32::from(v)).collect();

        Self {
            frame_number: frame.frame_number(),
            blob_id: frame.blob_id(),
            width: frame.width(),
            height: frame.height(),
            timestamp_ms: frame.timestamp_ms(),
            quality: frame.quality(),
            status: frame.status(),
            valid_pixels: distances.len(),
            min_distance_mm: distances.iter().copied().reduce(f32::min),
            max_distance_mm: distances.iter().copied().reduce(f32::max),
            mean_distance_mm: mean(&distances),
            mean_intensity: mean(&intensity),
        }
    }
}

/// Consecutive rejected frames before `grab` gives up.
const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Connection attempts while the device is still coming up.
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

fn load_config(cli: &Cli) -> Result<CameraConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = CameraConfig::from_file(path)?;
            config.apply_env_overrides();
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => CameraConfig::load()?,
    };

    if let Some(host) = &cli.host {
        config.network.host = host.clone();
    }
    if let Some(port) = cli.control_port {
        config.network.control_port = port;
    }
    if let Some(port) = cli.stream_port {
        config.network.stream_port = port;
    }
    if let Some(framing) = cli.protocol {
        config.protocol.framing = framing;
    }
    if let Commands::Grab {
        continuous, no_crc, ..
    } = &cli.command
    {
        if *continuous {
            config.acquisition.single_step = false;
        }
        if *no_crc {
            config.protocol.verify_crc = false;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Opens the control channel only, with a session when CoLa-2 is used.
fn open_control(config: &CameraConfig) -> Result<Control<TcpTransport>, ClientError> {
    let net = &config.network;
    let transport = TcpTransport::connect(
        &net.host,
        net.control_port,
        net.connect_timeout(),
        net.io_timeout(),
    )?;
    let handler = ProtocolHandler::new(transport, config.protocol.framing)
        .with_client_id(config.protocol.client_id.clone());
    let mut control = Control::new(handler);
    if config.protocol.framing == Framing::Cola2
        && !control.open_session(config.protocol.session_timeout_ms)
    {
        return Err(ClientError::SessionFailed);
    }
    Ok(control)
}

/// Connects, retrying transport-level failures a few times.
fn connect_camera(config: CameraConfig) -> Result<Camera, ClientError> {
    let mut attempt = 1;
    loop {
        match Camera::connect(config.clone()) {
            Ok(camera) => return Ok(camera),
            Err(e) if e.is_retryable() && attempt < CONNECT_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "connect failed, retrying");
                attempt += 1;
                std::thread::sleep(CONNECT_BACKOFF);
            }
            Err(e) => return Err(e),
        }
    }
}

fn print_summary(summary: &FrameSummary, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
        return Ok(());
    }

    let fmt_mm = |v: Option<f32>| v.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v));
    println!(
        "{} #{} {}x{} t={}ms q={} valid={} dist[min={} max={} mean={}] mm",
        "frame".green(),
        summary.frame_number.to_string().cyan(),
        summary.width,
        summary.height,
        summary.timestamp_ms,
        summary.quality,
        summary.valid_pixels,
        fmt_mm(summary.min_distance_mm),
        fmt_mm(summary.max_distance_mm),
        fmt_mm(summary.mean_distance_mm),
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli).map_err(|e| {
        eprintln!("{}: {}", "Configuration error".red(), e);
        e
    })?;

    match cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Ident => {
            let mut control = open_control(&config)?;
            let ident = control.device_ident()?;
            println!("{} {}", ident.name.cyan(), ident.version);
            control.close_session();
        }
        Commands::ReadVariable { name } => {
            let mut control = open_control(&config)?;
            let value = control.read_variable(&name).map_err(|e| {
                eprintln!("{}: {}", "Error".red(), e);
                e
            })?;
            println!("{}", hex::encode(&value));
            control.close_session();
        }
        Commands::Grab { count, json, .. } => {
            let mut camera = connect_camera(config).map_err(|e| {
                eprintln!("{}: {}", "Connection failed".red(), e);
                e
            })?;

            let mut failures = 0u32;
            let mut consecutive = 0u32;
            let mut grabbed = 0u32;
            while grabbed < count {
                match camera.get_frame() {
                    Ok(frame) => {
                        print_summary(&FrameSummary::new(&frame), json)?;
                        grabbed += 1;
                        consecutive = 0;
                    }
                    Err(e) if !camera.healthy() => {
                        eprintln!("{}: {}", "Stream lost".red(), e);
                        break;
                    }
                    Err(e) => {
                        failures += 1;
                        consecutive += 1;
                        eprintln!("{}: {}", "Frame rejected".yellow(), e);
                        if consecutive >= MAX_CONSECUTIVE_FAILURES {
                            eprintln!("{}", "Too many consecutive failures".red());
                            break;
                        }
                    }
                }
            }

            let stats = camera.stream_stats();
            tracing::info!(
                frames = stats.frames,
                rejected = stats.rejected,
                skipped_bytes = stats.skipped_bytes,
                failures,
                "grab finished"
            );
            camera.disconnect();
        }
    }

    Ok(())
}
