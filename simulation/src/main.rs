//! Weft mesh simulation CLI
//!
//! Joins a batch of simulated peers, disconnects some of them, and prints
//! a JSON summary of the resulting mesh.

use std::path::PathBuf;

use clap::Parser;

use weft_logging::{ConsoleFormat, FileConfig, LogConfig, WeftSubscriberBuilder};
use weft_sim::{MESH_NAME, SimConfig, run};

#[derive(Parser)]
#[command(
    name = "weft-sim",
    about = "Drive a mesh coordinator with simulated peers",
    version
)]
struct Cli {
    /// Number of peers to connect
    #[arg(short, long, default_value = "20")]
    peers: usize,

    /// Number of accepted peers to disconnect afterwards
    #[arg(short, long, default_value = "5")]
    leave: usize,

    /// Probability that a single signaling step fails (0.0 - 1.0)
    #[arg(short, long, default_value = "0.0")]
    failure_rate: f64,

    /// Handshake deadline in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    /// Upper bound of the simulated per-step delay in milliseconds
    #[arg(long, default_value = "20")]
    max_latency_ms: u64,

    /// RNG seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Human-readable logs instead of JSONL
    #[arg(long)]
    pretty: bool,

    /// Log level
    #[arg(long, default_value = "warn")]
    level: String,

    /// Log every handshake step and regulation outcome
    #[arg(long)]
    trace_handshakes: bool,

    /// Also write JSONL logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if !(0.0..=1.0).contains(&cli.failure_rate) {
        anyhow::bail!("--failure-rate must be within 0.0 and 1.0");
    }

    let mut log_config = LogConfig {
        level: cli.level,
        ..LogConfig::default()
    };
    if cli.pretty {
        log_config.console = ConsoleFormat::Pretty;
        log_config.ansi = true;
    }
    if cli.trace_handshakes {
        log_config = log_config.trace_handshakes();
    }

    let mut logging = WeftSubscriberBuilder::new().with_config(log_config);
    if let Some(dir) = cli.log_dir {
        logging = logging.with_file_output(FileConfig::for_mesh(dir, MESH_NAME));
    }
    let _guard = logging.init();

    let config = SimConfig {
        peers: cli.peers,
        leave: cli.leave,
        failure_rate: cli.failure_rate,
        timeout_ms: cli.timeout_ms,
        max_latency_ms: cli.max_latency_ms,
        seed: cli.seed,
    };

    let report = run(&config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
