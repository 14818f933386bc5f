use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

use image_puller::flusher::{spawn_log_flusher, DEFAULT_FLUSH_INTERVAL};
use image_puller::notifier::{init_logger, VerbosityLevel};
use image_puller::runtime::Engine as RuntimeEngine;
use image_puller::{CliRuntime, Notifier, RootfsExtractor};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Engine {
    Docker,
    Podman,
}

impl From<Engine> for RuntimeEngine {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Docker => RuntimeEngine::Docker,
            Engine::Podman => RuntimeEngine::Podman,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "", help = "Image to fetch (e.g., alpine:3.19)")]
    image: String,

    #[arg(
        long = "rootfs-dir",
        default_value = "/tmp/rootfs",
        help = "Path to store the rootfs"
    )]
    rootfs_dir: PathBuf,

    #[arg(
        short,
        long,
        value_enum,
        default_value = "docker",
        help = "Container engine to use"
    )]
    engine: Engine,

    #[arg(
        long,
        default_value_t = DEFAULT_FLUSH_INTERVAL.as_millis() as u64,
        help = "Interval in milliseconds between background log flushes"
    )]
    flush_interval_ms: u64,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches off the spinner"
    )]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logger(VerbosityLevel::from(cli.verbose));

    if let Err(e) = spawn_log_flusher(Duration::from_millis(cli.flush_interval_ms.max(1))) {
        warn!("Unable to start the log flusher: {}", e);
    }

    if let Err(e) = run(&cli) {
        error!("{}", e);
        log::logger().flush();
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!("Starting image-puller with image: {}", cli.image);
    debug!("Rootfs directory: {}", cli.rootfs_dir.display());
    debug!("Engine: {:?}", cli.engine);

    let runtime = CliRuntime::new(cli.engine.into())
        .map_err(|e| anyhow!("Unable to connect to {:?}: {}", cli.engine, e))?;
    let extractor = RootfsExtractor::new(runtime, Notifier::new(cli.verbose));

    let report = extractor.run(&cli.image, &cli.rootfs_dir)?;
    debug!(
        "Extracted {} from container {}: {:?}",
        report.reference, report.container_id, report.stats
    );

    Ok(())
}
