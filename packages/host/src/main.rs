use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vdev_net::ReqwestExecutor;
use vdev_runtime::{
    DeviceConfig, DeviceManager, DeviceSnapshot, EventRouter, FrameContext, ScriptDeviceFactory,
};

mod sink;

use sink::LogSink;

const FACTORY: &str = "script";

#[derive(Parser, Debug)]
#[command(name = "vdev", author, version, about = "Run a scripted virtual device")]
struct Cli {
    /// Device configuration (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Folder holding the entry module; overrides `resources.script_root`
    #[arg(long)]
    scripts: Option<PathBuf>,

    /// Stop after this many ticks; runs until the script ends when omitted
    #[arg(long)]
    ticks: Option<u64>,

    /// Ticks (and render frames) per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Resume the device from a snapshot file
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Write the device's snapshot here on exit
    #[arg(long)]
    save: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<DeviceConfig> {
    let mut config = match &cli.config {
        Some(path) => DeviceConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DeviceConfig::default(),
    };
    if let Some(scripts) = &cli.scripts {
        config.resources.script_root = Some(scripts.clone());
    }
    Ok(config)
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout is left to scripts' print output.
    fmt()
        .with_env_filter(EnvFilter::from_env("VDEV_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli)?);

    let router = Arc::new(EventRouter::new());
    let manager = DeviceManager::new(router.clone(), &config.resources.id_namespace);
    let executor = ReqwestExecutor::with_default_timeout().map_err(anyhow::Error::msg)?;
    manager.register_factory(Arc::new(ScriptDeviceFactory::new(
        FACTORY,
        config.clone(),
        Arc::new(executor),
        Arc::new(LogSink),
    )));

    let device = match &cli.restore {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            manager.restore(DeviceSnapshot::from_json(&json)?)?
        }
        None => {
            let device = manager.create_device(FACTORY)?;
            device.start();
            device
        }
    };
    info!(device = %device.id(), "device running");

    let period = Duration::from_secs(1) / cli.fps.max(1);
    let mut ticks = 0u64;
    while device.is_running() && cli.ticks.map_or(true, |limit| ticks < limit) {
        let started = Instant::now();
        ticks += 1;
        router.tick(ticks);
        router.render(FrameContext {
            frame: ticks,
            width: config.canvas.width,
            height: config.canvas.height,
        });
        if let Some(rest) = period.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    router.stop(None);
    if let Some(path) = &cli.save {
        let snapshot = manager.save(device.id())?;
        std::fs::write(path, snapshot.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "snapshot saved");
    }
    info!(ticks, "host exiting");
    Ok(())
}
