// Xkeysd CLI
// Remaps X-keys panel reports onto a virtual input device

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use xkeysd_core::{
    discover, Config, DeviceId, DeviceLoop, OpenDevice, SymbolTable, VirtualSink,
    DEFAULT_POLL_TIMEOUT_MS,
};

const DEFAULT_CONFIG_PATH: &str = "/etc/xkeysd.toml";

/// X-keys panel remapping daemon
#[derive(Parser, Debug)]
#[command(name = "xkeysd")]
#[command(about = "X-keys panel remapping daemon", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// List matching hidraw devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if args.list_devices {
        return list_devices();
    }

    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let table = SymbolTable::new();
    let config = Config::from_toml_path(&config_path, &table)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if args.check_config {
        println!("Configuration is valid ({} devices)", config.devices.len());
        return Ok(());
    }

    let devices = open_devices(&config)?;

    let mut sink = VirtualSink::create(&config.devices).context("creating virtual device")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("registering signal handler")?;
    }

    let mut device_loop = DeviceLoop::new(devices)?;
    info!("serving {} device(s)", device_loop.device_count());

    device_loop.run(&mut sink, &shutdown, DEFAULT_POLL_TIMEOUT_MS)?;
    info!("shutting down");
    Ok(())
}

/// Resolve every configured device to hidraw nodes and open them.
///
/// A path identity names one node directly; a vendor/product identity opens
/// every matching node, so several identical panels can share one mapping.
fn open_devices(config: &Config) -> Result<Vec<OpenDevice>> {
    let mut devices = Vec::new();

    for mapping in &config.devices {
        let nodes = match mapping.id() {
            DeviceId::Path(path) => vec![path.clone()],
            DeviceId::Usb { vendor, product } => {
                let nodes = discover::find_by_ids(*vendor, *product)
                    .context("enumerating hidraw devices")?;
                if nodes.is_empty() {
                    warn!("{}: no device matching {}", mapping.name(), mapping.id());
                }
                nodes
            }
        };

        for node in nodes {
            devices.push(
                OpenDevice::open(mapping.clone(), &node)
                    .with_context(|| format!("opening {}", node.display()))?,
            );
        }
    }

    if devices.is_empty() {
        bail!("no devices to serve");
    }
    Ok(devices)
}

fn list_devices() -> Result<()> {
    let infos = discover::enumerate().context("enumerating hidraw devices")?;
    if infos.is_empty() {
        println!("No hidraw devices found");
        return Ok(());
    }
    for info in infos {
        println!(
            "{}  {:04x}:{:04x}",
            info.node.display(),
            info.vendor,
            info.product
        );
    }
    Ok(())
}
