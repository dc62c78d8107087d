//! tplink-presence - list wireless clients of a TP-Link router
//!
//! Prints one MAC address per line (or JSON with `--json`).

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use tplink_presence::config::{Config, PollConfig, DEFAULT_LOG_FILTER};
use tplink_presence::scanner::Timeouts;
use tplink_presence::{DeviceSet, PresencePoller, RouterFactory, Scanner, Variant};

#[derive(Debug, Parser)]
#[command(name = "tplink-presence", version, about = "List wireless clients of a TP-Link router")]
struct Cli {
    /// Router address, optionally with port
    #[arg(env = "TPLINK_HOST")]
    host: String,

    /// Admin username
    #[arg(env = "TPLINK_USERNAME")]
    username: String,

    /// Admin password
    #[arg(env = "TPLINK_PASSWORD", hide_env_values = true)]
    password: String,

    /// Skip detection and use this firmware variant
    #[arg(long, value_parser = parse_variant)]
    variant: Option<Variant>,

    /// Keep polling until interrupted; without SECS uses `poll.interval_secs`
    #[arg(long, value_name = "SECS", num_args = 0..=1)]
    interval: Option<Option<u64>>,

    /// Stop polling after this many scans
    #[arg(long, requires = "interval")]
    count: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print devices as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter_handle = init_tracing();

    let config = Config::load()?;
    if let Some(handle) = &filter_handle {
        apply_log_filter(handle, &config.log.filter);
    }

    let mut timeouts = Timeouts {
        request: config.http.request_timeout(),
        session: config.http.session_timeout(),
    };
    if let Some(secs) = cli.timeout {
        timeouts.request = Duration::from_secs(secs.max(1));
        timeouts.session = timeouts.session.max(timeouts.request);
    }

    let mut factory =
        RouterFactory::connect(&cli.host, &cli.username, &cli.password)?.with_timeouts(timeouts);

    let scanner: Option<Box<dyn Scanner>> = match cli.variant {
        Some(variant) => factory.connect_variant(variant).await,
        None => factory.get_router().await,
    };

    let Some(mut scanner) = scanner else {
        println!("Error communicating with the router");
        return Ok(());
    };

    match poll_interval(cli.interval, &config.poll) {
        Some(interval) => {
            let mut poller = PresencePoller::new(scanner, interval);
            if let Some(count) = cli.count {
                poller = poller.with_max_scans(count);
            }
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            poller
                .run(shutdown, |devices| print_devices(devices, cli.json))
                .await;
        }
        None => {
            // Stale results from the probe beat printing nothing
            if let Err(e) = scanner.scan().await {
                tracing::warn!("Scan failed, showing previous results: {}", e);
            }
            print_devices(scanner.last_results(), cli.json);
            scanner.logout().await;
        }
    }

    Ok(())
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Logs go to stderr; stdout carries the device list.
/// Returns a handle for the configured filter unless `RUST_LOG` pins one.
fn init_tracing() -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let pinned = from_env.is_some();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    (!pinned).then_some(handle)
}

fn apply_log_filter(handle: &FilterHandle, directives: &str) {
    match EnvFilter::try_new(directives) {
        Ok(filter) => {
            if let Err(e) = handle.reload(filter) {
                tracing::warn!("Failed to apply log filter: {}", e);
            }
        }
        Err(e) => tracing::warn!("Invalid log filter {:?}, keeping default: {}", directives, e),
    }
}

/// Explicit `--interval SECS` wins over `poll.interval_secs`
fn poll_interval(requested: Option<Option<u64>>, poll: &PollConfig) -> Option<Duration> {
    requested.map(|secs| match secs {
        Some(secs) => Duration::from_secs(secs.max(1)),
        None => poll.interval(),
    })
}

fn parse_variant(name: &str) -> Result<Variant, String> {
    name.parse::<Variant>().map_err(|e| e.to_string())
}

fn print_devices(devices: &DeviceSet, json: bool) {
    if json {
        match serde_json::to_string(&devices.records()) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::error!("Failed to encode devices: {}", e),
        }
    } else {
        for mac in devices.macs() {
            println!("{}", mac);
        }
    }
}
