use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use ipv4_router::config::RouterConfig;
use ipv4_router::link::ChannelLink;
use ipv4_router::Router;

/// Forwarding plane of a simple IPv4 software router.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the interface/routing-table configuration (YAML).
    #[arg(long, default_value = "router.yaml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = RouterConfig::load(&cli.config)?;
    let (interfaces, routes) = config.into_tables();

    for iface in interfaces.list() {
        info!("interface {}: mac={:02x?} ip={}", iface.name, iface.mac, iface.ip);
    }
    for route in routes.list() {
        info!(
            "route {}/{} via {} dev {}",
            route.destination, route.netmask, route.gateway, route.iface
        );
    }

    // A real deployment would back `LinkLayer` with raw packet sockets
    // bound to each named interface; this binary ships only the
    // in-process `ChannelLink` used by the test suite, since wiring an
    // actual NIC is out of scope (spec §1: link I/O is an external
    // collaborator).
    let link: Arc<ChannelLink> = Arc::new(ChannelLink::new());
    for iface in interfaces.list() {
        link.register(&iface.name);
    }

    let router = Router::new(interfaces, routes, link);
    info!("router initialized, entering idle loop");

    // In the absence of a real link-layer driver there is nothing to
    // poll; keep the process alive so the resolver loop keeps running.
    let _ = router;
    loop {
        std::thread::park();
    }
}
