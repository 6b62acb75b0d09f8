//! Mesh data-announcement daemon binary.
//!
//! Wires the protocol engine in `alfred-core` to concrete UDP multicast
//! sockets, a CLI-driven [`DaemonConfig`], and a `tokio`-interval scheduler.
//! See `alfred-core` for the actual protocol behavior; this binary only
//! assembles the ambient stack around it (§4.7-§4.13).

use std::net::IpAddr;

use alfred_core::{Context, InterfaceState, SystemEnvironment};
use alfred_daemon::{config::Args, resolver, scheduler, DaemonConfig, DaemonError, MulticastTransport};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = DaemonConfig::from_args(args)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(opmode = ?config.opmode, ipv4mode = config.ipv4mode, "alfred-daemon starting");

    run(config).await.map_err(|error| {
        tracing::error!(%error, "alfred-daemon exited with an error");
        Box::new(error) as Box<dyn std::error::Error>
    })
}

async fn run(config: DaemonConfig) -> Result<(), DaemonError> {
    let mut ctx: Context<SystemEnvironment> =
        Context::new(config.opmode, config.ipv4mode, config.multicast_group, SystemEnvironment::new());

    for iface in &config.interfaces {
        let own_addrs: Vec<IpAddr> = vec![iface.bind_addr];
        ctx.add_interface(InterfaceState::new(iface.name.clone(), own_addrs, iface.scope_id));
        tracing::info!(interface = %iface.name, bind = %iface.bind_addr, "registered interface");
    }

    let mesh_resolver = resolver::build(&config.static_peers);
    let transport = MulticastTransport::bind(&config.interfaces, config.multicast_group, config.port)?;

    tracing::info!(port = config.port, group = %config.multicast_group, "multicast sockets bound");

    scheduler::run(ctx, transport, mesh_resolver, (), (), config.ttls, config.tick).await;

    Ok(())
}
