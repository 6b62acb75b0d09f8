//! CLI / configuration (ambient, §4.12): parses interface list, opmode,
//! `ipv4mode`, multicast group, port, TTLs, and tick intervals into a
//! [`DaemonConfig`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use alfred_core::{OpMode, RetentionTtls};
use alfred_proto::MacAddr;
use clap::Parser;

use crate::error::DaemonError;

/// One interface binding, as given on the command line: `name@bind_addr` or
/// `name@bind_addr@scope_id` for IPv6 link-local interfaces, whose numeric
/// scope id (`ip link show` ifindex) this crate has no portable, safe way to
/// resolve by name on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    /// Interface name, used only as a label in the core's per-interface
    /// state and in logs.
    pub name: String,
    /// Local address to bind and join the multicast group on.
    pub bind_addr: IpAddr,
    /// IPv6 scope id for link-local sends/joins on this interface.
    pub scope_id: Option<u32>,
}

impl std::str::FromStr for InterfaceSpec {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.split('@');
        let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| {
            format!("interface spec '{raw}' is missing a name (expected name@addr[@scope_id])")
        })?;
        let addr_part = parts
            .next()
            .ok_or_else(|| format!("interface spec '{raw}' is missing an address (expected name@addr[@scope_id])"))?;
        let bind_addr: IpAddr =
            addr_part.parse().map_err(|_| format!("invalid bind address '{addr_part}' for interface '{name}'"))?;
        let scope_id = match parts.next() {
            Some(raw_scope) => {
                Some(raw_scope.parse::<u32>().map_err(|_| format!("invalid scope id '{raw_scope}'"))?)
            },
            None => None,
        };
        if parts.next().is_some() {
            return Err(format!("interface spec '{raw}' has too many '@'-separated parts"));
        }
        Ok(Self { name: name.to_string(), bind_addr, scope_id })
    }
}

/// A pre-provisioned mesh-table entry for the resolver (§4.9): the
/// `(interface, ip) -> mac` mappings this crate can't derive algorithmically
/// (IPv4 peers, or IPv6 peers not shaped as EUI-64 link-local).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPeerSpec {
    /// Interface this mapping applies on.
    pub interface: String,
    /// The peer's address on that interface.
    pub ip: IpAddr,
    /// The peer's hardware address.
    pub mac: MacAddr,
}

impl std::str::FromStr for StaticPeerSpec {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.split('@');
        let interface = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| {
            format!("static peer spec '{raw}' is missing an interface (expected interface@ip@mac)")
        })?;
        let ip_part =
            parts.next().ok_or_else(|| format!("static peer spec '{raw}' is missing an address"))?;
        let ip: IpAddr = ip_part.parse().map_err(|_| format!("invalid peer address '{ip_part}'"))?;
        let mac_part =
            parts.next().ok_or_else(|| format!("static peer spec '{raw}' is missing a mac address"))?;
        let mac = parse_mac(mac_part)?;
        if parts.next().is_some() {
            return Err(format!("static peer spec '{raw}' has too many '@'-separated parts"));
        }
        Ok(Self { interface: interface.to_string(), ip, mac })
    }
}

fn parse_mac(raw: &str) -> Result<MacAddr, String> {
    let mut octets = [0u8; 6];
    let mut parts = raw.split(':');
    for octet in &mut octets {
        let part = parts.next().ok_or_else(|| format!("mac address '{raw}' has too few octets"))?;
        *octet = u8::from_str_radix(part, 16).map_err(|_| format!("invalid mac octet '{part}' in '{raw}'"))?;
    }
    if parts.next().is_some() {
        return Err(format!("mac address '{raw}' has too many octets"));
    }
    Ok(MacAddr::new(octets))
}

/// Mesh data-announcement daemon.
#[derive(Parser, Debug)]
#[command(name = "alfred-daemon")]
#[command(about = "Mesh data-announcement daemon")]
#[command(version)]
pub struct Args {
    /// Comma-separated list of interfaces to bind, each as
    /// `name@bind_addr[@scope_id]` (e.g. `bat0@fe80::1@3`).
    #[arg(short, long, value_delimiter = ',')]
    pub interfaces: Vec<InterfaceSpec>,

    /// Static mesh-table entries, repeatable: `interface@ip@mac`. Needed for
    /// any peer this crate can't resolve algorithmically (non-EUI-64 IPv6,
    /// or any IPv4 peer).
    #[arg(long = "static-peer")]
    pub static_peers: Vec<StaticPeerSpec>,

    /// Node role: `master` or `slave`.
    #[arg(short = 'm', long, default_value = "slave")]
    pub opmode: String,

    /// Use IPv4 multicast instead of IPv6 link-local.
    #[arg(long)]
    pub ipv4: bool,

    /// Multicast group override. Defaults to `ff02::1` (IPv6) or
    /// `224.0.0.1` (IPv4) depending on `--ipv4`.
    #[arg(long)]
    pub multicast_group: Option<String>,

    /// UDP port.
    #[arg(long, default_value_t = alfred_proto::ALFRED_PORT)]
    pub port: u16,

    /// Dataset cache entry TTL, in seconds.
    #[arg(long, default_value = "600")]
    pub dataset_ttl_secs: u64,

    /// Peer table entry TTL, in seconds.
    #[arg(long, default_value = "60")]
    pub peer_ttl_secs: u64,

    /// Transaction table entry TTL, in seconds.
    #[arg(long, default_value = "30")]
    pub transaction_ttl_secs: u64,

    /// Interval between `ANNOUNCE_MASTER` broadcasts, in seconds.
    #[arg(long, default_value = "10")]
    pub announce_interval_secs: u64,

    /// Interval between full peer syncs, in seconds.
    #[arg(long, default_value = "60")]
    pub sync_interval_secs: u64,

    /// Interval between local-data pushes to the best server, in seconds.
    #[arg(long, default_value = "10")]
    pub push_local_interval_secs: u64,

    /// Interval between retention sweeps, in seconds.
    #[arg(long, default_value = "30")]
    pub sweep_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Runtime configuration threaded from the CLI into [`alfred_core::Context`]
/// and the scheduler at startup (§3 "`DaemonConfig`").
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Interfaces to bind.
    pub interfaces: Vec<InterfaceSpec>,
    /// Pre-provisioned mesh-table entries for the resolver.
    pub static_peers: Vec<StaticPeerSpec>,
    /// Master or slave.
    pub opmode: OpMode,
    /// Whether to operate over IPv4 multicast instead of IPv6 link-local.
    pub ipv4mode: bool,
    /// The well-known multicast group to send `ANNOUNCE_MASTER`/sync traffic
    /// to.
    pub multicast_group: IpAddr,
    /// UDP port to bind and send on.
    pub port: u16,
    /// Retention TTLs for the three sweeps.
    pub ttls: RetentionTtls,
    /// Tick intervals for the four scheduler hooks.
    pub tick: TickIntervals,
    /// Log level passed to `tracing-subscriber` when `RUST_LOG` is unset.
    pub log_level: String,
}

/// Intervals driving the scheduler's four periodic hooks (§4.11).
#[derive(Debug, Clone, Copy)]
pub struct TickIntervals {
    /// `tick_announce` period.
    pub announce: Duration,
    /// `tick_sync` period.
    pub sync: Duration,
    /// `tick_push_local` period.
    pub push_local: Duration,
    /// `tick_sweep` period.
    pub sweep: Duration,
}

impl DaemonConfig {
    /// Builds a [`DaemonConfig`] from parsed CLI arguments, validating
    /// `opmode` and the multicast group override.
    pub fn from_args(args: Args) -> Result<Self, DaemonError> {
        let opmode = match args.opmode.to_ascii_lowercase().as_str() {
            "master" => OpMode::Master,
            "slave" => OpMode::Slave,
            other => {
                return Err(DaemonError::Config(format!(
                    "unknown opmode '{other}', expected 'master' or 'slave'"
                )));
            },
        };

        let default_group = if args.ipv4 {
            IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1))
        } else {
            IpAddr::V6(Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1))
        };
        let multicast_group = match args.multicast_group {
            Some(raw) => raw
                .parse()
                .map_err(|_| DaemonError::Config(format!("invalid multicast group '{raw}'")))?,
            None => default_group,
        };
        if args.ipv4 != multicast_group.is_ipv4() {
            return Err(DaemonError::Config(
                "multicast group address family does not match --ipv4".to_string(),
            ));
        }

        if args.interfaces.is_empty() {
            return Err(DaemonError::Config("at least one interface is required".to_string()));
        }
        for iface in &args.interfaces {
            if iface.bind_addr.is_ipv4() != args.ipv4 {
                return Err(DaemonError::Config(format!(
                    "interface '{}' bind address family does not match --ipv4",
                    iface.name
                )));
            }
        }

        Ok(Self {
            interfaces: args.interfaces,
            static_peers: args.static_peers,
            opmode,
            ipv4mode: args.ipv4,
            multicast_group,
            port: args.port,
            ttls: RetentionTtls {
                dataset: Duration::from_secs(args.dataset_ttl_secs),
                peer: Duration::from_secs(args.peer_ttl_secs),
                transaction: Duration::from_secs(args.transaction_ttl_secs),
            },
            tick: TickIntervals {
                announce: Duration::from_secs(args.announce_interval_secs),
                sync: Duration::from_secs(args.sync_interval_secs),
                push_local: Duration::from_secs(args.push_local_interval_secs),
                sweep: Duration::from_secs(args.sweep_interval_secs),
            },
            log_level: args.log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Args, DaemonConfig, InterfaceSpec, StaticPeerSpec};
    use alfred_core::OpMode;

    fn args_with(opmode: &str, ipv4: bool, group: Option<&str>) -> Args {
        let iface: InterfaceSpec =
            if ipv4 { "bat0@10.0.0.5".parse().unwrap() } else { "bat0@fe80::1@3".parse().unwrap() };
        Args {
            interfaces: vec![iface],
            static_peers: Vec::new(),
            opmode: opmode.to_string(),
            ipv4,
            multicast_group: group.map(str::to_string),
            port: alfred_proto::ALFRED_PORT,
            dataset_ttl_secs: 600,
            peer_ttl_secs: 60,
            transaction_ttl_secs: 30,
            announce_interval_secs: 10,
            sync_interval_secs: 60,
            push_local_interval_secs: 10,
            sweep_interval_secs: 30,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn parses_master_opmode() {
        let config = DaemonConfig::from_args(args_with("master", false, None)).unwrap();
        assert_eq!(config.opmode, OpMode::Master);
        assert!(!config.multicast_group.is_ipv4());
    }

    #[test]
    fn rejects_unknown_opmode() {
        assert!(DaemonConfig::from_args(args_with("bogus", false, None)).is_err());
    }

    #[test]
    fn defaults_to_ipv4_group_in_ipv4_mode() {
        let config = DaemonConfig::from_args(args_with("slave", true, None)).unwrap();
        assert!(config.multicast_group.is_ipv4());
    }

    #[test]
    fn rejects_mismatched_group_family() {
        assert!(DaemonConfig::from_args(args_with("slave", true, Some("ff02::1"))).is_err());
    }

    #[test]
    fn rejects_empty_interface_list() {
        let mut args = args_with("slave", false, None);
        args.interfaces.clear();
        assert!(DaemonConfig::from_args(args).is_err());
    }

    #[test]
    fn rejects_interface_family_mismatch() {
        let mut args = args_with("slave", false, None);
        args.interfaces.push("bat1@10.0.0.9".parse().unwrap());
        assert!(DaemonConfig::from_args(args).is_err());
    }

    #[test]
    fn interface_spec_parses_name_addr_and_scope() {
        let spec: InterfaceSpec = "bat0@fe80::1@5".parse().unwrap();
        assert_eq!(spec.name, "bat0");
        assert_eq!(spec.scope_id, Some(5));
    }

    #[test]
    fn interface_spec_scope_is_optional() {
        let spec: InterfaceSpec = "bat0@10.0.0.1".parse().unwrap();
        assert_eq!(spec.scope_id, None);
    }

    #[test]
    fn interface_spec_rejects_missing_address() {
        assert!("bat0".parse::<InterfaceSpec>().is_err());
    }

    #[test]
    fn static_peer_spec_parses_interface_ip_and_mac() {
        let spec: StaticPeerSpec = "bat0@10.0.0.1@aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(spec.interface, "bat0");
        assert_eq!(spec.mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn static_peer_spec_rejects_short_mac() {
        assert!("bat0@10.0.0.1@aa:bb:cc".parse::<StaticPeerSpec>().is_err());
    }

    #[test]
    fn static_peer_spec_rejects_missing_mac() {
        assert!("bat0@10.0.0.1".parse::<StaticPeerSpec>().is_err());
    }
}
