//! DNS proxy orchestration.
//!
//! Wires the resolver pipeline together, binds both transports, and runs
//! them until a termination signal arrives; then drains the injected routes
//! and exits with the signal's conventional exit code.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::RouteBackend;
use crate::error::Error;
use crate::hijack::Hijacker;
use crate::resolver::Resolver;
use crate::routes::RouteTable;
use crate::shutdown;
use crate::transport::{tcp::TcpTransport, udp::UdpTransport};
use crate::upstream::Upstreams;
use crate::zone::TargetZone;

/// Configuration for the DNS proxy. Immutable once the proxy is running.
pub struct ProxyConfig {
    /// Local address to bind, for both UDP and TCP.
    pub bind_addr: SocketAddr,
    /// Zone whose resolved addresses get rerouted.
    pub zone: String,
    /// Next hop for rerouted IPv4 destinations.
    pub gateway4: Ipv4Addr,
    /// Next hop for rerouted IPv6 destinations; absence disables IPv6
    /// rerouting entirely.
    pub gateway6: Option<Ipv6Addr>,
    /// Upstream nameserver endpoints, in failover order.
    pub nameservers: Vec<SocketAddr>,
}

/// Run the DNS proxy until a termination signal arrives.
///
/// Binding either transport is fatal. On signal, every injected route is
/// removed and the process exits with `128 + signal number`.
pub async fn run(config: ProxyConfig, backend: Arc<dyn RouteBackend>) -> Result<(), Error> {
    let routes = Arc::new(RouteTable::new(config.gateway6.is_some()));
    let zone = TargetZone::new(&config.zone);
    let upstreams = Upstreams::new(config.nameservers.clone());
    let hijacker = Hijacker::new(
        routes.clone(),
        backend.clone(),
        config.gateway4,
        config.gateway6,
    );
    let resolver = Arc::new(Resolver::new(zone, upstreams, hijacker));

    let udp = UdpTransport::bind(config.bind_addr)
        .await
        .map_err(|source| Error::Bind {
            transport: "UDP",
            addr: config.bind_addr,
            source,
        })?;
    let tcp = TcpTransport::bind(config.bind_addr)
        .await
        .map_err(|source| Error::Bind {
            transport: "TCP",
            addr: config.bind_addr,
            source,
        })?;

    info!(addr = %config.bind_addr, zone = %config.zone, "DNS proxy listening");
    info!(nameservers = ?config.nameservers, ipv6_rerouting = config.gateway6.is_some(), "forwarding to upstream nameservers");

    udp.start(resolver.clone());
    tcp.start(resolver);

    let termination = shutdown::wait_for_signal().await?;
    warn!(signal = termination.name, "received termination signal");

    shutdown::remove_routes(&routes, backend.as_ref());

    info!(signal = termination.name, "exiting");
    std::process::exit(termination.exit_code());
}
