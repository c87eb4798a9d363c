use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tracing::{Level, error};
use tracing_subscriber::EnvFilter;

use divert::backend::SystemRoutes;
use divert::proxy::{self, ProxyConfig};

/// Upstream nameservers are always contacted on the standard DNS port.
const DNS_PORT: u16 = 53;

#[derive(Parser)]
#[command(name = "divert")]
#[command(about = "Split-tunnel DNS proxy that reroutes a chosen zone through an alternate gateway", long_about = None)]
struct Args {
    /// IPv4 gateway for rerouted destinations
    #[arg(short = 'r', long)]
    gateway: Ipv4Addr,

    /// IPv6 gateway; enables IPv6 rerouting when present
    #[arg(long)]
    gateway6: Option<Ipv6Addr>,

    /// Zone whose resolved addresses are rerouted
    #[arg(short, long, default_value = "netflix.com")]
    zone: String,

    /// Primary upstream nameserver
    #[arg(long, default_value = "8.8.8.8")]
    primary: IpAddr,

    /// Secondary upstream nameserver
    #[arg(long, default_value = "8.8.4.4")]
    secondary: IpAddr,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Local port to listen on
    #[arg(short, long, default_value = "53")]
    port: u16,

    /// Verbose logging (per-request and per-backend-call detail)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose);

    let backend = match SystemRoutes::locate() {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let config = ProxyConfig {
        bind_addr: SocketAddr::new(args.bind, args.port),
        zone: args.zone,
        gateway4: args.gateway,
        gateway6: args.gateway6,
        nameservers: vec![
            SocketAddr::new(args.primary, DNS_PORT),
            SocketAddr::new(args.secondary, DNS_PORT),
        ],
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(proxy::run(config, backend)) {
        error!("{e}");
        std::process::exit(1);
    }
}
