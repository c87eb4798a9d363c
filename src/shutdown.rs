//! Termination handling: signal wait and route drain.
//!
//! The proxy serves until a termination signal arrives, then unwinds every
//! route it injected. Failure to drain leaves the rerouted addresses
//! unreachable once the alternate gateway goes away, so each removal is
//! attempted independently and failures never abort the rest.

use std::io;
use std::net::IpAddr;

use tracing::info;

use crate::backend::RouteBackend;
use crate::routes::RouteTable;

/// The signal that ended the serving phase.
pub struct Termination {
    pub name: &'static str,
    pub number: i32,
}

impl Termination {
    /// Conventional exit code for a signal-driven exit.
    pub fn exit_code(&self) -> i32 {
        128 + self.number
    }
}

/// Wait for a termination signal.
#[cfg(unix)]
pub async fn wait_for_signal() -> io::Result<Termination> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let termination = tokio::select! {
        _ = hangup.recv() => Termination { name: "SIGHUP", number: 1 },
        _ = interrupt.recv() => Termination { name: "SIGINT", number: 2 },
        _ = quit.recv() => Termination { name: "SIGQUIT", number: 3 },
        _ = terminate.recv() => Termination { name: "SIGTERM", number: 15 },
    };

    Ok(termination)
}

/// Wait for a termination signal (ctrl-c on non-unix platforms).
#[cfg(not(unix))]
pub async fn wait_for_signal() -> io::Result<Termination> {
    tokio::signal::ctrl_c().await?;

    Ok(Termination {
        name: "interrupt",
        number: 2,
    })
}

/// Remove every route injected during the server's lifetime.
///
/// Addresses stay recorded even when their add command failed, so this may
/// ask the backend to remove a route that was never installed; the backend
/// treats removal as best-effort for exactly that reason.
pub fn remove_routes(routes: &RouteTable, backend: &dyn RouteBackend) {
    let v4 = routes.routed_v4();
    if !v4.is_empty() {
        info!(count = v4.len(), "removing routes");
        for address in v4 {
            backend.remove(IpAddr::V4(address), 32);
        }
    }

    let v6 = routes.routed_v6();
    if !v6.is_empty() {
        info!(count = v6.len(), "removing IPv6 routes");
        for address in v6 {
            backend.remove(IpAddr::V6(address), 128);
        }
    }
}
