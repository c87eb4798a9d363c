//! Error types.

use std::net::SocketAddr;
use thiserror::Error;

/// Fatal startup errors.
///
/// Per-query failures never surface here; they are logged and answered with
/// a synthesized reply instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The OS routing command could not be found on `PATH`.
    #[error("unable to find the `route` command in your PATH")]
    RouteCommandNotFound,

    /// A listener failed to bind.
    #[error("failed to bind {transport} listener on {addr}: {source}")]
    Bind {
        transport: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Installing the termination signal handlers failed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}
