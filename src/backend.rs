//! Route backend: the boundary to the OS routing table.
//!
//! All routing-table mutation goes through the system `route` command, run
//! synchronously per mutation. The argument shape differs per OS family, so
//! it lives here and nowhere else. Command failures are logged and swallowed:
//! a failed add must not fail the query that triggered it, and a failed
//! remove must not abort the shutdown drain.

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, error};

use crate::error::Error;

#[cfg(windows)]
const ROUTE_COMMAND: &str = "route.exe";
#[cfg(not(windows))]
const ROUTE_COMMAND: &str = "route";

/// Capability to install and remove host routes.
///
/// `add` and `remove` are best-effort: implementations report failures by
/// logging, not by returning an error, and must tolerate being invoked for
/// an already-present or already-absent route.
pub trait RouteBackend: Send + Sync {
    /// Route `destination/prefix_len` through `gateway`.
    fn add(&self, destination: IpAddr, prefix_len: u8, gateway: IpAddr);

    /// Remove the route for `destination/prefix_len`.
    fn remove(&self, destination: IpAddr, prefix_len: u8);
}

/// [`RouteBackend`] backed by the system `route` executable.
pub struct SystemRoutes {
    program: PathBuf,
}

impl SystemRoutes {
    /// Locate the `route` command on `PATH`. Fatal at startup if absent.
    pub fn locate() -> Result<Self, Error> {
        let program = find_in_path(ROUTE_COMMAND).ok_or(Error::RouteCommandNotFound)?;

        Ok(Self { program })
    }

    /// Run the route command, logging its output on failure and, at debug
    /// level, on success.
    fn run(&self, args: Vec<String>) {
        let output = match Command::new(&self.program).args(&args).output() {
            Ok(output) => output,
            Err(e) => {
                error!(
                    command = %self.program.display(),
                    error = %e,
                    "failed to run route command"
                );
                return;
            }
        };

        let mut detail = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !detail.is_empty() {
                detail.push('\n');
            }
            detail.push_str(stderr.trim());
        }

        if output.status.success() {
            debug!(args = %args.join(" "), output = %detail, "route command succeeded");
        } else if detail.is_empty() {
            error!(args = %args.join(" "), status = %output.status, "route command failed");
        } else {
            error!(args = %args.join(" "), output = %detail, "route command failed");
        }
    }
}

impl RouteBackend for SystemRoutes {
    fn add(&self, destination: IpAddr, prefix_len: u8, gateway: IpAddr) {
        self.run(add_args(destination, prefix_len, gateway));
    }

    fn remove(&self, destination: IpAddr, prefix_len: u8) {
        self.run(remove_args(destination, prefix_len));
    }
}

#[cfg(not(windows))]
fn add_args(destination: IpAddr, prefix_len: u8, gateway: IpAddr) -> Vec<String> {
    vec![
        "add".into(),
        format!("{destination}/{prefix_len}"),
        "gw".into(),
        gateway.to_string(),
    ]
}

#[cfg(windows)]
fn add_args(destination: IpAddr, prefix_len: u8, gateway: IpAddr) -> Vec<String> {
    vec![
        "add".into(),
        format!("{destination}/{prefix_len}"),
        gateway.to_string(),
    ]
}

#[cfg(not(windows))]
fn remove_args(destination: IpAddr, prefix_len: u8) -> Vec<String> {
    vec!["del".into(), format!("{destination}/{prefix_len}")]
}

#[cfg(windows)]
fn remove_args(destination: IpAddr, prefix_len: u8) -> Vec<String> {
    vec!["delete".into(), format!("{destination}/{prefix_len}")]
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;

    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
