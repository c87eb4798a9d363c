//! Transport layer implementations for the DNS proxy.
//!
//! Provides the UDP and TCP listeners that receive DNS queries from clients
//! and hand each one to the resolver pipeline in its own task.

pub mod tcp;
pub mod udp;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Length of the fixed DNS message header.
pub const DNS_HEADER_LEN: usize = 12;

/// Transport protocol a query arrived on.
///
/// Upstream exchanges reuse the client's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}
