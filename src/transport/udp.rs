//! UDP transport for DNS queries.
//!
//! Each datagram is a complete query; it is handed to the resolver in its
//! own task so slow upstream exchanges never block the receive loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::warn;

use crate::resolver::Resolver;

use super::{DNS_HEADER_LEN, MAX_DNS_PACKET_SIZE, Protocol};

/// UDP listener for the DNS proxy.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the receive loop in its own task.
    pub fn start(self, resolver: Arc<Resolver>) {
        tokio::spawn(run(self.socket, resolver));
    }
}

/// Receive loop: one spawned handler per datagram.
async fn run(socket: Arc<UdpSocket>, resolver: Arc<Resolver>) {
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(error = %e, "UDP recv error");
                continue;
            }
        };

        if len < DNS_HEADER_LEN {
            continue;
        }

        let packet = buf[..len].to_vec();
        let socket = socket.clone();
        let resolver = resolver.clone();

        tokio::spawn(async move {
            let Some(reply) = resolver.process_query(&packet, Protocol::Udp).await else {
                return;
            };
            if let Err(e) = socket.send_to(&reply, src).await {
                warn!(error = %e, client = %src, "UDP send error");
            }
        });
    }
}
