//! Upstream nameserver pool with ordered failover.
//!
//! Forwards queries to a fixed pool of recursive resolvers over the same
//! transport the client used. The query id picks the pool member to try
//! first, spreading load without shared state; each member is attempted
//! once, wrapping around, and the first usable reply wins. No retries, no
//! backoff: this sits on the request path, so failing fast back to the
//! client beats latency. When the whole pool fails the client gets a
//! synthesized SERVFAIL instead of a transport error.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use hickory_proto::op::{Message, ResponseCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::resolver::synthesize_reply;
use crate::transport::{MAX_DNS_PACKET_SIZE, Protocol};

/// Deadline applied separately to each read and each write per attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(4);

/// Fixed, ordered pool of upstream resolver endpoints.
pub struct Upstreams {
    servers: Vec<SocketAddr>,
    attempt_timeout: Duration,
}

impl Upstreams {
    pub fn new(servers: Vec<SocketAddr>) -> Self {
        Self {
            servers,
            attempt_timeout: ATTEMPT_TIMEOUT,
        }
    }

    /// Override the per-attempt deadline (tests use short deadlines).
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Forward `query` and return the upstream's reply, or a synthesized
    /// SERVFAIL when every pool member failed.
    pub async fn resolve(&self, query: &Message, protocol: Protocol) -> Message {
        if let Some(question) = query.queries().first() {
            debug!(
                name = %question.name(),
                qtype = %question.query_type(),
                protocol = protocol.as_str(),
                "forwarding query"
            );
        }

        let packet = match query.to_vec() {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "failed to encode query for forwarding");
                return synthesize_reply(query, ResponseCode::ServFail);
            }
        };

        // The query id seeds the starting index so callers with diverse ids
        // spread across the pool without any shared round-robin state.
        let start = query.id() as usize;

        for attempt in 0..self.servers.len() {
            let server = self.servers[(start + attempt) % self.servers.len()];

            let outcome = match protocol {
                Protocol::Udp => self.exchange_udp(&packet, server).await,
                Protocol::Tcp => self.exchange_tcp(&packet, server).await,
            };

            let raw = match outcome {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(server = %server, error = %e, "upstream exchange failed");
                    continue;
                }
            };

            match Message::from_vec(&raw) {
                Ok(reply) => return reply,
                Err(e) => {
                    warn!(server = %server, error = %e, "discarding malformed upstream reply")
                }
            }
        }

        error!("failed to forward request, all nameservers exhausted");
        synthesize_reply(query, ResponseCode::ServFail)
    }

    async fn exchange_udp(&self, packet: &[u8], server: SocketAddr) -> io::Result<Vec<u8>> {
        let bind_addr: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server).await?;

        timeout(self.attempt_timeout, socket.send(packet))
            .await
            .map_err(|_| deadline_error())??;

        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
        let len = timeout(self.attempt_timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| deadline_error())??;
        buf.truncate(len);

        Ok(buf)
    }

    async fn exchange_tcp(&self, packet: &[u8], server: SocketAddr) -> io::Result<Vec<u8>> {
        let mut stream = timeout(self.attempt_timeout, TcpStream::connect(server))
            .await
            .map_err(|_| deadline_error())??;

        timeout(self.attempt_timeout, async {
            stream.write_u16(packet.len() as u16).await?;
            stream.write_all(packet).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| deadline_error())??;

        let len = timeout(self.attempt_timeout, stream.read_u16())
            .await
            .map_err(|_| deadline_error())?? as usize;

        let mut buf = vec![0u8; len];
        timeout(self.attempt_timeout, stream.read_exact(&mut buf))
            .await
            .map_err(|_| deadline_error())??;

        Ok(buf)
    }
}

fn deadline_error() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "upstream deadline elapsed")
}
