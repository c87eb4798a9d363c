//! TCP transport for DNS queries.
//!
//! Each connection runs in its own task and may carry several queries in
//! sequence. TCP DNS messages are prefixed with a 2-byte big-endian length.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::warn;

use crate::resolver::Resolver;

use super::{DNS_HEADER_LEN, MAX_DNS_PACKET_SIZE, Protocol};

/// TCP listener for the DNS proxy.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start the accept loop in its own task.
    pub fn start(self, resolver: Arc<Resolver>) {
        tokio::spawn(run_accept_loop(self.listener, resolver));
    }
}

/// Accept loop: one spawned handler per connection.
async fn run_accept_loop(listener: TcpListener, resolver: Arc<Resolver>) {
    loop {
        match listener.accept().await {
            Ok((client, _)) => {
                tokio::spawn(handle_connection(client, resolver.clone()));
            }
            Err(e) => {
                warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// Handle queries from one connection until the client hangs up.
async fn handle_connection(mut client: TcpStream, resolver: Arc<Resolver>) {
    while let Some(query) = read_message(&mut client).await {
        let Some(reply) = resolver.process_query(&query, Protocol::Tcp).await else {
            continue;
        };
        if write_message(&mut client, &reply).await.is_err() {
            return;
        }
    }
}

/// Read one length-prefixed DNS message, without the prefix.
async fn read_message(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let len = stream.read_u16().await.ok()? as usize;
    if len < DNS_HEADER_LEN || len > MAX_DNS_PACKET_SIZE {
        return None;
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.ok()?;

    Some(buf)
}

/// Write one DNS message with its length prefix.
async fn write_message(stream: &mut TcpStream, message: &[u8]) -> io::Result<()> {
    stream.write_u16(message.len() as u16).await?;
    stream.write_all(message).await?;
    stream.flush().await
}
