//! Per-query resolution pipeline.
//!
//! Parses each inbound packet, classifies it against the target zone, and
//! dispatches: hijacked A/AAAA queries go through the hijack processor,
//! everything else is forwarded upstream untouched. Replies are re-encoded
//! with name compression before being handed back to the transport.

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::RecordType;
use tracing::{debug, warn};

use crate::hijack::Hijacker;
use crate::transport::Protocol;
use crate::upstream::Upstreams;
use crate::zone::TargetZone;

/// What to do with a classified query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    /// Forward upstream and relay the reply unmodified.
    PassThrough,
    /// Target-zone A query: forward, then reroute returned IPv4 addresses.
    HijackV4,
    /// Target-zone AAAA query: forward-and-reroute, or suppress when IPv6
    /// rerouting is disabled.
    HijackV6,
}

/// Classify a query against the target zone.
///
/// Pure function of the query and the static configuration: hijack-eligible
/// names are the zone apex and its subdomains, and only A/AAAA questions
/// are hijacked. Queries without a question section pass through.
pub fn classify(zone: &TargetZone, query: &Message) -> QueryClass {
    let Some(question) = query.queries().first() else {
        return QueryClass::PassThrough;
    };

    if !zone.matches(&question.name().to_utf8()) {
        return QueryClass::PassThrough;
    }

    match question.query_type() {
        RecordType::A => QueryClass::HijackV4,
        RecordType::AAAA => QueryClass::HijackV6,
        _ => QueryClass::PassThrough,
    }
}

/// Build an empty reply to `query` with the given result code.
///
/// Echoes the question section and id, marked non-authoritative with
/// recursion available. Used both for SERVFAIL synthesis and for the empty
/// NOERROR reply of the disabled-IPv6 policy.
pub fn synthesize_reply(query: &Message, code: ResponseCode) -> Message {
    let mut reply = Message::new(query.id(), MessageType::Response, query.op_code());
    reply.set_recursion_desired(query.recursion_desired());
    reply.set_recursion_available(true);
    reply.set_authoritative(false);
    reply.set_response_code(code);

    for question in query.queries() {
        reply.add_query(question.clone());
    }

    reply
}

/// Resolver handles the query processing pipeline shared by both transports.
pub struct Resolver {
    zone: TargetZone,
    upstreams: Upstreams,
    hijacker: Hijacker,
}

impl Resolver {
    pub fn new(zone: TargetZone, upstreams: Upstreams, hijacker: Hijacker) -> Self {
        Self {
            zone,
            upstreams,
            hijacker,
        }
    }

    /// Process one raw DNS packet and produce the reply to send back.
    ///
    /// Returns `None` when the packet cannot be parsed (dropped: nothing
    /// sensible can be echoed back) or the reply cannot be encoded.
    pub async fn process_query(&self, packet: &[u8], protocol: Protocol) -> Option<Vec<u8>> {
        let query = match Message::from_vec(packet) {
            Ok(query) => query,
            Err(e) => {
                debug!(error = %e, protocol = protocol.as_str(), "dropping unparseable packet");
                return None;
            }
        };

        let reply = match classify(&self.zone, &query) {
            QueryClass::HijackV4 => {
                self.hijacker
                    .resolve_v4(&self.upstreams, &query, protocol)
                    .await
            }
            QueryClass::HijackV6 => {
                self.hijacker
                    .resolve_v6(&self.upstreams, &query, protocol)
                    .await
            }
            QueryClass::PassThrough => self.upstreams.resolve(&query, protocol).await,
        };

        match reply.to_vec() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "failed to encode reply");
                None
            }
        }
    }
}
