//! Hijack processing for target-zone queries.
//!
//! Forwards the query like any other, then walks the answer section and
//! injects a host route for every returned address before the reply goes
//! back to the client. Routing is a side channel; the reply content is
//! never modified. The one exception is AAAA with IPv6 rerouting disabled:
//! no forwarding happens and the client gets an empty NOERROR reply.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{Name, RData};
use tracing::{debug, info, warn};

use crate::backend::RouteBackend;
use crate::resolver::synthesize_reply;
use crate::routes::RouteTable;
use crate::transport::Protocol;
use crate::upstream::Upstreams;

/// Prefix length of injected IPv4 host routes.
const V4_PREFIX_LEN: u8 = 32;
/// Prefix length of injected IPv6 host routes.
const V6_PREFIX_LEN: u8 = 128;

/// Processes hijacked queries: forward, inspect answers, inject routes.
pub struct Hijacker {
    routes: Arc<RouteTable>,
    backend: Arc<dyn RouteBackend>,
    gateway4: Ipv4Addr,
    gateway6: Option<Ipv6Addr>,
}

impl Hijacker {
    pub fn new(
        routes: Arc<RouteTable>,
        backend: Arc<dyn RouteBackend>,
        gateway4: Ipv4Addr,
        gateway6: Option<Ipv6Addr>,
    ) -> Self {
        Self {
            routes,
            backend,
            gateway4,
            gateway6,
        }
    }

    /// Handle a target-zone A query: forward, then reroute every IPv4
    /// address in the answer section.
    pub async fn resolve_v4(
        &self,
        upstreams: &Upstreams,
        query: &Message,
        protocol: Protocol,
    ) -> Message {
        let reply = upstreams.resolve(query, protocol).await;

        for answer in reply.answers() {
            match answer.data() {
                RData::A(a) => self.reroute_v4(a.0, answer.name()),
                // Upstreams are not trusted to be well-formed.
                RData::AAAA(aaaa) => {
                    warn!(
                        address = %aaaa.0,
                        name = %answer.name(),
                        "AAAA record in A reply, not rerouting"
                    );
                }
                _ => {}
            }
        }

        reply
    }

    /// Handle a target-zone AAAA query.
    ///
    /// With a configured IPv6 gateway this mirrors [`Self::resolve_v4`] for
    /// AAAA records. Without one the query is answered locally with an
    /// empty NOERROR reply, never NXDOMAIN: NXDOMAIN makes some client
    /// stacks treat the whole name as unreachable instead of falling back
    /// to A.
    pub async fn resolve_v6(
        &self,
        upstreams: &Upstreams,
        query: &Message,
        protocol: Protocol,
    ) -> Message {
        let Some(gateway6) = self.gateway6 else {
            if let Some(question) = query.queries().first() {
                debug!(name = %question.name(), "suppressing AAAA for target zone");
            }
            return synthesize_reply(query, ResponseCode::NoError);
        };

        let reply = upstreams.resolve(query, protocol).await;

        for answer in reply.answers() {
            match answer.data() {
                RData::AAAA(aaaa) => self.reroute_v6(aaaa.0, answer.name(), gateway6),
                RData::A(a) => {
                    warn!(
                        address = %a.0,
                        name = %answer.name(),
                        "A record in AAAA reply, not rerouting"
                    );
                }
                _ => {}
            }
        }

        reply
    }

    fn reroute_v4(&self, address: Ipv4Addr, name: &Name) {
        if self.routes.register_v4(address) {
            info!(address = %address, name = %name, "rerouting address");
        } else {
            debug!(address = %address, name = %name, "address already rerouted");
        }

        // The backend call stays unconditional: the route may have been
        // lost outside this process, and the command tolerates duplicates.
        self.backend.add(
            IpAddr::V4(address),
            V4_PREFIX_LEN,
            IpAddr::V4(self.gateway4),
        );
    }

    fn reroute_v6(&self, address: Ipv6Addr, name: &Name, gateway6: Ipv6Addr) {
        if self.routes.register_v6(address) {
            info!(address = %address, name = %name, "rerouting address");
        } else {
            debug!(address = %address, name = %name, "address already rerouted");
        }

        self.backend
            .add(IpAddr::V6(address), V6_PREFIX_LEN, IpAddr::V6(gateway6));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{MessageType, OpCode, Query};
    use hickory_proto::rr::rdata::{A, AAAA};
    use hickory_proto::rr::{DNSClass, Record, RecordType};
    use std::net::SocketAddr;
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    use crate::transport::MAX_DNS_PACKET_SIZE;

    const TEST_TIMEOUT: Duration = Duration::from_millis(250);
    const GATEWAY4: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const GATEWAY6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1);

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RouteBackend for RecordingBackend {
        fn add(&self, destination: IpAddr, prefix_len: u8, gateway: IpAddr) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("add {destination}/{prefix_len} via {gateway}"));
        }

        fn remove(&self, destination: IpAddr, prefix_len: u8) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("remove {destination}/{prefix_len}"));
        }
    }

    fn query(id: u16, name: &str, qtype: RecordType) -> Message {
        let mut question = Query::new();
        question.set_name(Name::from_str(name).unwrap());
        question.set_query_type(qtype);
        question.set_query_class(DNSClass::IN);

        let mut message = Message::new(id, MessageType::Query, OpCode::Query);
        message.set_recursion_desired(true);
        message.add_query(question);
        message
    }

    /// Mock upstream answering every query with the given records.
    async fn spawn_upstream(rdatas: Vec<RData>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
            loop {
                let Ok((len, src)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let request = Message::from_vec(&buf[..len]).unwrap();
                let name = request.queries()[0].name().clone();

                let mut reply = synthesize_reply(&request, ResponseCode::NoError);
                for rdata in &rdatas {
                    reply.add_answer(Record::from_rdata(name.clone(), 60, rdata.clone()));
                }
                socket
                    .send_to(&reply.to_vec().unwrap(), src)
                    .await
                    .unwrap();
            }
        });

        addr
    }

    fn pool(upstream: SocketAddr) -> Upstreams {
        Upstreams::new(vec![upstream]).with_attempt_timeout(TEST_TIMEOUT)
    }

    fn hijacker(
        routes: &Arc<RouteTable>,
        backend: &Arc<RecordingBackend>,
        gateway6: Option<Ipv6Addr>,
    ) -> Hijacker {
        Hijacker::new(routes.clone(), backend.clone(), GATEWAY4, gateway6)
    }

    #[tokio::test]
    async fn v4_hijack_registers_and_routes_answers() {
        let upstream = spawn_upstream(vec![
            RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
            RData::A(A(Ipv4Addr::new(93, 184, 216, 35))),
        ])
        .await;
        let routes = Arc::new(RouteTable::new(false));
        let backend = Arc::new(RecordingBackend::default());
        let hijacker = hijacker(&routes, &backend, None);

        let request = query(11, "foo.netflix.com.", RecordType::A);
        let reply = hijacker
            .resolve_v4(&pool(upstream), &request, Protocol::Udp)
            .await;

        assert_eq!(reply.answers().len(), 2);
        let mut routed = routes.routed_v4();
        routed.sort();
        assert_eq!(
            routed,
            vec![
                Ipv4Addr::new(93, 184, 216, 34),
                Ipv4Addr::new(93, 184, 216, 35)
            ]
        );
        let calls = backend.calls();
        assert!(calls.contains(&"add 93.184.216.34/32 via 10.0.0.1".to_string()));
        assert!(calls.contains(&"add 93.184.216.35/32 via 10.0.0.1".to_string()));
    }

    #[tokio::test]
    async fn repeated_hijack_does_not_grow_route_set() {
        let upstream = spawn_upstream(vec![RData::A(A(Ipv4Addr::new(93, 184, 216, 34)))]).await;
        let routes = Arc::new(RouteTable::new(false));
        let backend = Arc::new(RecordingBackend::default());
        let hijacker = hijacker(&routes, &backend, None);
        let upstreams = pool(upstream);

        let request = query(12, "foo.netflix.com.", RecordType::A);
        hijacker
            .resolve_v4(&upstreams, &request, Protocol::Udp)
            .await;
        hijacker
            .resolve_v4(&upstreams, &request, Protocol::Udp)
            .await;

        assert_eq!(routes.routed_v4().len(), 1);
        // The backend call itself stays unconditional.
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn disabled_v6_answers_empty_success_without_forwarding() {
        // No upstream at all: forwarding would hang or fail loudly.
        let routes = Arc::new(RouteTable::new(false));
        let backend = Arc::new(RecordingBackend::default());
        let hijacker = hijacker(&routes, &backend, None);
        let upstreams = Upstreams::new(Vec::new()).with_attempt_timeout(TEST_TIMEOUT);

        let request = query(13, "foo.netflix.com.", RecordType::AAAA);
        let reply = hijacker
            .resolve_v6(&upstreams, &request, Protocol::Udp)
            .await;

        assert_eq!(reply.response_code(), ResponseCode::NoError);
        assert_eq!(reply.id(), 13);
        assert!(reply.answers().is_empty());
        assert!(backend.calls().is_empty());
        assert!(routes.routed_v6().is_empty());
    }

    #[tokio::test]
    async fn enabled_v6_registers_and_routes_answers() {
        let upstream = spawn_upstream(vec![RData::AAAA(AAAA(Ipv6Addr::new(
            0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x10,
        )))])
        .await;
        let routes = Arc::new(RouteTable::new(true));
        let backend = Arc::new(RecordingBackend::default());
        let hijacker = hijacker(&routes, &backend, Some(GATEWAY6));

        let request = query(14, "foo.netflix.com.", RecordType::AAAA);
        let reply = hijacker
            .resolve_v6(&pool(upstream), &request, Protocol::Udp)
            .await;

        assert_eq!(reply.answers().len(), 1);
        assert_eq!(
            routes.routed_v6(),
            vec![Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x10)]
        );
        assert_eq!(
            backend.calls(),
            vec!["add 2001:db8::10/128 via fd00::1".to_string()]
        );
    }

    #[tokio::test]
    async fn wrong_family_answer_is_not_routed() {
        // A malformed upstream returns AAAA records for an A question.
        let upstream = spawn_upstream(vec![RData::AAAA(AAAA(Ipv6Addr::LOCALHOST))]).await;
        let routes = Arc::new(RouteTable::new(true));
        let backend = Arc::new(RecordingBackend::default());
        let hijacker = hijacker(&routes, &backend, Some(GATEWAY6));

        let request = query(15, "foo.netflix.com.", RecordType::A);
        let reply = hijacker
            .resolve_v4(&pool(upstream), &request, Protocol::Udp)
            .await;

        // Reply content is untouched; nothing was registered or routed.
        assert_eq!(reply.answers().len(), 1);
        assert!(routes.routed_v4().is_empty());
        assert!(routes.routed_v6().is_empty());
        assert!(backend.calls().is_empty());
    }
}
