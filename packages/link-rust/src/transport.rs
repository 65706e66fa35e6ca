//! In-process transport implementations.
//!
//! [`NullTransport`] is the steady state for links that never leave the
//! process; [`ChannelTransport`] pairs two links over bounded mpsc
//! channels, giving tests and single-process deployments a real transport
//! with backpressure.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uplink_core::{Envelope, Executor, Transport};

use crate::link::Link;

/// Transport that discards every envelope.
///
/// Useful when all traffic is in-process (publish fan-out and local
/// response resolution never need the wire) and as the "never responds"
/// end of timeout scenarios.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn transmit(&self, envelope: Envelope) -> anyhow::Result<()> {
        debug!(address = %envelope.address, "discarding envelope");
        Ok(())
    }
}

/// One end of an in-process transport pair.
///
/// `transmit` enqueues onto the peer's bounded inbound channel, applying
/// backpressure when the peer falls behind. [`attach`](Self::attach) spawns
/// the inbound pump feeding this end's link.
pub struct ChannelTransport {
    peer: mpsc::Sender<Envelope>,
    inbound: Mutex<Option<mpsc::Receiver<Envelope>>>,
}

impl ChannelTransport {
    /// Creates two connected ends with `capacity` envelopes of buffering
    /// in each direction.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a zero-capacity channel cannot exist).
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(capacity);
        let (b_tx, b_rx) = mpsc::channel(capacity);
        (
            Self {
                peer: b_tx,
                inbound: Mutex::new(Some(a_rx)),
            },
            Self {
                peer: a_tx,
                inbound: Mutex::new(Some(b_rx)),
            },
        )
    }

    /// Starts the inbound pump: envelopes sent by the peer are handed to
    /// `link.deliver` on `executor`. A second attach is a no-op.
    pub fn attach(&self, link: Arc<Link>, executor: &dyn Executor) {
        let Some(mut inbound) = self.inbound.lock().take() else {
            warn!("transport already attached");
            return;
        };
        executor.spawn(Box::pin(async move {
            while let Some(envelope) = inbound.recv().await {
                link.deliver(envelope);
            }
            debug!("peer gone; inbound pump stopped");
        }));
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn transmit(&self, envelope: Envelope) -> anyhow::Result<()> {
        self.peer
            .send(envelope)
            .await
            .map_err(|_| anyhow::anyhow!("peer link is gone"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;
    use std::time::Duration;

    use uplink_core::{
        Address, Attributes, Entity, Listener, Payload, Priority, Resource, ResponseCode,
    };

    use super::*;
    use crate::executor::TokioExecutor;

    fn telemetry_topic() -> Address {
        Address::new(
            Entity::new("telemetry", 1).unwrap(),
            Resource::new("wheel", None, None).unwrap(),
        )
    }

    fn method_address() -> Address {
        Address::new(
            Entity::new("math", 1).unwrap(),
            Resource::rpc_request("Double").unwrap(),
        )
    }

    fn reply_address() -> Address {
        Address::new(Entity::new("caller", 1).unwrap(), Resource::rpc_response())
    }

    /// Listener that records payloads.
    struct Recording {
        seen: Mutex<Vec<Payload>>,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Listener for Recording {
        fn on_receive(
            &self,
            _: &Address,
            payload: &Payload,
            _: &Attributes,
        ) -> anyhow::Result<()> {
            self.seen.lock().push(payload.clone());
            Ok(())
        }
    }

    /// Method handler that doubles each payload byte and replies.
    struct Doubler {
        link: Mutex<Weak<Link>>,
    }

    impl Listener for Doubler {
        fn on_receive(
            &self,
            address: &Address,
            payload: &Payload,
            attributes: &Attributes,
        ) -> anyhow::Result<()> {
            let link = self
                .link
                .lock()
                .upgrade()
                .ok_or_else(|| anyhow::anyhow!("serving link is gone"))?;
            let response = Envelope::new(
                address.clone(),
                Payload::raw(payload.data.iter().map(|b| b * 2).collect::<Vec<u8>>()),
                Attributes::response(attributes.priority, attributes.id, ResponseCode::Ok),
            );
            tokio::spawn(async move {
                let outcome = link
                    .send(response.address, response.payload, response.attributes)
                    .await;
                assert!(outcome.is_ok());
            });
            Ok(())
        }
    }

    fn linked_pair() -> (Arc<Link>, Arc<Link>) {
        let (client_end, server_end) = ChannelTransport::pair(16);
        let client_end = Arc::new(client_end);
        let server_end = Arc::new(server_end);
        let executor = Arc::new(TokioExecutor);

        let client = Arc::new(Link::new(client_end.clone(), executor.clone()));
        let server = Arc::new(Link::new(server_end.clone(), executor.clone()));
        client_end.attach(client.clone(), executor.as_ref());
        server_end.attach(server.clone(), executor.as_ref());
        (client, server)
    }

    #[tokio::test]
    async fn null_transport_discards() {
        let transport = NullTransport;
        let envelope = Envelope::new(
            telemetry_topic(),
            Payload::empty(),
            Attributes::publish(Priority::Standard),
        );
        assert!(transport.transmit(envelope).await.is_ok());
    }

    #[tokio::test]
    async fn publish_crosses_the_pair() {
        let (client, server) = linked_pair();
        let listener = Recording::new();
        server.register_listener(telemetry_topic(), listener.clone());

        client
            .send(
                telemetry_topic(),
                Payload::raw([1, 2]),
                Attributes::publish(Priority::Standard),
            )
            .await
            .unwrap();

        // Give the inbound pump a turn.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*listener.seen.lock(), vec![Payload::raw([1, 2])]);
    }

    #[tokio::test]
    async fn rpc_round_trip_between_two_links() {
        // Opt-in log output for debugging: UPLINK_LOG=debug cargo test
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("UPLINK_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
            )
            .try_init();

        let (client, server) = linked_pair();
        let handler = Arc::new(Doubler {
            link: Mutex::new(Arc::downgrade(&server)),
        });
        server.register_listener(method_address(), handler);

        let attributes = Attributes::request(Priority::Standard, method_address(), 1000);
        let payload = client
            .invoke_method(reply_address(), Payload::raw([1, 2, 3]), attributes)
            .await
            .unwrap();

        assert_eq!(payload, Payload::raw([2, 4, 6]));
        assert_eq!(client.pending_call_count(), 0);
        assert_eq!(server.pending_call_count(), 0);
    }

    #[tokio::test]
    async fn transmit_to_a_dropped_peer_fails() {
        let (alive, gone) = ChannelTransport::pair(4);
        // Dropping the peer end closes its inbound receiver.
        drop(gone);

        let envelope = Envelope::new(
            telemetry_topic(),
            Payload::empty(),
            Attributes::publish(Priority::Standard),
        );
        assert!(alive.transmit(envelope).await.is_err());
    }

    #[tokio::test]
    async fn second_attach_is_a_noop() {
        let (end, _peer) = ChannelTransport::pair(4);
        let end = Arc::new(end);
        let executor = TokioExecutor;
        let link = Arc::new(Link::new(end.clone(), Arc::new(TokioExecutor)));
        end.attach(link.clone(), &executor);
        end.attach(link, &executor);
    }
}
