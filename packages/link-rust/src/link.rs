//! The link facade: the public surface of the messaging link.
//!
//! A [`Link`] composes the dispatch registry and the correlation table over
//! an injected transport and executor. Outbound envelopes enter through
//! [`send`](Link::send) (classified by message kind) or
//! [`invoke_method`](Link::invoke_method) (correlated request/response);
//! inbound envelopes re-enter through [`deliver`](Link::deliver), the
//! transport's callback. Each link owns its state outright -- two links
//! share nothing unless they share a transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uplink_core::attributes::AttributesError;
use uplink_core::{
    Address, Attributes, Envelope, Executor, Listener, MessageKind, Payload, Transport,
};

use crate::config::LinkConfig;
use crate::correlation::{CorrelationTable, RpcError};
use crate::dispatch::{DeliveryFailure, DeliveryReport, DispatchRegistry, RegistryError};

/// Error from [`Link::send`].
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The attributes failed kind-specific validation.
    #[error("invalid attributes: {0}")]
    Attributes(#[from] AttributesError),
    /// A listener rejected the envelope during fan-out. Fan-out still
    /// reached every listener; this reports the earliest failure.
    #[error("listener {} rejected delivery: {}", .failure.listener_index, .failure.reason)]
    Delivery {
        /// The earliest failure in registration order.
        failure: DeliveryFailure,
    },
    /// The transport failed to move the envelope. The link does not retry.
    #[error("transport failure: {0}")]
    Transport(#[source] anyhow::Error),
}

/// The public composition point: send, invoke, listen.
pub struct Link {
    registry: DispatchRegistry,
    calls: Arc<CorrelationTable>,
    transport: Arc<dyn Transport>,
    config: LinkConfig,
}

impl Link {
    /// Creates a link over `transport` with timers running on `executor`
    /// and default configuration.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, executor: Arc<dyn Executor>) -> Self {
        Self::with_config(transport, executor, LinkConfig::default())
    }

    /// Creates a link with explicit configuration.
    #[must_use]
    pub fn with_config(
        transport: Arc<dyn Transport>,
        executor: Arc<dyn Executor>,
        config: LinkConfig,
    ) -> Self {
        Self {
            registry: DispatchRegistry::new(),
            calls: CorrelationTable::new(executor),
            transport,
            config,
        }
    }

    /// Registers `listener` on `address`. Identical contract to
    /// [`DispatchRegistry::register`].
    pub fn register_listener(&self, address: Address, listener: Arc<dyn Listener>) -> bool {
        self.registry.register(address, listener)
    }

    /// Removes `listener` from `address`. Identical contract to
    /// [`DispatchRegistry::unregister`].
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if the pair is not currently registered.
    pub fn unregister_listener(
        &self,
        address: &Address,
        listener: &Arc<dyn Listener>,
    ) -> Result<(), RegistryError> {
        self.registry.unregister(address, listener)
    }

    /// Sends an envelope, classified by its attributes' kind.
    ///
    /// - PUBLISH: fans out to local listeners on `address`, then hands the
    ///   envelope to the transport for remote distribution.
    /// - RESPONSE: fans out to local listeners on the reply `address`; if
    ///   local response resolution is enabled, also offers the envelope to
    ///   the correlation table, and skips the transport when a locally
    ///   pending call consumed it.
    /// - REQUEST: transport only, fire-and-forget. Use
    ///   [`invoke_method`](Self::invoke_method) for a correlated reply.
    ///
    /// # Errors
    ///
    /// [`SendError::Attributes`] for kind-inconsistent attributes,
    /// [`SendError::Transport`] if the transport rejects the envelope, and
    /// [`SendError::Delivery`] when a local listener failed (reported after
    /// full fan-out and after the transport hand-off).
    pub async fn send(
        &self,
        address: Address,
        payload: Payload,
        attributes: Attributes,
    ) -> Result<(), SendError> {
        attributes.validate()?;
        let envelope = Envelope::new(address, payload, attributes);
        match envelope.attributes.kind {
            MessageKind::Publish => {
                let report = self.registry.publish(
                    &envelope.address,
                    &envelope.payload,
                    &envelope.attributes,
                );
                self.transport
                    .transmit(envelope)
                    .await
                    .map_err(SendError::Transport)?;
                Self::report_to_result(report)
            }
            MessageKind::Response => {
                let report = self.registry.publish(
                    &envelope.address,
                    &envelope.payload,
                    &envelope.attributes,
                );
                let mut consumed = false;
                if self.config.local_response_resolution {
                    if let Some(correlation_id) = envelope.attributes.correlation_id {
                        consumed = self.calls.resolve(&correlation_id, envelope.clone());
                    }
                }
                if consumed {
                    debug!("response consumed by a local pending call");
                } else {
                    self.transport
                        .transmit(envelope)
                        .await
                        .map_err(SendError::Transport)?;
                }
                Self::report_to_result(report)
            }
            MessageKind::Request => self
                .transport
                .transmit(envelope)
                .await
                .map_err(SendError::Transport),
        }
    }

    /// Issues a correlated remote-procedure call and resolves to the
    /// response payload.
    ///
    /// Builds a REQUEST envelope whose address is the caller's reply
    /// address and whose `sink` attribute names the destination method,
    /// registers a pending call keyed on the request's message id with a
    /// deadline of `ttl_ms` (or the configured default), and hands the
    /// envelope to the transport. Returns a future immediately; the calling
    /// thread never blocks. Dropping the returned future before resolution
    /// cancels the call.
    ///
    /// # Errors
    ///
    /// [`RpcError::InvalidRequest`] for attributes missing a sink;
    /// [`RpcError::Transport`] if the transport rejects the request;
    /// [`RpcError::Timeout`] when the deadline elapses first;
    /// [`RpcError::Cancelled`] if the call is withdrawn;
    /// [`RpcError::RemoteFailure`] when the response carries a non-OK code.
    pub async fn invoke_method(
        &self,
        address: Address,
        payload: Payload,
        mut attributes: Attributes,
    ) -> Result<Payload, RpcError> {
        attributes.kind = MessageKind::Request;
        attributes.validate()?;

        let id = attributes.id;
        let timeout = attributes
            .ttl_ms
            .map_or(self.config.default_call_timeout, Duration::from_millis);
        let reply = self.calls.register(id, timeout);

        let envelope = Envelope::new(address, payload, attributes);
        if let Err(cause) = self.transport.transmit(envelope).await {
            // The pending entry turns the transport failure into this
            // call's terminal outcome.
            self.calls.fail(&id, cause);
        }

        let response = reply.await?;
        if let Some(code) = response.attributes.code {
            if !code.is_ok() {
                return Err(RpcError::RemoteFailure(code));
            }
        }
        Ok(response.into_payload())
    }

    /// Inbound callback for the transport: an envelope addressed to this
    /// link has arrived.
    ///
    /// RESPONSE envelopes are offered to the correlation table first and
    /// fall back to reply-address listeners when no call consumed them.
    /// PUBLISH envelopes fan out on their topic address. REQUEST envelopes
    /// fan out under their sink address (local method handlers), which
    /// receive the envelope's own reply address. Malformed envelopes are
    /// dropped with a warning.
    pub fn deliver(&self, envelope: Envelope) -> DeliveryReport {
        if let Err(cause) = envelope.attributes.validate() {
            warn!(%cause, "dropping malformed inbound envelope");
            return DeliveryReport::default();
        }
        match envelope.attributes.kind {
            MessageKind::Publish => {
                self.registry
                    .publish(&envelope.address, &envelope.payload, &envelope.attributes)
            }
            MessageKind::Response => {
                if let Some(correlation_id) = envelope.attributes.correlation_id {
                    if self.calls.resolve(&correlation_id, envelope.clone()) {
                        return DeliveryReport::default();
                    }
                }
                self.registry
                    .publish(&envelope.address, &envelope.payload, &envelope.attributes)
            }
            MessageKind::Request => {
                // validate() guarantees the sink is present.
                let Some(sink) = envelope.attributes.sink.clone() else {
                    return DeliveryReport::default();
                };
                self.registry.dispatch(
                    &sink,
                    &envelope.address,
                    &envelope.payload,
                    &envelope.attributes,
                )
            }
        }
    }

    /// Number of calls currently awaiting a response.
    #[must_use]
    pub fn pending_call_count(&self) -> usize {
        self.calls.pending_count()
    }

    fn report_to_result(report: DeliveryReport) -> Result<(), SendError> {
        match report.failures.into_iter().next() {
            Some(failure) => Err(SendError::Delivery { failure }),
            None => Ok(()),
        }
    }
}
