//! Collaborator capabilities consumed by the dispatch and correlation engine.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::address::Address;
use crate::attributes::Attributes;
use crate::envelope::Envelope;
use crate::payload::Payload;

/// A unit of deferred work handed to an [`Executor`].
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Receives envelopes delivered on a registered address.
///
/// Implementations must report failures as the returned value -- a listener
/// that panics is a bug in the listener, not a condition the registry
/// handles.
pub trait Listener: Send + Sync {
    /// Called once per delivered envelope.
    ///
    /// # Errors
    ///
    /// Any error is captured by the registry, aggregated into the delivery
    /// report, and does not stop fan-out to the remaining listeners.
    fn on_receive(
        &self,
        address: &Address,
        payload: &Payload,
        attributes: &Attributes,
    ) -> anyhow::Result<()>;
}

/// Moves envelopes between processes.
///
/// The engine requires exactly one property: an envelope handed to
/// `transmit` arrives at its destination with every field intact (the
/// `to_wire`/`from_wire` round trip). Retry policy, framing, and security
/// belong to the implementation. Inbound envelopes re-enter the engine
/// through the link's deliver path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers `envelope` to its destination.
    ///
    /// # Errors
    ///
    /// Any error is surfaced to the sender unmodified; the engine does not
    /// retry.
    async fn transmit(&self, envelope: Envelope) -> anyhow::Result<()>;
}

/// Caller-supplied execution context for timers and deferred work.
///
/// The engine is agnostic to the policy behind `spawn` -- inline, pooled,
/// or cooperative -- and every engine operation is safe to invoke from the
/// executor's worker context.
pub trait Executor: Send + Sync {
    /// Runs `task` according to the executor's policy.
    fn spawn(&self, task: Task);
}
