//! Pending-call table: correlates RESPONSE envelopes back to the requests
//! that caused them, with timeout enforcement.
//!
//! Every entry moves through `PENDING -> {FULFILLED, EXPIRED, CANCELLED}`
//! exactly once. The race between a response arriving, the deadline
//! elapsing, and the caller losing interest is decided by atomic removal
//! from the map: whichever trigger removes the entry first owns the
//! terminal transition, and the losers find nothing and no-op. A timer is
//! aborted the moment its entry resolves by other means, so no timer
//! outlives its call.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::{abortable, AbortHandle};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uplink_core::attributes::AttributesError;
use uplink_core::{Envelope, Executor, MessageId, ResponseCode};

/// Terminal outcome of a remote-procedure call, surfaced through the
/// future returned by the link -- never thrown synchronously.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The request attributes failed kind-specific validation.
    #[error("invalid request attributes: {0}")]
    InvalidRequest(#[from] AttributesError),
    /// No matching response arrived before the deadline.
    #[error("call timed out after {waited_ms}ms")]
    Timeout {
        /// The deadline that elapsed, in milliseconds.
        waited_ms: u64,
    },
    /// The caller withdrew interest before resolution.
    #[error("call cancelled before a response arrived")]
    Cancelled,
    /// The transport failed to move the request.
    #[error("transport failure: {0}")]
    Transport(#[source] anyhow::Error),
    /// The remote side answered with a non-OK outcome code.
    #[error("remote method failed with {0:?}")]
    RemoteFailure(ResponseCode),
}

/// A registered call waiting for its response.
struct PendingCall {
    reply: oneshot::Sender<Result<Envelope, RpcError>>,
    timer: AbortHandle,
    timeout_ms: u64,
}

impl PendingCall {
    /// Performs the terminal transition: stops the timer and delivers the
    /// outcome. Consuming `self` makes a second transition unrepresentable.
    fn finish(self, outcome: Result<Envelope, RpcError>) {
        self.timer.abort();
        // The receiver may already be gone (caller dropped the future
        // after this entry was removed); that loses nothing.
        let _ = self.reply.send(outcome);
    }
}

/// Table of pending calls keyed by the originating request's message id.
pub struct CorrelationTable {
    pending: DashMap<MessageId, PendingCall>,
    executor: Arc<dyn Executor>,
    /// Self-reference handed to timer tasks and reply futures, so neither
    /// keeps the table alive on its own.
    weak: Weak<CorrelationTable>,
}

impl CorrelationTable {
    /// Creates an empty table whose timers run on `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            pending: DashMap::new(),
            executor,
            weak: weak.clone(),
        })
    }

    /// Registers a pending call and returns its unresolved future
    /// immediately; resolution happens asynchronously.
    ///
    /// At most one entry exists per id: a colliding registration displaces
    /// the previous entry, which resolves `Cancelled`.
    pub fn register(&self, id: MessageId, timeout: Duration) -> PendingReply {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let (reply, rx) = oneshot::channel();

        let table = self.weak.clone();
        let (timer, timer_handle) = abortable(async move {
            tokio::time::sleep(timeout).await;
            if let Some(table) = table.upgrade() {
                table.expire(&id);
            }
        });
        self.executor.spawn(Box::pin(async move {
            // An aborted timer resolves Err(Aborted); nothing to do.
            let _ = timer.await;
        }));

        let displaced = self.pending.insert(
            id,
            PendingCall {
                reply,
                timer: timer_handle,
                timeout_ms,
            },
        );
        if let Some(previous) = displaced {
            warn!(%id, "correlation id collision; cancelling displaced call");
            previous.finish(Err(RpcError::Cancelled));
        }
        debug!(%id, timeout_ms, "call registered");

        PendingReply {
            id,
            table: self.weak.clone(),
            rx,
            settled: false,
        }
    }

    /// Fulfills the call matching `correlation_id` with `envelope`.
    ///
    /// Returns whether a pending entry existed and was fulfilled; `false`
    /// means the call already resolved or the id is unknown -- a late or
    /// unroutable response, dropped by design.
    pub fn resolve(&self, correlation_id: &MessageId, envelope: Envelope) -> bool {
        match self.pending.remove(correlation_id) {
            Some((_, call)) => {
                debug!(%correlation_id, "call fulfilled");
                call.finish(Ok(envelope));
                true
            }
            None => {
                debug!(%correlation_id, "no pending call; response dropped");
                false
            }
        }
    }

    /// Expires the call with `id`, resolving its future with a timeout
    /// error. No-op if the call already resolved.
    pub fn expire(&self, id: &MessageId) {
        if let Some((_, call)) = self.pending.remove(id) {
            let waited_ms = call.timeout_ms;
            debug!(%id, waited_ms, "call expired");
            call.finish(Err(RpcError::Timeout { waited_ms }));
        }
    }

    /// Cancels the call with `id`, resolving its future with a
    /// cancellation error. No-op if the call already resolved.
    pub fn cancel(&self, id: &MessageId) {
        if let Some((_, call)) = self.pending.remove(id) {
            debug!(%id, "call cancelled");
            call.finish(Err(RpcError::Cancelled));
        }
    }

    /// Fails the call with `id` after a transport error. No-op if the call
    /// already resolved.
    pub fn fail(&self, id: &MessageId, cause: anyhow::Error) {
        if let Some((_, call)) = self.pending.remove(id) {
            warn!(%id, %cause, "call failed in transport");
            call.finish(Err(RpcError::Transport(cause)));
        }
    }

    /// Whether a call with `id` is still pending.
    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of calls currently pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Future resolving to the response envelope of a registered call.
///
/// Dropping it before resolution cancels the call and releases its timer;
/// dropping it afterwards is a no-op.
pub struct PendingReply {
    id: MessageId,
    table: Weak<CorrelationTable>,
    rx: oneshot::Receiver<Result<Envelope, RpcError>>,
    settled: bool,
}

impl PendingReply {
    /// Id of the call this future resolves.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }
}

impl Future for PendingReply {
    type Output = Result<Envelope, RpcError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => {
                this.settled = true;
                Poll::Ready(outcome)
            }
            // The sender vanished without a terminal transition, which only
            // happens when the table itself was dropped.
            Poll::Ready(Err(_)) => {
                this.settled = true;
                Poll::Ready(Err(RpcError::Cancelled))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.settled {
            if let Some(table) = self.table.upgrade() {
                table.cancel(&self.id);
            }
        }
    }
}
