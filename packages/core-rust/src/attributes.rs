//! Message attributes: kind, priority, lifetime, and correlation metadata.
//!
//! Attributes classify an envelope as PUBLISH, REQUEST, or RESPONSE and
//! carry everything the dispatch and correlation engine needs to route it:
//! a unique message id, an informational priority, an optional time-to-live,
//! the destination sink for requests, and the correlation id plus outcome
//! code for responses.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;

/// Classification of a message. Closed set -- unknown kinds can only enter
/// from the wire and are rejected while decoding an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Fan-out to topic listeners.
    Publish,
    /// RPC request expecting a correlated response.
    Request,
    /// RPC response referencing an originating request.
    Response,
}

/// Informational delivery priority. Ordered, but the engine does not
/// reorder deliveries by it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Background traffic.
    Low,
    /// Default traffic class.
    #[default]
    Standard,
    /// Elevated traffic, e.g. operator-facing events.
    High,
    /// Safety-relevant traffic.
    Critical,
}

/// Unique per-envelope identifier; doubles as the correlation key linking a
/// response back to its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome code carried on a RESPONSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    /// The remote method completed successfully.
    #[default]
    Ok,
    /// The request was malformed for the remote method.
    InvalidArgument,
    /// The addressed method or entity does not exist.
    NotFound,
    /// The remote side gave up on the deadline.
    DeadlineExceeded,
    /// The remote entity is temporarily unavailable.
    Unavailable,
    /// The remote method failed internally.
    Internal,
}

impl ResponseCode {
    /// Whether this code reports success.
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Error from kind-specific attribute validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributesError {
    #[error("request attributes require a sink address")]
    MissingSink,
    #[error("response attributes require a correlation id")]
    MissingCorrelation,
}

/// Metadata describing how an envelope is routed and correlated.
///
/// Immutable by convention once attached to an envelope. The builder-style
/// constructors generate a fresh message id; `with_id` exists for replaying
/// a known id in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    /// Message classification.
    pub kind: MessageKind,
    /// Unique envelope id; for requests, also the correlation key.
    pub id: MessageId,
    /// Informational priority.
    pub priority: Priority,
    /// Time-to-live in milliseconds; for requests, the call deadline.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ttl_ms: Option<u64>,
    /// Destination method address (REQUEST only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sink: Option<Address>,
    /// Id of the originating request (RESPONSE only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation_id: Option<MessageId>,
    /// Outcome of the remote call (RESPONSE only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code: Option<ResponseCode>,
}

impl Attributes {
    /// Attributes for a topic publication.
    #[must_use]
    pub fn publish(priority: Priority) -> Self {
        Self {
            kind: MessageKind::Publish,
            id: MessageId::generate(),
            priority,
            ttl_ms: None,
            sink: None,
            correlation_id: None,
            code: None,
        }
    }

    /// Attributes for an RPC request to `sink` with a `ttl_ms` deadline.
    #[must_use]
    pub fn request(priority: Priority, sink: Address, ttl_ms: u64) -> Self {
        Self {
            kind: MessageKind::Request,
            id: MessageId::generate(),
            priority,
            ttl_ms: Some(ttl_ms),
            sink: Some(sink),
            correlation_id: None,
            code: None,
        }
    }

    /// Attributes for an RPC response to the request identified by
    /// `correlation_id`.
    #[must_use]
    pub fn response(priority: Priority, correlation_id: MessageId, code: ResponseCode) -> Self {
        Self {
            kind: MessageKind::Response,
            id: MessageId::generate(),
            priority,
            ttl_ms: None,
            sink: None,
            correlation_id: Some(correlation_id),
            code: Some(code),
        }
    }

    /// Replaces the generated message id.
    #[must_use]
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Sets the time-to-live.
    #[must_use]
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// Replaces the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Checks kind-specific field requirements.
    ///
    /// # Errors
    ///
    /// [`AttributesError::MissingSink`] for a REQUEST without a sink,
    /// [`AttributesError::MissingCorrelation`] for a RESPONSE without a
    /// correlation id.
    pub fn validate(&self) -> Result<(), AttributesError> {
        match self.kind {
            MessageKind::Publish => Ok(()),
            MessageKind::Request => {
                if self.sink.is_none() {
                    return Err(AttributesError::MissingSink);
                }
                Ok(())
            }
            MessageKind::Response => {
                if self.correlation_id.is_none() {
                    return Err(AttributesError::MissingCorrelation);
                }
                Ok(())
            }
        }
    }
}
