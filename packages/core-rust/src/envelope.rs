//! The unit of transfer: address, payload, attributes -- plus its wire form.
//!
//! Envelopes are immutable once constructed. The wire codec is named
//! MsgPack (`rmp_serde::to_vec_named`) with camelCase keys; a transport
//! that round-trips `to_wire`/`from_wire` preserves every field losslessly,
//! which is the only contract the engine places on it.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::attributes::Attributes;
use crate::payload::Payload;

/// Error from encoding or decoding an envelope's wire form.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode envelope: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// A routable message: where it goes, what it carries, how it is handled.
///
/// The address is the topic for PUBLISH envelopes, the caller's reply
/// address for REQUEST envelopes (the destination lives in
/// `attributes.sink`), and the reply address being answered for RESPONSE
/// envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Topic or reply address.
    pub address: Address,
    /// Opaque payload bytes plus format tag.
    pub payload: Payload,
    /// Routing and correlation metadata.
    pub attributes: Attributes,
}

impl Envelope {
    /// Assembles an envelope.
    #[must_use]
    pub fn new(address: Address, payload: Payload, attributes: Attributes) -> Self {
        Self {
            address,
            payload,
            attributes,
        }
    }

    /// Consumes the envelope, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Encodes to named MsgPack.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn to_wire(&self) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decodes from named MsgPack.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] for malformed input, including
    /// unrecognized message kinds.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
