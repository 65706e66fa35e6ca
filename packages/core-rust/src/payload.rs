//! Opaque message payloads.
//!
//! The engine never interprets payload bytes; the format tag travels with
//! them so endpoints can pick a codec. Bytes serialize through
//! `serde_bytes` to keep the MsgPack binary representation compact.

use serde::{Deserialize, Serialize};

/// Declared encoding of a payload's bytes.
///
/// Informational only -- the dispatch and correlation engine treats all
/// payloads as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadFormat {
    /// No declared format.
    #[default]
    Unspecified,
    /// Protobuf-encoded message.
    Protobuf,
    /// Raw application-defined bytes.
    Raw,
    /// UTF-8 text.
    Text,
    /// JSON document.
    Json,
}

/// An opaque byte payload plus its declared format.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// The payload bytes, untouched by the engine.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Declared encoding of `data`.
    pub format: PayloadFormat,
}

impl Payload {
    /// An empty payload with no declared format.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Raw application-defined bytes.
    #[must_use]
    pub fn raw(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            format: PayloadFormat::Raw,
        }
    }

    /// UTF-8 text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            data: text.into().into_bytes(),
            format: PayloadFormat::Text,
        }
    }

    /// Protobuf-encoded bytes produced by an external codec.
    #[must_use]
    pub fn protobuf(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            format: PayloadFormat::Protobuf,
        }
    }

    /// Serializes `value` to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if `value` cannot be
    /// serialized.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: serde_json::to_vec(value)?,
            format: PayloadFormat::Json,
        })
    }

    /// Number of payload bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_format() {
        assert_eq!(Payload::empty().format, PayloadFormat::Unspecified);
        assert_eq!(Payload::raw([1, 2, 3]).format, PayloadFormat::Raw);
        assert_eq!(Payload::text("hi").format, PayloadFormat::Text);
        assert_eq!(Payload::protobuf([0x08, 0x03]).format, PayloadFormat::Protobuf);
    }

    #[test]
    fn text_preserves_utf8_bytes() {
        let payload = Payload::text("döner");
        assert_eq!(payload.data, "döner".as_bytes());
        assert_eq!(payload.len(), "döner".len());
        assert!(!payload.is_empty());
    }

    #[test]
    fn json_constructor_roundtrips() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Reading {
            value: i32,
        }

        let payload = Payload::json(&Reading { value: 3 }).unwrap();
        assert_eq!(payload.format, PayloadFormat::Json);
        let decoded: Reading = serde_json::from_slice(&payload.data).unwrap();
        assert_eq!(decoded, Reading { value: 3 });
    }

    #[test]
    fn format_serializes_to_screaming_snake_case() {
        let bytes = rmp_serde::to_vec_named(&PayloadFormat::Protobuf).unwrap();
        let s: String = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(s, "PROTOBUF");

        let bytes = rmp_serde::to_vec_named(&PayloadFormat::Unspecified).unwrap();
        let s: String = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(s, "UNSPECIFIED");
    }

    #[test]
    fn binary_data_roundtrips_through_msgpack() {
        let payload = Payload::raw(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let bytes = rmp_serde::to_vec_named(&payload).unwrap();
        let decoded: Payload = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }
}
