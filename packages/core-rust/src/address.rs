//! Structured addressing for topics and RPC endpoints.
//!
//! An [`Address`] names either a publish/subscribe topic or an RPC method,
//! composed of an entity segment (software entity name + major version) and
//! a resource segment (resource name, optional instance, optional message
//! type). Addresses are immutable, compare structurally, and hash by value
//! so they can key the dispatch registry directly.
//!
//! Canonical long form, used for logging and the `Display`/`FromStr` round
//! trip: `/{entity}/{major}/{resource}[.{instance}][#{message}]`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Resource name reserved for RPC endpoints.
const RPC_RESOURCE: &str = "rpc";

/// Resource instance naming the reply endpoint of an RPC caller.
const RPC_RESPONSE_INSTANCE: &str = "response";

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid segment pattern"))
}

/// Error returned when an address segment fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAddress {
    #[error("entity name must not be empty")]
    EmptyEntityName,
    #[error("resource name must not be empty")]
    EmptyResourceName,
    #[error("segment {segment:?} contains characters outside [A-Za-z0-9_.-]")]
    InvalidSegment { segment: String },
    #[error("cannot parse address from {input:?}")]
    Unparseable { input: String },
}

/// The software entity a message originates from or is destined to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Entity name, e.g. `"body.access"`.
    pub name: String,
    /// Major version of the entity's interface.
    pub version_major: u8,
}

impl Entity {
    /// Creates an entity segment.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidAddress`] if `name` is empty or carries characters
    /// outside `[A-Za-z0-9_.-]`.
    pub fn new(name: impl Into<String>, version_major: u8) -> Result<Self, InvalidAddress> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidAddress::EmptyEntityName);
        }
        validate_segment(&name)?;
        Ok(Self {
            name,
            version_major,
        })
    }
}

/// The resource (topic leaf or RPC method) within an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource name, e.g. `"door"` or the reserved `"rpc"`.
    pub name: String,
    /// Optional instance qualifier, e.g. `"front_left"` or an RPC method name.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instance: Option<String>,
    /// Optional message type carried on this resource, e.g. `"Door"`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl Resource {
    /// Creates a resource segment.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidAddress`] if `name` is empty, or if any present
    /// segment carries characters outside `[A-Za-z0-9_.-]`.
    pub fn new(
        name: impl Into<String>,
        instance: Option<String>,
        message: Option<String>,
    ) -> Result<Self, InvalidAddress> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidAddress::EmptyResourceName);
        }
        validate_segment(&name)?;
        if let Some(instance) = &instance {
            validate_segment(instance)?;
        }
        if let Some(message) = &message {
            validate_segment(message)?;
        }
        Ok(Self {
            name,
            instance,
            message,
        })
    }

    /// Resource naming an RPC method on the destination entity.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidAddress`] if `method` is empty or invalid.
    pub fn rpc_request(method: impl Into<String>) -> Result<Self, InvalidAddress> {
        let method = method.into();
        if method.is_empty() {
            return Err(InvalidAddress::EmptyResourceName);
        }
        Self::new(RPC_RESOURCE, Some(method), None)
    }

    /// Resource naming the reply endpoint of an RPC caller.
    #[must_use]
    pub fn rpc_response() -> Self {
        Self {
            name: RPC_RESOURCE.to_string(),
            instance: Some(RPC_RESPONSE_INSTANCE.to_string()),
            message: None,
        }
    }
}

/// A fully-qualified topic or RPC endpoint name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// The owning software entity.
    pub entity: Entity,
    /// The resource within that entity.
    pub resource: Resource,
}

impl Address {
    /// Combines validated segments into an address.
    #[must_use]
    pub fn new(entity: Entity, resource: Resource) -> Self {
        Self { entity, resource }
    }

    /// Whether this address names an RPC method (request destination).
    #[must_use]
    pub fn is_rpc_request(&self) -> bool {
        self.resource.name == RPC_RESOURCE
            && self
                .resource
                .instance
                .as_deref()
                .is_some_and(|instance| instance != RPC_RESPONSE_INSTANCE)
    }

    /// Whether this address names an RPC caller's reply endpoint.
    #[must_use]
    pub fn is_rpc_response(&self) -> bool {
        self.resource.name == RPC_RESOURCE
            && self.resource.instance.as_deref() == Some(RPC_RESPONSE_INSTANCE)
    }
}

fn validate_segment(segment: &str) -> Result<(), InvalidAddress> {
    if segment_pattern().is_match(segment) {
        Ok(())
    } else {
        Err(InvalidAddress::InvalidSegment {
            segment: segment.to_string(),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}/{}/{}",
            self.entity.name, self.entity.version_major, self.resource.name
        )?;
        if let Some(instance) = &self.resource.instance {
            write!(f, ".{instance}")?;
        }
        if let Some(message) = &self.resource.message {
            write!(f, "#{message}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = InvalidAddress;

    /// Parses the canonical long form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparseable = || InvalidAddress::Unparseable {
            input: s.to_string(),
        };

        let rest = s.strip_prefix('/').ok_or_else(unparseable)?;
        let mut parts = rest.splitn(3, '/');
        let entity_name = parts.next().ok_or_else(unparseable)?;
        let version = parts
            .next()
            .and_then(|v| v.parse::<u8>().ok())
            .ok_or_else(unparseable)?;
        let resource_part = parts.next().ok_or_else(unparseable)?;

        let (resource_part, message) = match resource_part.split_once('#') {
            Some((head, message)) => (head, Some(message.to_string())),
            None => (resource_part, None),
        };
        // Only the first dot separates name from instance: entity names may
        // themselves contain dots, resource names keep the same freedom.
        let (name, instance) = match resource_part.split_once('.') {
            Some((name, instance)) => (name, Some(instance.to_string())),
            None => (resource_part, None),
        };

        Ok(Self::new(
            Entity::new(entity_name, version)?,
            Resource::new(name, instance, message)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    fn door_topic() -> Address {
        Address::new(
            Entity::new("body.access", 1).unwrap(),
            Resource::new("door", Some("front_left".into()), Some("Door".into())).unwrap(),
        )
    }

    #[test]
    fn construct_valid_address() {
        let address = door_topic();
        assert_eq!(address.entity.name, "body.access");
        assert_eq!(address.entity.version_major, 1);
        assert_eq!(address.resource.instance.as_deref(), Some("front_left"));
    }

    #[test]
    fn empty_entity_name_rejected() {
        assert_eq!(Entity::new("", 1), Err(InvalidAddress::EmptyEntityName));
    }

    #[test]
    fn empty_resource_name_rejected() {
        assert_eq!(
            Resource::new("", None, None),
            Err(InvalidAddress::EmptyResourceName)
        );
    }

    #[test]
    fn invalid_characters_rejected() {
        let err = Entity::new("body access", 1).unwrap_err();
        assert!(matches!(err, InvalidAddress::InvalidSegment { .. }));

        let err = Resource::new("door", Some("front/left".into()), None).unwrap_err();
        assert!(matches!(err, InvalidAddress::InvalidSegment { .. }));
    }

    #[test]
    fn display_canonical_form() {
        assert_eq!(door_topic().to_string(), "/body.access/1/door.front_left#Door");

        let bare = Address::new(
            Entity::new("hr", 1).unwrap(),
            Resource::new("status", None, None).unwrap(),
        );
        assert_eq!(bare.to_string(), "/hr/1/status");
    }

    #[test]
    fn parse_roundtrip() {
        for text in [
            "/body.access/1/door.front_left#Door",
            "/hr/1/rpc.Raise",
            "/hartley/1/rpc.response",
            "/telemetry/3/wheel",
        ] {
            let address: Address = text.parse().unwrap();
            assert_eq!(address.to_string(), text);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        for text in ["", "no-slash", "/only/two", "/a/notanumber/r"] {
            assert!(text.parse::<Address>().is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn rpc_helpers() {
        let request = Address::new(
            Entity::new("hr", 1).unwrap(),
            Resource::rpc_request("Raise").unwrap(),
        );
        assert!(request.is_rpc_request());
        assert!(!request.is_rpc_response());
        assert_eq!(request.to_string(), "/hr/1/rpc.Raise");

        let response = Address::new(Entity::new("hartley", 1).unwrap(), Resource::rpc_response());
        assert!(response.is_rpc_response());
        assert!(!response.is_rpc_request());
    }

    #[test]
    fn usable_as_map_key() {
        let mut map = HashMap::new();
        map.insert(door_topic(), 7);
        // A structurally-equal address built independently finds the entry.
        assert_eq!(map.get(&door_topic()), Some(&7));
    }

    fn segment_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_\\-]{1,12}"
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(
            entity in segment_strategy(),
            version in 0u8..=255,
            resource in segment_strategy(),
            instance in proptest::option::of(segment_strategy()),
            message in proptest::option::of(segment_strategy()),
        ) {
            let address = Address::new(
                Entity::new(entity, version).unwrap(),
                Resource::new(resource, instance, message).unwrap(),
            );
            let reparsed: Address = address.to_string().parse().unwrap();
            prop_assert_eq!(reparsed, address);
        }
    }
}
