//! Topic-based listener registry and fan-out.
//!
//! Maps each [`Address`] to the listeners registered on it, via `DashMap`
//! for lock-free concurrent registration and lookup. Delivery is
//! synchronous, in registration order, against a snapshot of the listeners
//! present at the moment of the call -- listeners added mid-delivery are
//! first invoked on the next publish.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};
use uplink_core::{Address, Attributes, Listener, Payload};

/// Error returned by listener registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The (address, listener) pair is not currently registered.
    #[error("no such listener registered on {address}")]
    NotFound {
        /// Canonical form of the address the caller targeted.
        address: String,
    },
}

/// One listener's failure during fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Position of the failing listener in registration order.
    pub listener_index: usize,
    /// Rendered failure cause.
    pub reason: String,
}

/// Outcome of a single publish: how many listeners were invoked and which
/// of them failed. Fan-out never short-circuits, so `failures` can hold
/// more than one entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    /// Number of listeners in the delivery snapshot.
    pub attempted: usize,
    /// Failures in registration order.
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// Whether every listener (possibly zero) accepted the envelope.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// The earliest failure, if any -- what a publisher reports.
    #[must_use]
    pub fn first_failure(&self) -> Option<&DeliveryFailure> {
        self.failures.first()
    }
}

/// Concurrent topic -> listeners map with snapshot fan-out.
#[derive(Default)]
pub struct DispatchRegistry {
    topics: DashMap<Address, Vec<Arc<dyn Listener>>>,
}

impl DispatchRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` on `address`, in registration order.
    ///
    /// Returns `true` if the pair was newly registered. Registering the
    /// identical pair twice (same `Arc` identity) is an idempotent no-op
    /// returning `false` -- it never duplicates delivery.
    pub fn register(&self, address: Address, listener: Arc<dyn Listener>) -> bool {
        let mut listeners = self.topics.entry(address).or_default();
        if listeners.iter().any(|known| Arc::ptr_eq(known, &listener)) {
            debug!(count = listeners.len(), "listener already registered");
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Removes `listener` from `address`.
    ///
    /// Removing the last listener for an address prunes the address entry.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if the pair is not currently registered.
    pub fn unregister(
        &self,
        address: &Address,
        listener: &Arc<dyn Listener>,
    ) -> Result<(), RegistryError> {
        let not_found = || RegistryError::NotFound {
            address: address.to_string(),
        };

        let removed = {
            let mut listeners = self.topics.get_mut(address).ok_or_else(not_found)?;
            let before = listeners.len();
            listeners.retain(|known| !Arc::ptr_eq(known, listener));
            before != listeners.len()
        };
        if !removed {
            return Err(not_found());
        }
        self.topics
            .remove_if(address, |_, listeners| listeners.is_empty());
        Ok(())
    }

    /// Delivers to every listener registered on `address` at the moment of
    /// the call, in registration order.
    ///
    /// A failing listener never stops fan-out; all failures are collected
    /// into the report. Zero registered listeners is a valid steady state
    /// and reports OK.
    pub fn publish(
        &self,
        address: &Address,
        payload: &Payload,
        attributes: &Attributes,
    ) -> DeliveryReport {
        self.dispatch(address, address, payload, attributes)
    }

    /// Like [`publish`](Self::publish), but looks listeners up under `key`
    /// while handing them `address` as the envelope's own address. Used for
    /// inbound requests, which are routed by their sink but received with
    /// their reply address.
    pub fn dispatch(
        &self,
        key: &Address,
        address: &Address,
        payload: &Payload,
        attributes: &Attributes,
    ) -> DeliveryReport {
        let snapshot: Vec<Arc<dyn Listener>> = self
            .topics
            .get(key)
            .map(|listeners| listeners.value().clone())
            .unwrap_or_default();

        let mut failures = Vec::new();
        for (listener_index, listener) in snapshot.iter().enumerate() {
            if let Err(cause) = listener.on_receive(address, payload, attributes) {
                warn!(%address, listener_index, %cause, "listener rejected delivery");
                failures.push(DeliveryFailure {
                    listener_index,
                    reason: format!("{cause:#}"),
                });
            }
        }
        debug!(%key, attempted = snapshot.len(), failed = failures.len(), "dispatched");
        DeliveryReport {
            attempted: snapshot.len(),
            failures,
        }
    }

    /// Number of listeners currently registered on `address`.
    #[must_use]
    pub fn listener_count(&self, address: &Address) -> usize {
        self.topics
            .get(address)
            .map_or(0, |listeners| listeners.len())
    }

    /// Number of addresses with at least one listener.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}
