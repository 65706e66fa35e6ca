//! Uplink Core — addressing, payloads, message envelopes, and the
//! collaborator traits of the messaging link.

pub mod address;
pub mod attributes;
pub mod envelope;
pub mod payload;
pub mod traits;

pub use address::{Address, Entity, InvalidAddress, Resource};
pub use attributes::{
    Attributes, AttributesError, MessageId, MessageKind, Priority, ResponseCode,
};
pub use envelope::{CodecError, Envelope};
pub use payload::{Payload, PayloadFormat};
pub use traits::{Executor, Listener, Task, Transport};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
