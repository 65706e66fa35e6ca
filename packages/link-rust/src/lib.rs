//! Uplink Link — topic dispatch, RPC correlation, and the link facade over
//! a pluggable transport and executor.

pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod executor;
pub mod link;
pub mod transport;

pub use config::LinkConfig;
pub use correlation::{CorrelationTable, PendingReply, RpcError};
pub use dispatch::{DeliveryFailure, DeliveryReport, DispatchRegistry, RegistryError};
pub use executor::TokioExecutor;
pub use link::{Link, SendError};
pub use transport::{ChannelTransport, NullTransport};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
