//! Executor implementations.

use uplink_core::{Executor, Task};

/// Executor that spawns tasks onto the ambient tokio runtime.
///
/// Panics outside a runtime context, like `tokio::spawn` itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn(&self, task: Task) {
        tokio::spawn(task);
    }
}
