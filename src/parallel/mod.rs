//! Deferred computations and their dispatch across worker threads.

pub mod deferred;
pub use deferred::{Deferred, TaskHandle, TaskStatus};

pub mod dispatcher;
pub use dispatcher::ParallelDispatcher;
