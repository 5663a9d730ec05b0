//! Infrastructure adapters for queues, durable stores, and metrics.

pub mod metrics;
pub mod queue;
pub mod store;

pub use metrics::StaticMetrics;
pub use queue::InMemoryQueue;
pub use store::{FileStore, InMemoryStore, TaskStore};
