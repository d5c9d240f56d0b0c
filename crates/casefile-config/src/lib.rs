//! Casefile Config
//!
//! Serializable configuration for a casefile worker process. A worker is
//! configured once at startup; the same configuration is then used to build
//! the output writers of every task it executes.

mod error;
mod worker;

pub use error::ConfigError;
pub use worker::{RemoteOutputConfig, WorkerConfig, host_name};
