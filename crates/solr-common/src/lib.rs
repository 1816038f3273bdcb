//! Common types for the Solr operator: CRDs, errors, configuration, and
//! the object store the controllers reconcile through

#![warn(missing_docs)]

pub mod config;
pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod store;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::OperatorConfig;
pub use error::Error;
pub use store::{ResourceStore, Store};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Requeue interval for retryable reconcile errors
pub const REQUEUE_ERROR_DELAY_SECS: u64 = 30;

/// Requeue interval after the spec was normalized and written back
pub const REQUEUE_AFTER_DEFAULTS_SECS: u64 = 5;
