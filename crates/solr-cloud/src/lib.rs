//! SolrCloud controller
//!
//! Converges the objects a SolrCloud owns toward its spec:
//!
//! - **Resources**: pure generators for Services, ConfigMap, StatefulSet,
//!   Ingress and the provided ZookeeperCluster
//! - **Controller**: the reconcile loop and its error policy
//! - **Status**: aggregation of pod state into `SolrCloudStatus`

pub mod controller;
pub mod resources;
pub mod status;

mod node_service;
mod zookeeper;

pub use controller::{error_policy, reconcile, SolrCloudContext};
