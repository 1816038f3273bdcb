//! SolrPrometheusExporter controller
//!
//! Runs the Solr Prometheus exporter as a Deployment behind a metrics
//! Service, pointed at a SolrCloud's ZooKeeper ensemble or at a standalone
//! Solr address.

pub mod controller;
pub mod resources;

pub use controller::{error_policy, reconcile, resolve_connection, ExporterContext};
pub use resources::SolrConnection;
