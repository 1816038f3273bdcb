//! Command line interface
//!
//! Every flag can also be set through the environment so the operator can
//! be configured from a Deployment manifest.

use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use solr_common::config::DEFAULT_RECONCILE_TIMEOUT;
use solr_common::telemetry::TelemetryConfig;
use solr_common::OperatorConfig;

/// Solr operator - runs SolrCloud clusters and their metrics exporters on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "solr-operator", version, about, long_about = None)]
pub struct Cli {
    /// Print the CRD manifests and exit
    #[arg(long)]
    pub crd: bool,

    /// Operator settings
    #[command(flatten)]
    pub operator: OperatorArgs,

    /// Subcommand; defaults to running the controllers
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the SolrCloud and SolrPrometheusExporter controllers (default)
    Run,
}

/// Settings shared by every controller
#[derive(Args, Debug, Clone)]
pub struct OperatorArgs {
    /// Provision ZooKeeper ensembles through the ZooKeeper operator
    #[arg(
        long = "zk-operator",
        env = "USE_ZK_OPERATOR",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub use_zk_operator: bool,

    /// Base domain that turns on ingress addressing for SolrClouds without one
    #[arg(long, env = "INGRESS_BASE_DOMAIN")]
    pub ingress_base_domain: Option<String>,

    /// Deadline for a single reconcile pass
    #[arg(long, env = "RECONCILE_TIMEOUT_SECS", default_value_t = DEFAULT_RECONCILE_TIMEOUT.as_secs())]
    pub reconcile_timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl OperatorArgs {
    /// Configuration handed to the controllers
    pub fn operator_config(&self) -> OperatorConfig {
        OperatorConfig::default()
            .with_zk_operator(self.use_zk_operator)
            .with_ingress_base_domain(self.ingress_base_domain.clone())
            .with_reconcile_timeout(Duration::from_secs(self.reconcile_timeout_secs))
    }

    /// Tracing setup
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            json: self.log_json,
            ..Default::default()
        }
    }
}
