//! Process-wide operator configuration
//!
//! Built once at startup from CLI flags and environment, then shared
//! read-only with every controller through its context.

use std::time::Duration;

/// Default deadline for a single reconcile pass
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(60);

/// Immutable configuration consulted by the reconcilers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Whether the ZooKeeper operator's CRD is available for provisioning ensembles
    pub use_zk_operator: bool,
    /// Base domain used to default external addressability to an Ingress
    pub ingress_base_domain: Option<String>,
    /// Deadline for a single reconcile pass
    pub reconcile_timeout: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            use_zk_operator: true,
            ingress_base_domain: None,
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
        }
    }
}

impl OperatorConfig {
    /// Set whether ZooKeeper ensembles may be provisioned
    pub fn with_zk_operator(mut self, enabled: bool) -> Self {
        self.use_zk_operator = enabled;
        self
    }

    /// Set the ingress base domain; empty strings count as unset
    pub fn with_ingress_base_domain(mut self, domain: Option<String>) -> Self {
        self.ingress_base_domain = domain.filter(|d| !d.is_empty());
        self
    }

    /// Set the per-pass reconcile deadline
    pub fn with_reconcile_timeout(mut self, timeout: Duration) -> Self {
        self.reconcile_timeout = timeout;
        self
    }

    /// The ingress base domain as a borrowed str
    pub fn base_domain(&self) -> Option<&str> {
        self.ingress_base_domain.as_deref()
    }
}
