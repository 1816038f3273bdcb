//! Error types for the Solr operator
//!
//! Errors carry the resource they relate to so reconcile failures can be
//! traced back to a specific object. `is_retryable` drives the controllers'
//! error policy: retryable errors requeue, the rest wait for a spec change.

use std::time::Duration;

use thiserror::Error;

/// Default context value when no specific resource is known
pub const UNKNOWN_RESOURCE: &str = "unknown";

/// Main error type for Solr operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The desired state is invalid and cannot be reconciled until it changes
    #[error("bad request for {resource}: {message}")]
    BadRequest {
        /// Resource the request was made for
        resource: String,
        /// Description of what's invalid
        message: String,
    },

    /// A referenced object does not exist (yet)
    #[error("dependency of {resource} not found: {message}")]
    Dependency {
        /// Resource whose dependency is missing
        resource: String,
        /// Description of the missing dependency
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being converted (if known)
        kind: Option<String>,
    },

    /// Object lacks a metadata field required to address it
    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        /// Kind of the object
        kind: String,
        /// Name of the missing field
        field: &'static str,
    },

    /// A reconcile pass exceeded its deadline
    #[error("reconcile of {resource} timed out after {after:?}")]
    Timeout {
        /// Resource being reconciled
        resource: String,
        /// Configured deadline
        after: Duration,
    },
}

impl Error {
    /// Create a bad request error without resource context
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest {
            resource: UNKNOWN_RESOURCE.to_string(),
            message: msg.into(),
        }
    }

    /// Create a bad request error for a named resource
    pub fn bad_request_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::BadRequest {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create a missing dependency error for a named resource
    pub fn dependency_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Dependency {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a missing metadata error
    pub fn missing_metadata(kind: impl Into<String>, field: &'static str) -> Self {
        Self::MissingMetadata {
            kind: kind.into(),
            field,
        }
    }

    /// Create a timeout error
    pub fn timeout(resource: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            resource: resource.into(),
            after,
        }
    }

    /// Check if this error is retryable
    ///
    /// Bad requests, serialization and metadata errors need a spec fix.
    /// Kubernetes errors are retried unless the API rejected the request
    /// as malformed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if ae.code == 400 || ae.code == 422
            ),
            Error::BadRequest { .. } => false,
            Error::Dependency { .. } => true,
            Error::Serialization { .. } => false,
            Error::MissingMetadata { .. } => false,
            Error::Timeout { .. } => true,
        }
    }

    /// True when this is a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }

    /// Get the resource name if this error is associated with one
    pub fn resource(&self) -> Option<&str> {
        match self {
            Error::BadRequest { resource, .. }
            | Error::Dependency { resource, .. }
            | Error::Timeout { resource, .. } => Some(resource),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> Error {
        Error::from(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status {code}"),
            reason: "Test".to_string(),
            code,
        }))
    }

    // ==========================================================================
    // Story Tests: Error Classification During Reconciliation
    // ==========================================================================

    /// Story: a SolrCloud with a broken ZooKeeper reference is not retried
    ///
    /// The user has to fix the spec, so requeueing would only spin.
    #[test]
    fn story_configuration_errors_wait_for_a_spec_change() {
        let err = Error::bad_request_for("default/search", "No Zookeeper reference information provided.");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("bad request"));
        assert!(err.to_string().contains("default/search"));
        assert_eq!(err.resource(), Some("default/search"));

        let err = Error::bad_request("anything");
        assert_eq!(err.resource(), Some(UNKNOWN_RESOURCE));
    }

    /// Story: transient API failures are retried, malformed requests are not
    #[test]
    fn story_kube_errors_classified_by_status_code() {
        assert!(api_error(500).is_retryable());
        assert!(api_error(503).is_retryable());
        assert!(api_error(409).is_retryable());
        assert!(api_error(404).is_retryable());
        assert!(!api_error(400).is_retryable());
        assert!(!api_error(422).is_retryable());
    }

    #[test]
    fn not_found_detection() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(500).is_not_found());
        assert!(!Error::bad_request("x").is_not_found());
    }

    #[test]
    fn timeouts_and_dependencies_are_retried() {
        let err = Error::timeout("default/search", Duration::from_secs(60));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("timed out"));

        let err = Error::dependency_for("default/metrics", "SolrCloud default/search not found");
        assert!(err.is_retryable());
    }

    #[test]
    fn serialization_errors_are_permanent() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(!err.is_retryable());

        let err = Error::serialization_for_kind("Service", "bad port");
        match err {
            Error::Serialization { kind, .. } => assert_eq!(kind.as_deref(), Some("Service")),
            _ => panic!("Expected Serialization variant"),
        }

        assert!(!Error::missing_metadata("Pod", "name").is_retryable());
    }
}
