// # Configuration Service Trait
//
// Defines the interface to the remote GTM configuration store.
//
// ## Implementations
//
// - HTTP: `gtm-api-http` crate
// - Tests: scripted in-memory doubles in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use gtm_core::ConfigService;
//
// async fn show(config: &dyn ConfigService) -> gtm_core::Result<()> {
//     let property = config.get_property("www", "example.akadns.net").await?;
//     println!("{} has {} targets", property.name, property.traffic_targets.len());
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Datacenter, DatacenterId, Domain, Property};

/// Remote propagation state of the latest change to a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropagationStatus {
    /// Change accepted, not yet distributed
    Pending,
    /// Change live on the serving network
    Complete,
    /// Change rejected during propagation
    Denied,
}

impl PropagationStatus {
    /// `Complete` and `Denied` never change again
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Complete => "COMPLETE",
            Self::Denied => "DENIED",
        }
    }
}

impl std::fmt::Display for PropagationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment status returned for every mutating submission and status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    #[serde(default)]
    pub change_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub passing_validation: bool,
    pub propagation_status: PropagationStatus,
    #[serde(default)]
    pub propagation_status_date: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeploymentStatus {
    /// Create a status with the given change id and propagation state
    pub fn new(change_id: impl Into<String>, propagation_status: PropagationStatus) -> Self {
        Self {
            change_id: change_id.into(),
            message: String::new(),
            passing_validation: true,
            propagation_status,
            propagation_status_date: String::new(),
            extra: Map::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.propagation_status == PropagationStatus::Pending
    }
}

/// Trait for configuration service implementations
///
/// # Trust Level: Untrusted
///
/// Services are isolated, stateless and single-shot:
/// - one remote request per call
/// - no retry or backoff (the only time-based behaviour is the propagation monitor)
/// - no caching between calls
/// - no decision about whether an update is needed (owned by the reconciler)
///
/// Errors are returned as-is; callers decide whether they are fatal.
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Fetch a domain including its datacenters and properties
    ///
    /// # Returns
    ///
    /// - `Ok(Domain)`: The live domain
    /// - `Err(Error::NotFound)`: The domain does not exist
    async fn get_domain(&self, name: &str) -> Result<Domain, crate::Error>;

    /// Fetch a single property of a domain
    ///
    /// # Returns
    ///
    /// - `Ok(Property)`: The live property
    /// - `Err(Error::NotFound)`: The property does not exist
    async fn get_property(&self, name: &str, domain: &str) -> Result<Property, crate::Error>;

    /// Submit a full property document as one atomic update
    ///
    /// The remote service either accepts the whole document (returning a
    /// `PENDING` status) or rejects it; there is no partial application.
    async fn update_property(
        &self,
        property: &Property,
        domain: &str,
    ) -> Result<DeploymentStatus, crate::Error>;

    /// Fetch the current deployment status of a domain
    async fn get_domain_status(&self, domain: &str) -> Result<DeploymentStatus, crate::Error>;

    /// Fetch a single datacenter
    async fn get_datacenter(
        &self,
        id: DatacenterId,
        domain: &str,
    ) -> Result<Datacenter, crate::Error>;

    /// List all datacenters of a domain
    async fn list_datacenters(&self, domain: &str) -> Result<Vec<Datacenter>, crate::Error>;

    /// Service name (for logging)
    fn service_name(&self) -> &'static str;
}
