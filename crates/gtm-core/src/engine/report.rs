//! Batch results
//!
//! Every update invocation returns one [`BatchReport`] by value. Nothing is
//! accumulated across invocations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::monitor::MonitorOutcome;
use crate::reconcile::PlannedChange;
use crate::traits::DeploymentStatus;

/// Status reported for a submitted property
///
/// Resolved once from the verbosity option: the full deployment status, or
/// only the change id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateStatus {
    Detailed(DeploymentStatus),
    #[serde(rename_all = "camelCase")]
    Summary { change_id: String },
}

impl UpdateStatus {
    pub fn from_status(status: DeploymentStatus, verbose: bool) -> Self {
        if verbose {
            Self::Detailed(status)
        } else {
            Self::Summary {
                change_id: status.change_id,
            }
        }
    }

    pub fn change_id(&self) -> &str {
        match self {
            Self::Detailed(status) => &status.change_id,
            Self::Summary { change_id } => change_id,
        }
    }
}

/// A property whose submission was accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedProperty {
    pub property_name: String,
    pub status: UpdateStatus,
    /// Set when the caller waited for propagation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<MonitorOutcome>,
}

/// A property whose submission was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpdate {
    pub property_name: String,
    pub fail_msg: String,
}

/// Changes a dry run would have submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedProperty {
    pub property_name: String,
    pub changes: Vec<PlannedChange>,
}

/// Result of one update invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub updated_properties: Vec<UpdatedProperty>,
    pub failed_updates: Vec<FailedUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned_changes: Vec<PlannedProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unchanged_properties: Vec<String>,
}

impl BatchReport {
    /// Number of properties that reached the applier
    pub fn attempted(&self) -> usize {
        self.updated_properties.len() + self.failed_updates.len()
    }

    /// Some submissions were accepted and some rejected
    pub fn is_partial(&self) -> bool {
        !self.updated_properties.is_empty() && !self.failed_updates.is_empty()
    }

    /// Fail the invocation when every attempted submission was rejected
    pub(crate) fn into_result(self) -> Result<Self> {
        if !self.failed_updates.is_empty() && self.updated_properties.is_empty() {
            return Err(Error::AllUpdatesFailed(self.failed_updates));
        }
        Ok(self)
    }
}
