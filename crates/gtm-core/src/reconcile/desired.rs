//! Desired-state descriptor
//!
//! Normalized operator intent. A descriptor is validated on its own before
//! any live entity is read; everything that can be rejected without the
//! remote state is rejected here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::model::{DatacenterId, TrafficTarget};

/// Field values to force onto the target for one datacenter.
///
/// Only supplied fields are compared and written. When the property has no
/// target for the datacenter, a new target is appended built from these
/// values (`enabled` defaults to true, `weight` to 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOverride {
    pub datacenter_id: DatacenterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "handoutCName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub handout_cname: Option<String>,
}

impl TargetOverride {
    pub fn new(id: impl Into<DatacenterId>) -> Self {
        Self {
            datacenter_id: id.into(),
            enabled: None,
            weight: None,
            servers: None,
            name: None,
            handout_cname: None,
        }
    }

    /// Parse an operator-supplied JSON target record
    ///
    /// ```
    /// use gtm_core::reconcile::TargetOverride;
    ///
    /// let target = TargetOverride::from_json(r#"{"datacenterId": 3131, "weight": 25}"#).unwrap();
    /// assert_eq!(target.weight, Some(25.0));
    /// assert_eq!(target.enabled, None);
    /// ```
    pub fn from_json(value: &str) -> Result<Self> {
        serde_json::from_str(value)
            .map_err(|e| Error::validation(format!("Invalid target specification: {}", e)))
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = Some(servers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_handout_cname(mut self, cname: impl Into<String>) -> Self {
        self.handout_cname = Some(cname.into());
        self
    }

    /// Build the target appended when the datacenter is not yet routed to
    pub(crate) fn to_new_target(&self) -> TrafficTarget {
        TrafficTarget {
            datacenter_id: self.datacenter_id,
            enabled: self.enabled.unwrap_or(true),
            weight: self.weight.unwrap_or(0.0),
            servers: self.servers.clone().unwrap_or_default(),
            name: self.name.clone(),
            handout_cname: self.handout_cname.clone(),
            extra: Default::default(),
        }
    }
}

/// What the operator wants the property (or every property) to look like
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredChange {
    /// Datacenters the shared directive applies to
    #[serde(default)]
    pub datacenters: BTreeSet<DatacenterId>,

    /// Enable or disable the selected datacenter targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Weight for the single selected datacenter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Server list for the single selected datacenter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,

    /// Per-datacenter overrides, at most one per datacenter
    #[serde(default)]
    pub targets: Vec<TargetOverride>,

    /// Liveness tests the liveness directive applies to
    #[serde(default)]
    pub liveness_tests: BTreeSet<String>,

    /// Enable (`disabled = false`) or disable (`disabled = true`) the selected liveness tests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_enabled: Option<bool>,
}

impl DesiredChange {
    /// Start a descriptor selecting the given datacenters
    pub fn for_datacenters<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = DatacenterId>,
    {
        Self {
            datacenters: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = Some(servers.into_iter().map(Into::into).collect());
        self
    }

    /// Add a target override
    ///
    /// Repeating an identical override is a no-op; repeating a datacenter
    /// with different values is rejected.
    pub fn with_target(mut self, target: TargetOverride) -> Result<Self> {
        if let Some(existing) = self
            .targets
            .iter()
            .find(|t| t.datacenter_id == target.datacenter_id)
        {
            if *existing == target {
                return Ok(self);
            }
            return Err(Error::validation(format!(
                "Target {} already specified with different values",
                target.datacenter_id
            )));
        }
        self.targets.push(target);
        Ok(self)
    }

    /// Select liveness tests and the directive for them
    pub fn with_liveness_tests<I, S>(mut self, names: I, enabled: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.liveness_tests = names.into_iter().map(Into::into).collect();
        self.liveness_enabled = Some(enabled);
        self
    }

    /// Whether the descriptor touches weight or server fields
    pub fn edits_weight_or_servers(&self) -> bool {
        self.weight.is_some() || self.servers.is_some()
    }

    /// Check every invariant that does not depend on the live entity
    pub fn validate(&self) -> Result<()> {
        if self.datacenters.is_empty() && self.targets.is_empty() && self.liveness_tests.is_empty()
        {
            return Err(Error::validation(
                "datacenter(s), target(s) or liveness test(s) must be specified",
            ));
        }

        if self.enabled.is_some() && self.liveness_enabled.is_some() {
            return Err(Error::validation(
                "enable/disable may apply to datacenters or liveness tests, not both",
            ));
        }

        if let Some(id) = self
            .targets
            .iter()
            .map(|t| t.datacenter_id)
            .find(|id| self.datacenters.contains(id))
        {
            return Err(Error::validation(format!(
                "datacenter {} is selected both directly and by a target override",
                id
            )));
        }

        for (i, target) in self.targets.iter().enumerate() {
            let conflicting = self.targets[..i]
                .iter()
                .any(|t| t.datacenter_id == target.datacenter_id && t != target);
            if conflicting {
                return Err(Error::validation(format!(
                    "Target {} already specified with different values",
                    target.datacenter_id
                )));
            }
        }

        if self.datacenters.len() > 1 {
            if self.servers.is_some() {
                return Err(Error::validation(
                    "server update may only apply to one datacenter",
                ));
            }
            if self.weight.is_some() {
                return Err(Error::validation(
                    "weight update may only apply to one datacenter",
                ));
            }
        }

        let has_datacenter_directive = self.enabled.is_some() || self.edits_weight_or_servers();
        if has_datacenter_directive && self.datacenters.is_empty() {
            return Err(Error::validation(
                "enable/disable, weight or server change requires a datacenter",
            ));
        }
        if !self.datacenters.is_empty() && !has_datacenter_directive {
            return Err(Error::validation(
                "no change specified for the selected datacenter(s)",
            ));
        }

        match (self.liveness_tests.is_empty(), self.liveness_enabled.is_some()) {
            (true, true) => {
                return Err(Error::validation(
                    "liveness test enable/disable requires a liveness test name",
                ));
            }
            (false, false) => {
                return Err(Error::validation(
                    "liveness test(s) selected without enable or disable",
                ));
            }
            _ => {}
        }

        if let Some(weight) = self.weight {
            validate_weight(weight)?;
        }
        for target in &self.targets {
            if let Some(weight) = target.weight {
                validate_weight(weight)?;
            }
        }

        Ok(())
    }
}

fn validate_weight(weight: f64) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(Error::validation(format!(
            "weight must be a non-negative number. Got: {}",
            weight
        )));
    }
    Ok(())
}
