//! Diff engine
//!
//! Compares a [`DesiredChange`] against a live [`Property`] and produces a
//! mutated copy plus the list of field-level changes. A field is written only
//! when its desired value differs from the live one, so reconciling the same
//! change twice yields no changes the second time.
//!
//! Diffing is pure: nothing is submitted here. The caller owns the mutated
//! copy and decides whether to hand it to the mutation applier.
//!
//! ## Matching
//!
//! - Selected datacenters and target overrides are looked up through a
//!   datacenter id → target index built once per property.
//! - Overrides for datacenters the property does not route to append a new
//!   target.
//! - Liveness tests match by exact name.

mod desired;

pub use desired::{DesiredChange, TargetOverride};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::Result;
use crate::model::{DatacenterId, LivenessTest, Property, TrafficTarget};

/// What a planned change applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum ChangeSubject {
    Target(DatacenterId),
    LivenessTest(String),
}

impl std::fmt::Display for ChangeSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(id) => write!(f, "target {}", id),
            Self::LivenessTest(name) => write!(f, "liveness test {}", name),
        }
    }
}

/// One field-level mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedChange {
    pub subject: ChangeSubject,
    pub field: String,
    pub from: Value,
    pub to: Value,
}

/// Outcome of diffing one property
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Live property with every planned change applied
    pub property: Property,
    /// Field-level changes, in application order
    pub changes: Vec<PlannedChange>,
    /// Selected datacenters the property has no target for
    pub unmatched_datacenters: Vec<DatacenterId>,
    /// Selected liveness tests the property does not define
    pub unmatched_liveness_tests: Vec<String>,
}

impl Reconciliation {
    /// Whether the mutated property differs from the live one
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether any part of the descriptor applied to this property
    pub fn applies(&self, change: &DesiredChange) -> bool {
        let matched_datacenters = change.datacenters.len() > self.unmatched_datacenters.len();
        let matched_liveness = change.liveness_tests.len() > self.unmatched_liveness_tests.len();
        matched_datacenters || matched_liveness || !change.targets.is_empty()
    }
}

/// Diff `change` against `live`
///
/// # Returns
///
/// - `Ok(Reconciliation)`: the mutated copy and its changes (possibly none)
/// - `Err(Error::Validation)`: the descriptor itself is invalid
pub fn reconcile(live: &Property, change: &DesiredChange) -> Result<Reconciliation> {
    change.validate()?;

    let mut property = live.clone();
    let mut changes = Vec::new();
    let mut unmatched_datacenters = Vec::new();
    let mut index = property.target_index();

    debug!(
        "{} contains {} targets",
        property.name,
        property.traffic_targets.len()
    );

    for id in &change.datacenters {
        match index.get(id) {
            Some(&idx) => {
                apply_directive(&mut property.traffic_targets[idx], change, &mut changes);
            }
            None => {
                debug!("{} has no target for datacenter {}", property.name, id);
                unmatched_datacenters.push(*id);
            }
        }
    }

    for target in &change.targets {
        match index.get(&target.datacenter_id) {
            Some(&idx) => apply_override(&mut property.traffic_targets[idx], target, &mut changes),
            None => {
                let new_target = target.to_new_target();
                debug!(
                    "Adding target for datacenter {} to {}",
                    target.datacenter_id, property.name
                );
                changes.push(PlannedChange {
                    subject: ChangeSubject::Target(target.datacenter_id),
                    field: "target".to_string(),
                    from: Value::Null,
                    to: serde_json::to_value(&new_target)?,
                });
                index.insert(target.datacenter_id, property.traffic_targets.len());
                property.traffic_targets.push(new_target);
            }
        }
    }

    let unmatched_liveness_tests = match change.liveness_enabled {
        Some(enabled) => apply_liveness(
            &mut property.liveness_tests,
            &change.liveness_tests,
            enabled,
            &mut changes,
        ),
        None => Vec::new(),
    };

    Ok(Reconciliation {
        property,
        changes,
        unmatched_datacenters,
        unmatched_liveness_tests,
    })
}

/// Apply the shared datacenter directive to one target
fn apply_directive(
    target: &mut TrafficTarget,
    change: &DesiredChange,
    changes: &mut Vec<PlannedChange>,
) {
    let subject = ChangeSubject::Target(target.datacenter_id);

    if let Some(enabled) = change.enabled {
        set_if_changed(&subject, "enabled", &mut target.enabled, enabled, changes);
    }
    // Weight is ignored by the service for some property types
    if let Some(weight) = change.weight {
        set_if_changed(&subject, "weight", &mut target.weight, weight, changes);
    }
    if let Some(servers) = &change.servers {
        replace_servers(&subject, &mut target.servers, servers, changes);
    }
}

/// Apply every supplied field of an override to an existing target
fn apply_override(
    target: &mut TrafficTarget,
    desired: &TargetOverride,
    changes: &mut Vec<PlannedChange>,
) {
    let subject = ChangeSubject::Target(target.datacenter_id);

    if let Some(enabled) = desired.enabled {
        set_if_changed(&subject, "enabled", &mut target.enabled, enabled, changes);
    }
    if let Some(weight) = desired.weight {
        set_if_changed(&subject, "weight", &mut target.weight, weight, changes);
    }
    if let Some(servers) = &desired.servers {
        replace_servers(&subject, &mut target.servers, servers, changes);
    }
    if let Some(name) = &desired.name {
        set_if_changed(&subject, "name", &mut target.name, Some(name.clone()), changes);
    }
    if let Some(cname) = &desired.handout_cname {
        set_if_changed(
            &subject,
            "handoutCName",
            &mut target.handout_cname,
            Some(cname.clone()),
            changes,
        );
    }
}

/// Toggle the selected liveness tests, returning the names that matched nothing
fn apply_liveness(
    tests: &mut [LivenessTest],
    names: &BTreeSet<String>,
    enabled: bool,
    changes: &mut Vec<PlannedChange>,
) -> Vec<String> {
    let mut matched = BTreeSet::new();

    for test in tests.iter_mut().filter(|t| names.contains(&t.name)) {
        matched.insert(test.name.clone());
        let subject = ChangeSubject::LivenessTest(test.name.clone());
        // Liveness tests carry the inverted flag
        set_if_changed(&subject, "disabled", &mut test.disabled, !enabled, changes);
    }

    names
        .iter()
        .filter(|name| !matched.contains(*name))
        .cloned()
        .collect()
}

/// Replace the server list wholesale when its membership differs
fn replace_servers(
    subject: &ChangeSubject,
    current: &mut Vec<String>,
    desired: &[String],
    changes: &mut Vec<PlannedChange>,
) {
    let current_set: BTreeSet<&str> = current.iter().map(String::as_str).collect();
    let desired_set: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
    if current_set == desired_set {
        return;
    }

    debug!("{}: servers {:?} -> {:?}", subject, current, desired);
    changes.push(PlannedChange {
        subject: subject.clone(),
        field: "servers".to_string(),
        from: Value::from(current.clone()),
        to: Value::from(desired.to_vec()),
    });
    *current = desired.to_vec();
}

fn set_if_changed<T>(
    subject: &ChangeSubject,
    field: &str,
    current: &mut T,
    desired: T,
    changes: &mut Vec<PlannedChange>,
) where
    T: PartialEq + Clone + Into<Value>,
{
    if *current == desired {
        return;
    }

    debug!("{}: {} changed", subject, field);
    changes.push(PlannedChange {
        subject: subject.clone(),
        field: field.to_string(),
        from: current.clone().into(),
        to: desired.clone().into(),
    });
    *current = desired;
}
