//! Configuration entities of a GTM domain
//!
//! These mirror the configuration service's JSON documents. Every entity keeps
//! the fields it does not model in an `extra` map so that a fetched property
//! can be submitted back without losing anything.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Numeric datacenter identifier, unique within a domain
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DatacenterId(pub u32);

impl fmt::Display for DatacenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DatacenterId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(DatacenterId)
    }
}

impl From<u32> for DatacenterId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Top-level configuration container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub name: String,
    #[serde(default)]
    pub datacenters: Vec<Datacenter>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A routing destination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datacenter {
    pub datacenter_id: DatacenterId,
    #[serde(default)]
    pub nickname: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Datacenter {
    pub fn new(id: impl Into<DatacenterId>, nickname: impl Into<String>) -> Self {
        Self {
            datacenter_id: id.into(),
            nickname: nickname.into(),
            extra: Map::new(),
        }
    }
}

/// A load-balanced resource within a domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub traffic_targets: Vec<TrafficTarget>,
    #[serde(default)]
    pub liveness_tests: Vec<LivenessTest>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Property {
    /// Create an empty property
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a traffic target
    pub fn with_target(mut self, target: TrafficTarget) -> Self {
        self.traffic_targets.push(target);
        self
    }

    /// Append a liveness test
    pub fn with_liveness_test(mut self, test: LivenessTest) -> Self {
        self.liveness_tests.push(test);
        self
    }

    /// Index of each target by datacenter id
    pub fn target_index(&self) -> HashMap<DatacenterId, usize> {
        self.traffic_targets
            .iter()
            .enumerate()
            .map(|(idx, t)| (t.datacenter_id, idx))
            .collect()
    }

    pub fn target(&self, id: DatacenterId) -> Option<&TrafficTarget> {
        self.traffic_targets.iter().find(|t| t.datacenter_id == id)
    }

    /// Whether any target routes to one of the given datacenters
    pub fn references_any(&self, ids: &std::collections::BTreeSet<DatacenterId>) -> bool {
        self.traffic_targets
            .iter()
            .any(|t| ids.contains(&t.datacenter_id))
    }
}

/// One routing destination of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTarget {
    pub datacenter_id: DatacenterId,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "handoutCName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub handout_cname: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrafficTarget {
    pub fn new(id: impl Into<DatacenterId>) -> Self {
        Self {
            datacenter_id: id.into(),
            enabled: true,
            weight: 0.0,
            servers: Vec::new(),
            name: None,
            handout_cname: None,
            extra: Map::new(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A health check attached to a property.
///
/// Note the polarity: liveness tests carry `disabled`, whereas traffic targets
/// carry `enabled`. An "enable" directive therefore writes `disabled = false`.
/// Operators switching between the two are easily confused; the flag is kept
/// as the service defines it rather than normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessTest {
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LivenessTest {
    pub fn new(name: impl Into<String>, disabled: bool) -> Self {
        Self {
            name: name.into(),
            disabled,
            extra: Map::new(),
        }
    }
}
