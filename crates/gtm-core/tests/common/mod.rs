//! Test doubles and common utilities for contract tests
//!
//! The doubles keep their state in memory and count every remote call so
//! tests can assert which requests an operation made.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use gtm_core::error::{Error, Result};
use gtm_core::model::{Datacenter, DatacenterId, Domain, LivenessTest, Property, TrafficTarget};
use gtm_core::period::ReportPeriod;
use gtm_core::traits::{
    ConfigService, DatacenterTrafficReport, DeploymentStatus, IpAvailabilityReport,
    IpStatusQuery, PropagationStatus, PropertyTrafficReport, ReportMetadata, ReportService,
    TrafficWindow,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DOMAIN: &str = "example.akadns.net";

/// An in-memory configuration service
///
/// Accepted submissions replace the stored property, so a second fetch sees
/// the updated document.
pub struct ScriptedConfigService {
    domain: Mutex<Domain>,
    /// Properties whose submission is rejected
    failing: HashSet<String>,
    /// Statuses returned by successive get_domain_status calls
    status_script: Mutex<VecDeque<PropagationStatus>>,
    /// Fail get_domain_status after the script runs out
    status_error: bool,
    get_domain_calls: AtomicUsize,
    get_property_calls: AtomicUsize,
    update_calls: AtomicUsize,
    status_calls: AtomicUsize,
    list_calls: AtomicUsize,
    submitted: Mutex<Vec<Property>>,
}

impl ScriptedConfigService {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain: Mutex::new(domain),
            failing: HashSet::new(),
            status_script: Mutex::new(VecDeque::new()),
            status_error: false,
            get_domain_calls: AtomicUsize::new(0),
            get_property_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Reject submissions of the named property
    pub fn failing_on(mut self, property: &str) -> Self {
        self.failing.insert(property.to_string());
        self
    }

    /// Script the statuses returned by successive status polls
    pub fn with_status_script(self, statuses: &[PropagationStatus]) -> Self {
        *self.status_script.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    /// Fail status polls once the script is exhausted
    pub fn with_status_error(mut self) -> Self {
        self.status_error = true;
        self
    }

    pub fn get_domain_calls(&self) -> usize {
        self.get_domain_calls.load(Ordering::SeqCst)
    }

    pub fn get_property_calls(&self) -> usize {
        self.get_property_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Total number of remote calls of any kind
    pub fn total_calls(&self) -> usize {
        self.get_domain_calls()
            + self.get_property_calls()
            + self.update_calls()
            + self.status_calls()
            + self.list_calls()
    }

    /// Property documents submitted so far, in order
    pub fn submitted(&self) -> Vec<Property> {
        self.submitted.lock().unwrap().clone()
    }

    /// Current stored version of a property
    pub fn stored(&self, name: &str) -> Option<Property> {
        self.domain
            .lock()
            .unwrap()
            .properties
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }
}

#[async_trait]
impl ConfigService for ScriptedConfigService {
    async fn get_domain(&self, name: &str) -> Result<Domain> {
        self.get_domain_calls.fetch_add(1, Ordering::SeqCst);
        let domain = self.domain.lock().unwrap();
        if domain.name != name {
            return Err(Error::not_found(format!("domain {}", name)));
        }
        Ok(domain.clone())
    }

    async fn get_property(&self, name: &str, domain: &str) -> Result<Property> {
        self.get_property_calls.fetch_add(1, Ordering::SeqCst);
        let stored = self.domain.lock().unwrap();
        if stored.name != domain {
            return Err(Error::not_found(format!("domain {}", domain)));
        }
        stored
            .properties
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("property {}", name)))
    }

    async fn update_property(
        &self,
        property: &Property,
        _domain: &str,
    ) -> Result<DeploymentStatus> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&property.name) {
            return Err(Error::service("scripted", format!("{} rejected", property.name)));
        }

        self.submitted.lock().unwrap().push(property.clone());
        let mut domain = self.domain.lock().unwrap();
        if let Some(existing) = domain.properties.iter_mut().find(|p| p.name == property.name) {
            *existing = property.clone();
        }

        let change = self.update_calls.load(Ordering::SeqCst);
        Ok(DeploymentStatus::new(
            format!("change-{}", change),
            PropagationStatus::Pending,
        ))
    }

    async fn get_domain_status(&self, _domain: &str) -> Result<DeploymentStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.status_script.lock().unwrap().pop_front();
        match next {
            Some(status) => Ok(DeploymentStatus::new("change-1", status)),
            None if self.status_error => Err(Error::http("connection reset")),
            None => Ok(DeploymentStatus::new("change-1", PropagationStatus::Pending)),
        }
    }

    async fn get_datacenter(&self, id: DatacenterId, _domain: &str) -> Result<Datacenter> {
        self.domain
            .lock()
            .unwrap()
            .datacenters
            .iter()
            .find(|dc| dc.datacenter_id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("datacenter {}", id)))
    }

    async fn list_datacenters(&self, _domain: &str) -> Result<Vec<Datacenter>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.domain.lock().unwrap().datacenters.clone())
    }

    fn service_name(&self) -> &'static str {
        "scripted"
    }
}

/// A reporting service returning canned reports
#[derive(Default)]
pub struct CannedReportService {
    pub property_traffic: PropertyTrafficReport,
    pub datacenter_traffic: DatacenterTrafficReport,
    pub ip_availability: IpAvailabilityReport,
    /// Fail the traffic window lookups
    pub window_error: bool,
    /// Periods requested from traffic_per_property / traffic_per_datacenter
    pub requested_periods: Mutex<Vec<ReportPeriod>>,
}

impl CannedReportService {
    pub fn requested_periods(&self) -> Vec<ReportPeriod> {
        self.requested_periods.lock().unwrap().clone()
    }

    fn window(&self) -> Result<TrafficWindow> {
        if self.window_error {
            return Err(Error::report_service("window unavailable"));
        }
        Ok(TrafficWindow {
            start: Utc.with_ymd_and_hms(2019, 8, 1, 0, 0, 0).unwrap(),
            end: window_end(),
        })
    }
}

/// End of the canned data window
pub fn window_end() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 8, 1, 10, 15, 0).unwrap()
}

#[async_trait]
impl ReportService for CannedReportService {
    async fn datacenters_traffic_window(&self) -> Result<TrafficWindow> {
        self.window()
    }

    async fn properties_traffic_window(&self) -> Result<TrafficWindow> {
        self.window()
    }

    async fn traffic_per_datacenter(
        &self,
        _domain: &str,
        id: DatacenterId,
        period: &ReportPeriod,
    ) -> Result<DatacenterTrafficReport> {
        self.requested_periods.lock().unwrap().push(*period);
        let mut report = self.datacenter_traffic.clone();
        report.metadata.datacenter_id = Some(id);
        Ok(report)
    }

    async fn traffic_per_property(
        &self,
        _domain: &str,
        _property: &str,
        period: &ReportPeriod,
    ) -> Result<PropertyTrafficReport> {
        self.requested_periods.lock().unwrap().push(*period);
        Ok(self.property_traffic.clone())
    }

    async fn ip_status_per_property(
        &self,
        _domain: &str,
        _property: &str,
        _query: &IpStatusQuery,
    ) -> Result<IpAvailabilityReport> {
        Ok(self.ip_availability.clone())
    }

    fn service_name(&self) -> &'static str {
        "canned"
    }
}

/// A domain with four datacenters and three properties
///
/// - `www` routes to 3131 (enabled), 3132 (enabled) and 3133 (disabled)
/// - `api` routes to 3131 and 3134
/// - `static` routes to 3132 only
pub fn sample_domain() -> Domain {
    Domain {
        name: DOMAIN.to_string(),
        datacenters: vec![
            Datacenter::new(3131, "east"),
            Datacenter::new(3132, "west"),
            Datacenter::new(3133, "north"),
            Datacenter::new(3134, "south"),
        ],
        properties: vec![
            Property::new("www")
                .with_target(
                    TrafficTarget::new(3131)
                        .with_weight(50.0)
                        .with_servers(["1.1.1.1"])
                        .with_name("east"),
                )
                .with_target(
                    TrafficTarget::new(3132)
                        .with_weight(50.0)
                        .with_servers(["2.2.2.2"])
                        .with_name("west"),
                )
                .with_target(TrafficTarget::new(3133).with_enabled(false).with_name("north"))
                .with_liveness_test(LivenessTest::new("http", false)),
            Property::new("api")
                .with_target(TrafficTarget::new(3131).with_weight(1.0))
                .with_target(TrafficTarget::new(3134).with_weight(1.0)),
            Property::new("static").with_target(TrafficTarget::new(3132).with_weight(1.0)),
        ],
        extra: Default::default(),
    }
}

/// Shared scripted service over [`sample_domain`]
pub fn sample_service() -> Arc<ScriptedConfigService> {
    Arc::new(ScriptedConfigService::new(sample_domain()))
}

/// Report metadata for `www` over the canned window
pub fn www_metadata() -> ReportMetadata {
    ReportMetadata {
        domain: DOMAIN.to_string(),
        property: Some("www".to_string()),
        start: "2019-08-01T10:00:00Z".to_string(),
        end: window_end().to_rfc3339(),
        interval: "FIVE_MINUTE".to_string(),
        ..ReportMetadata::default()
    }
}
