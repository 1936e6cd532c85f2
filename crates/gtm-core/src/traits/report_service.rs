// # Report Service Trait
//
// Defines the interface to the GTM reporting service: traffic counts per
// datacenter or property and IP availability per property.
//
// Telemetry is read-only. Nothing returned here is ever merged back into
// configuration; the status aggregator only combines it with the live
// property for display.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::DatacenterId;
use crate::period::ReportPeriod;

/// Time range for which the reporting service currently holds data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// How IP availability should be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpStatusQuery {
    /// Only the latest sample
    MostRecent,
    /// All samples within a period
    Period(ReportPeriod),
}

/// Metadata shared by the traffic and IP reports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter_id: Option<DatacenterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter_nickname: Option<String>,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub interval: String,
}

/// Traffic for one property over a window, sampled per interval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTrafficReport {
    pub metadata: ReportMetadata,
    #[serde(default)]
    pub data_rows: Vec<TrafficReportRow>,
}

/// One sampling interval of property traffic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficReportRow {
    pub timestamp: String,
    #[serde(default)]
    pub datacenters: Vec<DatacenterTraffic>,
}

/// Requests handed to one datacenter within an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterTraffic {
    pub datacenter_id: DatacenterId,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub traffic_target_name: String,
    #[serde(default)]
    pub requests: i64,
    #[serde(default)]
    pub status: String,
}

/// Traffic for one datacenter over a window, broken down by property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterTrafficReport {
    pub metadata: ReportMetadata,
    #[serde(default)]
    pub data_rows: Vec<DatacenterTrafficRow>,
}

/// One sampling interval of datacenter traffic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterTrafficRow {
    pub timestamp: String,
    #[serde(default)]
    pub properties: Vec<PropertyTraffic>,
}

/// Requests for one property within a datacenter interval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTraffic {
    pub name: String,
    #[serde(default)]
    pub requests: i64,
    #[serde(default)]
    pub status: String,
}

/// IP availability samples for one property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAvailabilityReport {
    pub metadata: ReportMetadata,
    #[serde(default)]
    pub data_rows: Vec<IpAvailabilityRow>,
}

/// One IP availability sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAvailabilityRow {
    pub timestamp: String,
    #[serde(default)]
    pub cut_off: f64,
    #[serde(default)]
    pub datacenters: Vec<DatacenterIpStatus>,
}

/// IP detail for one datacenter within a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterIpStatus {
    pub datacenter_id: DatacenterId,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub traffic_target_name: String,
    #[serde(rename = "IPs", default)]
    pub ips: Vec<IpStatus>,
}

/// Liveness and handout state of one server address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpStatus {
    pub ip: String,
    #[serde(default)]
    pub handed_out: bool,
    #[serde(default)]
    pub alive: bool,
    #[serde(default)]
    pub score: f64,
}

/// Trait for reporting service implementations
///
/// Same trust level as [`ConfigService`](crate::ConfigService): single-shot,
/// stateless, no retries.
#[async_trait]
pub trait ReportService: Send + Sync {
    /// Window of available datacenter traffic data
    async fn datacenters_traffic_window(&self) -> Result<TrafficWindow, crate::Error>;

    /// Window of available property traffic data
    async fn properties_traffic_window(&self) -> Result<TrafficWindow, crate::Error>;

    /// Traffic of one datacenter across all properties of a domain
    async fn traffic_per_datacenter(
        &self,
        domain: &str,
        id: DatacenterId,
        period: &ReportPeriod,
    ) -> Result<DatacenterTrafficReport, crate::Error>;

    /// Traffic of one property across its datacenters
    async fn traffic_per_property(
        &self,
        domain: &str,
        property: &str,
        period: &ReportPeriod,
    ) -> Result<PropertyTrafficReport, crate::Error>;

    /// IP availability of one property
    async fn ip_status_per_property(
        &self,
        domain: &str,
        property: &str,
        query: &IpStatusQuery,
    ) -> Result<IpAvailabilityReport, crate::Error>;

    /// Service name (for logging)
    fn service_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_availability_decoding() {
        let json = r#"{
            "metadata": {"domain": "example.akadns.net", "property": "www",
                         "start": "2019-08-01T10:00:00Z", "end": "2019-08-01T10:15:00Z",
                         "mostRecent": true},
            "dataRows": [{
                "timestamp": "2019-08-01T10:14:00Z",
                "cutOff": 0.4,
                "datacenters": [{
                    "datacenterId": 3131, "nickname": "east", "trafficTargetName": "east - 1.2.3.4",
                    "IPs": [{"ip": "1.2.3.4", "score": 29.0, "handedOut": true, "alive": true}]
                }]
            }]
        }"#;

        let report: IpAvailabilityReport = serde_json::from_str(json).unwrap();
        let dc = &report.data_rows[0].datacenters[0];
        assert_eq!(dc.datacenter_id, DatacenterId(3131));
        assert!(dc.ips[0].handed_out);
        assert_eq!(report.metadata.property.as_deref(), Some("www"));
    }

    #[test]
    fn test_property_traffic_decoding() {
        let json = r#"{
            "metadata": {"domain": "example.akadns.net", "property": "www",
                         "start": "s", "end": "e", "interval": "FIVE_MINUTE"},
            "dataRows": [{"timestamp": "t1", "datacenters": [
                {"datacenterId": 1, "nickname": "a", "trafficTargetName": "a", "requests": 10, "status": "1"}
            ]}]
        }"#;

        let report: PropertyTrafficReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.data_rows[0].datacenters[0].requests, 10);
        assert_eq!(report.metadata.interval, "FIVE_MINUTE");
    }
}
