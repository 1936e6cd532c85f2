//! Reporting service over `/gtm-api/v1/reports`
//!
//! ```http
//! GET /gtm-api/v1/reports/traffic/datacenters-window
//! GET /gtm-api/v1/reports/traffic/properties-window
//! GET /gtm-api/v1/reports/traffic/domains/{domain}/datacenters/{id}?start=..&end=..
//! GET /gtm-api/v1/reports/traffic/domains/{domain}/properties/{property}?start=..&end=..
//! GET /gtm-api/v1/reports/ip-availability/domains/{domain}/properties/{property}?mostRecent=true
//! ```

use async_trait::async_trait;
use gtm_core::config::ServiceConfig;
use gtm_core::model::DatacenterId;
use gtm_core::period::ReportPeriod;
use gtm_core::traits::{
    DatacenterTrafficReport, IpAvailabilityReport, IpStatusQuery, PropertyTrafficReport,
    ReportService, TrafficWindow,
};
use gtm_core::Result;
use reqwest::Method;
use tracing::debug;

use crate::client::ApiClient;

const SERVICE: &str = "gtm-api";
const BASE_PATH: [&str; 3] = ["gtm-api", "v1", "reports"];

/// HTTP reporting service
#[derive(Debug, Clone)]
pub struct HttpReportService {
    client: ApiClient,
}

impl HttpReportService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(config)?,
        })
    }

    /// Share an existing client
    pub fn with_client(client: ApiClient) -> Self {
        Self { client }
    }

    async fn window(&self, kind: &str) -> Result<TrafficWindow> {
        let window = format!("{}-window", kind);
        let request = self
            .client
            .request(Method::GET, &report_path(&["traffic", window.as_str()]));
        self.client
            .send_json(request, SERVICE, &format!("{} traffic window", kind))
            .await
    }
}

fn report_path<'a>(segments: &[&'a str]) -> Vec<&'a str> {
    let mut path: Vec<&str> = BASE_PATH.to_vec();
    path.extend_from_slice(segments);
    path
}

fn period_query(period: &ReportPeriod) -> [(&'static str, String); 2] {
    [("start", period.start_param()), ("end", period.end_param())]
}

fn ip_query(query: &IpStatusQuery) -> Vec<(&'static str, String)> {
    match query {
        IpStatusQuery::MostRecent => vec![("mostRecent", "true".to_string())],
        IpStatusQuery::Period(period) => period_query(period).to_vec(),
    }
}

#[async_trait]
impl ReportService for HttpReportService {
    async fn datacenters_traffic_window(&self) -> Result<TrafficWindow> {
        self.window("datacenters").await
    }

    async fn properties_traffic_window(&self) -> Result<TrafficWindow> {
        self.window("properties").await
    }

    async fn traffic_per_datacenter(
        &self,
        domain: &str,
        id: DatacenterId,
        period: &ReportPeriod,
    ) -> Result<DatacenterTrafficReport> {
        debug!("Fetching traffic of datacenter {} in {}", id, domain);
        let id_segment = id.to_string();
        let path = report_path(&["traffic", "domains", domain, "datacenters", id_segment.as_str()]);
        let request = self
            .client
            .request(Method::GET, &path)
            .query(&period_query(period));
        self.client
            .send_json(request, SERVICE, &format!("traffic of datacenter {}", id))
            .await
    }

    async fn traffic_per_property(
        &self,
        domain: &str,
        property: &str,
        period: &ReportPeriod,
    ) -> Result<PropertyTrafficReport> {
        debug!("Fetching traffic of property {} in {}", property, domain);
        let path = report_path(&["traffic", "domains", domain, "properties", property]);
        let request = self
            .client
            .request(Method::GET, &path)
            .query(&period_query(period));
        self.client
            .send_json(request, SERVICE, &format!("traffic of property {}", property))
            .await
    }

    async fn ip_status_per_property(
        &self,
        domain: &str,
        property: &str,
        query: &IpStatusQuery,
    ) -> Result<IpAvailabilityReport> {
        debug!("Fetching IP availability of property {} in {}", property, domain);
        let path = report_path(&["ip-availability", "domains", domain, "properties", property]);
        let request = self
            .client
            .request(Method::GET, &path)
            .query(&ip_query(query));
        self.client
            .send_json(
                request,
                SERVICE,
                &format!("IP availability of property {}", property),
            )
            .await
    }

    fn service_name(&self) -> &'static str {
        SERVICE
    }
}
