//! Status queries
//!
//! Read-only reports built from the reporting service, anchored at the end of
//! its current data window.
//!
//! - Per datacenter: traffic across every property routed to it
//! - Per property: traffic share per datacenter plus IP availability, merged
//!   with the live property by the aggregator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregate::{PropertyStatus, aggregate};
use crate::error::Result;
use crate::model::DatacenterId;
use crate::period::{DEFAULT_PERIOD_LEN, ReportPeriod, parse_period_len};
use crate::traits::{ConfigService, DatacenterTrafficRow, IpStatusQuery, ReportService};

/// Traffic of the selected datacenters over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterTrafficStatus {
    pub domain: String,
    pub period_start: String,
    pub period_end: String,
    pub by_datacenter: Vec<DatacenterTrafficSummary>,
}

/// Traffic of one datacenter, summed per property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterTrafficSummary {
    pub datacenter_id: DatacenterId,
    pub nickname: String,
    pub total_requests: i64,
    pub properties: Vec<PropertyRequests>,
    pub data_rows: Vec<DatacenterTrafficRow>,
}

/// Requests one property sent to a datacenter during the period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRequests {
    pub name: String,
    pub requests: i64,
    /// Status of the most recent sample
    pub status: String,
}

/// Runs status queries against the configuration and reporting services
pub struct StatusReporter {
    config: Arc<dyn ConfigService>,
    reports: Arc<dyn ReportService>,
}

impl StatusReporter {
    pub fn new(config: Arc<dyn ConfigService>, reports: Arc<dyn ReportService>) -> Self {
        Self { config, reports }
    }

    /// Traffic per datacenter over the last `period_len` of the data window
    pub async fn datacenter_status(
        &self,
        domain: &str,
        ids: &[DatacenterId],
        period_len: &str,
    ) -> Result<DatacenterTrafficStatus> {
        let window = self.reports.datacenters_traffic_window().await?;
        let period = ReportPeriod::ending_at(window.end, checked_period_len(period_len));
        info!(
            "Datacenter traffic for {} from {} to {}",
            domain,
            period.start_param(),
            period.end_param()
        );

        let mut by_datacenter = Vec::with_capacity(ids.len());
        for &id in ids {
            let report = self
                .reports
                .traffic_per_datacenter(domain, id, &period)
                .await?;

            let nickname = match report.metadata.datacenter_nickname.clone() {
                Some(nickname) => nickname,
                None => self.lookup_nickname(domain, id).await,
            };
            by_datacenter.push(summarize(id, nickname, report.data_rows));
        }

        Ok(DatacenterTrafficStatus {
            domain: domain.to_string(),
            period_start: period.start_param(),
            period_end: period.end_param(),
            by_datacenter,
        })
    }

    /// Aggregated status of one property over the last `period_len` of the data window
    pub async fn property_status(
        &self,
        domain: &str,
        property: &str,
        period_len: &str,
    ) -> Result<PropertyStatus> {
        let window = self.reports.properties_traffic_window().await?;
        let period = ReportPeriod::ending_at(window.end, checked_period_len(period_len));
        info!(
            "Property status for {} in {} from {} to {}",
            property,
            domain,
            period.start_param(),
            period.end_param()
        );

        let live = self.config.get_property(property, domain).await?;
        let traffic = self
            .reports
            .traffic_per_property(domain, property, &period)
            .await?;
        let ip_availability = self
            .reports
            .ip_status_per_property(domain, property, &IpStatusQuery::MostRecent)
            .await?;

        debug!(
            "{}: {} traffic rows, {} IP rows",
            property,
            traffic.data_rows.len(),
            ip_availability.data_rows.len()
        );
        Ok(aggregate(&traffic, &ip_availability, &live))
    }

    async fn lookup_nickname(&self, domain: &str, id: DatacenterId) -> String {
        match self.config.get_datacenter(id, domain).await {
            Ok(dc) => dc.nickname,
            Err(e) => {
                warn!("Unable to look up nickname of datacenter {}: {}", id, e);
                String::new()
            }
        }
    }
}

fn checked_period_len(period_len: &str) -> &str {
    if parse_period_len(period_len).is_some() {
        period_len
    } else {
        warn!(
            "Invalid period length {:?}, using {}",
            period_len, DEFAULT_PERIOD_LEN
        );
        DEFAULT_PERIOD_LEN
    }
}

fn summarize(
    id: DatacenterId,
    nickname: String,
    data_rows: Vec<DatacenterTrafficRow>,
) -> DatacenterTrafficSummary {
    let mut per_property: BTreeMap<&str, (i64, &str, &str)> = BTreeMap::new();
    for row in &data_rows {
        for property in &row.properties {
            let entry = per_property
                .entry(property.name.as_str())
                .or_insert((0, "", ""));
            entry.0 += property.requests;
            if row.timestamp.as_str() >= entry.1 {
                entry.1 = row.timestamp.as_str();
                entry.2 = property.status.as_str();
            }
        }
    }

    let properties: Vec<PropertyRequests> = per_property
        .into_iter()
        .map(|(name, (requests, _, status))| PropertyRequests {
            name: name.to_string(),
            requests,
            status: status.to_string(),
        })
        .collect();

    DatacenterTrafficSummary {
        datacenter_id: id,
        nickname,
        total_requests: properties.iter().map(|p| p.requests).sum(),
        properties,
        data_rows,
    }
}
