//! Status aggregator
//!
//! Merges property traffic and IP availability telemetry with the live
//! property configuration into one report.
//!
//! Telemetry is incomplete by nature: a disabled datacenter generates no
//! traffic rows, and the reporting service knows nothing about `enabled`
//! flags. The live property is therefore the source of truth for which
//! datacenters exist; every declared target appears in the report, backfilled
//! with zero requests when telemetry is silent about it.
//!
//! The aggregator only reads the property. It never mutates configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::model::{DatacenterId, Property};
use crate::traits::{IpAvailabilityReport, IpStatus, PropertyTrafficReport, TrafficReportRow};

/// Aggregated status of one property over a report period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyStatus {
    pub domain: String,
    pub property_name: String,
    pub period_start: String,
    pub period_end: String,
    pub report_interval: String,
    pub status_summary: StatusSummary,
    /// Raw per-interval traffic rows, for the interval table
    pub datacenter_interval_status: Vec<TrafficReportRow>,
}

/// Per-datacenter summary for the whole period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    /// Timestamp of the IP availability sample, `None` when no sample exists
    pub last_update: Option<String>,
    pub cut_off: f64,
    pub datacenters: Vec<DatacenterStatus>,
}

/// One datacenter's share of a property's traffic plus its IP detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterStatus {
    pub datacenter_id: DatacenterId,
    pub nickname: String,
    pub traffic_target_name: String,
    /// Copied from the live target; `None` when the property does not declare it
    pub enabled: Option<bool>,
    pub total_requests: i64,
    pub usage_percentage: f64,
    /// `usage_percentage` formatted as `12.34%`
    pub property_usage: String,
    /// Status of the most recent traffic sample, `"0"` without one
    pub status: String,
    pub ips: Vec<IpStatus>,
}

/// One line of the positional summary table
///
/// Datacenters with several IPs span several rows; only the first carries
/// the datacenter columns. Datacenters without IP detail still get one row.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow<'a> {
    pub datacenter: &'a DatacenterStatus,
    pub ip: Option<&'a IpStatus>,
    pub continuation: bool,
}

impl PropertyStatus {
    /// Flatten the summary into table rows
    pub fn summary_rows(&self) -> Vec<SummaryRow<'_>> {
        let mut rows = Vec::new();
        for dc in &self.status_summary.datacenters {
            if dc.ips.is_empty() {
                rows.push(SummaryRow {
                    datacenter: dc,
                    ip: None,
                    continuation: false,
                });
                continue;
            }
            for (i, ip) in dc.ips.iter().enumerate() {
                rows.push(SummaryRow {
                    datacenter: dc,
                    ip: Some(ip),
                    continuation: i > 0,
                });
            }
        }
        rows
    }

    /// Requests across all datacenters
    pub fn total_requests(&self) -> i64 {
        self.status_summary
            .datacenters
            .iter()
            .map(|dc| dc.total_requests)
            .sum()
    }
}

#[derive(Default)]
struct Tally {
    requests: i64,
    nickname: String,
    target_name: String,
    latest: Option<(String, String)>,
}

/// Merge telemetry with the live property
pub fn aggregate(
    traffic: &PropertyTrafficReport,
    ip_availability: &IpAvailabilityReport,
    live: &Property,
) -> PropertyStatus {
    let mut tallies: BTreeMap<DatacenterId, Tally> = BTreeMap::new();
    let mut total_requests: i64 = 0;

    for row in &traffic.data_rows {
        for dc in &row.datacenters {
            let tally = tallies.entry(dc.datacenter_id).or_default();
            tally.requests += dc.requests;
            total_requests += dc.requests;
            if tally.nickname.is_empty() {
                tally.nickname = dc.nickname.clone();
            }
            if tally.target_name.is_empty() {
                tally.target_name = dc.traffic_target_name.clone();
            }
            let newer = tally
                .latest
                .as_ref()
                .is_none_or(|(ts, _)| row.timestamp >= *ts);
            if newer {
                tally.latest = Some((row.timestamp.clone(), dc.status.clone()));
            }
        }
    }

    let latest_ip_row = ip_availability
        .data_rows
        .iter()
        .max_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let ip_by_dc: HashMap<DatacenterId, &crate::traits::DatacenterIpStatus> = latest_ip_row
        .map(|row| {
            row.datacenters
                .iter()
                .map(|dc| (dc.datacenter_id, dc))
                .collect()
        })
        .unwrap_or_default();

    // Declared targets first, in declaration order, then telemetry-only datacenters by id
    let mut order: Vec<DatacenterId> = Vec::new();
    for target in &live.traffic_targets {
        if !order.contains(&target.datacenter_id) {
            order.push(target.datacenter_id);
        }
    }
    let mut extra: Vec<DatacenterId> = tallies
        .keys()
        .chain(ip_by_dc.keys())
        .copied()
        .filter(|id| live.target(*id).is_none())
        .collect();
    extra.sort();
    extra.dedup();
    order.extend(extra);

    let datacenters = order
        .into_iter()
        .map(|id| {
            let declared = live.target(id);
            let tally = tallies.get(&id);
            let ip = ip_by_dc.get(&id);

            let requests = tally.map(|t| t.requests).unwrap_or(0);
            let usage_percentage = usage(requests, total_requests);

            let nickname = tally
                .map(|t| t.nickname.clone())
                .filter(|n| !n.is_empty())
                .or_else(|| ip.map(|dc| dc.nickname.clone()))
                .unwrap_or_default();
            let traffic_target_name = tally
                .map(|t| t.target_name.clone())
                .filter(|n| !n.is_empty())
                .or_else(|| ip.map(|dc| dc.traffic_target_name.clone()))
                .filter(|n| !n.is_empty())
                .or_else(|| declared.and_then(|t| t.name.clone()))
                .unwrap_or_default();

            DatacenterStatus {
                datacenter_id: id,
                nickname,
                traffic_target_name,
                enabled: declared.map(|t| t.enabled),
                total_requests: requests,
                usage_percentage,
                property_usage: format!("{:.2}%", usage_percentage),
                status: tally
                    .and_then(|t| t.latest.as_ref())
                    .map(|(_, status)| status.clone())
                    .unwrap_or_else(|| "0".to_string()),
                ips: ip.map(|dc| dc.ips.clone()).unwrap_or_default(),
            }
        })
        .collect();

    PropertyStatus {
        domain: non_empty_or(&ip_availability.metadata.domain, &traffic.metadata.domain),
        property_name: ip_availability
            .metadata
            .property
            .clone()
            .or_else(|| traffic.metadata.property.clone())
            .unwrap_or_else(|| live.name.clone()),
        period_start: traffic.metadata.start.clone(),
        period_end: traffic.metadata.end.clone(),
        report_interval: traffic.metadata.interval.clone(),
        status_summary: StatusSummary {
            last_update: latest_ip_row.map(|row| row.timestamp.clone()),
            cut_off: latest_ip_row.map(|row| row.cut_off).unwrap_or(0.0),
            datacenters,
        },
        datacenter_interval_status: traffic.data_rows.clone(),
    }
}

/// Share of `requests` in `total`, as a percentage; 0 when there is no traffic
fn usage(requests: i64, total: i64) -> f64 {
    if total > 0 {
        (requests as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

fn non_empty_or(first: &str, second: &str) -> String {
    if first.is_empty() {
        second.to_string()
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrafficTarget;
    use crate::traits::{
        DatacenterIpStatus, DatacenterTraffic, IpAvailabilityRow, ReportMetadata,
    };

    fn traffic_row(ts: &str, counts: &[(u32, i64)]) -> TrafficReportRow {
        TrafficReportRow {
            timestamp: ts.to_string(),
            datacenters: counts
                .iter()
                .map(|&(id, requests)| DatacenterTraffic {
                    datacenter_id: DatacenterId(id),
                    nickname: format!("dc{}", id),
                    traffic_target_name: format!("target{}", id),
                    requests,
                    status: "1".to_string(),
                })
                .collect(),
        }
    }

    fn traffic(rows: Vec<TrafficReportRow>) -> PropertyTrafficReport {
        PropertyTrafficReport {
            metadata: ReportMetadata {
                domain: "example.akadns.net".to_string(),
                property: Some("www".to_string()),
                start: "2019-08-01T10:00:00Z".to_string(),
                end: "2019-08-01T10:15:00Z".to_string(),
                interval: "FIVE_MINUTE".to_string(),
                ..ReportMetadata::default()
            },
            data_rows: rows,
        }
    }

    fn ip(addr: &str) -> IpStatus {
        IpStatus {
            ip: addr.to_string(),
            handed_out: true,
            alive: true,
            score: 1.0,
        }
    }

    fn live() -> Property {
        Property::new("www")
            .with_target(TrafficTarget::new(1).with_name("east"))
            .with_target(TrafficTarget::new(2).with_name("west"))
            .with_target(TrafficTarget::new(3).with_name("north").with_enabled(false))
    }

    #[test]
    fn test_percentages_sum_to_100() {
        let report = aggregate(
            &traffic(vec![
                traffic_row("t1", &[(1, 10), (2, 20)]),
                traffic_row("t2", &[(1, 3), (2, 0)]),
            ]),
            &IpAvailabilityReport::default(),
            &live(),
        );

        let sum: f64 = report
            .status_summary
            .datacenters
            .iter()
            .map(|dc| dc.usage_percentage)
            .sum();
        assert!((sum - 100.0).abs() < 0.01 * report.status_summary.datacenters.len() as f64);
        assert_eq!(report.total_requests(), 33);
        assert_eq!(report.status_summary.datacenters[0].total_requests, 13);
        assert_eq!(report.status_summary.datacenters[0].property_usage, "39.39%");
    }

    #[test]
    fn test_zero_traffic_yields_zero_percent() {
        let report = aggregate(
            &traffic(vec![traffic_row("t1", &[(1, 0), (2, 0)])]),
            &IpAvailabilityReport::default(),
            &live(),
        );

        for dc in &report.status_summary.datacenters {
            assert_eq!(dc.usage_percentage, 0.0);
            assert_eq!(dc.property_usage, "0.00%");
        }
    }

    #[test]
    fn test_silent_declared_datacenter_is_backfilled() {
        let report = aggregate(
            &traffic(vec![traffic_row("t1", &[(1, 5), (2, 5)])]),
            &IpAvailabilityReport::default(),
            &live(),
        );

        let dcs = &report.status_summary.datacenters;
        assert_eq!(dcs.len(), 3);
        let north = &dcs[2];
        assert_eq!(north.datacenter_id, DatacenterId(3));
        assert_eq!(north.total_requests, 0);
        assert_eq!(north.property_usage, "0.00%");
        assert_eq!(north.status, "0");
        assert_eq!(north.enabled, Some(false));
        assert_eq!(north.traffic_target_name, "north");
    }

    #[test]
    fn test_telemetry_only_datacenter_kept_after_declared() {
        let report = aggregate(
            &traffic(vec![traffic_row("t1", &[(9, 5), (1, 5)])]),
            &IpAvailabilityReport::default(),
            &live(),
        );

        let ids: Vec<u32> = report
            .status_summary
            .datacenters
            .iter()
            .map(|dc| dc.datacenter_id.0)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 9]);
        assert_eq!(report.status_summary.datacenters[3].enabled, None);
    }

    #[test]
    fn test_ip_rows_and_placeholders() {
        let ips = IpAvailabilityReport {
            metadata: ReportMetadata::default(),
            data_rows: vec![IpAvailabilityRow {
                timestamp: "2019-08-01T10:14:00Z".to_string(),
                cut_off: 0.5,
                datacenters: vec![DatacenterIpStatus {
                    datacenter_id: DatacenterId(1),
                    nickname: "dc1".to_string(),
                    traffic_target_name: "east".to_string(),
                    ips: vec![ip("1.1.1.1"), ip("1.1.1.2")],
                }],
            }],
        };

        let report = aggregate(&traffic(vec![]), &ips, &live());
        assert_eq!(
            report.status_summary.last_update.as_deref(),
            Some("2019-08-01T10:14:00Z")
        );
        assert_eq!(report.status_summary.cut_off, 0.5);

        let rows = report.summary_rows();
        // two IP rows for dc 1, one placeholder each for dc 2 and dc 3
        assert_eq!(rows.len(), 4);
        assert!(!rows[0].continuation);
        assert!(rows[1].continuation);
        assert_eq!(rows[1].ip.map(|ip| ip.ip.as_str()), Some("1.1.1.2"));
        assert!(rows[2].ip.is_none());
        assert_eq!(rows[3].datacenter.datacenter_id, DatacenterId(3));
    }

    #[test]
    fn test_no_ip_sample() {
        let report = aggregate(&traffic(vec![]), &IpAvailabilityReport::default(), &live());
        assert!(report.status_summary.last_update.is_none());
        assert_eq!(report.property_name, "www");
        assert_eq!(report.domain, "example.akadns.net");
    }

    #[test]
    fn test_latest_status_wins() {
        let mut late = traffic_row("t2", &[(1, 1)]);
        late.datacenters[0].status = "2".to_string();
        let report = aggregate(
            &traffic(vec![late, traffic_row("t1", &[(1, 1)])]),
            &IpAvailabilityReport::default(),
            &live(),
        );
        assert_eq!(report.status_summary.datacenters[0].status, "2");
    }

    #[test]
    fn test_live_property_untouched() {
        let property = live();
        let before = property.clone();
        let _ = aggregate(
            &traffic(vec![traffic_row("t1", &[(1, 5)])]),
            &IpAvailabilityReport::default(),
            &property,
        );
        assert_eq!(property, before);
    }
}
