//! Collaborator traits
//!
//! The remote services are consumed only through these interfaces.
//!
//! - [`ConfigService`]: read and write domain configuration
//! - [`ReportService`]: read traffic and IP availability telemetry

pub mod config_service;
pub mod report_service;

pub use config_service::{ConfigService, DeploymentStatus, PropagationStatus};
pub use report_service::{
    DatacenterIpStatus, DatacenterTraffic, DatacenterTrafficReport, DatacenterTrafficRow,
    IpAvailabilityReport, IpAvailabilityRow, IpStatus, IpStatusQuery, PropertyTraffic,
    PropertyTrafficReport, ReportMetadata, ReportService, TrafficReportRow, TrafficWindow,
};
