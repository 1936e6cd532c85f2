// # gtm-core
//
// Core library for reconciling and inspecting GTM (global traffic
// management) domains.
//
// ## Architecture Overview
//
// - **ConfigService**: Trait for reading and submitting domain configuration
// - **ReportService**: Trait for reading traffic and IP availability telemetry
// - **reconcile**: Pure diff of a desired change against a live property
// - **GtmEngine**: Drives fetch → diff → submit → monitor for one or many properties
// - **PropagationMonitor**: Lazy stream of deployment status polls
// - **aggregate**: Merges telemetry with the live property for display
//
// ## Design Principles
//
// 1. **Diff before write**: A property is only submitted when a field actually changes
// 2. **Whole-document updates**: The remote service accepts or rejects a property atomically
// 3. **Explicit results**: Every invocation returns its own BatchReport
// 4. **Library-First**: The command line front end is a thin layer over this crate

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod monitor;
pub mod period;
pub mod reconcile;
pub mod status;
pub mod traits;

// Re-export core types for convenience
pub use aggregate::{PropertyStatus, aggregate};
pub use config::{GtmConfig, MonitorConfig, ServiceConfig};
pub use engine::{BatchReport, EngineEvent, FailedUpdate, GtmEngine, UpdateOptions, UpdateStatus};
pub use error::{Error, Result};
pub use model::{Datacenter, DatacenterId, Domain, LivenessTest, Property, TrafficTarget};
pub use monitor::{MonitorEvent, MonitorOutcome, PropagationMonitor};
pub use reconcile::{DesiredChange, PlannedChange, TargetOverride, reconcile};
pub use status::{DatacenterTrafficStatus, StatusReporter};
pub use traits::{ConfigService, DeploymentStatus, PropagationStatus, ReportService};
