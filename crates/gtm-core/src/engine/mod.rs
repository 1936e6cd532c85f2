//! Reconciliation engine
//!
//! The GtmEngine drives one update invocation end to end:
//! - Fetching the live property (or every property of a domain)
//! - Diffing it against the desired change
//! - Submitting changed properties through the mutation applier
//! - Optionally waiting for propagation
//!
//! ## Architecture
//!
//! ```text
//!                    ┌───────────────┐
//!  DesiredChange ───►│   GtmEngine   │───► BatchReport
//!                    └───────────────┘
//!                            │
//!         ┌──────────────────┼──────────────────────┐
//!         │                  │                      │
//!         ▼                  ▼                      ▼
//! ┌──────────────┐   ┌───────────────┐      ┌─────────────┐
//! │  reconcile   │   │ ConfigService │      │   Events    │
//! │  (diff)      │   │ (fetch/apply) │      │  (notify)   │
//! └──────────────┘   └───────────────┘      └─────────────┘
//! ```
//!
//! ## Per-property flow
//!
//! 1. Diff the live property against the change
//! 2. No changes: record as unchanged, submit nothing
//! 3. Dry run: record the planned changes, submit nothing
//! 4. Submit the whole mutated property
//! 5. If requested, monitor propagation until a terminal outcome
//!
//! Properties are processed strictly one after another; each finishes all
//! five steps before the next is fetched from the domain list. A rejected
//! submission is recorded and the batch continues.

mod report;
mod resolve;

pub use report::{BatchReport, FailedUpdate, PlannedProperty, UpdateStatus, UpdatedProperty};
pub use resolve::resolve_datacenters;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::model::{DatacenterId, Property};
use crate::monitor::{MonitorEvent, MonitorOutcome, PropagationMonitor};
use crate::reconcile::{DesiredChange, Reconciliation, reconcile};
use crate::traits::{ConfigService, DeploymentStatus};

/// Capacity of the engine event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Events emitted by the GtmEngine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A property was diffed
    PropertyReconciled {
        property_name: String,
        changes: usize,
    },

    /// A property needed no update
    PropertyUnchanged { property_name: String },

    /// A property submission was accepted
    UpdateSubmitted {
        property_name: String,
        status: DeploymentStatus,
    },

    /// A property submission was rejected
    UpdateFailed {
        property_name: String,
        error: String,
    },

    /// Propagation is still pending after a poll
    PropagationPending {
        property_name: String,
        polls: u32,
        remaining: Duration,
    },

    /// Propagation monitoring stopped
    PropagationFinished {
        property_name: String,
        outcome: MonitorOutcome,
    },
}

/// Per-invocation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Report full deployment statuses instead of change ids
    pub verbose: bool,
    /// Diff only; never submit
    pub dry_run: bool,
    /// Monitor each submission until propagation finishes
    pub wait_for_completion: bool,
    /// Override the configured monitor time budget
    pub timeout: Option<Duration>,
}

impl UpdateOptions {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Core reconciliation engine
///
/// Stateless between invocations: every call fetches the live configuration
/// again and returns its own [`BatchReport`].
pub struct GtmEngine {
    /// Configuration service for fetching and submitting properties
    config: Arc<dyn ConfigService>,

    /// Default propagation monitor settings
    monitor: MonitorConfig,

    /// Event sender for external progress reporting
    event_tx: mpsc::Sender<EngineEvent>,
}

impl GtmEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        config: Arc<dyn ConfigService>,
        monitor: MonitorConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        monitor.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let engine = Self {
            config,
            monitor,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Update a single named property
    ///
    /// # Returns
    ///
    /// - `Ok(BatchReport)`: the property was submitted, left unchanged or planned
    /// - `Err(Error::Validation)`: the change is invalid or matched nothing in the property
    /// - `Err(Error::NotFound)`: the property does not exist
    /// - `Err(Error::AllUpdatesFailed)`: the submission was rejected
    pub async fn update_property(
        &self,
        domain: &str,
        property: &str,
        change: &DesiredChange,
        options: UpdateOptions,
    ) -> Result<BatchReport> {
        change.validate()?;

        info!("Updating property {} in domain {}", property, domain);
        let live = self.config.get_property(property, domain).await?;
        let reconciliation = reconcile(&live, change)?;

        if !reconciliation.applies(change) {
            return Err(Error::validation(unmatched_message(&reconciliation)));
        }
        if !reconciliation.unmatched_datacenters.is_empty()
            || !reconciliation.unmatched_liveness_tests.is_empty()
        {
            warn!("{}", unmatched_message(&reconciliation));
        }

        let mut report = BatchReport::default();
        self.process(domain, reconciliation, &options, &mut report)
            .await;
        report.into_result()
    }

    /// Enable or disable datacenters across every property of a domain
    ///
    /// Properties that do not route to any selected datacenter are skipped.
    ///
    /// # Returns
    ///
    /// - `Ok(BatchReport)`: at least one submission succeeded, or none was needed
    /// - `Err(Error::Validation)`: the change is not a pure enable/disable of datacenters
    /// - `Err(Error::NotFound)`: the domain does not exist
    /// - `Err(Error::AllUpdatesFailed)`: every attempted submission was rejected
    pub async fn update_datacenters(
        &self,
        domain: &str,
        change: &DesiredChange,
        options: UpdateOptions,
    ) -> Result<BatchReport> {
        change.validate()?;
        if change.enabled.is_none()
            || change.edits_weight_or_servers()
            || !change.targets.is_empty()
            || change.liveness_enabled.is_some()
        {
            return Err(Error::validation(
                "domain-wide updates may only enable or disable datacenters",
            ));
        }

        info!(
            "Updating datacenter(s) {} in domain {}",
            join_ids(change.datacenters.iter()),
            domain
        );
        let live = self.config.get_domain(domain).await?;
        debug!("{} contains {} properties", live.name, live.properties.len());

        let mut report = BatchReport::default();
        for property in &live.properties {
            if !property.references_any(&change.datacenters) {
                debug!(
                    "Property {} does not route to the selected datacenter(s), skipping",
                    property.name
                );
                continue;
            }

            let reconciliation = reconcile(property, change)?;
            self.process(domain, reconciliation, &options, &mut report)
                .await;
        }

        if report.attempted() == 0 && report.planned_changes.is_empty() {
            info!("No property updates required in {}", domain);
        }
        report.into_result()
    }

    /// Resolve datacenter ids or nicknames against the domain
    pub async fn resolve_datacenters(
        &self,
        domain: &str,
        selectors: &[String],
    ) -> Result<Vec<DatacenterId>> {
        resolve_datacenters(self.config.as_ref(), domain, selectors).await
    }

    /// Mutation applier: submit the whole property as one atomic update
    ///
    /// Errors from the configuration service are returned unchanged.
    pub async fn apply(&self, property: &Property, domain: &str) -> Result<DeploymentStatus> {
        debug!(
            "Submitting property {} via {}",
            property.name,
            self.config.service_name()
        );
        let status = self.config.update_property(property, domain).await?;
        info!(
            "Property {} submitted, change {} {}",
            property.name, status.change_id, status.propagation_status
        );
        Ok(status)
    }

    /// Run the per-property flow and record the result
    async fn process(
        &self,
        domain: &str,
        reconciliation: Reconciliation,
        options: &UpdateOptions,
        report: &mut BatchReport,
    ) {
        let property_name = reconciliation.property.name.clone();

        self.emit_event(EngineEvent::PropertyReconciled {
            property_name: property_name.clone(),
            changes: reconciliation.changes.len(),
        });

        if !reconciliation.changed() {
            info!("Property {}: no update required", property_name);
            self.emit_event(EngineEvent::PropertyUnchanged {
                property_name: property_name.clone(),
            });
            report.unchanged_properties.push(property_name);
            return;
        }

        if options.dry_run {
            info!(
                "Property {}: {} change(s) planned, not submitted",
                property_name,
                reconciliation.changes.len()
            );
            report.planned_changes.push(PlannedProperty {
                property_name,
                changes: reconciliation.changes,
            });
            return;
        }

        match self.apply(&reconciliation.property, domain).await {
            Ok(status) => {
                self.emit_event(EngineEvent::UpdateSubmitted {
                    property_name: property_name.clone(),
                    status: status.clone(),
                });

                let (status, completion) = if options.wait_for_completion {
                    let outcome = self
                        .watch_propagation(&property_name, domain, status, options)
                        .await;
                    (outcome.status().clone(), Some(outcome))
                } else {
                    (status, None)
                };

                report.updated_properties.push(UpdatedProperty {
                    property_name,
                    status: UpdateStatus::from_status(status, options.verbose),
                    completion,
                });
            }
            Err(e) => {
                error!("Failed to update property {}: {}", property_name, e);
                self.emit_event(EngineEvent::UpdateFailed {
                    property_name: property_name.clone(),
                    error: e.to_string(),
                });
                report.failed_updates.push(FailedUpdate {
                    property_name,
                    fail_msg: e.to_string(),
                });
            }
        }
    }

    /// Drive the propagation monitor, forwarding its progress as events
    async fn watch_propagation(
        &self,
        property_name: &str,
        domain: &str,
        status: DeploymentStatus,
        options: &UpdateOptions,
    ) -> MonitorOutcome {
        let mut monitor = PropagationMonitor::new(self.config.as_ref(), domain, self.monitor);
        if let Some(timeout) = options.timeout {
            monitor = monitor.with_timeout(timeout);
        }

        let fallback = status.clone();
        let events = monitor.watch(status);
        let mut events = std::pin::pin!(events);

        while let Some(event) = events.next().await {
            match event {
                MonitorEvent::Polled {
                    polls, remaining, ..
                } => {
                    self.emit_event(EngineEvent::PropagationPending {
                        property_name: property_name.to_string(),
                        polls,
                        remaining,
                    });
                }
                MonitorEvent::Finished(outcome) => {
                    self.emit_event(EngineEvent::PropagationFinished {
                        property_name: property_name.to_string(),
                        outcome: outcome.clone(),
                    });
                    return outcome;
                }
            }
        }

        MonitorOutcome::Timeout { status: fallback }
    }

    /// Emit an event (non-blocking, drops event if channel is full)
    fn emit_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Event channel full, dropping event");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    // Nobody is listening
                }
            }
        }
    }
}

fn unmatched_message(reconciliation: &Reconciliation) -> String {
    let mut parts = Vec::new();
    if !reconciliation.unmatched_datacenters.is_empty() {
        parts.push(format!(
            "datacenter(s) {} not found in property {}",
            join_ids(reconciliation.unmatched_datacenters.iter()),
            reconciliation.property.name
        ));
    }
    if !reconciliation.unmatched_liveness_tests.is_empty() {
        parts.push(format!(
            "liveness test(s) {} not found in property {}",
            reconciliation.unmatched_liveness_tests.join(", "),
            reconciliation.property.name
        ));
    }
    parts.join("; ")
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a DatacenterId>) -> String {
    ids.map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Datacenter, Domain, TrafficTarget};
    use crate::traits::PropagationStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Accepts every submission and remembers it
    #[derive(Default)]
    struct Recorder {
        property: Option<Property>,
        submitted: Mutex<Vec<Property>>,
    }

    #[async_trait]
    impl ConfigService for Recorder {
        async fn get_domain(&self, name: &str) -> Result<Domain> {
            Err(Error::not_found(name))
        }

        async fn get_property(&self, name: &str, _domain: &str) -> Result<Property> {
            self.property
                .clone()
                .ok_or_else(|| Error::not_found(name))
        }

        async fn update_property(
            &self,
            property: &Property,
            _domain: &str,
        ) -> Result<DeploymentStatus> {
            self.submitted.lock().unwrap().push(property.clone());
            Ok(DeploymentStatus::new("c1", PropagationStatus::Pending))
        }

        async fn get_domain_status(&self, _domain: &str) -> Result<DeploymentStatus> {
            Ok(DeploymentStatus::new("c1", PropagationStatus::Complete))
        }

        async fn get_datacenter(&self, id: DatacenterId, _domain: &str) -> Result<Datacenter> {
            Err(Error::not_found(id.to_string()))
        }

        async fn list_datacenters(&self, _domain: &str) -> Result<Vec<Datacenter>> {
            Ok(Vec::new())
        }

        fn service_name(&self) -> &'static str {
            "recorder"
        }
    }

    fn engine(recorder: Arc<Recorder>) -> (GtmEngine, mpsc::Receiver<EngineEvent>) {
        GtmEngine::new(recorder, MonitorConfig::default()).unwrap()
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            property: Some(
                Property::new("www").with_target(TrafficTarget::new(1).with_weight(1.0)),
            ),
            ..Recorder::default()
        })
    }

    #[tokio::test]
    async fn test_update_submits_mutated_property() {
        let recorder = recorder();
        let (engine, mut events) = engine(recorder.clone());

        let change = DesiredChange::for_datacenters([DatacenterId(1)]).with_weight(2.0);
        let report = engine
            .update_property("example.akadns.net", "www", &change, UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(report.updated_properties.len(), 1);
        assert_eq!(report.updated_properties[0].status.change_id(), "c1");
        let submitted = recorder.submitted.lock().unwrap();
        assert_eq!(submitted[0].traffic_targets[0].weight, 2.0);

        assert_eq!(
            events.recv().await,
            Some(EngineEvent::PropertyReconciled {
                property_name: "www".to_string(),
                changes: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let recorder = recorder();
        let (engine, _events) = engine(recorder.clone());

        let change = DesiredChange::for_datacenters([DatacenterId(1)]).with_enabled(false);
        let report = engine
            .update_property(
                "example.akadns.net",
                "www",
                &change,
                UpdateOptions::default().dry_run(true),
            )
            .await
            .unwrap();

        assert!(report.updated_properties.is_empty());
        assert_eq!(report.planned_changes[0].changes[0].field, "enabled");
        assert!(recorder.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_selection_is_validation_error() {
        let recorder = recorder();
        let (engine, _events) = engine(recorder.clone());

        let change = DesiredChange::for_datacenters([DatacenterId(9)]).with_enabled(true);
        let err = engine
            .update_property("example.akadns.net", "www", &change, UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("datacenter(s) 9 not found"));
    }

    #[tokio::test]
    async fn test_domain_update_rejects_weight() {
        let recorder = recorder();
        let (engine, _events) = engine(recorder.clone());

        let change = DesiredChange::for_datacenters([DatacenterId(1)]).with_weight(3.0);
        let err = engine
            .update_datacenters("example.akadns.net", &change, UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_events_survive_dropped_receiver() {
        let recorder = recorder();
        let (engine, events) = engine(recorder.clone());
        drop(events);

        let change = DesiredChange::for_datacenters([DatacenterId(1)]).with_weight(1.0);
        let report = engine
            .update_property("example.akadns.net", "www", &change, UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(report.unchanged_properties, vec!["www".to_string()]);
    }
}
