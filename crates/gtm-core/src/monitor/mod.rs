//! Propagation monitor
//!
//! Tracks a submitted change until the remote service reports a terminal
//! propagation state or the local time budget runs out.
//!
//! ```text
//!            poll (every interval)
//!   PENDING ───────────────────────► PENDING ──► ...
//!      │                               │
//!      ├──► COMPLETE   (terminal)      ├──► TIMEOUT     budget cannot cover another interval
//!      └──► DENIED     (terminal)      └──► POLL_ERROR  status fetch failed
//! ```
//!
//! `TIMEOUT` and `POLL_ERROR` are local observations only; they never change
//! the remote status, and both carry the last status that was fetched.
//!
//! The monitor is a lazy, finite [`Stream`] of [`MonitorEvent`]s. Nothing is
//! polled until the stream is consumed, and it ends right after yielding
//! [`MonitorEvent::Finished`]. Presentation (progress dots, messages) is left
//! to the consumer.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::traits::{ConfigService, DeploymentStatus, PropagationStatus};

/// Terminal result of monitoring one change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorOutcome {
    /// Change deployed
    Complete { status: DeploymentStatus },
    /// Change denied by the service; the call itself succeeded
    Denied { status: DeploymentStatus },
    /// Budget exhausted while still pending
    Timeout { status: DeploymentStatus },
    /// A status fetch failed; `status` is the last one known
    PollError {
        status: DeploymentStatus,
        error: String,
    },
}

impl MonitorOutcome {
    /// Last known deployment status
    pub fn status(&self) -> &DeploymentStatus {
        match self {
            Self::Complete { status }
            | Self::Denied { status }
            | Self::Timeout { status }
            | Self::PollError { status, .. } => status,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Short operator-facing description
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Complete { .. } => "Change deployed",
            Self::Denied { .. } => "Change denied",
            Self::Timeout { .. } => {
                "Maximum wait time elapsed. Use query-status to confirm successful deployment"
            }
            Self::PollError { .. } => "Unable to retrieve domain status",
        }
    }

    fn from_terminal(status: DeploymentStatus) -> Self {
        match status.propagation_status {
            PropagationStatus::Denied => Self::Denied { status },
            _ => Self::Complete { status },
        }
    }
}

/// One step of the monitor
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A poll returned a still-pending status
    Polled {
        /// Polls performed so far
        polls: u32,
        status: DeploymentStatus,
        /// Budget left after this poll
        remaining: Duration,
    },
    /// The monitor stopped; always the last item
    Finished(MonitorOutcome),
}

/// Polls a domain's deployment status at a fixed interval
pub struct PropagationMonitor<'a> {
    config: &'a dyn ConfigService,
    domain: String,
    interval: Duration,
    timeout: Duration,
}

struct PollState<'a> {
    config: &'a dyn ConfigService,
    domain: String,
    interval: Duration,
    remaining: Duration,
    polls: u32,
    status: DeploymentStatus,
}

impl<'a> PropagationMonitor<'a> {
    /// Create a monitor for `domain`
    pub fn new(
        config: &'a dyn ConfigService,
        domain: impl Into<String>,
        settings: MonitorConfig,
    ) -> Self {
        Self {
            config,
            domain: domain.into(),
            interval: settings.poll_interval(),
            timeout: settings.timeout(),
        }
    }

    /// Override the poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the time budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lazy sequence of poll events starting from the applier's status
    ///
    /// A poll is only scheduled while the remaining budget covers a whole
    /// interval, so a budget shorter than the interval finishes at once with
    /// [`MonitorOutcome::Timeout`].
    pub fn watch(
        self,
        initial: DeploymentStatus,
    ) -> impl Stream<Item = MonitorEvent> + Send + 'a {
        let state = PollState {
            config: self.config,
            domain: self.domain,
            interval: self.interval,
            remaining: self.timeout,
            polls: 0,
            status: initial,
        };

        futures::stream::unfold(Some(state), |state| async move {
            let mut state = state?;

            if state.status.propagation_status.is_terminal() {
                let outcome = MonitorOutcome::from_terminal(state.status);
                info!("{}: {}", state.domain, outcome.describe());
                return Some((MonitorEvent::Finished(outcome), None));
            }

            if state.interval.is_zero() || state.remaining < state.interval {
                warn!(
                    "{}: propagation still {} after {} poll(s), giving up",
                    state.domain, state.status.propagation_status, state.polls
                );
                let outcome = MonitorOutcome::Timeout {
                    status: state.status,
                };
                return Some((MonitorEvent::Finished(outcome), None));
            }

            tokio::time::sleep(state.interval).await;
            state.remaining -= state.interval;
            state.polls += 1;

            match state.config.get_domain_status(&state.domain).await {
                Ok(fresh) => {
                    debug!(
                        "{}: poll {} -> {}",
                        state.domain, state.polls, fresh.propagation_status
                    );
                    state.status = fresh;
                    if state.status.propagation_status.is_terminal() {
                        let outcome = MonitorOutcome::from_terminal(state.status);
                        info!("{}: {}", state.domain, outcome.describe());
                        return Some((MonitorEvent::Finished(outcome), None));
                    }
                    let event = MonitorEvent::Polled {
                        polls: state.polls,
                        status: state.status.clone(),
                        remaining: state.remaining,
                    };
                    Some((event, Some(state)))
                }
                Err(e) => {
                    warn!("{}: unable to retrieve domain status: {}", state.domain, e);
                    let outcome = MonitorOutcome::PollError {
                        status: state.status,
                        error: e.to_string(),
                    };
                    Some((MonitorEvent::Finished(outcome), None))
                }
            }
        })
    }

    /// Drive [`watch`](Self::watch) to its end and return the outcome
    pub async fn wait(self, initial: DeploymentStatus) -> MonitorOutcome {
        let fallback = initial.clone();
        let events = self.watch(initial);
        let mut events = std::pin::pin!(events);

        while let Some(event) = events.next().await {
            if let MonitorEvent::Finished(outcome) = event {
                return outcome;
            }
        }

        // The stream always ends with `Finished`
        MonitorOutcome::Timeout { status: fallback }
    }
}
