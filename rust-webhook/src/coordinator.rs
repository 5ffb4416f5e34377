//! Per-site generation coordinator.
//!
//! Each site has a small state machine:
//!
//! ```text
//!            request                 request
//!   Idle ─────────────▶ Running ─────────────▶ RunningWithPending ──┐
//!    ▲                  │    ▲                         │        request
//!    └──── complete ────┘    └─────── complete ────────┘◀─────────┘
//! ```
//!
//! At most one build runs per site. Requests arriving mid-build collapse into
//! a single pending slot that remembers the latest domain; when the build
//! finishes the pending request is replayed once.
//!
//! Every site owns its own lock, so unrelated sites never wait on each other.
//! The outer map lock is held only long enough to look up or insert a slot.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::JobError;
use crate::runner::{BuildReport, JobRunner};
use crate::site::SiteId;

/// What `request_generation` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// A build was started.
    Started,
    /// A build was running; this request will run once it finishes.
    QueuedAsPending,
    /// A follow-up build was already queued; it will use this request's domain.
    AlreadyPending,
}

/// State of one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStatus {
    Idle,
    /// A build for `domain` is in flight.
    Running { domain: String },
    /// A build is in flight and another one for `domain` follows it.
    RunningWithPending { domain: String },
}

type SiteSlot = Arc<Mutex<GenerationStatus>>;

/// Deduplicates, queues and replays rebuild jobs per site.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct GenerationCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    runner: Arc<dyn JobRunner>,
    // Idle slots are kept; removing them would race with a request that
    // already holds the slot.
    sites: Mutex<HashMap<SiteId, SiteSlot>>,
}

impl GenerationCoordinator {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                runner,
                sites: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The runner builds are handed to.
    pub fn runner(&self) -> &Arc<dyn JobRunner> {
        &self.inner.runner
    }

    /// Request a build of `site` publishing to `domain`.
    ///
    /// Never waits on a build: the decision is made under the site's lock and
    /// the build itself is spawned onto the tokio runtime.
    pub fn request_generation(&self, site: &SiteId, domain: &str) -> Decision {
        let slot = self.slot(site);

        let decision = {
            let mut state = lock(&slot);
            let (next, decision) = match &*state {
                GenerationStatus::Idle => (
                    GenerationStatus::Running {
                        domain: domain.to_string(),
                    },
                    Decision::Started,
                ),
                GenerationStatus::Running { .. } => (
                    GenerationStatus::RunningWithPending {
                        domain: domain.to_string(),
                    },
                    Decision::QueuedAsPending,
                ),
                GenerationStatus::RunningWithPending { .. } => (
                    GenerationStatus::RunningWithPending {
                        domain: domain.to_string(),
                    },
                    Decision::AlreadyPending,
                ),
            };
            *state = next;
            decision
        };

        match decision {
            Decision::Started => {
                info!(site = %site, domain = %domain, "generation_started");
                self.spawn_job(site.clone(), domain.to_string());
            }
            Decision::QueuedAsPending => {
                info!(site = %site, domain = %domain, "generation_queued");
            }
            Decision::AlreadyPending => {
                info!(site = %site, domain = %domain, "generation_already_pending");
            }
        }

        decision
    }

    /// Snapshot of one site's state. `None` if the site was never requested.
    pub fn status(&self, site: &SiteId) -> Option<GenerationStatus> {
        let slot = lock(&self.inner.sites).get(site).cloned()?;
        let status = lock(&slot).clone();
        Some(status)
    }

    /// Record the end of a build and decide whether another one follows.
    ///
    /// Returns the domain of the follow-up build, if any; the site stays
    /// `Running` in that case. Failures are reported and never retried here.
    fn on_job_complete(
        &self,
        site: &SiteId,
        domain: &str,
        result: Result<BuildReport, JobError>,
    ) -> Option<String> {
        match result {
            Ok(report) => {
                for failure in &report.auxiliary_failures {
                    warn!(site = %site, domain = %domain, error = %failure, "generation_auxiliary_step_failed");
                }
                info!(
                    site = %site,
                    domain = %domain,
                    auxiliary_failures = report.auxiliary_failures.len(),
                    "generation_succeeded"
                );
            }
            Err(e) => {
                error!(site = %site, domain = %domain, error = %e, "generation_failed");
            }
        }

        let Some(slot) = lock(&self.inner.sites).get(site).cloned() else {
            warn!(site = %site, "generation_complete_unknown_site");
            return None;
        };

        let mut state = lock(&slot);
        match std::mem::replace(&mut *state, GenerationStatus::Idle) {
            GenerationStatus::RunningWithPending { domain: next } => {
                *state = GenerationStatus::Running {
                    domain: next.clone(),
                };
                info!(site = %site, domain = %next, "generation_pending_replayed");
                Some(next)
            }
            GenerationStatus::Running { .. } => {
                info!(site = %site, "generation_idle");
                None
            }
            GenerationStatus::Idle => {
                warn!(site = %site, "generation_complete_while_idle");
                None
            }
        }
    }

    fn slot(&self, site: &SiteId) -> SiteSlot {
        lock(&self.inner.sites)
            .entry(site.clone())
            .or_insert_with(|| Arc::new(Mutex::new(GenerationStatus::Idle)))
            .clone()
    }

    fn spawn_job(&self, site: SiteId, domain: String) {
        let coordinator = self.clone();
        tokio::spawn(coordinator.drive(site, domain));
    }

    /// Run builds for `site` until no pending request is left.
    async fn drive(self, site: SiteId, mut domain: String) {
        loop {
            let result = AssertUnwindSafe(self.inner.runner.run(&site, &domain))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(JobError::Failure(panic_message(panic.as_ref()))));

            match self.on_job_complete(&site, &domain, result) {
                Some(next) => domain = next,
                None => break,
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("job panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("job panicked: {s}")
    } else {
        "job panicked".to_string()
    }
}
