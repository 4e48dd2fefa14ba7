//! In-flight summary registry
//!
//! One [`SummaryResult`] per summary id, each behind its own mutex. The map
//! lock is only held long enough to find or insert an entry, so reports for
//! different deployments never wait on each other while reports for the same
//! deployment are applied one at a time.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use coa_protocol::summary::{DeploymentSummary, SummaryResult, SummaryState, TargetResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregator::lifecycle;
use crate::errors::CoordinatorError;

type Slot = Arc<Mutex<SummaryResult>>;

/// Key prefix of summaries stored under a deployment name
const NAMED_SUMMARY_PREFIX: &str = "summary-";

/// Registry of the summaries this coordinator is tracking
#[derive(Default)]
pub struct SummaryRegistry {
    entries: RwLock<HashMap<String, Slot>>,
}

fn lock(slot: &Slot) -> MutexGuard<'_, SummaryResult> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

impl SummaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &str) -> Option<Slot> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).cloned()
    }

    /// Start a new attempt for `id`, replacing any previous one
    pub fn begin(&self, id: &str, generation: &str, hash: &str) -> SummaryResult {
        let attempt = SummaryResult::new(id, generation, hash, SummaryState::Running);

        let slot = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            match entries.entry(id.to_string()) {
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(Mutex::new(attempt.clone())));
                    info!("Started summary {} (generation {})", id, generation);
                    return attempt;
                }
                Entry::Occupied(entry) => entry.get().clone(),
            }
        };

        let mut current = lock(&slot);
        info!(
            "Restarted summary {} (generation {} -> {})",
            id, current.generation, generation
        );
        *current = attempt.clone();
        attempt
    }

    /// Apply `f` to the summary under its lock.
    ///
    /// `f` works on a copy that replaces the stored summary only when it
    /// returns `Ok`, with a refreshed timestamp.
    pub fn update<T, F>(&self, id: &str, f: F) -> Result<T, CoordinatorError>
    where
        F: FnOnce(&mut SummaryResult) -> Result<T, CoordinatorError>,
    {
        let slot = self
            .slot(id)
            .ok_or_else(|| CoordinatorError::SummaryNotFound(id.to_string()))?;
        let mut current = lock(&slot);

        let mut draft = current.clone();
        let output = f(&mut draft)?;
        draft.touch();
        *current = draft;
        Ok(output)
    }

    /// Merge a target report into the summary
    pub fn apply_target_result(
        &self,
        id: &str,
        target: &str,
        result: TargetResult,
    ) -> Result<SummaryResult, CoordinatorError> {
        self.update(id, |current| {
            if current.is_finished() {
                warn!("Rejected report for target {} of finished summary {}", target, id);
                return Err(CoordinatorError::SummaryFinished(id.to_string()));
            }
            current.summary.update_target_result(target, result);
            Ok(current.clone())
        })
    }

    /// Apply a partial update of the caller-owned counters and flags
    pub fn apply_progress(
        &self,
        id: &str,
        progress: SummaryProgress,
    ) -> Result<SummaryResult, CoordinatorError> {
        self.update(id, |current| {
            if current.is_finished() {
                return Err(CoordinatorError::SummaryFinished(id.to_string()));
            }
            progress.apply(&mut current.summary);
            Ok(current.clone())
        })
    }

    /// Move the summary to `state`
    pub fn advance(&self, id: &str, state: SummaryState) -> Result<SummaryResult, CoordinatorError> {
        self.update(id, |current| {
            lifecycle::advance(current, state)?;
            Ok(current.clone())
        })
    }

    /// Mark the summary done and generate its status message
    pub fn complete(&self, id: &str) -> Result<(SummaryResult, String), CoordinatorError> {
        self.update(id, |current| {
            lifecycle::advance(current, SummaryState::Done)?;
            let message = current.summary.generate_status_message();
            Ok((current.clone(), message))
        })
    }

    /// Replace the summary wholesale.
    ///
    /// When both the stored and the incoming job ids are set, the incoming id
    /// must be an integer no older than the stored one. The state may only
    /// move forward, so a finished summary cannot be reopened.
    pub fn upsert(
        &self,
        id: &str,
        generation: &str,
        hash: &str,
        summary: DeploymentSummary,
        state: SummaryState,
    ) -> Result<SummaryResult, CoordinatorError> {
        let mut replacement = SummaryResult::new(id, generation, hash, state);
        replacement.summary = summary;

        let slot = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            match entries.entry(id.to_string()) {
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(Mutex::new(replacement.clone())));
                    info!("Stored summary {}", id);
                    return Ok(replacement);
                }
                Entry::Occupied(entry) => entry.get().clone(),
            }
        };

        let mut current = lock(&slot);
        check_job_order(id, &current.summary.job_id, &replacement.summary.job_id)?;
        lifecycle::check_transition(id, current.state, replacement.state)?;
        *current = replacement.clone();
        debug!("Replaced summary {}", id);
        Ok(replacement)
    }

    pub fn get(&self, id: &str) -> Option<SummaryResult> {
        self.slot(id).map(|slot| lock(&slot).clone())
    }

    /// Look up by id, then by the `summary-<name>` key
    pub fn find(&self, id: &str, name: Option<&str>) -> Option<SummaryResult> {
        self.get(id).or_else(|| {
            let name = name.filter(|name| !name.is_empty())?;
            debug!("Summary {} not found, trying name {}", id, name);
            self.get(&format!("{}{}", NAMED_SUMMARY_PREFIX, name))
        })
    }

    /// All summaries, ordered by id
    pub fn list(&self) -> Vec<SummaryResult> {
        let mut slots: Vec<(String, Slot)> = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries
                .iter()
                .map(|(id, slot)| (id.clone(), slot.clone()))
                .collect()
        };
        slots.sort_by(|(a, _), (b, _)| a.cmp(b));
        slots.iter().map(|(_, slot)| lock(slot).clone()).collect()
    }

    pub fn remove(&self, id: &str) -> Option<SummaryResult> {
        let slot = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.remove(id)
        }?;
        info!("Removed summary {}", id);
        let removed = lock(&slot).clone();
        Some(removed)
    }

    /// Keep the summary but flag it as removed
    pub fn soft_remove(&self, id: &str) -> Result<SummaryResult, CoordinatorError> {
        self.update(id, |current| {
            current.summary.removed = true;
            Ok(current.clone())
        })
    }

    pub fn is_finished(&self, id: &str) -> Result<bool, CoordinatorError> {
        self.get(id)
            .map(|current| current.is_finished())
            .ok_or_else(|| CoordinatorError::SummaryNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_job_order(id: &str, current: &str, incoming: &str) -> Result<(), CoordinatorError> {
    if current.is_empty() || incoming.is_empty() {
        debug!("Job id missing for summary {}, skipping order check", id);
        return Ok(());
    }

    let incoming_id: i64 = incoming.parse().map_err(|_| {
        CoordinatorError::BadRequest(format!("job id {} is not an integer", incoming))
    })?;
    match current.parse::<i64>() {
        Ok(current_id) if current_id > incoming_id => Err(CoordinatorError::StaleJobId {
            id: id.to_string(),
            incoming: incoming_id,
            current: current_id,
        }),
        _ => Ok(()),
    }
}

/// Partial update of the counters and flags a reconciler maintains itself.
///
/// Absent fields are left as they are. Nothing here is derived from the
/// target results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryProgress {
    #[serde(default)]
    pub target_count: Option<u32>,

    #[serde(default)]
    pub success_count: Option<u32>,

    #[serde(default)]
    pub planned_deployment: Option<u32>,

    #[serde(default)]
    pub current_deployed: Option<u32>,

    #[serde(default)]
    pub all_assigned_deployed: Option<bool>,

    #[serde(default)]
    pub skipped: Option<bool>,

    #[serde(default)]
    pub is_removal: Option<bool>,

    #[serde(default)]
    pub removed: Option<bool>,

    #[serde(rename = "message", default)]
    pub summary_message: Option<String>,

    #[serde(rename = "jobID", default)]
    pub job_id: Option<String>,
}

impl SummaryProgress {
    pub fn apply(self, summary: &mut DeploymentSummary) {
        if let Some(value) = self.target_count {
            summary.target_count = value;
        }
        if let Some(value) = self.success_count {
            summary.success_count = value;
        }
        if let Some(value) = self.planned_deployment {
            summary.planned_deployment = value;
        }
        if let Some(value) = self.current_deployed {
            summary.current_deployed = value;
        }
        if let Some(value) = self.all_assigned_deployed {
            summary.all_assigned_deployed = value;
        }
        if let Some(value) = self.skipped {
            summary.skipped = value;
        }
        if let Some(value) = self.is_removal {
            summary.is_removal = value;
        }
        if let Some(value) = self.removed {
            summary.removed = value;
        }
        if let Some(value) = self.summary_message {
            summary.summary_message = value;
        }
        if let Some(value) = self.job_id {
            summary.job_id = value;
        }
    }
}
