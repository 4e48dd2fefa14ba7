//! Deployment summary models
//!
//! Workers report [`ComponentResult`]s grouped into a [`TargetResult`]; the
//! coordinator merges those into one [`DeploymentSummary`] per deployment and
//! wraps it in a [`SummaryResult`] carrying the lifecycle state.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::state::ResultCode;

/// Status label of a target that reported success
pub const TARGET_STATUS_OK: &str = "OK";

/// Outcome of applying, removing or checking a single component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResult {
    #[serde(default)]
    pub status: ResultCode,

    #[serde(default)]
    pub message: String,
}

impl ComponentResult {
    pub fn new(status: ResultCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ResultCode::OK, message)
    }

    /// Failed component, `INTERNAL_ERROR` unless a status is given
    pub fn failure(message: impl Into<String>, status: Option<ResultCode>) -> Self {
        Self::new(status.unwrap_or(ResultCode::INTERNAL_ERROR), message)
    }
}

fn default_target_status() -> String {
    TARGET_STATUS_OK.to_string()
}

/// Aggregated outcome of every component reported for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    /// Free-form status label ("OK", "Failed", ...)
    #[serde(default = "default_target_status")]
    pub status: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(
        rename = "components",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub component_results: BTreeMap<String, ComponentResult>,
}

impl Default for TargetResult {
    fn default() -> Self {
        Self {
            status: default_target_status(),
            message: String::new(),
            component_results: BTreeMap::new(),
        }
    }
}

impl TargetResult {
    pub fn new(
        status: impl Into<String>,
        message: impl Into<String>,
        component_results: BTreeMap<String, ComponentResult>,
    ) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            component_results,
        }
    }

    /// An "OK" target with the given components
    pub fn ok(component_results: BTreeMap<String, ComponentResult>) -> Self {
        Self::new(TARGET_STATUS_OK, "", component_results)
    }

    /// Add or replace one component result
    pub fn with_component(mut self, name: impl Into<String>, result: ComponentResult) -> Self {
        self.component_results.insert(name.into(), result);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == TARGET_STATUS_OK
    }

    /// Merge a later report for the same target into this one.
    ///
    /// A non-"OK" incoming status replaces the stored one; an "OK" incoming
    /// status never does. Messages are joined with `"; "`. Components are
    /// upserted by name, entries absent from `incoming` are left untouched.
    pub fn merge(&mut self, incoming: TargetResult) {
        if incoming.status != TARGET_STATUS_OK {
            self.status = incoming.status;
        }

        if !incoming.message.is_empty() {
            if !self.message.is_empty() {
                self.message.push_str("; ");
            }
            self.message.push_str(&incoming.message);
        }

        self.component_results.extend(incoming.component_results);
    }
}

/// Plan-level report for one deployment operation.
///
/// `success_count` and `current_deployed` are bookkeeping owned by the
/// caller; nothing here derives them from `target_results`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    #[serde(default)]
    pub target_count: u32,

    #[serde(default)]
    pub success_count: u32,

    #[serde(default)]
    pub planned_deployment: u32,

    #[serde(default)]
    pub current_deployed: u32,

    #[serde(
        rename = "targets",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub target_results: BTreeMap<String, TargetResult>,

    #[serde(rename = "message", default, skip_serializing_if = "String::is_empty")]
    pub summary_message: String,

    #[serde(rename = "jobID", default, skip_serializing_if = "String::is_empty")]
    pub job_id: String,

    #[serde(default)]
    pub skipped: bool,

    #[serde(default)]
    pub is_removal: bool,

    #[serde(default)]
    pub all_assigned_deployed: bool,

    #[serde(default)]
    pub removed: bool,
}

impl DeploymentSummary {
    /// Store a target report, merging into the existing entry for `target` if any
    pub fn update_target_result(&mut self, target: &str, result: TargetResult) {
        match self.target_results.entry(target.to_string()) {
            Entry::Vacant(entry) => {
                debug!("Recording first result for target {}", target);
                entry.insert(result);
            }
            Entry::Occupied(mut entry) => {
                debug!("Merging result for target {}", target);
                entry.get_mut().merge(result);
            }
        }
    }

    /// Diagnostic message for a deployment that did not fully land.
    ///
    /// Empty when every assigned component is deployed. Targets and their
    /// components are listed in lexicographic name order.
    pub fn generate_status_message(&self) -> String {
        if self.all_assigned_deployed {
            return String::new();
        }

        let mut message = String::from("Failed to deploy");
        if !self.summary_message.is_empty() {
            message.push_str(": ");
            message.push_str(&self.summary_message);
        }
        message.push_str(". ");

        let target_errors: Vec<String> = self
            .target_results
            .iter()
            .map(|(target, result)| {
                let mut entry = format!("{}: \"{}\"", target, result.message);
                for (component, component_result) in &result.component_results {
                    entry.push_str(&format!(
                        " ({}.{}: {})",
                        target, component, component_result.message
                    ));
                }
                entry
            })
            .collect();

        message.push_str("Detailed status: ");
        message.push_str(&target_errors.join(", "));
        message
    }

    /// Flat status properties as a reconciler records them on an instance
    pub fn status_properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        properties.insert("targets".to_string(), self.target_count.to_string());
        properties.insert("deployed".to_string(), self.success_count.to_string());
        for (target, result) in &self.target_results {
            properties.insert(
                format!("targets.{}", target),
                format!("{} - {}", result.status, result.message),
            );
        }
        properties
    }
}

/// Lifecycle of a summarized operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum SummaryState {
    /// Reserved, no caller reports it today
    #[default]
    Pending,
    /// A reconcile operation is in progress
    Running,
    /// The operation completed, successfully or not
    Done,
}

impl SummaryState {
    pub fn as_u8(self) -> u8 {
        match self {
            SummaryState::Pending => 0,
            SummaryState::Running => 1,
            SummaryState::Done => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SummaryState::Pending),
            1 => Some(SummaryState::Running),
            2 => Some(SummaryState::Done),
            _ => None,
        }
    }
}

impl Serialize for SummaryState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for SummaryState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let state = value
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .and_then(SummaryState::from_u8);
        Ok(state.unwrap_or_else(|| {
            warn!("Unrecognized summary state {}, using PENDING", value);
            SummaryState::Pending
        }))
    }
}

/// A [`DeploymentSummary`] versioned with lifecycle state and identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    #[serde(default)]
    pub summary: DeploymentSummary,

    #[serde(rename = "summaryid", default)]
    pub summary_id: String,

    #[serde(default)]
    pub generation: String,

    #[serde(rename = "time", default = "Utc::now", deserialize_with = "lenient_time")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub state: SummaryState,

    #[serde(rename = "deploymentHash", default)]
    pub deployment_hash: String,
}

impl Default for SummaryResult {
    fn default() -> Self {
        Self {
            summary: DeploymentSummary::default(),
            summary_id: String::new(),
            generation: String::new(),
            timestamp: Utc::now(),
            state: SummaryState::Pending,
            deployment_hash: String::new(),
        }
    }
}

impl SummaryResult {
    pub fn new(
        summary_id: impl Into<String>,
        generation: impl Into<String>,
        deployment_hash: impl Into<String>,
        state: SummaryState,
    ) -> Self {
        Self {
            summary_id: summary_id.into(),
            generation: generation.into(),
            deployment_hash: deployment_hash.into(),
            state,
            ..Default::default()
        }
    }

    /// Whether the operation has finished, successfully or not
    pub fn is_finished(&self) -> bool {
        self.state == SummaryState::Done
    }

    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}

fn lenient_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = value.as_str().and_then(|raw| {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|t| t.and_utc())
                    .ok()
            })
    });
    Ok(parsed.unwrap_or_else(|| {
        warn!("Unparseable summary time {}, using now", value);
        Utc::now()
    }))
}
