//! Deployment descriptor models
//!
//! The subset of the deployment plan a provider receives alongside a request.
//! Wire names are camelCase and `null` collections read as empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use tracing::error;

use crate::errors::ProtocolError;

/// Kubernetes-style object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default)]
    pub route: String,

    #[serde(rename = "type", default)]
    pub route_type: String,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// One deployable unit of a solution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub component_type: String,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteSpec>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub constraints: String,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSpec {
    #[serde(default, deserialize_with = "nullable")]
    pub components: Vec<ComponentSpec>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionState {
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: ObjectMeta,

    #[serde(default, deserialize_with = "nullable")]
    pub spec: SolutionSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub solution: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentSpec>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    #[serde(default)]
    pub force_redeploy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: ObjectMeta,

    #[serde(default, deserialize_with = "nullable")]
    pub spec: TargetSpec,
}

/// A deployment plan, possibly restricted to a batch of its components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    #[serde(default)]
    pub solution_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolutionState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceSpec>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, TargetState>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub assignments: BTreeMap<String, String>,

    #[serde(default = "unset_index")]
    pub component_start_index: i64,

    #[serde(default = "unset_index")]
    pub component_end_index: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub active_target: String,
}

impl Default for DeploymentSpec {
    fn default() -> Self {
        Self {
            solution_name: String::new(),
            solution: None,
            instance: None,
            targets: BTreeMap::new(),
            assignments: BTreeMap::new(),
            component_start_index: unset_index(),
            component_end_index: unset_index(),
            active_target: String::new(),
        }
    }
}

impl DeploymentSpec {
    /// Components of the current batch.
    ///
    /// The full list unless both indices are set and `end > start`, in which
    /// case the range `[start, end)` clamped to the list. Empty without a
    /// solution.
    pub fn get_components_slice(&self) -> &[ComponentSpec] {
        let Some(solution) = &self.solution else {
            return &[];
        };
        let components = solution.spec.components.as_slice();

        let (start, end) = (self.component_start_index, self.component_end_index);
        if start >= 0 && end >= 0 && end > start {
            let len = components.len();
            let start = usize::try_from(start).unwrap_or(len).min(len);
            let end = usize::try_from(end).unwrap_or(len).min(len);
            return &components[start..end];
        }
        components
    }
}

/// Parse a JSON array of components, empty when the document is malformed
pub fn deserialize_components(json: &str) -> Vec<ComponentSpec> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        error!("Error deserializing components: {}", e);
        Vec::new()
    })
}

/// Parse a deployment document, `None` when it is malformed
pub fn deserialize_deployment(json: &str) -> Option<DeploymentSpec> {
    match serde_json::from_str(json) {
        Ok(deployment) => Some(deployment),
        Err(e) => {
            error!("Error deserializing deployment: {}", e);
            None
        }
    }
}

/// SHA-256 hex digest of the descriptor's canonical JSON
pub fn deployment_hash(deployment: &DeploymentSpec) -> Result<String, ProtocolError> {
    let bytes = serde_json::to_vec(deployment)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn unset_index() -> i64 {
    -1
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
