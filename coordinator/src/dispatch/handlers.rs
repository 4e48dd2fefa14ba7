//! Handlers mapping summary routes onto the registry

use coa_protocol::envelope::{CarriesBody, RequestEnvelope, ResponseEnvelope};
use coa_protocol::models::{deployment_hash, DeploymentSpec};
use coa_protocol::summary::{SummaryResult, TargetResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::aggregator::{SummaryProgress, SummaryRegistry};
use crate::errors::CoordinatorError;

pub type HandlerResult = Result<ResponseEnvelope, CoordinatorError>;

fn respond<T: Serialize>(value: &T) -> HandlerResult {
    let value = serde_json::to_value(value)?;
    Ok(ResponseEnvelope::success(value)?)
}

fn required_body<T: DeserializeOwned>(request: &RequestEnvelope) -> Result<T, CoordinatorError> {
    request
        .get_json::<T>()?
        .ok_or_else(|| CoordinatorError::BadRequest("request body is required".to_string()))
}

fn parameter<'a>(request: &'a RequestEnvelope, name: &str) -> Option<&'a str> {
    request
        .parameters
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// `GET summaries`
pub fn list_summaries(registry: &SummaryRegistry) -> HandlerResult {
    respond(&registry.list())
}

/// `GET summaries/{id}`, falling back to the `name` parameter
pub fn get_summary(registry: &SummaryRegistry, id: &str, request: &RequestEnvelope) -> HandlerResult {
    let result = registry
        .find(id, parameter(request, "name"))
        .ok_or_else(|| CoordinatorError::SummaryNotFound(id.to_string()))?;
    respond(&result)
}

/// `POST summaries/{id}`: start a new attempt.
///
/// Without a `hash` parameter the hash is computed from a deployment
/// descriptor body when one is sent.
pub fn begin_summary(
    registry: &SummaryRegistry,
    id: &str,
    request: &RequestEnvelope,
) -> HandlerResult {
    let generation = parameter(request, "generation").unwrap_or_default();
    let hash = match parameter(request, "hash") {
        Some(hash) => hash.to_string(),
        None => match request.get_json::<DeploymentSpec>()? {
            Some(deployment) => deployment_hash(&deployment)?,
            None => String::new(),
        },
    };
    respond(&registry.begin(id, generation, &hash))
}

/// `PUT summaries/{id}`: replace the summary with the body
pub fn upsert_summary(
    registry: &SummaryRegistry,
    id: &str,
    request: &RequestEnvelope,
) -> HandlerResult {
    let incoming: SummaryResult = required_body(request)?;
    let stored = registry.upsert(
        id,
        &incoming.generation,
        &incoming.deployment_hash,
        incoming.summary,
        incoming.state,
    )?;
    respond(&stored)
}

/// `DELETE summaries/{id}`, flagging instead of dropping with `soft=true`
pub fn delete_summary(
    registry: &SummaryRegistry,
    id: &str,
    request: &RequestEnvelope,
) -> HandlerResult {
    let removed = if parameter(request, "soft") == Some("true") {
        registry.soft_remove(id)?
    } else {
        registry
            .remove(id)
            .ok_or_else(|| CoordinatorError::SummaryNotFound(id.to_string()))?
    };
    respond(&removed)
}

/// `POST summaries/{id}/targets/{target}`: merge a target report
pub fn report_target(
    registry: &SummaryRegistry,
    id: &str,
    target: &str,
    request: &RequestEnvelope,
) -> HandlerResult {
    let result: TargetResult = required_body(request)?;
    respond(&registry.apply_target_result(id, target, result)?)
}

/// `POST summaries/{id}/progress`: update counters and flags
pub fn report_progress(
    registry: &SummaryRegistry,
    id: &str,
    request: &RequestEnvelope,
) -> HandlerResult {
    let progress: SummaryProgress = required_body(request)?;
    respond(&registry.apply_progress(id, progress)?)
}

/// `POST summaries/{id}/complete`: finish the summary
pub fn complete_summary(registry: &SummaryRegistry, id: &str) -> HandlerResult {
    let (summary, message) = registry.complete(id)?;
    respond(&Completion { summary, message })
}

/// Body of a `complete` response
#[derive(Debug, Serialize)]
struct Completion {
    summary: SummaryResult,
    message: String,
}
