//! Envelope dispatcher
//!
//! Resolves a [`RequestEnvelope`] to a summary route, runs the handler and
//! turns any failure into an error response carrying the matching result
//! code. Every response echoes the request's `request-id`.

pub mod handlers;
pub mod routes;

use std::sync::Arc;

use coa_protocol::envelope::{RequestEnvelope, ResponseEnvelope, REQUEST_ID_KEY};
use coa_protocol::state::ResultCode;
use tracing::{debug, warn};

use crate::aggregator::SummaryRegistry;
use crate::dispatch::handlers::HandlerResult;
use crate::dispatch::routes::{Method, Route};

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SummaryRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SummaryRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SummaryRegistry> {
        &self.registry
    }

    /// Handle one request. Never fails: errors become error responses.
    pub fn dispatch(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        let response = match self.route(request) {
            Ok(response) => response,
            Err(e) => {
                warn!("{} {} failed: {}", request.method, request.route, e);
                ResponseEnvelope::error(&e.to_string(), e.result_code())
            }
        };

        match request.request_id() {
            Some(request_id) => response.with_metadata(REQUEST_ID_KEY, request_id),
            None => response,
        }
    }

    fn route(&self, request: &RequestEnvelope) -> HandlerResult {
        let Some(route) = Route::parse(&request.route) else {
            return Ok(ResponseEnvelope::not_found(&format!(
                "no route {}",
                request.route
            )));
        };
        let method = Method::parse(&request.method);
        if !route.allows(&method) {
            return Ok(ResponseEnvelope::error(
                &format!("method {} not allowed on {}", method, request.route),
                ResultCode::METHOD_NOT_ALLOWED,
            ));
        }
        debug!("Dispatching {} {}", method, request.route);

        let registry = self.registry.as_ref();
        match (method, route) {
            (Method::Get, Route::Summaries) => handlers::list_summaries(registry),
            (Method::Get, Route::Summary { id }) => handlers::get_summary(registry, id, request),
            (Method::Post, Route::Summary { id }) => {
                handlers::begin_summary(registry, id, request)
            }
            (Method::Put, Route::Summary { id }) => {
                handlers::upsert_summary(registry, id, request)
            }
            (Method::Delete, Route::Summary { id }) => {
                handlers::delete_summary(registry, id, request)
            }
            (Method::Post, Route::Target { id, target }) => {
                handlers::report_target(registry, id, target, request)
            }
            (Method::Post, Route::Progress { id }) => {
                handlers::report_progress(registry, id, request)
            }
            (Method::Post, Route::Complete { id }) => handlers::complete_summary(registry, id),
            (method, _) => Ok(ResponseEnvelope::error(
                &format!("method {} not allowed on {}", method, request.route),
                ResultCode::METHOD_NOT_ALLOWED,
            )),
        }
    }
}
