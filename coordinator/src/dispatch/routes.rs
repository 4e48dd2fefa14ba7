//! Route table of the summary API

use std::fmt;

/// Request method, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
            Method::Put => f.write_str("PUT"),
            Method::Delete => f.write_str("DELETE"),
            Method::Other(raw) => f.write_str(raw),
        }
    }
}

/// A resolved route, borrowing its ids from the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// `summaries`
    Summaries,
    /// `summaries/{id}`
    Summary { id: &'a str },
    /// `summaries/{id}/targets/{target}`
    Target { id: &'a str, target: &'a str },
    /// `summaries/{id}/progress`
    Progress { id: &'a str },
    /// `summaries/{id}/complete`
    Complete { id: &'a str },
}

const SUMMARIES: &str = "summaries";

impl<'a> Route<'a> {
    /// Resolve a route path, ignoring leading and trailing slashes
    pub fn parse(path: &'a str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return None;
        }
        match segments[..] {
            [SUMMARIES] => Some(Route::Summaries),
            [SUMMARIES, id] => Some(Route::Summary { id }),
            [SUMMARIES, id, "targets", target] => Some(Route::Target { id, target }),
            [SUMMARIES, id, "progress"] => Some(Route::Progress { id }),
            [SUMMARIES, id, "complete"] => Some(Route::Complete { id }),
            _ => None,
        }
    }

    /// Whether this route answers `method`
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Route::Summaries => *method == Method::Get,
            Route::Summary { .. } => !matches!(method, Method::Other(_)),
            Route::Target { .. } | Route::Progress { .. } | Route::Complete { .. } => {
                *method == Method::Post
            }
        }
    }
}
