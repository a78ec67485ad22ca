//! Pulls authorization-relevant values out of raw requests.
//!
//! The extraction is deliberately dumb: candidates are collected as strings
//! and handed to the core, which owns precedence, parsing, and the decision
//! to skip garbage.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, Method, StatusCode};
use axum::response::Response;
use serde_json::Value;

use herdbook_auth::{OrgIdSources, ResourceKind};
use herdbook_core::ResourceId;

use crate::errors;

/// Route prefix whose requests have no tenancy until a session exists.
pub const AUTH_PREFIX: &str = "/api/auth";

/// The caller's own profile endpoint is the one auth-prefixed route that
/// does carry tenancy.
pub const OWN_PROFILE_PATH: &str = "/api/auth/me";

const ORGANIZATION_HEADER: &str = "x-organization-id";
const ORGANIZATION_QUERY_KEYS: [&str; 3] = ["organizationId", "organization_id", "orgId"];
const BODY_LIMIT: usize = 256 * 1024;

pub fn bypasses_tenancy(path: &str) -> bool {
    path.starts_with(AUTH_PREFIX) && path != OWN_PROFILE_PATH
}

/// Collect organization-id candidates from every defined source.
pub fn org_id_sources(req: &Request, body: Option<&Value>) -> OrgIdSources {
    OrgIdSources {
        path: path_segment_after(req.uri().path(), "organizations"),
        query: query_organization_id(req.uri().query()),
        body: body.and_then(body_organization_id),
        header: req
            .headers()
            .get(ORGANIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    }
}

/// Item id for a guarded route: the path segment following the resource
/// segment. `Ok(None)` for collection endpoints; a malformed segment is a
/// plain not-found, indistinguishable from an absent row.
pub fn resource_id(path: &str, kind: ResourceKind) -> Result<Option<ResourceId>, Response> {
    match path_segment_after(path, kind.path_segment()) {
        None => Ok(None),
        Some(raw) => match raw.parse::<ResourceId>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => Err(errors::malformed_id_response()),
        },
    }
}

/// Buffer a JSON request body (bounded) so the tenancy resolver can read
/// explicit organization fields, then rebuild the request for the handler.
pub async fn buffer_json_body(req: Request) -> Result<(Request, Option<Value>), Response> {
    let has_json_body = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH)
        && req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

    if !has_json_body {
        return Ok((req, None));
    }

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, BODY_LIMIT).await.map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "INVALID_BODY",
            "request body could not be read",
        )
    })?;

    let value = serde_json::from_slice::<Value>(&bytes).ok();
    Ok((Request::from_parts(parts, Body::from(bytes)), value))
}

fn path_segment_after(path: &str, segment: &str) -> Option<String> {
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    while let Some(part) = parts.next() {
        if part == segment {
            return parts.next().map(str::to_owned);
        }
    }
    None
}

fn query_organization_id(query: Option<&str>) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if ORGANIZATION_QUERY_KEYS.contains(&key) && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn body_organization_id(body: &Value) -> Option<String> {
    let value = body
        .get("organizationId")
        .or_else(|| body.get("organization_id"))?;
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
