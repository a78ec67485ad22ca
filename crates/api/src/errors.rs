//! Consistent JSON error responses with machine-readable codes.
//!
//! Denials never say more than the fixed code set. In particular the 404
//! bodies for "does not exist" and "exists in another tenant" are built from
//! the same literal so they cannot drift apart.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use herdbook_auth::{AccessDecision, AuthError, GateDenial};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn auth_error_response(err: AuthError) -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, err.code(), err.to_string())
}

pub fn gate_response(denial: GateDenial) -> axum::response::Response {
    let status = match denial {
        GateDenial::MissingOrganization => StatusCode::BAD_REQUEST,
        GateDenial::NotMember | GateDenial::InsufficientRole => StatusCode::FORBIDDEN,
    };
    let message = match denial {
        GateDenial::MissingOrganization => "organization id is required",
        GateDenial::NotMember => "not a member of this organization",
        GateDenial::InsufficientRole => "role does not permit this operation",
    };
    json_error(status, denial.code(), message)
}

fn not_found() -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND", "not found")
}

/// Map a non-Allow guard decision to its wire shape. Detail strings on the
/// error variants stay in server logs.
pub fn decision_response(decision: &AccessDecision) -> axum::response::Response {
    match decision {
        AccessDecision::Allow { .. } => {
            error!("allow decision reached the error mapper");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error",
            )
        }
        AccessDecision::DenyUnauthenticated => json_error(
            StatusCode::UNAUTHORIZED,
            "TOKEN_REQUIRED",
            "authentication required",
        ),
        AccessDecision::DenyMissingOrganization => json_error(
            StatusCode::BAD_REQUEST,
            "ORGANIZATION_ID_REQUIRED",
            "organization id is required",
        ),
        AccessDecision::DenyNotMember => json_error(
            StatusCode::FORBIDDEN,
            "ORGANIZATION_ACCESS_DENIED",
            "not a member of this organization",
        ),
        AccessDecision::DenyInsufficientRole => json_error(
            StatusCode::FORBIDDEN,
            "INSUFFICIENT_PERMISSIONS",
            "role does not permit this operation",
        ),
        AccessDecision::DenyResourceNotFound | AccessDecision::DenyResourceForeignTenant => {
            not_found()
        }
        AccessDecision::ErrorConfiguration(detail) => {
            error!(%detail, "guard configuration error");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error",
            )
        }
        AccessDecision::ErrorStorage(detail) => {
            error!(%detail, "storage error during authorization");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error",
            )
        }
    }
}

/// 404 used when an item path segment is not even a well-formed id; shaped
/// identically to every other not-found.
pub fn malformed_id_response() -> axum::response::Response {
    not_found()
}
