use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use duka_auth::AuthzError;
use duka_core::DomainError;
use duka_infra::{EngineError, StoreError};

/// Handler result: both arms are finished responses.
pub type ApiResult = Result<axum::response::Response, axum::response::Response>;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Domain(e) => domain_error_to_response(e),
        EngineError::Store(StoreError::Timeout(msg)) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "timeout", msg)
        }
        EngineError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        e @ EngineError::Timeout(_) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "timeout", e.to_string())
        }
        e @ EngineError::RetriesExhausted { .. } => {
            tracing::error!(error = %e, "unit of work gave up");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "retries_exhausted", e.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
        DomainError::InsufficientStock {
            product_id,
            location,
            available,
            requested,
        } => json_error_with_details(
            StatusCode::CONFLICT,
            "insufficient_stock",
            message,
            json!({
                "product_id": product_id,
                "location": location,
                "available": available,
                "requested": requested,
            }),
        ),
        DomainError::InsufficientInventory(shortages) => json_error_with_details(
            StatusCode::CONFLICT,
            "insufficient_inventory",
            message,
            json!({ "shortages": shortages }),
        ),
        DomainError::OverReturn {
            sale_item_id,
            requested,
            remaining,
        } => json_error_with_details(
            StatusCode::CONFLICT,
            "over_return",
            message,
            json!({
                "sale_item_id": sale_item_id,
                "requested": requested,
                "remaining": remaining,
            }),
        ),
    }
}

pub fn forbidden(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

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

pub fn json_error_with_details(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: serde_json::Value,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}
