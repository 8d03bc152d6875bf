//! One place where domain, dispatch and export failures become HTTP responses.
//!
//! Every error body has the shape `{ "error": code, "message": msg }`, plus
//! `"field"` when a single input field is at fault.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use invoicely_core::DomainError;
use invoicely_export::ExportError;
use invoicely_infra::command_dispatcher::DispatchError;
use invoicely_infra::numbering::NumberingStoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Numbering(#[from] NumberingStoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("invalid query parameter {field}: {message}")]
    InvalidQuery { field: String, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_query(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::InvalidQuery {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invoice_not_found() -> Self {
        ApiError::NotFound("invoice not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Dispatch(e) => dispatch_error_to_response(e),
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Numbering(e) => {
                tracing::error!(error = %e, "numbering state failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "numbering_store_error", e.to_string())
            }
            ApiError::Export(e) => export_error_to_response(e),
            ApiError::InvalidBody(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_body", msg),
            ApiError::InvalidQuery { field, message } => {
                json_field_error(StatusCode::BAD_REQUEST, "invalid_query", field, message)
            }
            ApiError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        }
    }
}

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvalidField { field, message } => {
            json_field_error(StatusCode::BAD_REQUEST, "validation_error", field, message)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "stored event could not be decoded");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => {
            tracing::error!(error = %msg, "event publication failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "publish_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidField { field, message } => {
            json_field_error(StatusCode::BAD_REQUEST, "validation_error", field, message)
        }
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

fn export_error_to_response(err: ExportError) -> Response {
    match err {
        ExportError::NothingArchived { .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        other => {
            tracing::error!(error = %other, "export failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "export_error", other.to_string())
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn json_field_error(
    status: StatusCode,
    code: &'static str,
    field: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "field": field.into(),
        })),
    )
        .into_response()
}
