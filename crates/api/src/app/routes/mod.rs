use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::Query,
    Json, Router,
};

use crate::app::errors::ApiError;

pub mod due_dates;
pub mod export;
pub mod invoices;
pub mod numbering;
pub mod system;

/// Router for every API endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/invoices", invoices::router().merge(export::router()))
        .nest("/numbering", numbering::router())
        .nest("/due-dates", due_dates::router())
}

/// Unwrap a JSON body, turning axum's rejection into our error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))
}

pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::invalid_query("query", rejection.body_text()))
}
