use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::Extension,
    routing::get,
    Json, Router,
};

use invoicely_invoicing::DueDateConfig;

use crate::app::errors::ApiError;
use crate::app::routes::json_body;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/config", get(get_config).put(put_config))
}

pub async fn get_config(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<DueDateConfig>, ApiError> {
    Ok(Json(services.due_date_config()?))
}

/// Affects defaults for invoices saved from now on; stored due dates stay.
pub async fn put_config(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<DueDateConfig>, JsonRejection>,
) -> Result<Json<DueDateConfig>, ApiError> {
    let config = json_body(payload)?;
    Ok(Json(services.update_due_dates(config)?))
}
