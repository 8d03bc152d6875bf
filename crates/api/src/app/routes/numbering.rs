use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::Extension,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use invoicely_invoicing::NumberingConfig;

use crate::app::dto::NumberPreview;
use crate::app::errors::ApiError;
use crate::app::routes::json_body;
use crate::app::services::{self, AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/config", get(get_config).put(put_config))
        .route("/preview", get(preview))
}

pub async fn get_config(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<NumberingConfig>, ApiError> {
    Ok(Json(services.numbering_config()?))
}

/// Replaces prefix, separator, year flag, padding and counter in one go.
pub async fn put_config(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<NumberingConfig>, JsonRejection>,
) -> Result<Json<NumberingConfig>, ApiError> {
    let config = json_body(payload)?;
    Ok(Json(services.update_numbering(config)?))
}

pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let next = services.preview_number(services::today())?;
    Ok(Json(NumberPreview { next }))
}
