use std::sync::Arc;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::dto::{ChangeStatusRequest, InvoicePage, InvoiceRequest};
use crate::app::errors::ApiError;
use crate::app::query::{InvoiceQuery, ListParams};
use crate::app::routes::{json_body, query_params};
use crate::app::services::{self, AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route("/due", get(due_report))
        .route("/overdue/sweep", post(sweep_overdue))
        .route(
            "/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/:id/status", post(change_status))
        .route("/:id/history", get(invoice_history))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<InvoiceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    let created = services.create_invoice(req)?;
    Ok((StatusCode::CREATED, Json(services.respond(created)?)))
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<InvoicePage>, ApiError> {
    let query = InvoiceQuery::parse(&query_params(params)?)?;
    let tracker = services.due_tracker()?;
    let today = services::today();

    let selected = query.select(services.list_invoices(), &tracker, today);
    let (page, total, total_pages) = query.paginate(selected);
    let items = page
        .into_iter()
        .map(|invoice| services.to_response(invoice, &tracker, today))
        .collect();

    Ok(Json(InvoicePage {
        items,
        total,
        page: query.page,
        per_page: query.per_page,
        total_pages,
    }))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = services.get_invoice(&id)?;
    Ok(Json(services.respond(invoice)?))
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<InvoiceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    let updated = services.update_invoice(&id, req)?;
    Ok(Json(services.respond(updated)?))
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services.delete_invoice(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    let invoice = services.change_status(&id, &req.status)?;
    Ok(Json(services.respond(invoice)?))
}

pub async fn invoice_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.history(&id)?))
}

pub async fn due_report(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.due_report(services::today())?))
}

pub async fn sweep_overdue(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.sweep_overdue(services::today())?))
}
