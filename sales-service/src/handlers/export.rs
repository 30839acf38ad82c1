use crate::dtos::{DocumentType, ExportParams};
use crate::middleware::user_id::OwnerId;
use crate::services::export;
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use service_core::error::AppError;

/// CSV export of the owner's sales history: header row first, then one
/// row per receipt or invoice.
pub async fn sales_export(
    State(state): State<AppState>,
    owner: OwnerId,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = match params.document_type {
        DocumentType::Receipts => state.db.receipts_for_export(owner.0).await?,
        DocumentType::Invoices => state.db.invoices_for_export(owner.0).await?,
    };

    let body = export::write_csv(&rows)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sales.csv\"",
            ),
        ],
        body,
    ))
}
