use crate::dtos::{CreateInvoiceRequest, InvoiceListParams, InvoiceResponse};
use crate::middleware::user_id::OwnerId;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn create_invoice(
    State(state): State<AppState>,
    owner: OwnerId,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = payload.into_input();
    let record = state.db.create_invoice(owner.0, &input).await?;

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(record))))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    owner: OwnerId,
    Query(params): Query<InvoiceListParams>,
) -> Result<impl IntoResponse, AppError> {
    let records = state.db.list_invoices(owner.0, &params.into()).await?;

    Ok(Json(
        records
            .into_iter()
            .map(InvoiceResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .db
        .get_invoice(owner.0, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id)))?;

    Ok(Json(InvoiceResponse::from(record)))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.db.delete_invoice(owner.0, invoice_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Invoice {} not found",
            invoice_id
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}
