use crate::dtos::{CreateReceiptRequest, ReceiptListParams, ReceiptResponse};
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

pub async fn create_receipt(
    State(state): State<AppState>,
    owner: OwnerId,
    Json(payload): Json<CreateReceiptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = payload.into_input()?;
    let record = state.db.create_receipt(owner.0, &input).await?;

    Ok((StatusCode::CREATED, Json(ReceiptResponse::from(record))))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    owner: OwnerId,
    Query(params): Query<ReceiptListParams>,
) -> Result<impl IntoResponse, AppError> {
    let records = state.db.list_receipts(owner.0, &params.into()).await?;

    Ok(Json(
        records
            .into_iter()
            .map(ReceiptResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(receipt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .db
        .get_receipt(owner.0, receipt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt {} not found", receipt_id)))?;

    Ok(Json(ReceiptResponse::from(record)))
}

pub async fn delete_receipt(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(receipt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.db.delete_receipt(owner.0, receipt_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Receipt {} not found",
            receipt_id
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}
