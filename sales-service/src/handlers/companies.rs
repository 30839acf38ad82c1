use crate::dtos::{CompanyResponse, CreateCompanyRequest, UpdateCompanyRequest};
use crate::middleware::user_id::OwnerId;
use crate::models::{CreateCompany, UpdateCompany};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_company(
    State(state): State<AppState>,
    owner: OwnerId,
    Json(payload): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = CreateCompany {
        owner_id: owner.0,
        name: payload.name,
        nip_number: payload.nip_number,
        address: payload.company_address.into(),
    };

    let company = state.db.create_company(&input).await?;

    Ok((StatusCode::CREATED, Json(CompanyResponse::from(company))))
}

pub async fn list_companies(
    State(state): State<AppState>,
    owner: OwnerId,
) -> Result<impl IntoResponse, AppError> {
    let companies = state.db.list_companies(owner.0).await?;

    Ok(Json(
        companies
            .into_iter()
            .map(CompanyResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_company(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let company = state
        .db
        .get_company_by_name(owner.0, &name)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company '{}' not found", name)))?;

    Ok(Json(CompanyResponse::from(company)))
}

pub async fn update_company(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(name): Path<String>,
    Json(payload): Json<UpdateCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = UpdateCompany {
        nip_number: payload.nip_number,
        address: payload.company_address.map(Into::into),
    };

    let company = state
        .db
        .update_company(owner.0, &name, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company '{}' not found", name)))?;

    Ok(Json(CompanyResponse::from(company)))
}

pub async fn delete_company(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.db.delete_company(owner.0, &name).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Company '{}' not found",
            name
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}
