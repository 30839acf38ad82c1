//! Company model for sales-service.

use super::address::{Address, CreateAddress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A seller company. Owned by the authenticated user; the display name is
/// unique across the system and immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub company_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address_id: Uuid,
    pub nip_number: String,
    pub created_utc: DateTime<Utc>,
}

/// Company together with its resolved postal address.
#[derive(Debug, Clone)]
pub struct CompanyWithAddress {
    pub company: Company,
    pub address: Address,
}

/// Input for creating a company.
#[derive(Debug, Clone)]
pub struct CreateCompany {
    pub owner_id: Uuid,
    pub name: String,
    pub nip_number: String,
    pub address: CreateAddress,
}

/// Input for updating a company (NIP number and/or address fields;
/// the name stays fixed).
#[derive(Debug, Clone, Default)]
pub struct UpdateCompany {
    pub nip_number: Option<String>,
    pub address: Option<CreateAddress>,
}
