//! Address model for sales-service.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Postal address. A value object owned by exactly one company, receipt
/// (sales point) or invoice (buyer address); never shared across documents.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub address_id: Uuid,
    pub street: String,
    pub building_number: String,
    pub post_code: String,
    pub city: String,
    pub country: String,
}

/// Input for creating an address.
#[derive(Debug, Clone)]
pub struct CreateAddress {
    pub street: String,
    pub building_number: String,
    pub post_code: String,
    pub city: String,
    pub country: String,
}
