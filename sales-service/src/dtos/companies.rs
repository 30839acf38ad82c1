//! Company request/response types.

use super::validate_nip;
use crate::models::{Address, CompanyWithAddress, CreateAddress};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Postal address as sent and returned over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddressDto {
    #[validate(length(min = 1, max = 32))]
    pub street: String,
    #[validate(length(min = 1, max = 10))]
    pub building_number: String,
    #[validate(length(min = 1, max = 6))]
    pub post_code: String,
    #[validate(length(min = 1, max = 36))]
    pub city: String,
    #[validate(length(min = 1, max = 42))]
    pub country: String,
}

impl From<Address> for AddressDto {
    fn from(address: Address) -> Self {
        Self {
            street: address.street,
            building_number: address.building_number,
            post_code: address.post_code,
            city: address.city,
            country: address.country,
        }
    }
}

impl From<AddressDto> for CreateAddress {
    fn from(dto: AddressDto) -> Self {
        Self {
            street: dto.street,
            building_number: dto.building_number,
            post_code: dto.post_code,
            city: dto.city,
            country: dto.country,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(custom(function = validate_nip))]
    pub nip_number: String,
    #[validate(nested)]
    pub company_address: AddressDto,
}

/// Update payload; the company name is immutable.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(custom(function = validate_nip))]
    pub nip_number: Option<String>,
    #[validate(nested)]
    pub company_address: Option<AddressDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyResponse {
    pub id: Uuid,
    pub name: String,
    pub nip_number: String,
    pub company_address: AddressDto,
}

impl From<CompanyWithAddress> for CompanyResponse {
    fn from(record: CompanyWithAddress) -> Self {
        Self {
            id: record.company.company_id,
            name: record.company.name,
            nip_number: record.company.nip_number,
            company_address: AddressDto::from(record.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> AddressDto {
        AddressDto {
            street: "Teststreet".to_string(),
            building_number: "12".to_string(),
            post_code: "12-345".to_string(),
            city: "TestCity".to_string(),
            country: "Poland".to_string(),
        }
    }

    #[test]
    fn valid_company_passes() {
        let request = CreateCompanyRequest {
            name: "TestCompany".to_string(),
            nip_number: "1234567890".to_string(),
            company_address: address(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn short_nip_fails() {
        let request = CreateCompanyRequest {
            name: "TestCompany".to_string(),
            nip_number: "123456789".to_string(),
            company_address: address(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn nested_address_is_validated() {
        let mut bad_address = address();
        bad_address.post_code = "12-34567".to_string();
        let request = CreateCompanyRequest {
            name: "TestCompany".to_string(),
            nip_number: "1234567890".to_string(),
            company_address: bad_address,
        };
        assert!(request.validate().is_err());
    }
}
