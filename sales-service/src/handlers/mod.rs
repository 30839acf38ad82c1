//! HTTP handlers for sales-service.

pub mod companies;
pub mod export;
pub mod invoices;
pub mod receipts;
