//! Services module for sales-service.

pub mod database;
pub mod export;
pub mod metrics;
pub mod numbering;
pub mod pricing;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
