//! CSV export parameters.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Receipts,
    Invoices,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub document_type: DocumentType,
}
