//! Domain models for sales-service.

mod address;
mod company;
mod invoice;
mod receipt;
mod vat;

pub use address::{Address, CreateAddress};
pub use company::{Company, CompanyWithAddress, CreateCompany, UpdateCompany};
pub use invoice::{
    CreateInvoice, CreateInvoicePrepayment, CreateInvoiceProduct, Invoice, InvoicePrepayment,
    InvoiceProduct, InvoiceRecord, ListInvoicesFilter,
};
pub use receipt::{
    CreateReceipt, CreateReceiptProduct, ListReceiptsFilter, Receipt, ReceiptProduct,
    ReceiptRecord,
};
pub use vat::VatClass;
