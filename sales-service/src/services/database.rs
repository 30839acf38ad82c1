//! Database service for sales-service.
//!
//! Every document creation is one transaction: read the company's most
//! recent document for numbering, insert the header and all its lines,
//! commit. Any failure rolls the whole transaction back, so a document is
//! never persisted with some but not all of its line items.

use crate::models::{
    Address, Company, CompanyWithAddress, CreateAddress, CreateCompany, CreateInvoice,
    CreateReceipt, Invoice, InvoicePrepayment, InvoiceProduct, InvoiceRecord, ListInvoicesFilter,
    ListReceiptsFilter, Receipt, ReceiptProduct, ReceiptRecord, UpdateCompany,
};
use crate::services::export::SalesRow;
use crate::services::metrics::{DB_QUERY_DURATION, INVOICES_TOTAL, RECEIPTS_TOTAL};
use crate::services::numbering::{self, LastInvoice, LastReceipt};
use crate::services::pricing;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "sales-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Company Operations
    // -------------------------------------------------------------------------

    /// Create a company with its address.
    #[instrument(skip(self, input), fields(owner_id = %input.owner_id, name = %input.name))]
    pub async fn create_company(&self, input: &CreateCompany) -> Result<CompanyWithAddress, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_company"])
            .start_timer();

        let mut tx = self.begin().await?;

        let address = insert_address(&mut tx, &input.address).await?;

        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (company_id, owner_id, name, address_id, nip_number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING company_id, owner_id, name, address_id, nip_number, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.owner_id)
        .bind(&input.name)
        .bind(address.address_id)
        .bind(&input.nip_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Company '{}' already exists", input.name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create company: {}", e)),
        })?;

        self.commit(tx).await?;
        timer.observe_duration();

        info!(company_id = %company.company_id, name = %company.name, "Company created");

        Ok(CompanyWithAddress { company, address })
    }

    /// Get one of the owner's companies by its unique name.
    #[instrument(skip(self), fields(owner_id = %owner_id, name = %name))]
    pub async fn get_company_by_name(
        &self,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<CompanyWithAddress>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_company_by_name"])
            .start_timer();

        let company = sqlx::query_as::<_, Company>(
            r#"
            SELECT company_id, owner_id, name, address_id, nip_number, created_utc
            FROM companies
            WHERE owner_id = $1 AND name = $2
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get company: {}", e)))?;

        let result = match company {
            Some(company) => {
                let address = self.get_address(company.address_id).await?;
                Some(CompanyWithAddress { company, address })
            }
            None => None,
        };

        timer.observe_duration();

        Ok(result)
    }

    /// List the owner's companies.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn list_companies(&self, owner_id: Uuid) -> Result<Vec<CompanyWithAddress>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_companies"])
            .start_timer();

        let companies = sqlx::query_as::<_, Company>(
            r#"
            SELECT company_id, owner_id, name, address_id, nip_number, created_utc
            FROM companies
            WHERE owner_id = $1
            ORDER BY name
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list companies: {}", e)))?;

        let address_ids: Vec<Uuid> = companies.iter().map(|c| c.address_id).collect();
        let mut addresses = self.get_addresses(&address_ids).await?;

        let result = companies
            .into_iter()
            .filter_map(|company| {
                addresses
                    .remove(&company.address_id)
                    .map(|address| CompanyWithAddress { company, address })
            })
            .collect();

        timer.observe_duration();

        Ok(result)
    }

    /// Update a company's NIP number and/or address in one transaction.
    /// The company name is immutable.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, name = %name))]
    pub async fn update_company(
        &self,
        owner_id: Uuid,
        name: &str,
        input: &UpdateCompany,
    ) -> Result<Option<CompanyWithAddress>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_company"])
            .start_timer();

        let mut tx = self.begin().await?;

        let company = sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies
            SET nip_number = COALESCE($3, nip_number)
            WHERE owner_id = $1 AND name = $2
            RETURNING company_id, owner_id, name, address_id, nip_number, created_utc
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .bind(&input.nip_number)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update company: {}", e)))?;

        let Some(company) = company else {
            return Ok(None);
        };

        let address = if let Some(address) = &input.address {
            sqlx::query_as::<_, Address>(
                r#"
                UPDATE addresses
                SET street = $2, building_number = $3, post_code = $4, city = $5, country = $6
                WHERE address_id = $1
                RETURNING address_id, street, building_number, post_code, city, country
                "#,
            )
            .bind(company.address_id)
            .bind(&address.street)
            .bind(&address.building_number)
            .bind(&address.post_code)
            .bind(&address.city)
            .bind(&address.country)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update address: {}", e))
            })?
        } else {
            fetch_address(&mut tx, company.address_id).await?
        };

        self.commit(tx).await?;
        timer.observe_duration();

        info!(company_id = %company.company_id, "Company updated");

        Ok(Some(CompanyWithAddress { company, address }))
    }

    /// Delete a company. Blocked while receipts or invoices still reference
    /// it (protected foreign keys).
    #[instrument(skip(self), fields(owner_id = %owner_id, name = %name))]
    pub async fn delete_company(&self, owner_id: Uuid, name: &str) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_company"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM companies
            WHERE owner_id = $1 AND name = $2
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Company '{}' is still referenced by existing documents",
                    name
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete company: {}", e)),
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(name = %name, "Company deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Receipt Operations
    // -------------------------------------------------------------------------

    /// Create a receipt with its lines, assigning the print number inside
    /// the same transaction as the insert.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, company = %input.company_name))]
    pub async fn create_receipt(
        &self,
        owner_id: Uuid,
        input: &CreateReceipt,
    ) -> Result<ReceiptRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_receipt"])
            .start_timer();

        let mut tx = self.begin().await?;

        let company = fetch_company_by_name(&mut tx, owner_id, &input.company_name).await?;
        let address = fetch_address(&mut tx, company.address_id).await?;

        let last = sqlx::query_as::<_, (DateTime<Utc>, i32)>(
            r#"
            SELECT created_utc, print_number
            FROM receipts
            WHERE company_id = $1
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(company.company_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to read last receipt: {}", e)))?
        .map(|(created_utc, print_number)| LastReceipt {
            created_utc,
            print_number,
        });

        let now = Utc::now();
        let print_number = numbering::next_print_number(last.as_ref(), now.date_naive());

        let sales_point = match &input.sales_point {
            Some(address) => Some(insert_address(&mut tx, address).await?),
            None => None,
        };

        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (
                receipt_id, company_id, print_number, receipt_number, header,
                sales_point_address_id, checkout_number, buyer_nip, currency, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING receipt_id, company_id, print_number, receipt_number, header,
                sales_point_address_id, checkout_number, buyer_nip, currency, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company.company_id)
        .bind(print_number)
        .bind(print_number)
        .bind(&input.header)
        .bind(sales_point.as_ref().map(|a| a.address_id))
        .bind(&input.checkout_number)
        .bind(&input.buyer_nip)
        .bind(&input.currency)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create receipt: {}", e)))?;

        let mut products = Vec::with_capacity(input.products.len());
        for (sort_order, product) in input.products.iter().enumerate() {
            let row = sqlx::query_as::<_, ReceiptProduct>(
                r#"
                INSERT INTO receipt_products (
                    product_id, receipt_id, name, quantity, unit_price, vat_class,
                    discount_value, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING product_id, receipt_id, name, quantity, unit_price, vat_class,
                    discount_value, sort_order
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(receipt.receipt_id)
            .bind(&product.name)
            .bind(product.quantity)
            .bind(product.unit_price)
            .bind(product.vat_class.as_str())
            .bind(product.discount_value)
            .bind(sort_order as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create receipt line: {}", e))
            })?;
            products.push(row);
        }

        self.commit(tx).await?;
        timer.observe_duration();

        RECEIPTS_TOTAL
            .with_label_values(&[receipt.currency.as_str()])
            .inc();

        info!(
            receipt_id = %receipt.receipt_id,
            print_number = print_number,
            "Receipt created"
        );

        Ok(ReceiptRecord {
            receipt,
            products,
            company: CompanyWithAddress { company, address },
            sales_point,
        })
    }

    /// Get one of the owner's receipts with its lines.
    #[instrument(skip(self), fields(owner_id = %owner_id, receipt_id = %receipt_id))]
    pub async fn get_receipt(
        &self,
        owner_id: Uuid,
        receipt_id: Uuid,
    ) -> Result<Option<ReceiptRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_receipt"])
            .start_timer();

        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT r.receipt_id, r.company_id, r.print_number, r.receipt_number, r.header,
                r.sales_point_address_id, r.checkout_number, r.buyer_nip, r.currency, r.created_utc
            FROM receipts r
            JOIN companies c ON c.company_id = r.company_id
            WHERE c.owner_id = $1 AND r.receipt_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(receipt_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get receipt: {}", e)))?;

        let result = match receipt {
            Some(receipt) => Some(self.assemble_receipt_records(vec![receipt]).await?.remove(0)),
            None => None,
        };

        timer.observe_duration();

        Ok(result)
    }

    /// List the owner's receipts, newest first.
    #[instrument(skip(self, filter), fields(owner_id = %owner_id))]
    pub async fn list_receipts(
        &self,
        owner_id: Uuid,
        filter: &ListReceiptsFilter,
    ) -> Result<Vec<ReceiptRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_receipts"])
            .start_timer();

        let receipts = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT r.receipt_id, r.company_id, r.print_number, r.receipt_number, r.header,
                r.sales_point_address_id, r.checkout_number, r.buyer_nip, r.currency, r.created_utc
            FROM receipts r
            JOIN companies c ON c.company_id = r.company_id
            WHERE c.owner_id = $1
              AND ($2::timestamptz IS NULL OR r.created_utc >= $2)
              AND ($3::timestamptz IS NULL OR r.created_utc <= $3)
              AND ($4::varchar IS NULL OR r.currency = $4)
              AND ($5::int IS NULL OR r.print_number >= $5)
              AND ($6::int IS NULL OR r.print_number <= $6)
              AND ($7::varchar IS NULL OR r.buyer_nip = $7)
            ORDER BY r.created_utc DESC
            "#,
        )
        .bind(owner_id)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(&filter.currency)
        .bind(filter.print_number_gte)
        .bind(filter.print_number_lte)
        .bind(&filter.buyer_nip)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list receipts: {}", e)))?;

        let result = self.assemble_receipt_records(receipts).await?;

        timer.observe_duration();

        Ok(result)
    }

    /// Delete one of the owner's receipts; its lines cascade. Assigned
    /// print numbers are never reused.
    #[instrument(skip(self), fields(owner_id = %owner_id, receipt_id = %receipt_id))]
    pub async fn delete_receipt(&self, owner_id: Uuid, receipt_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_receipt"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM receipts r
            USING companies c
            WHERE c.company_id = r.company_id AND c.owner_id = $1 AND r.receipt_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(receipt_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete receipt: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(receipt_id = %receipt_id, "Receipt deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice with its lines, assigning the invoice number and
    /// accumulating the persisted price/tax aggregates inside the same
    /// transaction as the insert.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, company = %input.company_name))]
    pub async fn create_invoice(
        &self,
        owner_id: Uuid,
        input: &CreateInvoice,
    ) -> Result<InvoiceRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let company = fetch_company_by_name(&mut tx, owner_id, &input.company_name).await?;
        let address = fetch_address(&mut tx, company.address_id).await?;

        if let Some(previous) = &input.previous_prepayment {
            let exists: Option<(Uuid,)> = sqlx::query_as(
                r#"
                SELECT invoice_id
                FROM invoices
                WHERE company_id = $1 AND invoice_number = $2 AND is_prepayment = TRUE
                LIMIT 1
                "#,
            )
            .bind(company.company_id)
            .bind(previous)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to look up prepayment invoice: {}",
                    e
                ))
            })?;

            if exists.is_none() {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "Prepayment invoice '{}' not found",
                    previous
                )));
            }
        }

        let last = sqlx::query_as::<_, (DateTime<Utc>, String)>(
            r#"
            SELECT created_utc, invoice_number
            FROM invoices
            WHERE company_id = $1
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(company.company_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to read last invoice: {}", e)))?
        .map(|(created_utc, invoice_number)| LastInvoice {
            created_utc,
            invoice_number,
        });

        let now = Utc::now();
        let invoice_number = numbering::next_invoice_number(last.as_ref(), now.date_naive())?;

        let buyer_address = insert_address(&mut tx, &input.buyer_address).await?;

        let invoice_id = Uuid::new_v4();
        let products: Vec<InvoiceProduct> = input
            .products
            .iter()
            .enumerate()
            .map(|(sort_order, product)| InvoiceProduct {
                product_id: Uuid::new_v4(),
                invoice_id,
                name: product.name.clone(),
                unit: product.unit.clone(),
                quantity: product.quantity,
                unit_price: product.unit_price,
                discount_value: product.discount_value,
                vat_rate: product.vat_rate,
                sort_order: sort_order as i32,
            })
            .collect();
        let prepayments: Vec<InvoicePrepayment> = input
            .prepayments
            .iter()
            .enumerate()
            .map(|(sort_order, prepayment)| InvoicePrepayment {
                prepayment_id: Uuid::new_v4(),
                invoice_id,
                net_price: prepayment.net_price,
                vat_rate: prepayment.vat_rate,
                sort_order: sort_order as i32,
            })
            .collect();

        let tax_data = pricing::invoice_tax_data(&products);
        let net_price = tax_data.total_net_price;
        let total_tax = tax_data.total_tax_value;
        let gross_price = net_price + total_tax;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                invoice_id, company_id, invoice_number, buyer_name, buyer_nip, buyer_pesel,
                buyer_address_id, date_finished, currency, is_paid, is_prepayment,
                previous_prepayment, net_price, total_tax, gross_price, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING invoice_id, company_id, invoice_number, buyer_name, buyer_nip, buyer_pesel,
                buyer_address_id, date_finished, currency, is_paid, is_prepayment,
                previous_prepayment, net_price, total_tax, gross_price, created_utc
            "#,
        )
        .bind(invoice_id)
        .bind(company.company_id)
        .bind(&invoice_number)
        .bind(&input.buyer_name)
        .bind(&input.buyer_nip)
        .bind(&input.buyer_pesel)
        .bind(buyer_address.address_id)
        .bind(input.date_finished)
        .bind(&input.currency)
        .bind(input.is_paid)
        .bind(input.is_prepayment)
        .bind(&input.previous_prepayment)
        .bind(net_price)
        .bind(total_tax)
        .bind(gross_price)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        for product in &products {
            sqlx::query(
                r#"
                INSERT INTO invoice_products (
                    product_id, invoice_id, name, unit, quantity, unit_price,
                    discount_value, vat_rate, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(product.product_id)
            .bind(product.invoice_id)
            .bind(&product.name)
            .bind(&product.unit)
            .bind(product.quantity)
            .bind(product.unit_price)
            .bind(product.discount_value)
            .bind(product.vat_rate)
            .bind(product.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice line: {}", e))
            })?;
        }

        for prepayment in &prepayments {
            sqlx::query(
                r#"
                INSERT INTO invoice_prepayments (
                    prepayment_id, invoice_id, net_price, vat_rate, sort_order
                )
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(prepayment.prepayment_id)
            .bind(prepayment.invoice_id)
            .bind(prepayment.net_price)
            .bind(prepayment.vat_rate)
            .bind(prepayment.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create prepayment line: {}", e))
            })?;
        }

        self.commit(tx).await?;
        timer.observe_duration();

        let kind = if invoice.is_prepayment {
            "prepayment"
        } else {
            "standard"
        };
        INVOICES_TOTAL.with_label_values(&[kind]).inc();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Invoice created"
        );

        Ok(InvoiceRecord {
            invoice,
            products,
            prepayments,
            company: CompanyWithAddress { company, address },
            buyer_address,
        })
    }

    /// Get one of the owner's invoices with its lines.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.invoice_id, i.company_id, i.invoice_number, i.buyer_name, i.buyer_nip,
                i.buyer_pesel, i.buyer_address_id, i.date_finished, i.currency, i.is_paid,
                i.is_prepayment, i.previous_prepayment, i.net_price, i.total_tax, i.gross_price,
                i.created_utc
            FROM invoices i
            JOIN companies c ON c.company_id = i.company_id
            WHERE c.owner_id = $1 AND i.invoice_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let result = match invoice {
            Some(invoice) => Some(self.assemble_invoice_records(vec![invoice]).await?.remove(0)),
            None => None,
        };

        timer.observe_duration();

        Ok(result)
    }

    /// List the owner's invoices, newest first.
    #[instrument(skip(self, filter), fields(owner_id = %owner_id))]
    pub async fn list_invoices(
        &self,
        owner_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.invoice_id, i.company_id, i.invoice_number, i.buyer_name, i.buyer_nip,
                i.buyer_pesel, i.buyer_address_id, i.date_finished, i.currency, i.is_paid,
                i.is_prepayment, i.previous_prepayment, i.net_price, i.total_tax, i.gross_price,
                i.created_utc
            FROM invoices i
            JOIN companies c ON c.company_id = i.company_id
            WHERE c.owner_id = $1
              AND ($2::timestamptz IS NULL OR i.created_utc >= $2)
              AND ($3::timestamptz IS NULL OR i.created_utc <= $3)
              AND ($4::date IS NULL OR i.date_finished >= $4)
              AND ($5::date IS NULL OR i.date_finished <= $5)
              AND ($6::bool IS NULL OR i.is_prepayment = $6)
            ORDER BY i.created_utc DESC
            "#,
        )
        .bind(owner_id)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(filter.finished_from)
        .bind(filter.finished_to)
        .bind(filter.is_prepayment)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        let result = self.assemble_invoice_records(invoices).await?;

        timer.observe_duration();

        Ok(result)
    }

    /// Delete one of the owner's invoices; its lines cascade. Assigned
    /// invoice numbers are never reused.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, owner_id: Uuid, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM invoices i
            USING companies c
            WHERE c.company_id = i.company_id AND c.owner_id = $1 AND i.invoice_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(invoice_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Export Operations
    // -------------------------------------------------------------------------

    /// All of the owner's invoices reduced to export rows, oldest first.
    /// Invoice totals are persisted at creation, so this is a single join.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn invoices_for_export(&self, owner_id: Uuid) -> Result<Vec<SalesRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoices_for_export"])
            .start_timer();

        let rows = sqlx::query_as::<_, SalesRow>(
            r#"
            SELECT c.name AS seller, a.country, i.created_utc AS transaction_time,
                i.currency, i.net_price, i.total_tax, i.gross_price
            FROM invoices i
            JOIN companies c ON c.company_id = i.company_id
            JOIN addresses a ON a.address_id = c.address_id
            WHERE c.owner_id = $1
            ORDER BY i.created_utc
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to export invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// All of the owner's receipts reduced to export rows, oldest first.
    /// Receipt totals are derived from the lines at read time.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn receipts_for_export(&self, owner_id: Uuid) -> Result<Vec<SalesRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["receipts_for_export"])
            .start_timer();

        let receipts = sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>, String)>(
            r#"
            SELECT r.receipt_id, c.name AS seller, a.country, r.created_utc, r.currency
            FROM receipts r
            JOIN companies c ON c.company_id = r.company_id
            JOIN addresses a ON a.address_id = c.address_id
            WHERE c.owner_id = $1
            ORDER BY r.created_utc
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to export receipts: {}", e))
        })?;

        let receipt_ids: Vec<Uuid> = receipts.iter().map(|(id, ..)| *id).collect();
        let mut products = self.get_receipt_products(&receipt_ids).await?;

        let rows = receipts
            .into_iter()
            .map(|(receipt_id, seller, country, transaction_time, currency)| {
                let lines = products.remove(&receipt_id).unwrap_or_default();
                let totals = pricing::receipt_totals(&lines);
                SalesRow {
                    seller,
                    country,
                    transaction_time,
                    currency,
                    net_price: totals.gross_price - totals.total_tax,
                    total_tax: totals.total_tax,
                    gross_price: totals.gross_price,
                }
            })
            .collect();

        timer.observe_duration();

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Internal Helpers
    // -------------------------------------------------------------------------

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })
    }

    async fn commit(&self, tx: Transaction<'static, Postgres>) -> Result<(), AppError> {
        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })
    }

    async fn get_address(&self, address_id: Uuid) -> Result<Address, AppError> {
        sqlx::query_as::<_, Address>(
            r#"
            SELECT address_id, street, building_number, post_code, city, country
            FROM addresses
            WHERE address_id = $1
            "#,
        )
        .bind(address_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get address: {}", e)))
    }

    async fn get_addresses(
        &self,
        address_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Address>, AppError> {
        if address_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let addresses = sqlx::query_as::<_, Address>(
            r#"
            SELECT address_id, street, building_number, post_code, city, country
            FROM addresses
            WHERE address_id = ANY($1)
            "#,
        )
        .bind(address_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get addresses: {}", e)))?;

        Ok(addresses
            .into_iter()
            .map(|address| (address.address_id, address))
            .collect())
    }

    async fn get_companies(
        &self,
        company_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Company>, AppError> {
        if company_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let companies = sqlx::query_as::<_, Company>(
            r#"
            SELECT company_id, owner_id, name, address_id, nip_number, created_utc
            FROM companies
            WHERE company_id = ANY($1)
            "#,
        )
        .bind(company_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get companies: {}", e)))?;

        Ok(companies
            .into_iter()
            .map(|company| (company.company_id, company))
            .collect())
    }

    async fn get_receipt_products(
        &self,
        receipt_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<ReceiptProduct>>, AppError> {
        if receipt_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let products = sqlx::query_as::<_, ReceiptProduct>(
            r#"
            SELECT product_id, receipt_id, name, quantity, unit_price, vat_class,
                discount_value, sort_order
            FROM receipt_products
            WHERE receipt_id = ANY($1)
            ORDER BY receipt_id, sort_order
            "#,
        )
        .bind(receipt_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get receipt lines: {}", e))
        })?;

        let mut grouped: HashMap<Uuid, Vec<ReceiptProduct>> = HashMap::new();
        for product in products {
            grouped.entry(product.receipt_id).or_default().push(product);
        }
        Ok(grouped)
    }

    /// Resolve lines, companies and addresses for a page of receipts.
    async fn assemble_receipt_records(
        &self,
        receipts: Vec<Receipt>,
    ) -> Result<Vec<ReceiptRecord>, AppError> {
        let receipt_ids: Vec<Uuid> = receipts.iter().map(|r| r.receipt_id).collect();
        let company_ids: Vec<Uuid> = receipts.iter().map(|r| r.company_id).collect();

        let mut products = self.get_receipt_products(&receipt_ids).await?;
        let companies = self.get_companies(&company_ids).await?;

        let mut address_ids: Vec<Uuid> = companies.values().map(|c| c.address_id).collect();
        address_ids.extend(receipts.iter().filter_map(|r| r.sales_point_address_id));
        let addresses = self.get_addresses(&address_ids).await?;

        let mut records = Vec::with_capacity(receipts.len());
        for receipt in receipts {
            let company = companies.get(&receipt.company_id).cloned().ok_or_else(|| {
                AppError::Consistency(anyhow::anyhow!(
                    "receipt {} references a missing company",
                    receipt.receipt_id
                ))
            })?;
            let address = addresses.get(&company.address_id).cloned().ok_or_else(|| {
                AppError::Consistency(anyhow::anyhow!(
                    "company {} references a missing address",
                    company.company_id
                ))
            })?;
            let sales_point = receipt
                .sales_point_address_id
                .and_then(|id| addresses.get(&id).cloned());

            records.push(ReceiptRecord {
                products: products.remove(&receipt.receipt_id).unwrap_or_default(),
                receipt,
                company: CompanyWithAddress { company, address },
                sales_point,
            });
        }
        Ok(records)
    }

    /// Resolve lines, prepayments, companies and addresses for a page of
    /// invoices.
    async fn assemble_invoice_records(
        &self,
        invoices: Vec<Invoice>,
    ) -> Result<Vec<InvoiceRecord>, AppError> {
        let invoice_ids: Vec<Uuid> = invoices.iter().map(|i| i.invoice_id).collect();
        let company_ids: Vec<Uuid> = invoices.iter().map(|i| i.company_id).collect();

        let mut products: HashMap<Uuid, Vec<InvoiceProduct>> = HashMap::new();
        if !invoice_ids.is_empty() {
            let rows = sqlx::query_as::<_, InvoiceProduct>(
                r#"
                SELECT product_id, invoice_id, name, unit, quantity, unit_price,
                    discount_value, vat_rate, sort_order
                FROM invoice_products
                WHERE invoice_id = ANY($1)
                ORDER BY invoice_id, sort_order
                "#,
            )
            .bind(&invoice_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice lines: {}", e))
            })?;
            for row in rows {
                products.entry(row.invoice_id).or_default().push(row);
            }
        }

        let mut prepayments: HashMap<Uuid, Vec<InvoicePrepayment>> = HashMap::new();
        if !invoice_ids.is_empty() {
            let rows = sqlx::query_as::<_, InvoicePrepayment>(
                r#"
                SELECT prepayment_id, invoice_id, net_price, vat_rate, sort_order
                FROM invoice_prepayments
                WHERE invoice_id = ANY($1)
                ORDER BY invoice_id, sort_order
                "#,
            )
            .bind(&invoice_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get prepayment lines: {}", e))
            })?;
            for row in rows {
                prepayments.entry(row.invoice_id).or_default().push(row);
            }
        }

        let companies = self.get_companies(&company_ids).await?;

        let mut address_ids: Vec<Uuid> = companies.values().map(|c| c.address_id).collect();
        address_ids.extend(invoices.iter().map(|i| i.buyer_address_id));
        let addresses = self.get_addresses(&address_ids).await?;

        let mut records = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let company = companies.get(&invoice.company_id).cloned().ok_or_else(|| {
                AppError::Consistency(anyhow::anyhow!(
                    "invoice {} references a missing company",
                    invoice.invoice_id
                ))
            })?;
            let address = addresses.get(&company.address_id).cloned().ok_or_else(|| {
                AppError::Consistency(anyhow::anyhow!(
                    "company {} references a missing address",
                    company.company_id
                ))
            })?;
            let buyer_address = addresses
                .get(&invoice.buyer_address_id)
                .cloned()
                .ok_or_else(|| {
                    AppError::Consistency(anyhow::anyhow!(
                        "invoice {} references a missing buyer address",
                        invoice.invoice_id
                    ))
                })?;

            records.push(InvoiceRecord {
                products: products.remove(&invoice.invoice_id).unwrap_or_default(),
                prepayments: prepayments.remove(&invoice.invoice_id).unwrap_or_default(),
                invoice,
                company: CompanyWithAddress { company, address },
                buyer_address,
            });
        }
        Ok(records)
    }
}

/// Insert an address row inside the given transaction.
async fn insert_address(
    tx: &mut Transaction<'static, Postgres>,
    input: &CreateAddress,
) -> Result<Address, AppError> {
    sqlx::query_as::<_, Address>(
        r#"
        INSERT INTO addresses (address_id, street, building_number, post_code, city, country)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING address_id, street, building_number, post_code, city, country
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&input.street)
    .bind(&input.building_number)
    .bind(&input.post_code)
    .bind(&input.city)
    .bind(&input.country)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create address: {}", e)))
}

/// Look up the owner's company by name inside the given transaction;
/// documents can only be issued against an existing company.
async fn fetch_company_by_name(
    tx: &mut Transaction<'static, Postgres>,
    owner_id: Uuid,
    name: &str,
) -> Result<Company, AppError> {
    sqlx::query_as::<_, Company>(
        r#"
        SELECT company_id, owner_id, name, address_id, nip_number, created_utc
        FROM companies
        WHERE owner_id = $1 AND name = $2
        "#,
    )
    .bind(owner_id)
    .bind(name)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get company: {}", e)))?
    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company '{}' not found", name)))
}

async fn fetch_address(
    tx: &mut Transaction<'static, Postgres>,
    address_id: Uuid,
) -> Result<Address, AppError> {
    sqlx::query_as::<_, Address>(
        r#"
        SELECT address_id, street, building_number, post_code, city, country
        FROM addresses
        WHERE address_id = $1
        "#,
    )
    .bind(address_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get address: {}", e)))
}
