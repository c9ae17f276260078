use super::{like_pattern, page_offset, Database, INVOICE_COLUMNS, INVOICE_FROM};
use crate::models::{
    CreateInvoice, Invoice, ListInvoicesFilter, PendingInvoicesFilter, SupplierBalance,
    UpdateInvoice, PAGE_SIZE,
};
use crate::services::access::ScopeFilter;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::reconciliation::CashPayment;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};

/// One page of the pending-invoices board plus aggregates over the whole
/// filtered set.
#[derive(Debug, Clone, Serialize)]
pub struct PendingInvoicesPage {
    pub invoices: Vec<Invoice>,
    pub page: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub supplier_summary: Vec<SupplierBalance>,
    pub total_balance: Decimal,
}

const PENDING_WHERE: &str = r#"
    WHERE i.status = 'pending'
      AND $1::bool
      AND ($2::bigint IS NULL OR i.pos_id = $2)
      AND ($3::text IS NULL OR s.name ILIKE $3 OR p.name ILIKE $3 OR i.invoice_number ILIKE $3)
      AND ($4::bigint IS NULL OR i.supplier_id = $4)
"#;

impl Database {
    /// Insert an invoice, plus its cash payment when it was registered as
    /// already paid.
    #[instrument(skip(self, input, cash), fields(invoice_number = %input.invoice_number))]
    pub async fn create_invoice(
        &self,
        input: &CreateInvoice,
        cash: Option<&CashPayment>,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO invoices (supplier_id, pos_id, invoice_number, invoice_date, amount,
                                  amount_paid, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING invoice_id
            "#,
        )
        .bind(input.supplier_id)
        .bind(input.pos_id)
        .bind(&input.invoice_number)
        .bind(input.invoice_date)
        .bind(input.amount)
        .bind(input.amount_paid)
        .bind(input.status.as_str())
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::bad_request("Unknown supplier or point of sale")
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        if let Some(cash) = cash {
            insert_cash_payment(&mut tx, invoice_id, input.amount, cash).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            invoice_id = invoice_id,
            status = input.status.as_str(),
            cash_payment = cash.is_some(),
            "Invoice created"
        );

        self.fetch_invoice(invoice_id).await
    }

    async fn fetch_invoice(&self, invoice_id: i64) -> Result<Invoice, AppError> {
        self.get_invoice(invoice_id, ScopeFilter::everything())
            .await?
            .ok_or_else(|| AppError::not_found("Invoice not found"))
    }

    /// Invoice by id, if it is visible in the given scope.
    #[instrument(skip(self))]
    pub async fn get_invoice(
        &self,
        invoice_id: i64,
        scope: ScopeFilter,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {} {}
            WHERE i.invoice_id = $1 AND $2::bool AND ($3::bigint IS NULL OR i.pos_id = $3)
            "#,
            INVOICE_COLUMNS, INVOICE_FROM
        );

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();
        Ok(invoice)
    }

    /// Pending invoices visible in `scope`, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_pending_invoices(
        &self,
        filter: &PendingInvoicesFilter,
        scope: ScopeFilter,
    ) -> Result<PendingInvoicesPage, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_pending_invoices"])
            .start_timer();

        let pattern = like_pattern(filter.query.as_deref());
        let page = filter.page.max(1);

        let list_sql = format!(
            r#"
            SELECT {} {} {}
            ORDER BY i.invoice_date DESC, i.invoice_id DESC
            LIMIT $5 OFFSET $6
            "#,
            INVOICE_COLUMNS, INVOICE_FROM, PENDING_WHERE
        );
        let invoices = sqlx::query_as::<_, Invoice>(&list_sql)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .bind(&pattern)
            .bind(filter.supplier_id)
            .bind(PAGE_SIZE)
            .bind(page_offset(page))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list pending invoices: {}", e))
            })?;

        let totals_sql = format!(
            r#"
            SELECT COUNT(*), COALESCE(SUM(i.amount - i.amount_paid), 0)
            {} {}
            "#,
            INVOICE_FROM, PENDING_WHERE
        );
        let (total_count, total_balance) = sqlx::query_as::<_, (i64, Decimal)>(&totals_sql)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .bind(&pattern)
            .bind(filter.supplier_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to total pending invoices: {}", e))
            })?;

        let summary_sql = format!(
            r#"
            SELECT i.supplier_id, s.name AS supplier_name, COUNT(*) AS invoices,
                   COALESCE(SUM(i.amount - i.amount_paid), 0) AS total
            {} {}
            GROUP BY i.supplier_id, s.name
            ORDER BY s.name, i.supplier_id
            "#,
            INVOICE_FROM, PENDING_WHERE
        );
        let supplier_summary = sqlx::query_as::<_, SupplierBalance>(&summary_sql)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .bind(&pattern)
            .bind(filter.supplier_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to summarize invoices: {}", e))
            })?;

        timer.observe_duration();

        Ok(PendingInvoicesPage {
            invoices,
            page,
            total_count,
            total_pages: (total_count + PAGE_SIZE - 1) / PAGE_SIZE,
            supplier_summary,
            total_balance,
        })
    }

    /// Invoices visible in `scope` with optional filters. Returns the page
    /// and the total number of matches.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
        scope: ScopeFilter,
    ) -> Result<(Vec<Invoice>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let where_sql = r#"
            WHERE $1::bool
              AND ($2::bigint IS NULL OR i.pos_id = $2)
              AND ($3::text IS NULL OR i.status = $3)
              AND ($4::bigint IS NULL OR i.supplier_id = $4)
              AND ($5::bigint IS NULL OR i.pos_id = $5)
              AND ($6::date IS NULL OR i.invoice_date = $6)
              AND ($7::text IS NULL OR s.name ILIKE $7 OR p.name ILIKE $7 OR i.invoice_number ILIKE $7)
        "#;
        let pattern = like_pattern(filter.query.as_deref());
        let status = filter.status.map(|s| s.as_str());

        let list_sql = format!(
            "SELECT {} {} {} ORDER BY {} LIMIT $8 OFFSET $9",
            INVOICE_COLUMNS,
            INVOICE_FROM,
            where_sql,
            filter.order_sql()
        );
        let invoices = sqlx::query_as::<_, Invoice>(&list_sql)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .bind(status)
            .bind(filter.supplier_id)
            .bind(filter.pos_id)
            .bind(filter.invoice_date)
            .bind(&pattern)
            .bind(PAGE_SIZE)
            .bind(page_offset(filter.page))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        let count_sql = format!("SELECT COUNT(*) {} {}", INVOICE_FROM, where_sql);
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .bind(status)
            .bind(filter.supplier_id)
            .bind(filter.pos_id)
            .bind(filter.invoice_date)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count invoices: {}", e)))?;

        timer.observe_duration();
        Ok((invoices, total))
    }

    /// Edit an invoice that has no payments and was not confirmed.
    #[instrument(skip(self, input, cash))]
    pub async fn update_invoice(
        &self,
        invoice_id: i64,
        input: &UpdateInvoice,
        cash: Option<&CashPayment>,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let (confirmed, payments) = sqlx::query_as::<_, (bool, i64)>(
            r#"
            SELECT i.confirmed,
                   (SELECT COUNT(*) FROM payments pg WHERE pg.invoice_id = i.invoice_id)
            FROM invoices i
            WHERE i.invoice_id = $1
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

        if payments > 0 || confirmed {
            return Err(AppError::conflict(
                "The invoice already has a payment or was confirmed and can no longer be edited",
            ));
        }

        sqlx::query(
            r#"
            UPDATE invoices
            SET supplier_id = $2, pos_id = $3, invoice_number = $4, invoice_date = $5,
                amount = $6, amount_paid = $7, status = $8, updated_utc = NOW()
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .bind(input.supplier_id)
        .bind(input.pos_id)
        .bind(&input.invoice_number)
        .bind(input.invoice_date)
        .bind(input.amount)
        .bind(input.amount_paid)
        .bind(input.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::bad_request("Unknown supplier or point of sale")
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)),
        })?;

        if let Some(cash) = cash {
            insert_cash_payment(&mut tx, invoice_id, input.amount, cash).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(invoice_id = invoice_id, status = input.status.as_str(), "Invoice updated");

        self.fetch_invoice(invoice_id).await
    }

    /// Delete an invoice and its payments. Confirmed invoices are kept.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, invoice_id: i64) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let confirmed = sqlx::query_scalar::<_, bool>(
            "SELECT confirmed FROM invoices WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        match confirmed {
            None => return Ok(false),
            Some(true) => {
                return Err(AppError::conflict(
                    "The invoice was confirmed by the supplier and cannot be deleted",
                ))
            }
            Some(false) => {}
        }

        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1 AND NOT confirmed")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = invoice_id, "Invoice deleted");
        }
        timer.observe_duration();
        Ok(deleted)
    }

    /// Mark an invoice as confirmed by its supplier. The first confirmation
    /// wins; later ones leave the stored timestamp and email untouched.
    #[instrument(skip(self, email))]
    pub async fn confirm_invoice(
        &self,
        invoice_id: i64,
        email: &str,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["confirm_invoice"])
            .start_timer();

        let confirmed_utc = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            UPDATE invoices
            SET confirmed = TRUE,
                confirmed_utc = CASE WHEN confirmed THEN confirmed_utc ELSE NOW() END,
                confirmed_by_email = CASE WHEN confirmed THEN confirmed_by_email ELSE $2 END
            WHERE invoice_id = $1
            RETURNING confirmed_utc
            "#,
        )
        .bind(invoice_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to confirm invoice: {}", e)))?;

        timer.observe_duration();
        Ok(confirmed_utc.flatten())
    }
}

async fn insert_cash_payment(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: i64,
    amount: Decimal,
    cash: &CashPayment,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO payments (invoice_id, payment_date, amount, paid_by, notes)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(invoice_id)
    .bind(cash.payment_date)
    .bind(amount)
    .bind(&cash.paid_by)
    .bind(&cash.notes)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record cash payment: {}", e)))?;

    info!(invoice_id = invoice_id, "Cash payment recorded");
    Ok(())
}
