use super::{Database, INVOICE_COLUMNS, INVOICE_FROM, PAYMENT_COLUMNS, PAYMENT_FROM};
use crate::models::{CreateBatch, Invoice, Payment, PaymentBatch};
use crate::services::access::ScopeFilter;
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use tracing::{info, instrument};

const BATCH_SELECT: &str = r#"
    SELECT b.batch_id, b.supplier_id, s.name AS supplier_name, s.email AS supplier_email,
           b.payment_date, b.paid_by, b.voucher_key, b.notes, b.created_utc
    FROM payment_batches b
    JOIN suppliers s ON s.supplier_id = b.supplier_id
"#;

impl Database {
    /// Invoices among `ids` that can still be paid in a batch: pending,
    /// without payments and visible in `scope`.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn eligible_batch_invoices(
        &self,
        ids: &[i64],
        scope: ScopeFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["eligible_batch_invoices"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {} {}
            WHERE i.invoice_id = ANY($1)
              AND i.status = 'pending'
              AND NOT EXISTS (SELECT 1 FROM payments pg WHERE pg.invoice_id = i.invoice_id)
              AND $2::bool
              AND ($3::bigint IS NULL OR i.pos_id = $3)
            ORDER BY i.invoice_date, i.invoice_id
            "#,
            INVOICE_COLUMNS, INVOICE_FROM
        );

        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(ids)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load batch invoices: {}", e))
            })?;

        timer.observe_duration();
        Ok(invoices)
    }

    /// Create a batch and one full payment per invoice, settling every
    /// invoice, in a single transaction.
    #[instrument(skip(self, input), fields(supplier_id = input.supplier_id, invoices = input.invoice_ids.len()))]
    pub async fn create_batch(
        &self,
        input: &CreateBatch,
    ) -> Result<(PaymentBatch, Vec<Payment>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_batch"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Re-check under lock: another request may have paid some of them.
        let locked = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT i.invoice_id
            FROM invoices i
            WHERE i.invoice_id = ANY($1)
              AND i.supplier_id = $2
              AND i.status = 'pending'
              AND NOT EXISTS (SELECT 1 FROM payments pg WHERE pg.invoice_id = i.invoice_id)
            FOR UPDATE
            "#,
        )
        .bind(&input.invoice_ids)
        .bind(input.supplier_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoices: {}", e)))?;

        if locked.len() != input.invoice_ids.len() {
            return Err(AppError::conflict(
                "Some of the selected invoices were paid in the meantime",
            ));
        }

        let batch_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payment_batches (supplier_id, payment_date, paid_by, voucher_key, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING batch_id
            "#,
        )
        .bind(input.supplier_id)
        .bind(input.payment_date)
        .bind(&input.paid_by)
        .bind(&input.voucher_key)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create batch: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO payments (invoice_id, payment_date, amount, paid_by, voucher_key, notes, batch_id)
            SELECT i.invoice_id, $2, i.amount, $3, $4, $5, $6
            FROM invoices i
            WHERE i.invoice_id = ANY($1)
            "#,
        )
        .bind(&input.invoice_ids)
        .bind(input.payment_date)
        .bind(&input.paid_by)
        .bind(&input.voucher_key)
        .bind(CreateBatch::payment_note(batch_id))
        .bind(batch_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create batch payments: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE invoices
            SET amount_paid = amount, status = 'paid', updated_utc = NOW()
            WHERE invoice_id = ANY($1)
            "#,
        )
        .bind(&input.invoice_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to settle invoices: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(batch_id = batch_id, "Payment batch created");

        let batch = self
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| AppError::not_found("Batch not found"))?;
        let payments = self.list_batch_payments(batch_id).await?;
        Ok((batch, payments))
    }

    #[instrument(skip(self))]
    pub async fn get_batch(&self, batch_id: i64) -> Result<Option<PaymentBatch>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_batch"])
            .start_timer();

        let batch = sqlx::query_as::<_, PaymentBatch>(&format!(
            "{} WHERE b.batch_id = $1",
            BATCH_SELECT
        ))
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get batch: {}", e)))?;

        timer.observe_duration();
        Ok(batch)
    }

    #[instrument(skip(self))]
    pub async fn list_batch_payments(&self, batch_id: i64) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_batch_payments"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {} {}
            WHERE pg.batch_id = $1
            ORDER BY i.invoice_date, pg.payment_id
            "#,
            PAYMENT_COLUMNS, PAYMENT_FROM
        );

        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list batch payments: {}", e))
            })?;

        timer.observe_duration();
        Ok(payments)
    }

    /// Confirm every not yet confirmed invoice paid by the batch. Returns the
    /// confirmation time.
    #[instrument(skip(self, email))]
    pub async fn confirm_batch(&self, batch_id: i64, email: &str) -> Result<DateTime<Utc>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["confirm_batch"])
            .start_timer();

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET confirmed = TRUE, confirmed_utc = $2, confirmed_by_email = $3
            WHERE NOT confirmed
              AND invoice_id IN (SELECT invoice_id FROM payments WHERE batch_id = $1)
            "#,
        )
        .bind(batch_id)
        .bind(now)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to confirm batch: {}", e)))?;

        info!(
            batch_id = batch_id,
            confirmed = result.rows_affected(),
            "Batch confirmed"
        );
        timer.observe_duration();
        Ok(now)
    }
}
