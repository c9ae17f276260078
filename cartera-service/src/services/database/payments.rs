use super::{like_pattern, page_offset, Database, PAYMENT_COLUMNS, PAYMENT_FROM};
use crate::models::{CreatePayment, InvoiceStatus, ListPaymentsFilter, Payment, PAGE_SIZE};
use crate::services::access::ScopeFilter;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::reconciliation::apply_payment;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};

impl Database {
    /// Payments visible in `scope`, most recent first.
    #[instrument(skip(self, filter))]
    pub async fn list_payments(
        &self,
        filter: &ListPaymentsFilter,
        scope: ScopeFilter,
    ) -> Result<(Vec<Payment>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let where_sql = r#"
            WHERE $1::bool
              AND ($2::bigint IS NULL OR i.pos_id = $2)
              AND ($3::text IS NULL
                   OR i.invoice_number ILIKE $3
                   OR s.name ILIKE $3
                   OR p.name ILIKE $3
                   OR pg.paid_by ILIKE $3
                   OR pg.notes ILIKE $3
                   OR ($4::numeric IS NOT NULL AND pg.amount = $4))
        "#;
        let pattern = like_pattern(filter.query.as_deref());
        let amount = filter.amount_query();

        let list_sql = format!(
            r#"
            SELECT {} {} {}
            ORDER BY pg.payment_date DESC, pg.payment_id DESC
            LIMIT $5 OFFSET $6
            "#,
            PAYMENT_COLUMNS, PAYMENT_FROM, where_sql
        );
        let payments = sqlx::query_as::<_, Payment>(&list_sql)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .bind(&pattern)
            .bind(amount)
            .bind(PAGE_SIZE)
            .bind(page_offset(filter.page))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        let count_sql = format!("SELECT COUNT(*) {} {}", PAYMENT_FROM, where_sql);
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .bind(&pattern)
            .bind(amount)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count payments: {}", e)))?;

        timer.observe_duration();
        Ok((payments, total))
    }

    #[instrument(skip(self))]
    pub async fn get_payment(
        &self,
        payment_id: i64,
        scope: ScopeFilter,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {} {}
            WHERE pg.payment_id = $1 AND $2::bool AND ($3::bigint IS NULL OR i.pos_id = $3)
            "#,
            PAYMENT_COLUMNS, PAYMENT_FROM
        );

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .bind(scope.visible)
            .bind(scope.pos_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self))]
    pub async fn list_invoice_payments(&self, invoice_id: i64) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoice_payments"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {} {}
            WHERE pg.invoice_id = $1
            ORDER BY pg.payment_date, pg.payment_id
            "#,
            PAYMENT_COLUMNS, PAYMENT_FROM
        );

        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();
        Ok(payments)
    }

    /// Register the single payment of an invoice and settle the invoice.
    #[instrument(skip(self, input), fields(invoice_id = input.invoice_id))]
    pub async fn create_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let (amount, amount_paid, payments) = sqlx::query_as::<_, (Decimal, Decimal, i64)>(
            r#"
            SELECT i.amount, i.amount_paid,
                   (SELECT COUNT(*) FROM payments pg WHERE pg.invoice_id = i.invoice_id)
            FROM invoices i
            WHERE i.invoice_id = $1
            FOR UPDATE
            "#,
        )
        .bind(input.invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

        if payments > 0 {
            return Err(AppError::conflict("This invoice already has a payment registered"));
        }

        let payment_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payments (invoice_id, payment_date, amount, paid_by, voucher_key, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING payment_id
            "#,
        )
        .bind(input.invoice_id)
        .bind(input.payment_date)
        .bind(input.amount)
        .bind(&input.paid_by)
        .bind(&input.voucher_key)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::conflict("This invoice already has a payment registered")
            }
            e => AppError::DatabaseError(anyhow::anyhow!("Failed to create payment: {}", e)),
        })?;

        let settlement = apply_payment(amount, amount_paid, input.amount);
        sqlx::query(
            r#"
            UPDATE invoices
            SET amount_paid = $2, status = $3, updated_utc = NOW()
            WHERE invoice_id = $1
            "#,
        )
        .bind(input.invoice_id)
        .bind(settlement.amount_paid)
        .bind(settlement.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to settle invoice: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            payment_id = payment_id,
            invoice_id = input.invoice_id,
            paid = settlement.status == InvoiceStatus::Paid,
            "Payment recorded"
        );

        self.get_payment(payment_id, ScopeFilter::everything())
            .await?
            .ok_or_else(|| AppError::not_found("Payment not found"))
    }

    /// Attach a voucher to a payment that has none. Returns `false` when a
    /// voucher was already attached.
    #[instrument(skip(self))]
    pub async fn attach_voucher(&self, payment_id: i64, voucher_key: &str) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["attach_voucher"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET voucher_key = $2
            WHERE payment_id = $1 AND COALESCE(voucher_key, '') = ''
            "#,
        )
        .bind(payment_id)
        .bind(voucher_key)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to attach voucher: {}", e)))?;

        let attached = result.rows_affected() > 0;
        if attached {
            info!(payment_id = payment_id, "Voucher attached");
        }
        timer.observe_duration();
        Ok(attached)
    }
}
