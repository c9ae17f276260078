//! Database service for cartera-service.

mod batches;
mod invoices;
mod payments;
mod points_of_sale;
mod reports;
mod suppliers;
mod users;

pub use invoices::PendingInvoicesPage;
pub use reports::{AnalyticsReport, DashboardSummary};

use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Columns of an invoice joined with its supplier and point of sale, for
/// queries that alias `invoices i`, `suppliers s` and `points_of_sale p`.
pub(crate) const INVOICE_COLUMNS: &str = r#"
    i.invoice_id, i.supplier_id, s.name AS supplier_name, s.email AS supplier_email,
    i.pos_id, p.name AS pos_name, i.invoice_number, i.invoice_date, i.amount,
    i.amount_paid, i.status, i.created_utc, i.updated_utc, i.created_by,
    i.confirmed, i.confirmed_utc, i.confirmed_by_email
"#;

pub(crate) const INVOICE_FROM: &str = r#"
    FROM invoices i
    JOIN suppliers s ON s.supplier_id = i.supplier_id
    JOIN points_of_sale p ON p.pos_id = i.pos_id
"#;

/// Columns of a payment joined with its invoice, supplier and point of sale.
pub(crate) const PAYMENT_COLUMNS: &str = r#"
    pg.payment_id, pg.invoice_id, i.invoice_number, i.supplier_id,
    s.name AS supplier_name, i.pos_id, p.name AS pos_name, pg.payment_date,
    pg.amount, pg.paid_by, pg.voucher_key, pg.notes, pg.created_utc, pg.batch_id
"#;

pub(crate) const PAYMENT_FROM: &str = r#"
    FROM payments pg
    JOIN invoices i ON i.invoice_id = pg.invoice_id
    JOIN suppliers s ON s.supplier_id = i.supplier_id
    JOIN points_of_sale p ON p.pos_id = i.pos_id
"#;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "cartera-service"))]
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
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
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
}

/// `%term%` pattern for ILIKE searches, or `None` for a blank search.
pub(crate) fn like_pattern(query: Option<&str>) -> Option<String> {
    let term = query?.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{}%", escaped))
}

/// Row offset of a 1-based page. Out-of-range pages saturate and yield an
/// empty page instead of overflowing.
pub(crate) fn page_offset(page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(crate::models::PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some(" fv-1 ")).as_deref(), Some("%fv-1%"));
        assert_eq!(like_pattern(Some("50%")).as_deref(), Some("%50\\%%"));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }

    #[test]
    fn pages_start_at_one() {
        assert_eq!(page_offset(0), 0);
        assert_eq!(page_offset(1), 0);
        assert_eq!(page_offset(3), 50);
    }

    #[test]
    fn huge_page_saturates() {
        assert_eq!(page_offset(i64::MAX), i64::MAX);
        assert_eq!(page_offset(i64::MIN), 0);
    }
}
