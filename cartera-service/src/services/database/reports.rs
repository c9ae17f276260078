use super::Database;
use crate::models::{
    AnalyticsFilter, InvoiceRanking, KpiTotals, MonthlyPurchases, NamedTotal, SupplierBalance,
};
use crate::services::access::ScopeFilter;
use crate::services::metrics::DB_QUERY_DURATION;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use tracing::instrument;

/// Pending balances visible to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_pending: Decimal,
    pub pending_count: i64,
    pub suppliers_with_balance: usize,
    pub by_supplier: Vec<SupplierBalance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub filters: AnalyticsFilter,
    pub total_purchases: Decimal,
    pub invoice_count: i64,
    pub total_paid: Decimal,
    /// Average days between invoice date and payment date, one decimal.
    pub avg_days_to_pay: f64,
    pub top_suppliers: Vec<NamedTotal>,
    pub by_point_of_sale: Vec<NamedTotal>,
    pub by_month: Vec<MonthlyPurchases>,
    pub top_invoices: Vec<InvoiceRanking>,
    pub points_of_sale: Vec<NamedOption>,
    pub suppliers: Vec<NamedOption>,
}

/// Entry of a filter selector.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NamedOption {
    pub id: i64,
    pub name: String,
}

const ANALYTICS_WHERE: &str = r#"
    WHERE ($1::bigint IS NULL OR i.pos_id = $1)
      AND ($2::bigint IS NULL OR i.supplier_id = $2)
      AND i.invoice_date BETWEEN $3 AND $4
"#;

pub(crate) fn round_days(avg: Option<f64>) -> f64 {
    avg.map(|days| (days * 10.0).round() / 10.0).unwrap_or(0.0)
}

impl Database {
    #[instrument(skip(self))]
    pub async fn dashboard_summary(&self, scope: ScopeFilter) -> Result<DashboardSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard_summary"])
            .start_timer();

        let by_supplier = sqlx::query_as::<_, SupplierBalance>(
            r#"
            SELECT i.supplier_id, s.name AS supplier_name, COUNT(*) AS invoices,
                   COALESCE(SUM(i.amount - i.amount_paid), 0) AS total
            FROM invoices i
            JOIN suppliers s ON s.supplier_id = i.supplier_id
            WHERE i.status = 'pending'
              AND $1::bool
              AND ($2::bigint IS NULL OR i.pos_id = $2)
            GROUP BY i.supplier_id, s.name
            ORDER BY total DESC, s.name
            "#,
        )
        .bind(scope.visible)
        .bind(scope.pos_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load dashboard: {}", e)))?;

        timer.observe_duration();

        Ok(DashboardSummary {
            total_pending: by_supplier.iter().map(|row| row.total).sum(),
            pending_count: by_supplier.iter().map(|row| row.invoices).sum(),
            suppliers_with_balance: by_supplier.len(),
            by_supplier,
        })
    }

    #[instrument(skip(self))]
    pub async fn analytics(&self, filter: &AnalyticsFilter) -> Result<AnalyticsReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["analytics"])
            .start_timer();

        let db_err =
            |e: sqlx::Error| AppError::DatabaseError(anyhow::anyhow!("Failed to load analytics: {}", e));

        let kpis = sqlx::query_as::<_, KpiTotals>(&format!(
            r#"
            WITH filtered AS (SELECT i.invoice_id, i.invoice_date, i.amount FROM invoices i {})
            SELECT
                (SELECT COALESCE(SUM(amount), 0) FROM filtered) AS total_purchases,
                (SELECT COUNT(*) FROM filtered) AS invoice_count,
                (SELECT COALESCE(SUM(pg.amount), 0)
                   FROM payments pg JOIN filtered f ON f.invoice_id = pg.invoice_id) AS total_paid,
                (SELECT AVG(pg.payment_date - f.invoice_date)::float8
                   FROM payments pg JOIN filtered f ON f.invoice_id = pg.invoice_id) AS avg_days_to_pay
            "#,
            ANALYTICS_WHERE
        ))
        .bind(filter.pos_id)
        .bind(filter.supplier_id)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let top_suppliers = sqlx::query_as::<_, NamedTotal>(&format!(
            r#"
            SELECT s.supplier_id AS id, s.name, SUM(i.amount) AS total
            FROM invoices i JOIN suppliers s ON s.supplier_id = i.supplier_id
            {}
            GROUP BY s.supplier_id, s.name
            ORDER BY total DESC, s.name
            LIMIT 10
            "#,
            ANALYTICS_WHERE
        ))
        .bind(filter.pos_id)
        .bind(filter.supplier_id)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let by_point_of_sale = sqlx::query_as::<_, NamedTotal>(&format!(
            r#"
            SELECT p.pos_id AS id, p.name, SUM(i.amount) AS total
            FROM invoices i JOIN points_of_sale p ON p.pos_id = i.pos_id
            {}
            GROUP BY p.pos_id, p.name
            ORDER BY total DESC, p.name
            "#,
            ANALYTICS_WHERE
        ))
        .bind(filter.pos_id)
        .bind(filter.supplier_id)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let by_month = sqlx::query_as::<_, MonthlyPurchases>(&format!(
            r#"
            SELECT DATE_TRUNC('month', i.invoice_date)::date AS month, SUM(i.amount) AS total
            FROM invoices i
            {}
            GROUP BY month
            ORDER BY month
            "#,
            ANALYTICS_WHERE
        ))
        .bind(filter.pos_id)
        .bind(filter.supplier_id)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let top_invoices = sqlx::query_as::<_, InvoiceRanking>(&format!(
            r#"
            SELECT i.invoice_id, i.invoice_number, i.invoice_date,
                   s.name AS supplier_name, p.name AS pos_name, i.amount
            FROM invoices i
            JOIN suppliers s ON s.supplier_id = i.supplier_id
            JOIN points_of_sale p ON p.pos_id = i.pos_id
            {}
            ORDER BY i.amount DESC, i.invoice_id DESC
            LIMIT 12
            "#,
            ANALYTICS_WHERE
        ))
        .bind(filter.pos_id)
        .bind(filter.supplier_id)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let points_of_sale = sqlx::query_as::<_, NamedOption>(
            "SELECT pos_id AS id, name FROM points_of_sale ORDER BY name, pos_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let suppliers = sqlx::query_as::<_, NamedOption>(
            "SELECT supplier_id AS id, name FROM suppliers ORDER BY name, supplier_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        timer.observe_duration();

        Ok(AnalyticsReport {
            filters: filter.clone(),
            total_purchases: kpis.total_purchases,
            invoice_count: kpis.invoice_count,
            total_paid: kpis.total_paid,
            avg_days_to_pay: round_days(kpis.avg_days_to_pay),
            top_suppliers,
            by_point_of_sale,
            by_month,
            top_invoices,
            points_of_sale,
            suppliers,
        })
    }
}
