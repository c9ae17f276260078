use super::{like_pattern, Database};
use crate::models::{CreateSupplier, Supplier, SupplierOrdering};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use tracing::{info, instrument};

impl Database {
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_supplier(&self, input: &CreateSupplier) -> Result<Supplier, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_supplier"])
            .start_timer();

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (name, tax_id, email, phone)
            VALUES ($1, $2, $3, $4)
            RETURNING supplier_id, name, tax_id, email, phone, created_utc
            "#,
        )
        .bind(&input.name)
        .bind(&input.tax_id)
        .bind(&input.email)
        .bind(&input.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create supplier: {}", e)))?;

        timer.observe_duration();
        info!(supplier_id = supplier.supplier_id, "Supplier created");
        Ok(supplier)
    }

    #[instrument(skip(self))]
    pub async fn get_supplier(&self, supplier_id: i64) -> Result<Option<Supplier>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_supplier"])
            .start_timer();

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT supplier_id, name, tax_id, email, phone, created_utc
            FROM suppliers
            WHERE supplier_id = $1
            "#,
        )
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get supplier: {}", e)))?;

        timer.observe_duration();
        Ok(supplier)
    }

    /// Suppliers matching `query` on name, tax ID or email.
    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        query: Option<&str>,
        ordering: SupplierOrdering,
    ) -> Result<Vec<Supplier>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_suppliers"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT supplier_id, name, tax_id, email, phone, created_utc
            FROM suppliers
            WHERE ($1::text IS NULL OR name ILIKE $1 OR tax_id ILIKE $1 OR email ILIKE $1)
            ORDER BY {}
            "#,
            ordering.as_sql()
        );

        let suppliers = sqlx::query_as::<_, Supplier>(&sql)
            .bind(like_pattern(query))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list suppliers: {}", e))
            })?;

        timer.observe_duration();
        Ok(suppliers)
    }

    #[instrument(skip(self, input))]
    pub async fn update_supplier(
        &self,
        supplier_id: i64,
        input: &CreateSupplier,
    ) -> Result<Option<Supplier>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_supplier"])
            .start_timer();

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            UPDATE suppliers
            SET name = $2, tax_id = $3, email = $4, phone = $5
            WHERE supplier_id = $1
            RETURNING supplier_id, name, tax_id, email, phone, created_utc
            "#,
        )
        .bind(supplier_id)
        .bind(&input.name)
        .bind(&input.tax_id)
        .bind(&input.email)
        .bind(&input.phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update supplier: {}", e)))?;

        if supplier.is_some() {
            info!(supplier_id = supplier_id, "Supplier updated");
        }
        timer.observe_duration();
        Ok(supplier)
    }

    /// Delete a supplier. Refused while invoices or batches reference it.
    #[instrument(skip(self))]
    pub async fn delete_supplier(&self, supplier_id: i64) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_supplier"])
            .start_timer();

        let result = sqlx::query("DELETE FROM suppliers WHERE supplier_id = $1")
            .bind(supplier_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::conflict("The supplier has invoices and cannot be deleted")
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete supplier: {}", e)),
            })?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(supplier_id = supplier_id, "Supplier deleted");
        }
        timer.observe_duration();
        Ok(deleted)
    }
}
