use super::Database;
use crate::models::{CreatePointOfSale, PointOfSale};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use tracing::{info, instrument};

impl Database {
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_point_of_sale(
        &self,
        input: &CreatePointOfSale,
    ) -> Result<PointOfSale, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_point_of_sale"])
            .start_timer();

        let pos = sqlx::query_as::<_, PointOfSale>(
            r#"
            INSERT INTO points_of_sale (name, city, user_id)
            VALUES ($1, $2, $3)
            RETURNING pos_id, name, city, user_id
            "#,
        )
        .bind(&input.name)
        .bind(&input.city)
        .bind(input.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::conflict("That user is already linked to another point of sale")
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::not_found("User not found")
            }
            _ => AppError::DatabaseError(anyhow::anyhow!(
                "Failed to create point of sale: {}",
                e
            )),
        })?;

        timer.observe_duration();
        info!(pos_id = pos.pos_id, "Point of sale created");
        Ok(pos)
    }

    #[instrument(skip(self))]
    pub async fn get_point_of_sale(&self, pos_id: i64) -> Result<Option<PointOfSale>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_point_of_sale"])
            .start_timer();

        let pos = sqlx::query_as::<_, PointOfSale>(
            "SELECT pos_id, name, city, user_id FROM points_of_sale WHERE pos_id = $1",
        )
        .bind(pos_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get point of sale: {}", e))
        })?;

        timer.observe_duration();
        Ok(pos)
    }

    /// All points of sale ordered by name.
    #[instrument(skip(self))]
    pub async fn list_points_of_sale(&self) -> Result<Vec<PointOfSale>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_points_of_sale"])
            .start_timer();

        let list = sqlx::query_as::<_, PointOfSale>(
            "SELECT pos_id, name, city, user_id FROM points_of_sale ORDER BY name, pos_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list points of sale: {}", e))
        })?;

        timer.observe_duration();
        Ok(list)
    }
}
