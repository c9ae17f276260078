use super::Database;
use crate::models::{CreateUser, PointOfSale, User};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use tracing::{info, instrument};

const USER_SELECT: &str = r#"
    SELECT u.user_id, u.username, u.email, u.password_hash, u.is_staff, u.is_active,
           u.created_utc, a.pos_id, p.name AS pos_name
    FROM users u
    LEFT JOIN pos_assignments a ON a.user_id = u.user_id
    LEFT JOIN points_of_sale p ON p.pos_id = a.pos_id
"#;

impl Database {
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create_user(&self, input: &CreateUser) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (username, email, password_hash, is_staff)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id
            "#,
        )
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(input.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::conflict(format!("Username '{}' is already taken", input.username))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create user: {}", e)),
        })?;

        timer.observe_duration();
        info!(user_id = user_id, is_staff = input.is_staff, "User created");

        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!("{} WHERE u.user_id = $1", USER_SELECT))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user_by_username"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!("{} WHERE u.username = $1", USER_SELECT))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_users"])
            .start_timer();

        let users = sqlx::query_as::<_, User>(&format!("{} ORDER BY u.username", USER_SELECT))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list users: {}", e)))?;

        timer.observe_duration();
        Ok(users)
    }

    /// Point of sale assigned to a user, if any.
    #[instrument(skip(self))]
    pub async fn user_point_of_sale(&self, user_id: i64) -> Result<Option<PointOfSale>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["user_point_of_sale"])
            .start_timer();

        let pos = sqlx::query_as::<_, PointOfSale>(
            r#"
            SELECT p.pos_id, p.name, p.city, p.user_id
            FROM pos_assignments a
            JOIN points_of_sale p ON p.pos_id = a.pos_id
            WHERE a.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load assignment: {}", e))
        })?;

        timer.observe_duration();
        Ok(pos)
    }

    /// Assign a point of sale to a user, replacing any previous assignment.
    #[instrument(skip(self))]
    pub async fn assign_point_of_sale(&self, user_id: i64, pos_id: i64) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["assign_point_of_sale"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO pos_assignments (user_id, pos_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET pos_id = EXCLUDED.pos_id
            "#,
        )
        .bind(user_id)
        .bind(pos_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::not_found("User or point of sale not found")
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to assign: {}", e)),
        })?;

        timer.observe_duration();
        info!(user_id = user_id, pos_id = pos_id, "Point of sale assigned");
        Ok(())
    }

    /// Remove a user's assignment. Returns whether one existed.
    #[instrument(skip(self))]
    pub async fn unassign_point_of_sale(&self, user_id: i64) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["unassign_point_of_sale"])
            .start_timer();

        let result = sqlx::query("DELETE FROM pos_assignments WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to unassign: {}", e)))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }
}
