use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[serde(default)]
    pub is_staff: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePointOfSaleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 100))]
    #[serde(default)]
    pub city: String,

    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignPointOfSaleRequest {
    pub point_of_sale_id: i64,
}
