use serde::Deserialize;
use validator::Validate;

use crate::models::CreateSupplier;

#[derive(Debug, Deserialize, Validate)]
pub struct SupplierRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,

    #[validate(length(max = 50))]
    #[serde(default)]
    pub tax_id: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    #[serde(default)]
    pub phone: String,
}

impl SupplierRequest {
    pub fn into_model(self) -> CreateSupplier {
        CreateSupplier {
            name: self.name.trim().to_string(),
            tax_id: self.tax_id.trim().to_string(),
            email: self.email.unwrap_or_default().trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SupplierQuery {
    pub q: Option<String>,
    pub ordering: Option<String>,
}
