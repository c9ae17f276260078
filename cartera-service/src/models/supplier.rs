//! Suppliers (proveedores).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub supplier_id: i64,
    pub name: String,
    pub tax_id: String,
    pub email: String,
    pub phone: String,
    pub created_utc: DateTime<Utc>,
}

impl Supplier {
    /// Trimmed email, or `None` when the supplier has none.
    pub fn contact_email(&self) -> Option<&str> {
        Some(self.email.trim()).filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct CreateSupplier {
    pub name: String,
    pub tax_id: String,
    pub email: String,
    pub phone: String,
}

/// Whitelisted orderings for supplier listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupplierOrdering {
    #[default]
    NameAsc,
    NameDesc,
    TaxIdAsc,
    TaxIdDesc,
    CreatedAsc,
    CreatedDesc,
}

impl SupplierOrdering {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("-name") => Self::NameDesc,
            Some("tax_id") => Self::TaxIdAsc,
            Some("-tax_id") => Self::TaxIdDesc,
            Some("created_utc") => Self::CreatedAsc,
            Some("-created_utc") => Self::CreatedDesc,
            _ => Self::NameAsc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NameAsc => "name ASC, supplier_id ASC",
            Self::NameDesc => "name DESC, supplier_id DESC",
            Self::TaxIdAsc => "tax_id ASC, supplier_id ASC",
            Self::TaxIdDesc => "tax_id DESC, supplier_id DESC",
            Self::CreatedAsc => "created_utc ASC, supplier_id ASC",
            Self::CreatedDesc => "created_utc DESC, supplier_id DESC",
        }
    }
}
