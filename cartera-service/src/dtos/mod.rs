pub mod admin;
pub mod auth;
pub mod invoices;
pub mod payments;
pub mod reports;
pub mod suppliers;

use serde::Serialize;

use crate::models::PAGE_SIZE;

/// A page of a listing.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: i64, total_count: i64) -> Self {
        Self {
            items,
            page: page.max(1),
            page_size: PAGE_SIZE,
            total_count,
            total_pages: (total_count + PAGE_SIZE - 1) / PAGE_SIZE,
        }
    }
}
