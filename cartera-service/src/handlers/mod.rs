pub mod admin;
pub mod auth;
pub mod batches;
pub mod confirmations;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod payments;
pub mod suppliers;
