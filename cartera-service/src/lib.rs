//! Cartera Service - supplier invoices, payments and batch payments for
//! businesses with several points of sale.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;
