//! Multi-tenant invoicing backend.
//!
//! Companies manage clients, a product catalog, and invoices. Issued
//! invoices get a gapless per-company number, a rendered PDF, and an
//! optional hosted payment link; gateway webhooks settle them. Bulk
//! CSV/XLSX uploads import clients and products with per-row outcomes.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

pub use startup::{build_router, AppState, Application};
