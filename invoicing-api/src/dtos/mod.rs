pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod devices;
pub mod invoices;
pub mod payments;
pub mod products;
pub mod uploads;
