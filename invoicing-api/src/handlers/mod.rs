pub mod auth;
pub mod clients;
pub mod company;
pub mod dashboard;
pub mod devices;
pub mod health;
pub mod invoices;
pub mod products;
pub mod uploads;
pub mod webhooks;
