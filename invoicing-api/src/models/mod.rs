//! Database models for the invoicing backend.

mod client;
mod company;
mod device;
mod invoice;
mod payment;
mod product;
mod upload;
mod user;

pub use client::{Client, CreateClient, ListClientsFilter, UpdateClient};
pub use company::{Company, UpdateCompany};
pub use device::Device;
pub use invoice::{
    CreateInvoice, CreateInvoiceItem, Invoice, InvoiceItem, InvoiceStatus, ListInvoicesFilter,
    UpdateInvoice,
};
pub use payment::{CreatePayment, Payment, PaymentMethod};
pub use product::{CreateProduct, ListProductsFilter, Product, UpdateProduct};
pub use upload::{RowError, UploadBatch, UploadEntity, UploadStatus};
pub use user::User;
