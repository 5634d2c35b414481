pub mod bulk;
pub mod database;
pub mod gateway;
pub mod jwt;
pub mod mailer;
pub mod metrics;
pub mod pdf;
pub mod push;
pub mod storage;
