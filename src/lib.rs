pub mod api;
pub mod audit;
pub mod authorization;
pub mod config;
pub mod database;
pub mod error;

pub use error::AuditError;
