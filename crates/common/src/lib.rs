//! VeriNews Common Library
//!
//! Shared code for the VeriNews API including:
//! - News and report domain types with their validation rules
//! - The report moderation workflow
//! - Store traits with Postgres and in-memory implementations
//! - Classification client abstraction
//! - One-time verification codes
//! - Admin management of the user directory
//! - Error types, configuration, authentication and metrics

pub mod auth;
pub mod classifier;
pub mod config;
pub mod db;
pub mod errors;
pub mod ids;
pub mod metrics;
pub mod moderation;
pub mod news;
pub mod otp;
pub mod paging;
pub mod services;
pub mod store;
pub mod users;

// Re-export commonly used types
pub use classifier::Classifier;
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use store::{MemoryStore, Store};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
