//! Configuration management

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::ConfigLoader;
pub use schema::{ApiConfig, Config, EntryConfig, RetryConfig, RetryConfigs};
pub use validator::ConfigValidator;
