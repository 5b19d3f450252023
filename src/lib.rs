// Sirene Client - Library root

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;

pub use auth::{Credentials, RefreshHandle, RefreshPolicy, TokenManager};
pub use error::{Result, SireneError};
pub use http_client::SireneClient;
