// Admin session client - library root

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod navigation;
pub mod transport;

pub use auth::{CredentialStore, LoginCredentials, SessionManager};
pub use error::{SessionError, TransportError};
pub use http_client::ApiClient;
