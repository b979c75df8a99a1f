pub mod client;
pub mod error;
pub mod service;
pub mod token_store;
mod wire;

pub use client::BackendClient;
pub use error::ApiError;
pub use service::AuthService;
pub use token_store::{StoredAuth, TokenStore};
