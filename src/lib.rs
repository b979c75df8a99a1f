pub mod ai;
pub mod auth;
pub mod chat;
pub mod config;
pub mod models;
pub mod services;

pub use ai::{AiClient, ConversationNamer, MessagePipeline, TextGenerator};
pub use auth::{ApiError, AuthService, BackendClient, TokenStore};
pub use chat::{ChatSessionController, SidebarSelectionController};
pub use config::AppConfig;
pub use services::ConversationRepository;
