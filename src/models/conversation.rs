use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

/// Client-side projection of a server-owned conversation record. The
/// message log stays empty until the conversation is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub messages: Vec<Message>,
}
