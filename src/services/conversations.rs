use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ai::ConversationDescriptor;
use crate::auth::{ApiError, BackendClient};
use crate::models::Conversation;

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct ListResponse {
    data: Vec<ConversationDto>,
}

#[derive(Debug, Deserialize)]
struct ConversationDto {
    id: String,
    #[serde(default)]
    conversation_name: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "createdAt", default = "Utc::now")]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CreatedDto {
    id: String,
}

impl ConversationDto {
    fn into_model(self) -> Conversation {
        Conversation {
            id: self.id,
            title: self.conversation_name,
            icon: self.icon,
            description: self.description,
            created_at: self.created_at,
            messages: Vec::new(),
        }
    }
}

/// CRUD over the backend's conversation resource. Records are created
/// server-side; the client only ever holds a projection.
#[derive(Clone)]
pub struct ConversationRepository {
    client: BackendClient,
}

impl ConversationRepository {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Conversation>, ApiError> {
        let response: ListResponse = self.client.get_json("/conversations/get").await?;
        Ok(response.data.into_iter().map(|d| d.into_model()).collect())
    }

    pub async fn create(
        &self,
        descriptor: &ConversationDescriptor,
    ) -> Result<Conversation, ApiError> {
        let body = serde_json::json!({
            "conversation_name": descriptor.name,
            "icon": descriptor.icon,
            "description": descriptor.description,
        });
        let created: CreatedDto = self.client.post_json("/conversations/create", &body).await?;
        tracing::debug!(id = %created.id, title = %descriptor.name, "Conversation created");

        Ok(Conversation {
            id: created.id,
            title: descriptor.name.clone(),
            icon: descriptor.icon.clone(),
            description: descriptor.description.clone(),
            created_at: Utc::now(),
            messages: Vec::new(),
        })
    }

    /// Bulk delete. Partial failure is not modeled: the backend either
    /// removes every requested id or the call fails as a whole.
    pub async fn delete(&self, ids: &[String]) -> Result<(), ApiError> {
        let body = serde_json::json!({ "conversationIds": ids });
        self.client
            .delete_with_body("/conversations/delete", &body)
            .await
    }
}
