use std::sync::Arc;

use base64::Engine;

use super::client::TextGenerator;
use super::wire::Part;
use crate::models::ImageAttachment;

/// Rendered as an assistant message when a send fails for any reason, so a
/// bad network day reads as conversation rather than an error banner.
pub const FALLBACK_REPLY: &str = "An error occurred. Please try again.";

const PERSONA_INSTRUCTIONS: &str = "You are Sprout, a friendly assistant for a farm-management \
app. Answer questions about crops, livestock, equipment, feed and farm finances in plain \
language. Keep replies short and practical, suitable for reading in the field.";

const CONTEXT_PREAMBLE: &str = "Use the earlier messages below only lightly as background; \
prioritize the message after the separator.";

const GREETING_PROMPT: &str = "Greet the user warmly in one short sentence as Sprout, the farm \
assistant, and ask what they need help with on the farm today.";

/// A separator the model is told to treat as the boundary between stale
/// context and the current turn.
const TURN_SEPARATOR: &str = "||";

/// Outcome of one AI round-trip. This layer never fails: transport, timeout
/// and parse errors all degrade to the fallback text with `success: false`.
#[derive(Debug, Clone)]
pub struct PipelineReply {
    pub success: bool,
    pub text: String,
}

/// Builds the AI request for a chat turn (persona instructions, running
/// context, current message, optional inline image) and extracts the reply.
#[derive(Clone)]
pub struct MessagePipeline {
    generator: Arc<dyn TextGenerator>,
}

impl MessagePipeline {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// One chat turn. `context` is the concatenation of prior user turns;
    /// the current message goes after the separator so the model weights it
    /// highest.
    pub async fn send(
        &self,
        context: &str,
        text: &str,
        image: Option<&ImageAttachment>,
    ) -> PipelineReply {
        let mut parts = vec![Part::text(Self::compose(context, text))];

        // The image rides as its own structured part, never merged into the
        // prompt text.
        if let Some(image) = image {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&image.data);
            parts.push(Part::image(image.mime_type.clone(), encoded));
        }

        self.dispatch(parts).await
    }

    /// The session-opening assistant turn. No user text is involved.
    pub async fn greet(&self) -> PipelineReply {
        self.dispatch(vec![Part::text(GREETING_PROMPT)]).await
    }

    fn compose(context: &str, text: &str) -> String {
        let mut prompt = String::with_capacity(
            PERSONA_INSTRUCTIONS.len() + CONTEXT_PREAMBLE.len() + context.len() + text.len() + 16,
        );
        prompt.push_str(PERSONA_INSTRUCTIONS);
        prompt.push_str("\n\n");
        prompt.push_str(CONTEXT_PREAMBLE);
        prompt.push('\n');
        prompt.push_str(context);
        prompt.push('\n');
        prompt.push_str(TURN_SEPARATOR);
        prompt.push('\n');
        prompt.push_str(text);
        prompt
    }

    async fn dispatch(&self, parts: Vec<Part>) -> PipelineReply {
        match self.generator.generate(parts).await {
            Ok(text) => PipelineReply {
                success: true,
                text,
            },
            Err(e) => {
                tracing::warn!(error = %e, "AI call failed, substituting fallback reply");
                PipelineReply {
                    success: false,
                    text: FALLBACK_REPLY.to_string(),
                }
            }
        }
    }
}
