pub mod client;
pub mod namer;
pub mod pipeline;
pub mod wire;

pub use client::{AiClient, AiError, TextGenerator};
pub use namer::{ConversationDescriptor, ConversationNamer};
pub use pipeline::{MessagePipeline, PipelineReply, FALLBACK_REPLY};
