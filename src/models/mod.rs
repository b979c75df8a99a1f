pub mod attachment;
pub mod conversation;
pub mod message;
pub mod user;

pub use attachment::ImageAttachment;
pub use conversation::Conversation;
pub use message::{Message, Role};
pub use user::{Session, TokenPair, UserProfile};
