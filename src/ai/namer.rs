use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::client::TextGenerator;
use super::wire::Part;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static ICON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*-(.+?)-\*").unwrap());
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\+(.+?)\+\*").unwrap());

const NAMING_INSTRUCTIONS: &str = "Suggest a short title, a single emoji icon, and a one-line \
description for a conversation that starts with the message below. Reply with exactly three \
fields: the title wrapped in ** double asterisks **, the icon wrapped in *- dash markers -*, \
and the description wrapped in *+ plus markers +*.\n\nMessage: ";

/// Title, icon and description for a freshly created conversation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationDescriptor {
    pub name: String,
    pub icon: String,
    pub description: String,
}

/// Derives a conversation descriptor from the naming trigger (the user's
/// second message of a session) via one AI round-trip.
#[derive(Clone)]
pub struct ConversationNamer {
    generator: Arc<dyn TextGenerator>,
}

impl ConversationNamer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// `None` means the AI call itself failed; the caller swallows it and
    /// the conversation simply keeps a blank title. Malformed replies still
    /// produce a descriptor, with empty strings for the missing fields.
    pub async fn derive(&self, trigger: &str) -> Option<ConversationDescriptor> {
        let prompt = format!("{NAMING_INSTRUCTIONS}{trigger}");
        match self.generator.generate(vec![Part::text(prompt)]).await {
            Ok(reply) => Some(Self::parse(&reply)),
            Err(e) => {
                tracing::warn!(error = %e, "Conversation naming call failed");
                None
            }
        }
    }

    /// Each field is extracted independently; a pattern miss resolves to an
    /// empty string, never an error.
    pub fn parse(reply: &str) -> ConversationDescriptor {
        ConversationDescriptor {
            name: Self::capture(&NAME_RE, reply),
            icon: Self::capture(&ICON_RE, reply),
            description: Self::capture(&DESCRIPTION_RE, reply),
        }
    }

    fn capture(re: &Regex, reply: &str) -> String {
        re.captures(reply)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    }
}
