use tokio_util::sync::CancellationToken;

use crate::ai::{ConversationNamer, MessagePipeline};
use crate::models::{ImageAttachment, Message};
use crate::services::ConversationRepository;

/// Where the session currently is. `LimitReached` is deliberately not a
/// phase: hitting the message cap is a transient send outcome and the
/// session stays `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingGreeting,
    Ready,
    Sending,
}

/// Result of one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant reply (or its fallback) was appended.
    Replied,
    /// The per-session user message cap was hit; nothing was sent. The
    /// caller shows a transient warning and the session stays `Ready`.
    LimitReached,
    /// Empty input, or the session is not in `Ready`.
    Rejected,
    /// The session was reset while the request was in flight; the stale
    /// reply was discarded.
    Superseded,
}

/// Drives one chat session: greeting, send/receive cycles, the message cap,
/// once-per-session conversation creation, and "new conversation" resets.
///
/// Every send is awaited to completion before the next user action is
/// processed, so assistant replies always append in the order their user
/// messages were sent. A reset hands the in-flight send a cancelled token
/// instead of letting a stale reply write into the superseded session.
pub struct ChatSessionController {
    pipeline: MessagePipeline,
    namer: ConversationNamer,
    conversations: ConversationRepository,
    message_limit: usize,
    phase: SessionPhase,
    messages: Vec<Message>,
    running_context: String,
    user_message_count: usize,
    naming_done: bool,
    active_conversation: Option<String>,
    cancel: CancellationToken,
}

impl ChatSessionController {
    pub fn new(
        pipeline: MessagePipeline,
        namer: ConversationNamer,
        conversations: ConversationRepository,
        message_limit: usize,
    ) -> Self {
        Self {
            pipeline,
            namer,
            conversations,
            message_limit,
            phase: SessionPhase::Idle,
            messages: Vec::new(),
            running_context: String::new(),
            user_message_count: 0,
            naming_done: false,
            active_conversation: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn user_message_count(&self) -> usize {
        self.user_message_count
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_conversation.as_deref()
    }

    /// Token for the current session generation. External owners (screen
    /// exit, app shutdown) may cancel it to discard an in-flight reply.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start the first session. Same path as a "new conversation" reset.
    pub async fn start(&mut self) {
        self.new_conversation().await;
    }

    /// Reset to a fresh session from any phase. The previous generation's
    /// token is cancelled so an in-flight send cannot append here.
    pub async fn new_conversation(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();

        self.messages.clear();
        self.running_context.clear();
        self.user_message_count = 0;
        self.naming_done = false;
        self.active_conversation = None;

        self.phase = SessionPhase::AwaitingGreeting;
        self.greet().await;
    }

    /// Track which server-side conversation the session is showing, so a
    /// sidebar delete of that record can reset us.
    pub fn open_conversation(&mut self, id: impl Into<String>) {
        self.active_conversation = Some(id.into());
    }

    /// Reset to `AwaitingGreeting` if the active conversation was among the
    /// deleted ids. Returns whether a reset happened.
    pub async fn reset_if_deleted(&mut self, deleted: &[String]) -> bool {
        let hit = self
            .active_conversation
            .as_ref()
            .is_some_and(|id| deleted.contains(id));
        if hit {
            tracing::debug!("Active conversation deleted, resetting session");
            self.new_conversation().await;
        }
        hit
    }

    /// One user turn. Appends the user message, awaits the AI reply (or its
    /// fallback) and, on exactly the second user message of the session,
    /// derives a name and creates the server-side conversation record.
    pub async fn send(&mut self, text: &str, image: Option<ImageAttachment>) -> SendOutcome {
        if self.phase != SessionPhase::Ready {
            return SendOutcome::Rejected;
        }
        let text = text.trim();
        if text.is_empty() && image.is_none() {
            return SendOutcome::Rejected;
        }
        if self.user_message_count >= self.message_limit {
            tracing::debug!(limit = self.message_limit, "Session message cap reached");
            return SendOutcome::LimitReached;
        }

        self.phase = SessionPhase::Sending;
        self.messages.push(Message::user(text, image.clone()));
        self.user_message_count += 1;
        let count = self.user_message_count;

        let cancel = self.cancel.clone();
        let reply = tokio::select! {
            _ = cancel.cancelled() => return SendOutcome::Superseded,
            reply = self.pipeline.send(&self.running_context, text, image.as_ref()) => reply,
        };

        self.messages.push(Message::assistant(reply.text));
        if !text.is_empty() {
            self.running_context.push_str(text);
            self.running_context.push('\n');
        }
        self.phase = SessionPhase::Ready;

        // The flag flips the moment the condition is observed, so a failed
        // create is never re-attempted within this session.
        if count == 2 && !self.naming_done {
            self.naming_done = true;
            self.create_conversation_record(text).await;
        }

        SendOutcome::Replied
    }

    async fn greet(&mut self) {
        let cancel = self.cancel.clone();
        let reply = tokio::select! {
            _ = cancel.cancelled() => return,
            reply = self.pipeline.greet() => reply,
        };

        self.messages.push(Message::assistant(reply.text));
        self.phase = SessionPhase::Ready;
    }

    /// Naming and creation failures are logged and swallowed; they must
    /// never block the chat turn.
    async fn create_conversation_record(&mut self, trigger: &str) {
        let Some(descriptor) = self.namer.derive(trigger).await else {
            tracing::warn!("Conversation naming failed, keeping session untitled");
            return;
        };
        if descriptor.name.is_empty() {
            tracing::warn!("Naming reply had no usable title, skipping create");
            return;
        }

        match self.conversations.create(&descriptor).await {
            Ok(conversation) => {
                self.active_conversation = Some(conversation.id);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create conversation record");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::{AiError, TextGenerator};
    use crate::ai::wire::Part;
    use crate::auth::{BackendClient, StoredAuth, TokenStore};
    use crate::models::{Role, TokenPair};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NAMING_MARKER: &str = "Suggest a short title";

    /// Answers chat prompts with "ok" and naming prompts with a canned
    /// descriptor reply. Optionally fails the naming call.
    struct StubGenerator {
        calls: AtomicUsize,
        naming_calls: AtomicUsize,
        fail_naming: bool,
    }

    impl StubGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                naming_calls: AtomicUsize::new(0),
                fail_naming: false,
            }
        }

        fn failing_naming() -> Self {
            Self {
                fail_naming: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, parts: Vec<Part>) -> Result<String, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = parts[0].text.as_deref().unwrap_or_default();
            if prompt.contains(NAMING_MARKER) {
                self.naming_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_naming {
                    return Err(AiError::Network("down".to_string()));
                }
                return Ok("**Field notes**\n*-🌾-*\n*+Questions from the field+*".to_string());
            }
            Ok("ok".to_string())
        }
    }

    async fn controller(
        server: &MockServer,
        generator: Arc<dyn TextGenerator>,
        limit: usize,
    ) -> (tempfile::TempDir, ChatSessionController) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(dir.path().join("auth.json")).await;
        store
            .set(StoredAuth {
                tokens: TokenPair {
                    access_token: "token".to_string(),
                    refresh_token: "refresh".to_string(),
                },
                user: None,
            })
            .await
            .unwrap();
        let client = BackendClient::new(server.uri(), store, Duration::from_secs(5));
        let session = ChatSessionController::new(
            MessagePipeline::new(generator.clone()),
            ConversationNamer::new(generator),
            ConversationRepository::new(client),
            limit,
        );
        (dir, session)
    }

    async fn mount_create(server: &MockServer, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/conversations/create"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "c1" })),
            )
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn greeting_opens_every_session() {
        let server = MockServer::start().await;
        let (_dir, mut session) =
            controller(&server, Arc::new(StubGenerator::new()), 10).await;

        assert_eq!(session.phase(), SessionPhase::Idle);
        session.start().await;
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn send_outside_ready_is_rejected() {
        let server = MockServer::start().await;
        let (_dir, mut session) =
            controller(&server, Arc::new(StubGenerator::new()), 10).await;

        assert_eq!(session.send("hello", None).await, SendOutcome::Rejected);
        session.start().await;
        assert_eq!(session.send("   ", None).await, SendOutcome::Rejected);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn ten_sends_cap_and_create_once() {
        let server = MockServer::start().await;
        mount_create(&server, 1).await;

        let generator = Arc::new(StubGenerator::new());
        let (_dir, mut session) = controller(&server, generator.clone(), 10).await;
        session.start().await;

        for i in 1..=10 {
            let outcome = session.send(&format!("message {i}"), None).await;
            assert_eq!(outcome, SendOutcome::Replied);
        }

        // 1 greeting + 10 user + 10 assistant.
        assert_eq!(session.messages().len(), 21);
        assert_eq!(session.user_message_count(), 10);
        assert_eq!(generator.naming_calls.load(Ordering::SeqCst), 1);

        // The 11th attempt is inert: no message, no AI call.
        let calls_before = generator.calls.load(Ordering::SeqCst);
        assert_eq!(
            session.send("message 11", None).await,
            SendOutcome::LimitReached
        );
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.messages().len(), 21);
        assert_eq!(generator.calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn create_waits_for_second_message() {
        let server = MockServer::start().await;
        mount_create(&server, 0).await;

        let (_dir, mut session) =
            controller(&server, Arc::new(StubGenerator::new()), 10).await;
        session.start().await;
        session.send("only one message", None).await;
        // Mock expectation of zero create calls verifies on drop.
    }

    #[tokio::test]
    async fn create_posts_parsed_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations/create"))
            .and(body_json(serde_json::json!({
                "conversation_name": "Field notes",
                "icon": "🌾",
                "description": "Questions from the field"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "c1" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, mut session) =
            controller(&server, Arc::new(StubGenerator::new()), 10).await;
        session.start().await;
        session.send("first", None).await;
        session.send("second", None).await;
        assert_eq!(session.active_conversation_id(), Some("c1"));
    }

    #[tokio::test]
    async fn naming_failure_never_blocks_the_turn() {
        let server = MockServer::start().await;
        mount_create(&server, 0).await;

        let generator = Arc::new(StubGenerator::failing_naming());
        let (_dir, mut session) = controller(&server, generator.clone(), 10).await;
        session.start().await;

        session.send("first", None).await;
        assert_eq!(session.send("second", None).await, SendOutcome::Replied);
        assert_eq!(session.messages().len(), 5);

        // The naming flag is already set; later sends never retry.
        session.send("third", None).await;
        session.send("fourth", None).await;
        assert_eq!(generator.naming_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations/create"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, mut session) =
            controller(&server, Arc::new(StubGenerator::new()), 10).await;
        session.start().await;
        session.send("first", None).await;
        assert_eq!(session.send("second", None).await, SendOutcome::Replied);
        assert!(session.active_conversation_id().is_none());
    }

    #[tokio::test]
    async fn reset_starts_a_fresh_session_with_fresh_create() {
        let server = MockServer::start().await;
        mount_create(&server, 2).await;

        let (_dir, mut session) =
            controller(&server, Arc::new(StubGenerator::new()), 10).await;
        session.start().await;
        session.send("a", None).await;
        session.send("b", None).await;
        assert_eq!(session.messages().len(), 5);

        session.new_conversation().await;
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.user_message_count(), 0);
        assert!(session.active_conversation_id().is_none());

        session.send("c", None).await;
        session.send("d", None).await;
        // Second session names and creates again; expect(2) verifies.
    }

    #[tokio::test]
    async fn deleting_active_conversation_resets_session() {
        let server = MockServer::start().await;
        let (_dir, mut session) =
            controller(&server, Arc::new(StubGenerator::new()), 10).await;
        session.start().await;
        session.send("hello", None).await;
        session.open_conversation("c7");

        let reset = session
            .reset_if_deleted(&["c3".to_string(), "c7".to_string()])
            .await;
        assert!(reset);
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.messages().len(), 1);
        assert!(session.active_conversation_id().is_none());

        let untouched = session.reset_if_deleted(&["c99".to_string()]).await;
        assert!(!untouched);
    }

    /// Generator that cancels the session's token mid-request and then
    /// stalls, simulating a reset racing an in-flight send.
    struct CancellingGenerator {
        token: CancellationToken,
    }

    #[async_trait]
    impl TextGenerator for CancellingGenerator {
        async fn generate(&self, parts: Vec<Part>) -> Result<String, AiError> {
            let prompt = parts[0].text.as_deref().unwrap_or_default();
            if prompt.contains("Greet the user") {
                return Ok("hi".to_string());
            }
            self.token.cancel();
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn cancelled_send_discards_stale_reply() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(dir.path().join("auth.json")).await;
        let client = BackendClient::new(server.uri(), store, Duration::from_secs(5));

        // Two-phase construction: the generator needs the session's token.
        let placeholder = Arc::new(StubGenerator::new());
        let mut session = ChatSessionController::new(
            MessagePipeline::new(placeholder.clone()),
            ConversationNamer::new(placeholder),
            ConversationRepository::new(client),
            10,
        );
        session.start().await;

        let generator = Arc::new(CancellingGenerator {
            token: session.cancel_handle(),
        });
        session.pipeline = MessagePipeline::new(generator);

        let outcome = session.send("racing message", None).await;
        assert_eq!(outcome, SendOutcome::Superseded);
        // The stale reply never appended; only greeting + user message.
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].role, Role::User);
    }
}
