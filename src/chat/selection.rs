use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::auth::ApiError;
use crate::models::Conversation;
use crate::services::ConversationRepository;

pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Normal,
    Selecting,
}

/// What a completed press turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressOutcome {
    Tap(String),
    LongPress(String),
    /// Release without a matching press, or on a different row.
    Ignored,
}

/// Explicit press/release state machine for sustained-press detection,
/// decoupled from any rendering concern. A release at or past the threshold
/// is a long press; before it, a normal tap.
#[derive(Debug)]
pub struct LongPressRecognizer {
    threshold: Duration,
    pressed: Option<(String, Instant)>,
}

impl LongPressRecognizer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pressed: None,
        }
    }

    pub fn press(&mut self, id: &str) {
        self.press_at(id, Instant::now());
    }

    pub fn release(&mut self, id: &str) -> PressOutcome {
        self.release_at(id, Instant::now())
    }

    pub fn press_at(&mut self, id: &str, at: Instant) {
        self.pressed = Some((id.to_string(), at));
    }

    pub fn release_at(&mut self, id: &str, at: Instant) -> PressOutcome {
        let Some((pressed_id, started)) = self.pressed.take() else {
            return PressOutcome::Ignored;
        };
        if pressed_id != id {
            return PressOutcome::Ignored;
        }
        if at.duration_since(started) >= self.threshold {
            PressOutcome::LongPress(pressed_id)
        } else {
            PressOutcome::Tap(pressed_id)
        }
    }
}

/// Multi-select over the sidebar's conversation list: long-press enters
/// selection mode, taps toggle membership, batch delete clears it. Shares
/// the repository with the chat session but never touches message flow.
pub struct SidebarSelectionController {
    repository: ConversationRepository,
    recognizer: LongPressRecognizer,
    conversations: Vec<Conversation>,
    mode: SelectionMode,
    selected: HashSet<String>,
}

impl SidebarSelectionController {
    pub fn new(repository: ConversationRepository, long_press: Duration) -> Self {
        Self {
            repository,
            recognizer: LongPressRecognizer::new(long_press),
            conversations: Vec::new(),
            mode: SelectionMode::Normal,
            selected: HashSet::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn selected(&self) -> &HashSet<String> {
        &self.selected
    }

    /// Reload the list projection from the backend.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        self.conversations = self.repository.list().await?;
        let known: HashSet<&str> = self.conversations.iter().map(|c| c.id.as_str()).collect();
        self.selected.retain(|id| known.contains(id.as_str()));
        if self.selected.is_empty() {
            self.mode = SelectionMode::Normal;
        }
        Ok(())
    }

    pub fn press_started(&mut self, id: &str) {
        self.recognizer.press(id);
    }

    /// Finish a press. Returns the conversation to open when the gesture was
    /// a plain tap in `Normal` mode; selection changes return `None`.
    pub fn press_finished(&mut self, id: &str) -> Option<String> {
        self.press_finished_at(id, Instant::now())
    }

    pub fn press_finished_at(&mut self, id: &str, at: Instant) -> Option<String> {
        match self.recognizer.release_at(id, at) {
            PressOutcome::LongPress(id) => {
                self.mode = SelectionMode::Selecting;
                self.selected.insert(id);
                None
            }
            PressOutcome::Tap(id) => match self.mode {
                SelectionMode::Normal => Some(id),
                SelectionMode::Selecting => {
                    self.toggle(&id);
                    None
                }
            },
            PressOutcome::Ignored => None,
        }
    }

    /// Toggle membership; an emptied selection drops back to `Normal`.
    pub fn toggle(&mut self, id: &str) {
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
            self.mode = SelectionMode::Selecting;
        } else if self.selected.is_empty() {
            self.mode = SelectionMode::Normal;
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.conversations.iter().map(|c| c.id.clone()).collect();
        if !self.selected.is_empty() {
            self.mode = SelectionMode::Selecting;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.mode = SelectionMode::Normal;
    }

    /// Batch-delete the selection. On success the deleted ids leave the
    /// local projection, selection resets, and the return value says whether
    /// `active` (the conversation open in the chat view) was among them so
    /// the caller can reset the session. On failure the selection is left
    /// exactly as it was.
    pub async fn delete_selected(&mut self, active: Option<&str>) -> Result<bool, ApiError> {
        if self.selected.is_empty() {
            return Ok(false);
        }

        let ids: Vec<String> = self.selected.iter().cloned().collect();
        self.repository.delete(&ids).await?;

        let active_deleted = active.is_some_and(|a| self.selected.contains(a));
        self.conversations.retain(|c| !self.selected.contains(&c.id));
        self.selected.clear();
        self.mode = SelectionMode::Normal;

        tracing::debug!(count = ids.len(), "Deleted conversations");
        Ok(active_deleted)
    }
}
