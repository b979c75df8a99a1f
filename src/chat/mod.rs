pub mod selection;
pub mod session;

pub use selection::{LongPressRecognizer, PressOutcome, SelectionMode, SidebarSelectionController};
pub use session::{ChatSessionController, SendOutcome, SessionPhase};
