// Presentation boundary: what a session tells the user interface.
//
// The session worker calls these methods from its own thread, so
// implementations must be thread-safe; they are never called while holding
// any session lock. User input flows the other way, through
// `SessionController::on_choice_selected` and `on_exit_requested`.

use rochambeau_protocol::Role;

use crate::session::SessionState;

pub trait Presentation: Send + Sync {
    /// Connection/result status line.
    fn set_status(&self, text: &str);
    /// Choice-related text ("Waiting for opponent...", "You chose ...").
    fn set_choice_display(&self, text: &str);
    fn show_choice_options(&self);
    fn hide_choice_options(&self);
    fn show_exit(&self);
    fn hide_exit(&self);
    /// Observer hook for lifecycle transitions.
    fn state_changed(&self, _role: Role, _state: SessionState) {}
}

/// Presentation that discards everything.
pub struct NullPresentation;

impl Presentation for NullPresentation {
    fn set_status(&self, _text: &str) {}
    fn set_choice_display(&self, _text: &str) {}
    fn show_choice_options(&self) {}
    fn hide_choice_options(&self) {}
    fn show_exit(&self) {}
    fn hide_exit(&self) {}
}
