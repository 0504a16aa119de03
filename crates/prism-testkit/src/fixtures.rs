//! Session fixture domain.
//!
//! A deliberately small state/action pair for driving stores in tests. The
//! engine under test never inspects these types directly; they exist so
//! tests have something concrete to project from.

use prism_core::Store;

/// Test domain state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    /// Monotonic activity counter.
    pub tick: u64,
    /// Unread message count.
    pub unread: u32,
    /// Current topic line.
    pub topic: String,
}

/// Test domain actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Advance the activity counter.
    Tick,
    /// A message arrived.
    MessageReceived {
        /// Message body; unused by the reducer beyond existing.
        body: String,
    },
    /// Clear the unread count.
    MarkAllRead,
    /// Replace the topic line.
    SetTopic(String),
    /// An action that changes nothing.
    Heartbeat,
}

/// Pure reducer for the session domain.
pub fn session_reducer(state: &SessionState, action: &SessionAction) -> SessionState {
    let mut next = state.clone();
    match action {
        SessionAction::Tick => next.tick += 1,
        SessionAction::MessageReceived { .. } => {
            next.tick += 1;
            next.unread += 1;
        }
        SessionAction::MarkAllRead => next.unread = 0,
        SessionAction::SetTopic(topic) => next.topic = topic.clone(),
        SessionAction::Heartbeat => {}
    }
    next
}

/// A fresh store over the session domain.
pub fn session_store() -> Store<SessionState, SessionAction> {
    Store::new(SessionState::default(), session_reducer)
}
