//! Snapshot reconciliation: the authoritative conversation state and the
//! speak-on-new-reply policy.

use crate::models::{Message, Role};

/// Outcome of merging one snapshot. At most one speech signal per merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    /// A new agent reply appeared at the tail; voice this text.
    Speak(String),
    /// Nothing to voice this tick.
    Silent,
}

/// The conversation as this client currently believes it to be.
#[derive(Debug, Default)]
struct ConversationState {
    messages: Vec<Message>,
    last_spoken_count: usize,
}

/// Merges freshly polled snapshots into the local conversation state and
/// decides when a newly appeared message warrants spoken playback.
///
/// The reconciler is the only owner of the message list; nothing else in
/// the crate mutates it.
#[derive(Debug, Default)]
pub struct ConversationReconciler {
    state: ConversationState,
}

impl ConversationReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one snapshot. The remote is authoritative: the snapshot
    /// replaces the local message list wholesale, with no content diffing.
    ///
    /// Speech is signalled only when the conversation grew beyond the last
    /// spoken count and the newest message is an agent reply. The spoken
    /// count then advances to the snapshot length either way, so a
    /// user-authored tail suppresses playback for that tick without losing
    /// track of what has been seen.
    pub fn merge(&mut self, snapshot: Vec<Message>) -> ReconcileResult {
        self.state.messages = snapshot;
        let grew = self.state.messages.len() > self.state.last_spoken_count;
        let result = match self.state.messages.last() {
            Some(last) if grew && last.role == Role::Agent => {
                ReconcileResult::Speak(last.text.clone())
            }
            _ => ReconcileResult::Silent,
        };
        self.state.last_spoken_count = self.state.messages.len();
        result
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn last_spoken_count(&self) -> usize {
        self.state.last_spoken_count
    }
}
