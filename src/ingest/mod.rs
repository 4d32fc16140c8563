// src/ingest/mod.rs

//! Ingestion state machine.
//!
//! ```text
//! ChooseMethod -> AwaitingFile  ----------------------------> done
//!              -> AwaitingPaste (repeat until terminator) --> done
//!              -> AwaitingZip -> (1 candidate) -------------> done
//!                             -> (>1) AwaitingEntrySelection -> done
//! AwaitingManifest -> manifest saved
//! ```
//!
//! State is keyed per user. Starting a new flow replaces the old one, and
//! the registry is only updated by the caller once a flow completes.

pub mod machine;
pub mod state;

use std::collections::HashMap;

pub use machine::{CompletedProject, IngestInput, Ingestor, Transition, ENTRY_CHOICE_PREFIX};
pub use state::{ConversationState, IngestMethod, IngestTarget};

use crate::types::UserId;

/// Live ingestion conversations, one per user.
#[derive(Debug, Default)]
pub struct Conversations {
    states: HashMap<UserId, ConversationState>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: UserId) -> Option<&ConversationState> {
        self.states.get(&user)
    }

    /// Replace whatever flow `user` had.
    pub fn set(&mut self, user: UserId, state: ConversationState) {
        self.states.insert(user, state);
    }

    pub fn take(&mut self, user: UserId) -> Option<ConversationState> {
        self.states.remove(&user)
    }
}
