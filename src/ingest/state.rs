// src/ingest/state.rs

use std::path::PathBuf;

use crate::store::ProjectPaths;

/// Project an ingestion flow writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestTarget {
    pub name: String,
    pub paths: ProjectPaths,
    /// Whether an existing project is being replaced.
    pub replace: bool,
}

/// How the user wants to supply source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMethod {
    File,
    Paste,
    Zip,
}

impl IngestMethod {
    pub const ALL: [IngestMethod; 3] = [IngestMethod::File, IngestMethod::Paste, IngestMethod::Zip];

    pub fn data(self) -> &'static str {
        match self {
            IngestMethod::File => "method:file",
            IngestMethod::Paste => "method:paste",
            IngestMethod::Zip => "method:zip",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IngestMethod::File => "📄 Upload a file",
            IngestMethod::Paste => "📝 Paste code",
            IngestMethod::Zip => "🗜 Upload a zip",
        }
    }

    /// Accepts button data (`method:zip`) or a typed word (`zip`).
    pub fn parse(input: &str) -> Option<Self> {
        let word = input.trim();
        let word = word.strip_prefix("method:").unwrap_or(word);
        match word.to_ascii_lowercase().as_str() {
            "file" | "upload" => Some(IngestMethod::File),
            "paste" | "text" => Some(IngestMethod::Paste),
            "zip" | "archive" => Some(IngestMethod::Zip),
            _ => None,
        }
    }
}

/// Where a user's ingestion conversation currently stands. Each step carries
/// exactly what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    ChooseMethod {
        target: IngestTarget,
    },
    /// `target` is `None` for `/upload`, where the file name names the
    /// project.
    AwaitingFile {
        target: Option<IngestTarget>,
    },
    AwaitingPaste {
        target: IngestTarget,
        buffer: String,
        messages: usize,
    },
    AwaitingZip {
        target: IngestTarget,
    },
    AwaitingEntrySelection {
        target: IngestTarget,
        /// Relative to the project directory, sorted.
        candidates: Vec<PathBuf>,
    },
    AwaitingManifest {
        project: String,
        paths: ProjectPaths,
    },
}

impl ConversationState {
    pub fn step_name(&self) -> &'static str {
        match self {
            ConversationState::ChooseMethod { .. } => "awaiting-method-choice",
            ConversationState::AwaitingFile { .. } => "awaiting-file",
            ConversationState::AwaitingPaste { .. } => "awaiting-paste",
            ConversationState::AwaitingZip { .. } => "awaiting-zip",
            ConversationState::AwaitingEntrySelection { .. } => "awaiting-entry-selection",
            ConversationState::AwaitingManifest { .. } => "awaiting-manifest",
        }
    }

    /// Whether the next step consumes an uploaded document.
    pub fn accepts_document(&self) -> bool {
        matches!(
            self,
            ConversationState::AwaitingFile { .. }
                | ConversationState::AwaitingZip { .. }
                | ConversationState::AwaitingManifest { .. }
        )
    }

    /// Target of a flow that may have created a directory to discard on
    /// failure.
    pub fn target(&self) -> Option<&IngestTarget> {
        match self {
            ConversationState::ChooseMethod { target }
            | ConversationState::AwaitingPaste { target, .. }
            | ConversationState::AwaitingZip { target }
            | ConversationState::AwaitingEntrySelection { target, .. } => Some(target),
            ConversationState::AwaitingFile { target } => target.as_ref(),
            ConversationState::AwaitingManifest { .. } => None,
        }
    }
}
