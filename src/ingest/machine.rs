// src/ingest/machine.rs

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{BotvisorError, Result};
use crate::store::{sanitize_file_name, sanitize_name, ArtifactStore, LayoutKind};
use crate::transport::{Choice, OutgoingMessage};

use super::state::{ConversationState, IngestMethod, IngestTarget};

/// Prefix of entry-selection button data.
pub const ENTRY_CHOICE_PREFIX: &str = "entry:";

/// One inbound message, as seen by the state machine.
#[derive(Debug, Clone, Copy)]
pub enum IngestInput<'a> {
    Text(&'a str),
    Choice(&'a str),
    /// `bytes` is only fetched when the current step accepts documents.
    Document { file_name: &'a str, bytes: &'a [u8] },
}

/// A project whose source has been fully collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedProject {
    pub name: String,
    pub paths: crate::store::ProjectPaths,
    pub entry_point: PathBuf,
    pub replace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Keep (or move to) `state` and reply.
    Stay {
        state: ConversationState,
        reply: OutgoingMessage,
    },
    /// Source collected; the caller registers the project and clears state.
    Completed(CompletedProject),
    /// Dependency manifest written for an existing project.
    ManifestSaved { project: String, bytes: usize },
}

/// Drives [`ConversationState`] forward. Writes go to the artifact store;
/// the registry is never touched here.
#[derive(Debug, Clone)]
pub struct Ingestor {
    store: ArtifactStore,
    terminator: String,
}

impl Ingestor {
    pub fn new(store: ArtifactStore, terminator: impl Into<String>) -> Self {
        Self {
            store,
            terminator: terminator.into(),
        }
    }

    pub fn terminator(&self) -> &str {
        &self.terminator
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn ext(&self) -> &str {
        self.store.script_extension()
    }

    /// Target for `/new <name>` or `/edit <name>`. Replacements of legacy
    /// projects move to the consolidated layout.
    pub fn target(&self, name: &str, replace: bool) -> IngestTarget {
        IngestTarget {
            name: name.to_string(),
            paths: self.store.consolidated_paths(name),
            replace,
        }
    }

    /// Bot name for an upload that names itself after its file.
    pub fn name_from_file(&self, file_name: &str) -> Result<String> {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        sanitize_name(stem).ok_or_else(|| {
            BotvisorError::IngestionFailure(format!(
                "Cannot derive a bot name from \"{file_name}\"."
            ))
        })
    }

    pub fn method_prompt(&self, target: &IngestTarget) -> OutgoingMessage {
        let verb = if target.replace { "Editing" } else { "Creating" };
        let choices = IngestMethod::ALL
            .iter()
            .map(|m| Choice::new(m.label(), m.data()))
            .collect();
        OutgoingMessage::text(format!(
            "{verb} bot \"{}\". How do you want to send the code?",
            target.name
        ))
        .with_choices(choices)
    }

    pub fn file_prompt(&self) -> OutgoingMessage {
        OutgoingMessage::text(format!("📄 Send the .{} file.", self.ext()))
    }

    pub fn manifest_prompt(&self, project: &str) -> OutgoingMessage {
        OutgoingMessage::text(format!(
            "📦 Send the requirements for \"{project}\" as a .txt file, or paste them as text."
        ))
    }

    /// Advance `state` with `input`.
    ///
    /// An `Err` means the flow failed and must be dropped; rejections that
    /// let the user retry come back as `Stay` with the same step.
    pub fn advance(&self, state: ConversationState, input: IngestInput<'_>) -> Result<Transition> {
        debug!(step = state.step_name(), "ingestion input");
        match state {
            ConversationState::ChooseMethod { target } => Ok(self.choose_method(target, input)),
            ConversationState::AwaitingFile { target } => self.accept_file(target, input),
            ConversationState::AwaitingPaste {
                target,
                buffer,
                messages,
            } => self.accept_paste(target, buffer, messages, input),
            ConversationState::AwaitingZip { target } => self.accept_zip(target, input),
            ConversationState::AwaitingEntrySelection { target, candidates } => {
                Ok(self.select_entry(target, candidates, input))
            }
            ConversationState::AwaitingManifest { project, paths } => {
                self.accept_manifest(project, paths, input)
            }
        }
    }

    fn choose_method(&self, target: IngestTarget, input: IngestInput<'_>) -> Transition {
        let method = match input {
            IngestInput::Text(text) | IngestInput::Choice(text) => IngestMethod::parse(text),
            IngestInput::Document { .. } => None,
        };
        let (state, reply) = match method {
            Some(IngestMethod::File) => (
                ConversationState::AwaitingFile {
                    target: Some(target),
                },
                self.file_prompt(),
            ),
            Some(IngestMethod::Paste) => (
                ConversationState::AwaitingPaste {
                    target,
                    buffer: String::new(),
                    messages: 0,
                },
                OutgoingMessage::text(format!(
                    "📝 Paste the code. Long scripts can span several messages. Send {} when finished.",
                    self.terminator
                )),
            ),
            Some(IngestMethod::Zip) => (
                ConversationState::AwaitingZip { target },
                OutgoingMessage::text("🗜 Send the .zip archive."),
            ),
            None => {
                let reply = self.method_prompt(&target);
                (ConversationState::ChooseMethod { target }, reply)
            }
        };
        Transition::Stay { state, reply }
    }

    fn accept_file(&self, target: Option<IngestTarget>, input: IngestInput<'_>) -> Result<Transition> {
        let IngestInput::Document { file_name, bytes } = input else {
            return Ok(Transition::Stay {
                state: ConversationState::AwaitingFile { target },
                reply: self.file_prompt(),
            });
        };

        if !self.store.is_script_name(file_name) {
            return Ok(Transition::Stay {
                state: ConversationState::AwaitingFile { target },
                reply: OutgoingMessage::text(format!(
                    "❌ \"{file_name}\" is not a .{} file. Send the script again.",
                    self.ext()
                )),
            });
        }
        if bytes.is_empty() {
            return Err(BotvisorError::IngestionFailure(format!(
                "\"{file_name}\" is empty."
            )));
        }

        let target = match target {
            Some(target) => target,
            None => self.target(&self.name_from_file(file_name)?, false),
        };

        let stored_name = match target.paths.kind {
            LayoutKind::Consolidated => sanitize_file_name(file_name)
                .unwrap_or_else(|| format!("main.{}", self.ext())),
            LayoutKind::Legacy => file_name.to_string(),
        };
        let entry_point = self
            .store
            .write_script(&target.paths, &target.name, &stored_name, bytes)?;
        Ok(self.complete(target, entry_point))
    }

    fn accept_paste(
        &self,
        target: IngestTarget,
        mut buffer: String,
        messages: usize,
        input: IngestInput<'_>,
    ) -> Result<Transition> {
        let text = match input {
            IngestInput::Text(text) => text,
            _ => {
                return Ok(Transition::Stay {
                    reply: OutgoingMessage::text(format!(
                        "Paste the code as text, then send {}.",
                        self.terminator
                    )),
                    state: ConversationState::AwaitingPaste {
                        target,
                        buffer,
                        messages,
                    },
                });
            }
        };

        if text.trim() == self.terminator {
            if buffer.trim().is_empty() {
                return Err(BotvisorError::IngestionFailure(
                    "Nothing was pasted.".to_string(),
                ));
            }
            let file_name = format!("main.{}", self.ext());
            let entry_point =
                self.store
                    .write_script(&target.paths, &target.name, &file_name, buffer.as_bytes())?;
            info!(project = %target.name, messages, bytes = buffer.len(), "pasted script saved");
            return Ok(self.complete(target, entry_point));
        }

        buffer.push_str(text);
        buffer.push('\n');
        let messages = messages + 1;
        Ok(Transition::Stay {
            reply: OutgoingMessage::text(format!(
                "✅ Part {messages} received. Send more, or {} to finish.",
                self.terminator
            )),
            state: ConversationState::AwaitingPaste {
                target,
                buffer,
                messages,
            },
        })
    }

    fn accept_zip(&self, target: IngestTarget, input: IngestInput<'_>) -> Result<Transition> {
        let IngestInput::Document { file_name, bytes } = input else {
            return Ok(Transition::Stay {
                state: ConversationState::AwaitingZip { target },
                reply: OutgoingMessage::text("🗜 Send the .zip archive."),
            });
        };
        let is_zip = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if !is_zip {
            return Ok(Transition::Stay {
                state: ConversationState::AwaitingZip { target },
                reply: OutgoingMessage::text(format!(
                    "❌ \"{file_name}\" is not a .zip archive. Send the archive again."
                )),
            });
        }

        let scanned = self
            .store
            .extract_archive(&target.paths, bytes)
            .map_err(|e| BotvisorError::IngestionFailure(format!("Could not extract \"{file_name}\": {e:#}")))
            .and_then(|extracted| Ok((extracted, self.store.entry_candidates(&target.paths)?)));
        let (extracted, candidates) = match scanned {
            Ok(scanned) => scanned,
            Err(e) => {
                if !target.replace
                    && let Err(discard) = self.store.discard_dir(&target.paths)
                {
                    warn!(project = %target.name, "could not discard extracted files: {discard:#}");
                }
                return Err(e);
            }
        };
        info!(
            project = %target.name,
            extracted,
            candidates = candidates.len(),
            "archive extracted"
        );

        match candidates.as_slice() {
            [] => {
                if !target.replace {
                    self.store.discard_dir(&target.paths)?;
                }
                Err(BotvisorError::IngestionFailure(format!(
                    "No .{} files found in \"{file_name}\".",
                    self.ext()
                )))
            }
            [only] => {
                let entry_point = target.paths.dir.join(only);
                Ok(self.complete(target, entry_point))
            }
            _ => {
                let reply = entry_selection_prompt(&candidates);
                Ok(Transition::Stay {
                    state: ConversationState::AwaitingEntrySelection { target, candidates },
                    reply,
                })
            }
        }
    }

    fn select_entry(
        &self,
        target: IngestTarget,
        candidates: Vec<PathBuf>,
        input: IngestInput<'_>,
    ) -> Transition {
        let picked = match input {
            IngestInput::Choice(data) => Some(
                data.strip_prefix(ENTRY_CHOICE_PREFIX)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(data)),
            ),
            IngestInput::Text(text) => {
                let text = text.trim();
                match text.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= candidates.len() => Some(candidates[n - 1].clone()),
                    _ => Some(PathBuf::from(text)),
                }
            }
            IngestInput::Document { .. } => None,
        };

        let rejection = match &picked {
            None => "Pick the entry point from the list.".to_string(),
            Some(rel) if !self.store.is_candidate_path(rel) => format!(
                "❌ \"{}\" is not a .{} script inside the project.",
                rel.display(),
                self.ext()
            ),
            Some(rel) if !candidates.contains(rel) => {
                format!("❌ \"{}\" is not one of the candidates.", rel.display())
            }
            Some(rel) if !self.store.fs().is_file(&target.paths.dir.join(rel)) => {
                format!("❌ \"{}\" no longer exists.", rel.display())
            }
            Some(rel) => {
                let entry_point = target.paths.dir.join(rel);
                return self.complete(target, entry_point);
            }
        };

        let mut reply = entry_selection_prompt(&candidates);
        reply.text = format!("{rejection}\n{}", reply.text);
        Transition::Stay {
            state: ConversationState::AwaitingEntrySelection { target, candidates },
            reply,
        }
    }

    fn accept_manifest(
        &self,
        project: String,
        paths: crate::store::ProjectPaths,
        input: IngestInput<'_>,
    ) -> Result<Transition> {
        let contents: Vec<u8> = match input {
            IngestInput::Document { file_name, bytes } => {
                let is_txt = Path::new(file_name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
                if !is_txt {
                    return Ok(Transition::Stay {
                        reply: OutgoingMessage::text(format!(
                            "❌ \"{file_name}\" is not a .txt file."
                        )),
                        state: ConversationState::AwaitingManifest { project, paths },
                    });
                }
                bytes.to_vec()
            }
            IngestInput::Text(text) => {
                let mut text = text.trim_end().to_string();
                text.push('\n');
                text.into_bytes()
            }
            IngestInput::Choice(_) => {
                let reply = self.manifest_prompt(&project);
                return Ok(Transition::Stay {
                    state: ConversationState::AwaitingManifest { project, paths },
                    reply,
                });
            }
        };

        self.store.write_manifest(&paths, &contents)?;
        info!(project = %project, bytes = contents.len(), "dependency manifest saved");
        Ok(Transition::ManifestSaved {
            project,
            bytes: contents.len(),
        })
    }

    fn complete(&self, target: IngestTarget, entry_point: PathBuf) -> Transition {
        info!(project = %target.name, entry = ?entry_point, replace = target.replace, "ingestion complete");
        Transition::Completed(CompletedProject {
            name: target.name,
            paths: target.paths,
            entry_point,
            replace: target.replace,
        })
    }
}

fn entry_selection_prompt(candidates: &[PathBuf]) -> OutgoingMessage {
    let mut text = String::from("Several scripts found. Which one is the entry point?");
    for (i, rel) in candidates.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, rel.display()));
    }
    let choices = candidates
        .iter()
        .map(|rel| {
            let rel = rel.to_string_lossy();
            Choice::new(rel.clone(), format!("{ENTRY_CHOICE_PREFIX}{rel}"))
        })
        .collect();
    OutgoingMessage::text(text).with_choices(choices)
}
