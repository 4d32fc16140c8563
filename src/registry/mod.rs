// src/registry/mod.rs

//! Authoritative in-memory table of managed projects.
//!
//! The registry is an owned value passed to the components that need it;
//! there is no global state. Only the engine mutates it, one event at a time.

pub mod log_buffer;
pub mod project;

use std::collections::BTreeMap;

pub use log_buffer::{LogBuffer, LogEntry};
pub use project::{
    ExitWaiter, InstallTicket, ManagedProject, ProcessSlot, RunningProcess,
};

use crate::errors::{BotvisorError, Result};

#[derive(Debug, Default)]
pub struct Registry {
    projects: BTreeMap<String, ManagedProject>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ManagedProject> {
        self.projects.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ManagedProject> {
        self.projects.get_mut(name)
    }

    /// Like [`Registry::get_mut`], but unknown names are a `NotFound` error.
    pub fn require_mut(&mut self, name: &str) -> Result<&mut ManagedProject> {
        self.projects
            .get_mut(name)
            .ok_or_else(|| BotvisorError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    /// Insert or replace the entry for `project.name()`.
    pub fn insert(&mut self, project: ManagedProject) -> Option<ManagedProject> {
        self.projects.insert(project.name().to_string(), project)
    }

    pub fn remove(&mut self, name: &str) -> Option<ManagedProject> {
        self.projects.remove(name)
    }

    /// Project names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedProject> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
