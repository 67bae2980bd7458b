use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-side folder name of a workspace, without any tenant prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceName(String);

impl WorkspaceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkspaceName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub name: WorkspaceName,
    pub label: String,
}

/// Generation of the active workspace context. Every effect is issued with the
/// tag current at the time; results carrying an older tag are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContextTag(pub u64);

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Known workspaces and the active selection.
///
/// This is the only writer of the active context: `select`, `clear_selection`
/// and removing the selected workspace advance the generation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkspaceRegistry {
    entries: Vec<WorkspaceEntry>,
    active: Option<WorkspaceName>,
    generation: u64,
    pending_delete: Option<WorkspaceName>,
}

impl WorkspaceRegistry {
    pub fn entries(&self) -> &[WorkspaceEntry] {
        &self.entries
    }

    pub fn active(&self) -> Option<&WorkspaceName> {
        self.active.as_ref()
    }

    pub fn tag(&self) -> ContextTag {
        ContextTag(self.generation)
    }

    pub fn is_current(&self, tag: ContextTag) -> bool {
        tag.0 == self.generation
    }

    pub fn pending_delete(&self) -> Option<&WorkspaceName> {
        self.pending_delete.as_ref()
    }

    pub fn set_entries(&mut self, entries: Vec<WorkspaceEntry>) {
        self.entries = entries;
    }

    pub fn contains(&self, name: &WorkspaceName) -> bool {
        self.entries.iter().any(|entry| &entry.name == name)
    }

    pub fn label_of(&self, name: &WorkspaceName) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| &entry.name == name)
            .map(|entry| entry.label.as_str())
    }

    /// Makes `name` the active workspace in a fresh context.
    pub fn select(&mut self, name: WorkspaceName) -> ContextTag {
        self.active = Some(name);
        self.advance()
    }

    /// Leaves no workspace selected, in a fresh context.
    pub fn clear_selection(&mut self) -> ContextTag {
        self.active = None;
        self.advance()
    }

    /// Records the workspace produced by a run of the current context without
    /// starting a new one, so that run's own follow-up results still apply.
    pub fn adopt(&mut self, name: WorkspaceName) {
        if !self.contains(&name) {
            let label = display_label(name.as_str());
            self.entries.insert(
                0,
                WorkspaceEntry {
                    name: name.clone(),
                    label,
                },
            );
        }
        self.active = Some(name);
    }

    pub fn request_delete(&mut self, name: WorkspaceName) {
        self.pending_delete = Some(name);
    }

    pub fn cancel_delete(&mut self) -> Option<WorkspaceName> {
        self.pending_delete.take()
    }

    pub fn confirm_delete(&mut self) -> Option<WorkspaceName> {
        self.pending_delete.take()
    }

    /// Removes a deleted workspace. Returns the new tag when it was the
    /// active one.
    pub fn remove(&mut self, name: &WorkspaceName) -> Option<ContextTag> {
        self.entries.retain(|entry| &entry.name != name);
        if self.active.as_ref() == Some(name) {
            Some(self.clear_selection())
        } else {
            None
        }
    }

    fn advance(&mut self) -> ContextTag {
        self.generation += 1;
        ContextTag(self.generation)
    }
}

/// `20240101120000_paper` is shown as `paper`.
pub fn display_label(name: &str) -> String {
    match name.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest.to_string(),
        _ => name.to_string(),
    }
}
