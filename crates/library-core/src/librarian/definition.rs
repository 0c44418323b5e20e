//! `LibrarianDefinition`: a named policy bundling topic scope, permissions,
//! thresholds, and (optionally) a dedicated text-generator connection spec.

use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

/// Add/delete/reorganize permissions a librarian holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub add: bool,
    pub delete: bool,
    pub reorganize: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self { add: true, delete: true, reorganize: true }
    }
}

/// Job-triggering thresholds for a topic this librarian owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Volume count at which a topic is considered complex enough to
    /// warrant a specialist.
    pub topic_complexity: u32,
    /// Volume count at which an Optimization job is escalated.
    pub escalate_at: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { topic_complexity: 50, escalate_at: 100 }
    }
}

/// Connection spec for a librarian's own text-generator process, if it has
/// one distinct from the default. The ACP wire protocol that would launch
/// `command`/`args` is an external collaborator (spec §1) — this crate
/// stores the spec but always dispatches generation through the injected
/// [`crate::provider::TextGenerationProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcpSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(rename = "agentId")]
    pub agent_id: String,
}

/// A named librarian: scope (topic globs), permissions, thresholds, and an
/// optional dedicated generator connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarianDefinition {
    pub name: String,
    pub description: String,
    pub purpose: String,
    pub topics: Vec<String>,
    pub permissions: Permissions,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub acp: Option<AcpSpec>,
}

impl LibrarianDefinition {
    /// The always-present, catch-all librarian.
    pub fn default_librarian() -> Self {
        Self {
            name: "default".to_string(),
            description: "Catch-all librarian handling any topic with no dedicated specialist".to_string(),
            purpose: "General-purpose extraction, summarization, and reorganization".to_string(),
            topics: vec!["*".to_string()],
            permissions: Permissions::default(),
            thresholds: Thresholds::default(),
            acp: None,
        }
    }

    /// Validate the `^[a-z][a-z0-9-]*$` name rule and non-empty topics.
    pub fn validate(&self) -> Result<(), LibraryError> {
        if !is_kebab_case(&self.name) {
            return Err(LibraryError::Validation(format!(
                "librarian name {:?} must match ^[a-z][a-z0-9-]*$",
                self.name
            )));
        }
        if self.topics.is_empty() {
            return Err(LibraryError::Validation(
                "librarian must declare at least one topic glob".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_kebab_case(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
