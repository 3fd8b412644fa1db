//! User-confirmation seam.
//!
//! Destructive operations collect a set of named boolean choices plus a
//! committing action before mutating anything. Presentation of the dialog is
//! the embedding application's business; the core only sees the answer.

use async_trait::async_trait;

/// A named boolean choice offered alongside a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkbox {
    pub id: String,
    pub label: String,
    pub default: bool,
}

impl Checkbox {
    pub fn new(id: &str, label: &str, default: bool) -> Self {
        Checkbox {
            id: id.to_string(),
            label: label.to_string(),
            default,
        }
    }
}

/// A confirmation request: message, choices, and the available actions.
/// "Cancel" is always available in addition to the listed actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
    pub checkboxes: Vec<Checkbox>,
    pub actions: Vec<String>,
}

/// The user's answer: the chosen action and the checkbox values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmResult {
    pub action: String,
    pub choices: Vec<(String, bool)>,
}

impl ConfirmResult {
    /// Value of a named choice, defaulting to false when absent.
    pub fn choice(&self, id: &str) -> bool {
        self.choices
            .iter()
            .find(|(cid, _)| cid == id)
            .map(|(_, v)| *v)
            .unwrap_or(false)
    }
}

/// Collaborator that presents confirmations to the user.
///
/// Returns `None` when the user cancelled.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn ask(&self, request: ConfirmRequest) -> Option<ConfirmResult>;
}
