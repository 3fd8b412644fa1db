//! Outcome events.
//!
//! Orchestration operations return explicit outcome values; the mapping of
//! an outcome to user-facing notifications and cross-cutting collaborators
//! (download manager, dependency manager) happens through discrete, named
//! events pushed into an [`EventSink`]. Delivery is at-most-once per logical
//! outcome per operation.

/// A discrete, named outcome event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Enabled-state changed (or was confirmed) for a batch of mods.
    /// Fired exactly once per batch, after all individual updates.
    ModsChanged {
        profile_id: String,
        mod_ids: Vec<String>,
        enabled: bool,
    },
    /// A download was resolved and handed to the download subsystem.
    DownloadStarted {
        game_id: String,
        mod_id: u64,
        file_id: u64,
        name: String,
        uris: Vec<String>,
    },
    /// A download could not be started; named with the file's identity.
    DownloadFailed { file_id: u64, message: String },
    /// Terminal notification of an update check, success or failure.
    UpdateCheckComplete {
        game_id: String,
        checked: usize,
        failed: usize,
    },
    /// Fire-and-forget request to the download subsystem to drop an archive.
    RemoveDownload { archive_id: String },
    /// Forwarded signal to the dependency collaborator.
    DisableDependents { mod_ids: Vec<String> },
    /// The category forest for a game was replaced or merged.
    CategoriesUpdated { game_id: String, count: usize },
}

/// Consumer of outcome events (presentation layer, download manager, ...).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}
