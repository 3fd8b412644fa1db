//! Orchestration core of Oxide Manager.
//!
//! Coordinates the moving parts of Nexus-style mod management: resolving
//! nxm:// deep links into download locations, tracking competing versions of
//! the same logical mod, deciding which version is active per profile, and
//! driving enable/disable/remove workflows together with the deployment
//! engine and the underlying file operations — under partial failure
//! (network errors, missing files, user cancellation).
//!
//! Presentation, the persisted store's wire format, the metadata service
//! itself and the deployment engine's linking strategy live outside this
//! crate; each is reached through a narrow seam (`StateStore`, `Confirmer`,
//! `DeploymentEngine`, `EventSink`).

pub mod api;
pub mod categories;
pub mod dialog;
pub mod error;
pub mod events;
pub mod modinfo;
pub mod nxm;
pub mod orchestrator;
pub mod store;
pub mod version;

pub use api::{ApiContext, Client, DownloadUri, FileInfo};
pub use categories::{sync_categories, Category, CategorySyncOutcome, SyncMode};
pub use dialog::{Checkbox, ConfirmRequest, ConfirmResult, Confirmer};
pub use error::{CoreError, Result};
pub use events::{Event, EventSink};
pub use modinfo::{FileCategory, ModRecord, NewestFile};
pub use nxm::{normalize_game_id, NxmLink};
pub use orchestrator::{
    CheckScope, DeploymentEngine, DownloadOutcome, EnableOutcome, Orchestrator, RemovalOutcome,
    RemovalReport, UpdateCheckOutcome,
};
pub use store::{MemoryStore, ProfileModState, StateStore};
pub use version::{resolve_group, UpdateStatus, VersionGroup};
