//! Version resolution.
//!
//! Multiple installed records can be versions of the same logical mod (they
//! share an external mod id). This module computes, for a given subject
//! record, the derived version group: the sibling set, the active member for
//! a profile, and an update-status classification for the active member.
//!
//! Pure computation over provided inputs. Malformed or missing metadata
//! degrades to [`UpdateStatus::None`] rather than raising an error, since
//! metadata completeness is not guaranteed upstream.

use crate::modinfo::{ModRecord, NewestFile};
use crate::store::ProfileModState;

/// Update classification for the active version of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Nothing actionable.
    None,
    /// A newer file is known and differs from the installed one.
    UpdateAvailable,
    /// A newer version exists but the user has to pick the file themselves.
    ManualUpdateRequired,
    /// The installed version is bugged and an update is available.
    BuggyUpdateAvailable,
    /// The installed version is bugged and no fix is available; the mod
    /// should be disabled.
    Blocked,
}

/// One sibling within a version group, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub id: String,
    pub version: Option<String>,
}

/// The derived set of records sharing one external mod id.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionGroup {
    /// Members in insertion order of discovery. No implicit sort by version
    /// string: version strings are not guaranteed to be comparable.
    pub members: Vec<VersionEntry>,
    /// The active member: the enabled sibling, or the subject as fallback.
    /// Never undefined.
    pub active_id: String,
    pub status: UpdateStatus,
}

/// Resolve the version group containing `subject_id`.
pub fn resolve_group(
    all_mods: &[ModRecord],
    profile_state: &ProfileModState,
    subject_id: &str,
) -> VersionGroup {
    let subject = all_mods.iter().find(|m| m.id == subject_id);

    let siblings: Vec<&ModRecord> = match subject.and_then(|s| s.external_mod_id()) {
        Some(external_id) => all_mods
            .iter()
            .filter(|m| m.external_mod_id() == Some(external_id))
            .collect(),
        // Absent/zero external id: the group is the singleton subject.
        None => subject.into_iter().collect(),
    };

    let active_id = siblings
        .iter()
        .find(|m| profile_state.get(&m.id).copied().unwrap_or(false))
        .map(|m| m.id.clone())
        .unwrap_or_else(|| subject_id.to_string());

    let active = all_mods.iter().find(|m| m.id == active_id);
    let status = active.map(update_status).unwrap_or(UpdateStatus::None);

    VersionGroup {
        members: siblings
            .iter()
            .map(|m| VersionEntry {
                id: m.id.clone(),
                version: m.version.clone(),
            })
            .collect(),
        active_id,
        status,
    }
}

/// Classify the update status of one record.
///
/// Only evaluated for records that are neither the primary file nor
/// categorized as the main file; those always report `None`.
fn update_status(rec: &ModRecord) -> UpdateStatus {
    if rec.is_main_file() {
        return UpdateStatus::None;
    }

    match (rec.bug(), rec.newest_file) {
        // Bugged with no known fix: should be disabled.
        (Some(_), NewestFile::Unknown) => UpdateStatus::Blocked,
        // Bugged but a newer file is known (or at least known to exist).
        (Some(_), _) => UpdateStatus::BuggyUpdateAvailable,
        (None, NewestFile::Known(id)) => {
            if rec.file_id != Some(id) {
                UpdateStatus::UpdateAvailable
            } else {
                UpdateStatus::None
            }
        }
        (None, NewestFile::Unidentified) => {
            if rec.file_id.is_some() && rec.version.is_some() {
                UpdateStatus::ManualUpdateRequired
            } else {
                UpdateStatus::None
            }
        }
        (None, NewestFile::Unknown) => UpdateStatus::None,
    }
}
