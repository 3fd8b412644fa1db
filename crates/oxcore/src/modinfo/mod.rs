//! Mod record types and metadata.
//!
//! A [`ModRecord`] is one installed/downloaded mod as the persisted store
//! knows it. Metadata completeness is not guaranteed by the upstream source,
//! so most fields are optional and accessors default on missing data instead
//! of erroring. Anything the core does not interpret lives in the `extra`
//! side map.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the metadata source knows about a newer file for a record.
///
/// The remote side encodes this as an optional integer where literal zero
/// means "a newer version exists but cannot be identified automatically".
/// That overload is kept explicit here instead of collapsing it back into
/// an `Option<u64>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NewestFile {
    /// No data about newer files.
    #[default]
    Unknown,
    /// A concrete file id for the newest file.
    Known(u64),
    /// A newer version exists but the source could not identify the file.
    Unidentified,
}

impl NewestFile {
    /// Translate the wire encoding (`None` / `Some(0)` / `Some(n)`).
    pub fn from_raw(raw: Option<u64>) -> Self {
        match raw {
            None => NewestFile::Unknown,
            Some(0) => NewestFile::Unidentified,
            Some(n) => NewestFile::Known(n),
        }
    }
}

/// File category as reported by the metadata source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileCategory {
    Main,
    Update,
    Optional,
    OldVersion,
    Miscellaneous,
    Other(String),
}

impl FileCategory {
    /// Parse the enum-like wire string (case-insensitive).
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "MAIN" => FileCategory::Main,
            "UPDATE" => FileCategory::Update,
            "OPTIONAL" => FileCategory::Optional,
            "OLD_VERSION" => FileCategory::OldVersion,
            "MISCELLANEOUS" => FileCategory::Miscellaneous,
            _ => FileCategory::Other(raw.to_string()),
        }
    }
}

/// One installed/downloaded mod.
///
/// Created on successful install, mutated by user edits or version-check
/// results, destroyed (together with its directory) on explicit removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModRecord {
    /// Unique within a game context, stable once created.
    pub id: String,
    /// External mod id the metadata source uses to group versions.
    pub nexus_mod_id: Option<u64>,
    /// External file id of the installed file.
    pub file_id: Option<u64>,
    /// Version string according to the author. Not guaranteed to be semver.
    pub version: Option<String>,
    /// Newest-file knowledge from the last update check.
    pub newest_file: NewestFile,
    /// Bug message attached to this file version, if any.
    pub bug_message: Option<String>,
    /// File category as reported by the source.
    pub file_category: Option<FileCategory>,
    /// Whether the source marks this file as the primary download.
    pub is_primary: bool,
    /// Name as reported by the source.
    pub name: String,
    /// Logical file name, if the source provides one.
    pub logical_name: Option<String>,
    /// User-assigned display name override.
    pub custom_name: Option<String>,
    /// Relative path of the installed files, owned by the record until removal.
    pub installation_path: Option<PathBuf>,
    /// Source download archive, owned jointly with the download subsystem.
    pub archive_id: Option<String>,
    /// Attributes the core does not interpret.
    pub extra: BTreeMap<String, String>,
}

impl ModRecord {
    /// Create a minimal record; everything else defaults to "unknown".
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        ModRecord {
            id: id.into(),
            nexus_mod_id: None,
            file_id: None,
            version: None,
            newest_file: NewestFile::Unknown,
            bug_message: None,
            file_category: None,
            is_primary: false,
            name: name.into(),
            logical_name: None,
            custom_name: None,
            installation_path: None,
            archive_id: None,
            extra: BTreeMap::new(),
        }
    }

    /// Display name: custom override, then logical name, then source name.
    pub fn display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .or(self.logical_name.as_deref())
            .unwrap_or(&self.name)
    }

    /// External mod id, treating absent and zero the same way.
    pub fn external_mod_id(&self) -> Option<u64> {
        self.nexus_mod_id.filter(|&id| id != 0)
    }

    /// Bug message, if present and non-empty.
    pub fn bug(&self) -> Option<&str> {
        self.bug_message.as_deref().filter(|m| !m.is_empty())
    }

    /// Whether this is the main file of its mod (primary flag or MAIN category).
    pub fn is_main_file(&self) -> bool {
        self.is_primary || self.file_category == Some(FileCategory::Main)
    }
}
