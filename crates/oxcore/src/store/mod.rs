//! Persisted-state seam.
//!
//! Mod records and per-profile enabled state are owned by the embedding
//! application's persisted store; the core reads and writes them only
//! through the narrow [`StateStore`] interface and never caches
//! authoritative copies beyond a single operation.
//!
//! Every mutating method is one atomic key-path update. The core never does
//! read-modify-write across a suspension point, so concurrent unrelated
//! mutations of the store cannot be lost.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::categories::Category;
use crate::modinfo::{ModRecord, NewestFile};

/// Per-profile enabled-state map: mod id -> enabled.
///
/// An absent entry reads as disabled. Entries are created when a mod becomes
/// known to a profile and dropped only when the record itself is removed.
pub type ProfileModState = BTreeMap<String, bool>;

/// Narrow interface to the persisted mod/profile state.
pub trait StateStore: Send + Sync {
    /// All mod records for a game, in insertion order of discovery.
    fn mods(&self, game_id: &str) -> Vec<ModRecord>;

    /// One record by id.
    fn mod_record(&self, game_id: &str, mod_id: &str) -> Option<ModRecord>;

    /// Insert or replace a record.
    fn upsert_mod(&self, game_id: &str, record: ModRecord);

    /// Remove a record and any per-profile state referring to it.
    fn remove_mod(&self, game_id: &str, mod_id: &str);

    /// Write the newest-file attribute of a record.
    fn set_newest_file(&self, game_id: &str, mod_id: &str, newest: NewestFile);

    /// Snapshot of a profile's enabled-state map.
    fn profile_state(&self, profile_id: &str) -> ProfileModState;

    /// Whether a mod is enabled in a profile (absent reads as disabled).
    fn is_enabled(&self, profile_id: &str, mod_id: &str) -> bool;

    /// Set a mod's enabled state in a profile.
    fn set_enabled(&self, profile_id: &str, mod_id: &str, enabled: bool);

    /// The category forest for a game.
    fn categories(&self, game_id: &str) -> Vec<Category>;

    /// Replace the category forest for a game wholesale.
    fn replace_categories(&self, game_id: &str, categories: Vec<Category>);
}

/// In-memory [`StateStore`], used by tests and as a reference implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    // Vec keeps insertion order, which version groups rely on.
    mods: BTreeMap<String, Vec<ModRecord>>,
    profiles: BTreeMap<String, ProfileModState>,
    categories: BTreeMap<String, Vec<Category>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn mods(&self, game_id: &str) -> Vec<ModRecord> {
        let inner = self.inner.lock().unwrap();
        inner.mods.get(game_id).cloned().unwrap_or_default()
    }

    fn mod_record(&self, game_id: &str, mod_id: &str) -> Option<ModRecord> {
        let inner = self.inner.lock().unwrap();
        inner
            .mods
            .get(game_id)
            .and_then(|mods| mods.iter().find(|m| m.id == mod_id))
            .cloned()
    }

    fn upsert_mod(&self, game_id: &str, record: ModRecord) {
        let mut inner = self.inner.lock().unwrap();
        let mods = inner.mods.entry(game_id.to_string()).or_default();
        match mods.iter_mut().find(|m| m.id == record.id) {
            Some(existing) => *existing = record,
            None => mods.push(record),
        }
    }

    fn remove_mod(&self, game_id: &str, mod_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mods) = inner.mods.get_mut(game_id) {
            mods.retain(|m| m.id != mod_id);
        }
        for state in inner.profiles.values_mut() {
            state.remove(mod_id);
        }
    }

    fn set_newest_file(&self, game_id: &str, mod_id: &str, newest: NewestFile) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(rec) = inner
            .mods
            .get_mut(game_id)
            .and_then(|mods| mods.iter_mut().find(|m| m.id == mod_id))
        {
            rec.newest_file = newest;
        }
    }

    fn profile_state(&self, profile_id: &str) -> ProfileModState {
        let inner = self.inner.lock().unwrap();
        inner.profiles.get(profile_id).cloned().unwrap_or_default()
    }

    fn is_enabled(&self, profile_id: &str, mod_id: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .profiles
            .get(profile_id)
            .and_then(|state| state.get(mod_id))
            .copied()
            .unwrap_or(false)
    }

    fn set_enabled(&self, profile_id: &str, mod_id: &str, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .profiles
            .entry(profile_id.to_string())
            .or_default()
            .insert(mod_id.to_string(), enabled);
    }

    fn categories(&self, game_id: &str) -> Vec<Category> {
        let inner = self.inner.lock().unwrap();
        inner.categories.get(game_id).cloned().unwrap_or_default()
    }

    fn replace_categories(&self, game_id: &str, categories: Vec<Category>) {
        let mut inner = self.inner.lock().unwrap();
        inner.categories.insert(game_id.to_string(), categories);
    }
}
