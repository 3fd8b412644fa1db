//! Deployment orchestration.
//!
//! Drives the workflows that combine profile state, the metadata service,
//! the deployment engine and destructive file operations:
//!
//! - enable/disable batches (state only; deployment is applied lazily by an
//!   explicit activation step so batches stay cheap)
//! - version switching within a version group
//! - removal batches (confirm, deactivate, reconcile deployment, clean up)
//! - update checks against the metadata service
//! - resolving nxm:// links into download locations
//!
//! Operations return explicit outcome values; user-facing notifications are
//! derived from those and from the events pushed into the [`EventSink`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::join_all;

use crate::api::{ApiContext, Client};
use crate::dialog::{Checkbox, ConfirmRequest, Confirmer};
use crate::error::{CoreError, Result};
use crate::events::{Event, EventSink};
use crate::modinfo::NewestFile;
use crate::nxm::{normalize_game_id, NxmLink};
use crate::store::StateStore;

/// External subsystem that materializes enabled mods into the game
/// directory. One reconciliation call per game context; the linking strategy
/// is its own business.
#[async_trait]
pub trait DeploymentEngine: Send + Sync {
    async fn deploy(&self, game_id: &str) -> Result<()>;
}

/// Result of an enable/disable batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnableOutcome {
    /// Mods whose state actually changed, in input order.
    pub changed: Vec<String>,
    /// Mods already in the requested state.
    pub unchanged: Vec<String>,
}

/// Result of a removal batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The user cancelled; nothing was mutated.
    Cancelled,
    Done(RemovalReport),
}

/// Aggregate report of a removal batch. Per-item failures are collected
/// here, one summary for the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemovalReport {
    /// Mods whose record was removed from persisted state.
    pub removed: Vec<String>,
    /// Mods whose directory could not be deleted, with the failure text.
    /// These keep their record.
    pub failed: Vec<(String, String)>,
    /// Archive removals requested from the download subsystem.
    pub archives_requested: Vec<String>,
}

/// Result of resolving a deep link into download locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Started { name: String, uris: Vec<String> },
    /// The service answered but has no locations yet. Distinct from any
    /// error: the caller may retry later.
    NotYetAvailable,
}

/// Which records an update check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckScope {
    /// Every record with a known external mod id.
    Full,
    /// Only records with no newer-file knowledge yet.
    Optimized,
}

/// Aggregate result of an update check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateCheckOutcome {
    pub checked: usize,
    pub updated: usize,
    /// Mod ids whose check failed. Logged individually, reported once.
    pub failed: Vec<String>,
}

/// Orchestrates mod state changes, deployment and cleanup.
pub struct Orchestrator {
    store: Arc<dyn StateStore>,
    engine: Arc<dyn DeploymentEngine>,
    confirmer: Arc<dyn Confirmer>,
    events: Arc<dyn EventSink>,
    client: Client,
    /// Directory containing mod installation directories.
    install_root: PathBuf,
    /// Game contexts with an update check in flight.
    checks_running: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        engine: Arc<dyn DeploymentEngine>,
        confirmer: Arc<dyn Confirmer>,
        events: Arc<dyn EventSink>,
        client: Client,
        install_root: PathBuf,
    ) -> Self {
        Orchestrator {
            store,
            engine,
            confirmer,
            events,
            client,
            install_root,
            checks_running: Mutex::new(HashSet::new()),
        }
    }

    /// Set the enabled state for a batch of mods.
    ///
    /// Pure state mutation, no deployment call: deployment is applied by a
    /// later explicit activation so several batches can share one. Mutations
    /// are applied in input order; the single `ModsChanged` event fires
    /// after all of them, whether or not anything changed.
    pub fn set_mods_enabled(
        &self,
        profile_id: &str,
        mod_ids: &[String],
        enable: bool,
    ) -> EnableOutcome {
        let mut outcome = EnableOutcome::default();
        for id in mod_ids {
            if self.store.is_enabled(profile_id, id) != enable {
                self.store.set_enabled(profile_id, id, enable);
                outcome.changed.push(id.clone());
            } else {
                outcome.unchanged.push(id.clone());
            }
        }

        tracing::info!(profile_id, enable, count = mod_ids.len(), "mods toggled");
        self.events.emit(Event::ModsChanged {
            profile_id: profile_id.to_string(),
            mod_ids: mod_ids.to_vec(),
            enabled: enable,
        });
        outcome
    }

    /// Switch which sibling of a version group is active: disable the old
    /// one, enable the new one. Identical ids are a complete no-op.
    pub fn select_version(&self, profile_id: &str, old_id: &str, new_id: &str) -> EnableOutcome {
        if old_id == new_id {
            return EnableOutcome::default();
        }

        let mut outcome = EnableOutcome::default();
        if self.store.is_enabled(profile_id, old_id) {
            self.store.set_enabled(profile_id, old_id, false);
            outcome.changed.push(old_id.to_string());
        }
        self.events.emit(Event::ModsChanged {
            profile_id: profile_id.to_string(),
            mod_ids: vec![old_id.to_string()],
            enabled: false,
        });

        if !self.store.is_enabled(profile_id, new_id) {
            self.store.set_enabled(profile_id, new_id, true);
            outcome.changed.push(new_id.to_string());
        }
        self.events.emit(Event::ModsChanged {
            profile_id: profile_id.to_string(),
            mod_ids: vec![new_id.to_string()],
            enabled: true,
        });

        tracing::info!(profile_id, old_id, new_id, "switched active version");
        outcome
    }

    /// Remove a batch of mods after confirmation.
    ///
    /// With "remove mod files" selected: deactivate all targets, reconcile
    /// through the deployment engine, and only then delete installation
    /// directories. A deployment failure fails the whole batch before any
    /// deletion. Directory deletions run per item; one failure is collected
    /// and reported but does not abort the siblings.
    pub async fn remove_mods(
        &self,
        profile_id: &str,
        game_id: &str,
        mod_ids: &[String],
    ) -> Result<RemovalOutcome> {
        let game_id = normalize_game_id(game_id);

        let request = ConfirmRequest {
            title: "Confirm deletion".to_string(),
            message: format!(
                "Do you really want to remove {} mod(s)?\n{}",
                mod_ids.len(),
                mod_ids.join("\n")
            ),
            checkboxes: vec![
                Checkbox::new("mod", "Remove Mod", true),
                Checkbox::new("archive", "Remove Archive", false),
                Checkbox::new("dependents", "Disable Dependent", false),
            ],
            actions: vec!["Remove".to_string()],
        };
        let Some(answer) = self.confirmer.ask(request).await else {
            tracing::info!(%game_id, "removal cancelled");
            return Ok(RemovalOutcome::Cancelled);
        };
        if answer.action != "Remove" {
            return Ok(RemovalOutcome::Cancelled);
        }

        let remove_files = answer.choice("mod");
        let remove_archive = answer.choice("archive");
        let disable_dependents = answer.choice("dependents");

        let mut report = RemovalReport::default();

        if remove_files {
            // Deactivate everything before touching the disk.
            for id in mod_ids {
                if self.store.is_enabled(profile_id, id) {
                    self.store.set_enabled(profile_id, id, false);
                }
            }

            // Reconcile on-disk state. Never delete mod directories while
            // the deployment engine reports an error.
            if let Err(e) = self.engine.deploy(&game_id).await {
                tracing::error!(%game_id, error = %e, "deployment failed, aborting removal batch");
                return Err(e);
            }

            let targets: Vec<(String, Option<PathBuf>)> = mod_ids
                .iter()
                .map(|id| {
                    let path = self
                        .store
                        .mod_record(&game_id, id)
                        .and_then(|r| r.installation_path);
                    (id.clone(), path)
                })
                .collect();

            let deletions = targets.into_iter().map(|(id, rel)| {
                let root = self.install_root.clone();
                async move {
                    let Some(rel) = rel else {
                        // Nothing on disk for this record.
                        return (id, Ok(()));
                    };
                    let full = root.join(rel);
                    match tokio::fs::remove_dir_all(&full).await {
                        Ok(()) => (id, Ok(())),
                        // Already gone is as good as deleted.
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (id, Ok(())),
                        Err(e) => (
                            id,
                            Err(CoreError::FileSystem {
                                path: full,
                                source: e,
                            }),
                        ),
                    }
                }
            });

            for (id, result) in join_all(deletions).await {
                if let Err(e) = result {
                    tracing::warn!(mod_id = %id, error = %e, "failed to delete mod directory");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        for id in mod_ids {
            let deletion_failed = report.failed.iter().any(|(f, _)| f == id);
            let record = self.store.mod_record(&game_id, id);

            if remove_archive && !deletion_failed {
                if let Some(archive_id) = record.as_ref().and_then(|r| r.archive_id.clone()) {
                    // Fire-and-forget: the download subsystem owns the rest.
                    self.events.emit(Event::RemoveDownload {
                        archive_id: archive_id.clone(),
                    });
                    report.archives_requested.push(archive_id);
                }
            }

            if remove_files && !deletion_failed {
                self.store.remove_mod(&game_id, id);
                report.removed.push(id.clone());
            }
        }

        if disable_dependents {
            self.events.emit(Event::DisableDependents {
                mod_ids: mod_ids.to_vec(),
            });
        }

        if report.failed.is_empty() {
            tracing::info!(%game_id, removed = report.removed.len(), "removal batch done");
        } else {
            let names: Vec<&str> = report.failed.iter().map(|(id, _)| id.as_str()).collect();
            tracing::warn!(%game_id, failed = ?names, "removal batch completed with failures");
        }

        Ok(RemovalOutcome::Done(report))
    }

    /// Check the metadata source for newer files across a game's mods.
    ///
    /// Update checks for the same game context are mutually exclusive: a
    /// second request while one is outstanding is rejected with
    /// [`CoreError::UpdateCheckRunning`]. Exactly one terminal
    /// `UpdateCheckComplete` event fires on completion, success or failure.
    pub async fn check_mods_version(
        &self,
        ctx: &ApiContext,
        game_id: &str,
        scope: CheckScope,
    ) -> Result<UpdateCheckOutcome> {
        let game_id = normalize_game_id(game_id);
        let _guard = CheckGuard::acquire(&self.checks_running, &game_id)?;

        tracing::info!(%game_id, ?scope, "update check started");
        let mut outcome = UpdateCheckOutcome::default();

        for rec in self.store.mods(&game_id) {
            let Some(mod_id) = rec.external_mod_id() else {
                continue;
            };
            let Some(file_id) = rec.file_id else {
                continue;
            };
            if scope == CheckScope::Optimized && rec.newest_file != NewestFile::Unknown {
                continue;
            }

            outcome.checked += 1;
            match self.client.get_file_info(ctx, mod_id, file_id, &game_id).await {
                Ok(info) => {
                    let newest = info.newest_file();
                    if newest != rec.newest_file {
                        self.store.set_newest_file(&game_id, &rec.id, newest);
                        outcome.updated += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(mod_id = %rec.id, error = %e, "update check failed for mod");
                    outcome.failed.push(rec.id.clone());
                }
            }
        }

        self.events.emit(Event::UpdateCheckComplete {
            game_id: game_id.clone(),
            checked: outcome.checked,
            failed: outcome.failed.len(),
        });
        tracing::info!(
            %game_id,
            checked = outcome.checked,
            updated = outcome.updated,
            failed = outcome.failed.len(),
            "update check complete"
        );

        Ok(outcome)
    }

    /// Resolve an nxm:// link into download locations.
    ///
    /// Emits exactly one of `DownloadStarted` / `DownloadFailed`, named with
    /// the file's identity. An empty location list is not an error.
    pub async fn start_download(&self, ctx: &ApiContext, raw_link: &str) -> Result<DownloadOutcome> {
        let link = NxmLink::parse(raw_link)?;
        let game_id = normalize_game_id(&link.game_id);

        let info = match self
            .client
            .get_file_info(ctx, link.mod_id, link.file_id, &game_id)
            .await
        {
            Ok(info) => info,
            Err(e) => return Err(self.download_failed(&link, e)),
        };

        let uris = match self
            .client
            .get_download_uris(
                ctx,
                link.mod_id,
                link.file_id,
                &game_id,
                link.key.as_deref(),
                link.expires,
            )
            .await
        {
            Ok(uris) => uris,
            Err(e) => return Err(self.download_failed(&link, e)),
        };

        if uris.is_empty() {
            tracing::info!(link = %link.lookup_key(), "no download locations yet");
            self.events.emit(Event::DownloadFailed {
                file_id: link.file_id,
                message: "no download locations (yet)".to_string(),
            });
            return Ok(DownloadOutcome::NotYetAvailable);
        }

        let uris: Vec<String> = uris.into_iter().map(|u| u.uri).collect();
        tracing::debug!(link = %link.lookup_key(), count = uris.len(), "got download locations");
        self.events.emit(Event::DownloadStarted {
            game_id,
            mod_id: link.mod_id,
            file_id: link.file_id,
            name: info.name.clone(),
            uris: uris.clone(),
        });

        Ok(DownloadOutcome::Started {
            name: info.name,
            uris,
        })
    }

    fn download_failed(&self, link: &NxmLink, e: CoreError) -> CoreError {
        tracing::warn!(link = %link.lookup_key(), error = %e, "download failed");
        self.events.emit(Event::DownloadFailed {
            file_id: link.file_id,
            message: e.to_string(),
        });
        e
    }
}

/// RAII holder of the per-game update-check flag.
struct CheckGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    game_id: String,
}

impl<'a> CheckGuard<'a> {
    fn acquire(running: &'a Mutex<HashSet<String>>, game_id: &str) -> Result<Self> {
        let mut set = running.lock().unwrap();
        if !set.insert(game_id.to_string()) {
            return Err(CoreError::UpdateCheckRunning(game_id.to_string()));
        }
        Ok(CheckGuard {
            running,
            game_id: game_id.to_string(),
        })
    }
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.running.lock().unwrap().remove(&self.game_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::ConfirmResult;
    use crate::modinfo::ModRecord;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const GAME: &str = "skyrimspecialedition";
    const PROFILE: &str = "default";

    struct StubEngine {
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubEngine {
        fn ok() -> Self {
            StubEngine {
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            StubEngine {
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DeploymentEngine for StubEngine {
        async fn deploy(&self, _game_id: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CoreError::Deployment("link step failed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Confirmer that answers without user interaction.
    struct Answering(Option<ConfirmResult>);

    impl Answering {
        fn cancel() -> Self {
            Answering(None)
        }

        fn remove(mod_files: bool, archive: bool, dependents: bool) -> Self {
            Answering(Some(ConfirmResult {
                action: "Remove".to_string(),
                choices: vec![
                    ("mod".to_string(), mod_files),
                    ("archive".to_string(), archive),
                    ("dependents".to_string(), dependents),
                ],
            }))
        }
    }

    #[async_trait]
    impl Confirmer for Answering {
        async fn ask(&self, _request: ConfirmRequest) -> Option<ConfirmResult> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Collecting(Mutex<Vec<Event>>);

    impl Collecting {
        fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }
    }

    impl EventSink for Collecting {
        fn emit(&self, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn unreachable_client() -> Client {
        // Nothing listens on port 1; requests fail fast.
        Client::with_base_url("http://127.0.0.1:1", Duration::from_millis(100)).unwrap()
    }

    /// Serve the given JSON bodies, one per connection, then exit.
    fn serve_json(responses: Vec<&'static str>) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for body in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = [0u8; 1024];
                let _ = std::io::Read::read(&mut stream, &mut buf);
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                std::io::Write::write_all(&mut stream, response.as_bytes()).unwrap();
            }
        });
        format!("http://{addr}")
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        engine: Arc<StubEngine>,
        events: Arc<Collecting>,
        orch: Orchestrator,
        _tmp: tempfile::TempDir,
    }

    fn fixture(engine: StubEngine, confirmer: Answering) -> Fixture {
        fixture_with_client(engine, confirmer, unreachable_client())
    }

    fn fixture_with_client(engine: StubEngine, confirmer: Answering, client: Client) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(engine);
        let events = Arc::new(Collecting::default());
        let orch = Orchestrator::new(
            store.clone(),
            engine.clone(),
            Arc::new(confirmer),
            events.clone(),
            client,
            tmp.path().to_path_buf(),
        );
        Fixture {
            store,
            engine,
            events,
            orch,
            _tmp: tmp,
        }
    }

    fn seed_mod(store: &MemoryStore, id: &str, install_dir: Option<&str>) {
        let mut rec = ModRecord::new(id, id);
        rec.nexus_mod_id = Some(7);
        rec.file_id = Some(1);
        rec.installation_path = install_dir.map(PathBuf::from);
        rec.archive_id = Some(format!("archive-{id}"));
        store.upsert_mod(GAME, rec);
    }

    #[test]
    fn test_enable_batch_fires_single_event() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        seed_mod(&f.store, "a", None);
        seed_mod(&f.store, "b", None);
        f.store.set_enabled(PROFILE, "a", true);

        let ids = vec!["a".to_string(), "b".to_string()];
        let outcome = f.orch.set_mods_enabled(PROFILE, &ids, true);

        assert_eq!(outcome.changed, vec!["b"]);
        assert_eq!(outcome.unchanged, vec!["a"]);
        assert!(f.store.is_enabled(PROFILE, "a"));
        assert!(f.store.is_enabled(PROFILE, "b"));

        // One event for the whole batch, fired after all mutations.
        let events = f.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            Event::ModsChanged {
                profile_id: PROFILE.to_string(),
                mod_ids: ids,
                enabled: true,
            }
        );
    }

    #[test]
    fn test_enable_noop_batch_still_notifies() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        seed_mod(&f.store, "a", None);
        f.store.set_enabled(PROFILE, "a", true);

        let outcome = f.orch.set_mods_enabled(PROFILE, &["a".to_string()], true);
        assert!(outcome.changed.is_empty());
        assert_eq!(f.events.events().len(), 1);
    }

    #[test]
    fn test_select_version_switches() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        seed_mod(&f.store, "old", None);
        seed_mod(&f.store, "new", None);
        f.store.set_enabled(PROFILE, "old", true);

        let outcome = f.orch.select_version(PROFILE, "old", "new");
        assert_eq!(outcome.changed, vec!["old", "new"]);
        assert!(!f.store.is_enabled(PROFILE, "old"));
        assert!(f.store.is_enabled(PROFILE, "new"));
        assert_eq!(f.events.events().len(), 2);
    }

    #[test]
    fn test_select_version_same_id_is_noop() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        seed_mod(&f.store, "a", None);
        f.store.set_enabled(PROFILE, "a", true);

        let outcome = f.orch.select_version(PROFILE, "a", "a");
        assert!(outcome.changed.is_empty());
        assert!(f.store.is_enabled(PROFILE, "a"));
        assert!(f.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_removal_cancelled_mutates_nothing() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        seed_mod(&f.store, "a", None);
        f.store.set_enabled(PROFILE, "a", true);

        let outcome = f
            .orch
            .remove_mods(PROFILE, GAME, &["a".to_string()])
            .await
            .unwrap();

        assert_eq!(outcome, RemovalOutcome::Cancelled);
        assert!(f.store.is_enabled(PROFILE, "a"));
        assert!(f.store.mod_record(GAME, "a").is_some());
        assert_eq!(f.engine.calls.load(Ordering::SeqCst), 0);
        assert!(f.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_removal_deploy_failure_deletes_nothing() {
        let f = fixture(StubEngine::failing(), Answering::remove(true, false, false));
        seed_mod(&f.store, "a", Some("mod-a"));
        seed_mod(&f.store, "b", Some("mod-b"));
        let dir_a = f._tmp.path().join("mod-a");
        let dir_b = f._tmp.path().join("mod-b");
        std::fs::create_dir(&dir_a).unwrap();
        std::fs::create_dir(&dir_b).unwrap();
        f.store.set_enabled(PROFILE, "a", true);

        let err = f
            .orch
            .remove_mods(PROFILE, GAME, &["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Deployment(_)));
        // Fail closed: no directory deleted, no record removed.
        assert!(dir_a.exists());
        assert!(dir_b.exists());
        assert!(f.store.mod_record(GAME, "a").is_some());
        assert!(f.store.mod_record(GAME, "b").is_some());
    }

    #[tokio::test]
    async fn test_removal_partial_failure() {
        let f = fixture(StubEngine::ok(), Answering::remove(true, true, false));
        seed_mod(&f.store, "a", Some("mod-a"));
        seed_mod(&f.store, "b", Some("mod-b"));
        seed_mod(&f.store, "c", Some("mod-c"));
        std::fs::create_dir(f._tmp.path().join("mod-a")).unwrap();
        // "b" points at a plain file: remove_dir_all fails on it.
        std::fs::write(f._tmp.path().join("mod-b"), "not a directory").unwrap();
        std::fs::create_dir(f._tmp.path().join("mod-c")).unwrap();
        for id in ["a", "b", "c"] {
            f.store.set_enabled(PROFILE, id, true);
        }

        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let RemovalOutcome::Done(report) =
            f.orch.remove_mods(PROFILE, GAME, &ids).await.unwrap()
        else {
            panic!("expected completed removal");
        };

        assert_eq!(report.removed, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");

        // Succeeding mods: record gone, directory gone.
        assert!(f.store.mod_record(GAME, "a").is_none());
        assert!(f.store.mod_record(GAME, "c").is_none());
        assert!(!f._tmp.path().join("mod-a").exists());
        // Failing mod keeps its record but was still deactivated.
        assert!(f.store.mod_record(GAME, "b").is_some());
        assert!(!f.store.is_enabled(PROFILE, "b"));

        // Archive removal requested only for the mods that were removed.
        let archive_events = f
            .events
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::RemoveDownload { .. }))
            .count();
        assert_eq!(archive_events, 2);
        assert_eq!(
            report.archives_requested,
            vec!["archive-a".to_string(), "archive-c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_removal_dependents_signal_forwarded() {
        let f = fixture(StubEngine::ok(), Answering::remove(false, false, true));
        seed_mod(&f.store, "a", None);

        let ids = vec!["a".to_string()];
        f.orch.remove_mods(PROFILE, GAME, &ids).await.unwrap();

        // No files removed, but the dependents signal still goes out.
        assert!(f.store.mod_record(GAME, "a").is_some());
        assert_eq!(
            f.events.events(),
            vec![Event::DisableDependents { mod_ids: ids }]
        );
        assert_eq!(f.engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_check_guard_mutual_exclusion() {
        let running = Mutex::new(HashSet::new());
        let first = CheckGuard::acquire(&running, GAME).unwrap();
        let second = CheckGuard::acquire(&running, GAME);
        assert!(matches!(second, Err(CoreError::UpdateCheckRunning(_))));

        // A different game context is not blocked.
        CheckGuard::acquire(&running, "fallout4").unwrap();

        drop(first);
        CheckGuard::acquire(&running, GAME).unwrap();
    }

    #[tokio::test]
    async fn test_update_check_terminal_event_and_reaccept() {
        let f = fixture(StubEngine::ok(), Answering::cancel());

        let outcome = f
            .orch
            .check_mods_version(&ApiContext::new(GAME, "key"), GAME, CheckScope::Full)
            .await
            .unwrap();
        assert_eq!(outcome.checked, 0);

        // Exactly one terminal notification.
        assert_eq!(
            f.events.events(),
            vec![Event::UpdateCheckComplete {
                game_id: GAME.to_string(),
                checked: 0,
                failed: 0,
            }]
        );

        // Once the first check completed, a second is accepted.
        f.orch
            .check_mods_version(&ApiContext::new(GAME, "key"), GAME, CheckScope::Full)
            .await
            .unwrap();
        assert_eq!(f.events.events().len(), 2);
    }

    #[tokio::test]
    async fn test_update_check_collects_per_item_failures() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        seed_mod(&f.store, "a", None);
        seed_mod(&f.store, "b", None);

        let outcome = f
            .orch
            .check_mods_version(&ApiContext::new(GAME, "key"), GAME, CheckScope::Full)
            .await
            .unwrap();

        // The service is unreachable: every item fails, the check still
        // completes with one terminal event.
        assert_eq!(outcome.checked, 2);
        assert_eq!(outcome.failed, vec!["a", "b"]);
        let terminal: Vec<Event> = f
            .events
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::UpdateCheckComplete { .. }))
            .collect();
        assert_eq!(terminal.len(), 1);
    }

    #[tokio::test]
    async fn test_update_check_optimized_skips_known() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        seed_mod(&f.store, "a", None);
        f.store.set_newest_file(GAME, "a", NewestFile::Known(9));

        let outcome = f
            .orch
            .check_mods_version(&ApiContext::new(GAME, "key"), GAME, CheckScope::Optimized)
            .await
            .unwrap();
        assert_eq!(outcome.checked, 0);
    }

    #[tokio::test]
    async fn test_start_download_malformed_link() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        let err = f
            .orch
            .start_download(&ApiContext::new(GAME, "key"), "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedLink(_)));
        // Parse failures surface synchronously, no events.
        assert!(f.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_start_download_empty_uris_not_yet_available() {
        // The service answers but has no mirrors yet: file info succeeds,
        // the location list comes back empty.
        let base = serve_json(vec![r#"{"file_id": 7, "name": "Some Mod"}"#, "[]"]);
        let client = Client::with_base_url(&base, Duration::from_secs(5)).unwrap();
        let f = fixture_with_client(StubEngine::ok(), Answering::cancel(), client);

        let outcome = f
            .orch
            .start_download(
                &ApiContext::new(GAME, "key"),
                "nxm://SkyrimSE/mods/42/files/7?key=abc&expires=99",
            )
            .await
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::NotYetAvailable);

        // Exactly one failure event, named with the file id, no start event.
        let events = f.events.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Event::DownloadFailed { file_id: 7, .. }
        ));
    }

    #[tokio::test]
    async fn test_start_download_failure_emits_one_event() {
        let f = fixture(StubEngine::ok(), Answering::cancel());
        let err = f
            .orch
            .start_download(
                &ApiContext::new(GAME, "key"),
                "nxm://SkyrimSE/mods/42/files/7?key=abc&expires=99",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));

        let events = f.events.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Event::DownloadFailed { file_id: 7, .. }
        ));
    }
}
