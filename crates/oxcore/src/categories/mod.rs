//! Category taxonomy.
//!
//! Categories form a forest keyed by game id: each entry has an id, a name
//! and an optional parent. The local forest can be refreshed from the
//! metadata service in two modes: a full refresh replaces it wholesale
//! (discarding local customizations, hence the confirmation), an incremental
//! refresh merges and keeps local-only entries.

use serde::{Deserialize, Serialize};

use crate::api::{ApiContext, Client};
use crate::dialog::{ConfirmRequest, Confirmer};
use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::nxm::normalize_game_id;
use crate::store::StateStore;

/// A single category definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub parent_id: Option<u64>,
}

/// Child categories of a parent.
pub fn children(categories: &[Category], parent_id: u64) -> Vec<&Category> {
    categories
        .iter()
        .filter(|c| c.parent_id == Some(parent_id))
        .collect()
}

/// Top-level categories (no parent).
pub fn top_level(categories: &[Category]) -> Vec<&Category> {
    categories.iter().filter(|c| c.parent_id.is_none()).collect()
}

/// How to refresh the local forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Replace wholesale. Requires user confirmation.
    Full,
    /// Merge, preserving local-only entries. No confirmation.
    Incremental,
}

/// Result of a category sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySyncOutcome {
    /// The user declined the full refresh.
    Cancelled,
    Updated { count: usize },
}

/// Merge a fetched forest into the local one.
///
/// Remote entries win for shared ids; local-only entries are preserved in
/// their original relative order, after the remote ones.
pub fn merge_categories(local: Vec<Category>, remote: Vec<Category>) -> Vec<Category> {
    let mut merged = remote;
    for cat in local {
        if !merged.iter().any(|r| r.id == cat.id) {
            merged.push(cat);
        }
    }
    merged
}

/// Refresh the category forest for a game.
///
/// Either the fetched forest lands in the store (one atomic replace) or
/// nothing changes: a fetch failure aborts with no partial mutation.
pub async fn sync_categories(
    client: &Client,
    ctx: &ApiContext,
    store: &dyn StateStore,
    confirmer: &dyn Confirmer,
    events: &dyn EventSink,
    game_id: &str,
    mode: SyncMode,
) -> Result<CategorySyncOutcome> {
    let game_id = normalize_game_id(game_id);

    if mode == SyncMode::Full {
        let request = ConfirmRequest {
            title: "Retrieve Categories".to_string(),
            message: "Retrieving the full category list will discard your local changes."
                .to_string(),
            checkboxes: Vec::new(),
            actions: vec!["Retrieve".to_string()],
        };
        let confirmed = confirmer
            .ask(request)
            .await
            .map(|r| r.action == "Retrieve")
            .unwrap_or(false);
        if !confirmed {
            tracing::info!(%game_id, "category refresh cancelled");
            return Ok(CategorySyncOutcome::Cancelled);
        }
    }

    let fetched = client.get_category_list(ctx, &game_id).await?;

    let next = match mode {
        SyncMode::Full => fetched,
        SyncMode::Incremental => merge_categories(store.categories(&game_id), fetched),
    };
    let count = next.len();
    store.replace_categories(&game_id, next);

    tracing::info!(%game_id, count, ?mode, "categories updated");
    events.emit(Event::CategoriesUpdated {
        game_id: game_id.clone(),
        count,
    });

    Ok(CategorySyncOutcome::Updated { count })
}
