//! Remote metadata client.
//!
//! Thin wrapper over the metadata service's REST API: file info, download
//! locations, category list. The client performs no retries; retry policy
//! belongs to callers. HTTP failures are translated into the typed taxonomy
//! here so nothing upstream has to look at status codes.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::categories::Category;
use crate::error::{CoreError, Result};
use crate::modinfo::NewestFile;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.nexusmods.com/v1";

const USER_AGENT: &str = concat!("OxideManager/", env!("CARGO_PKG_VERSION"));

/// Request context: credentials plus the active game.
///
/// Captured at request start and passed explicitly; changing the account key
/// or active game means building a new context, so requests already in
/// flight keep the values they started with.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub game_id: String,
    pub api_key: String,
}

impl ApiContext {
    pub fn new(game_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        ApiContext {
            game_id: game_id.into(),
            api_key: api_key.into(),
        }
    }
}

/// Canonical metadata for one file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub file_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub size_kb: u64,
    /// Newer-file hint: absent = no data, 0 = newer version exists but is
    /// not identified, anything else = a concrete file id.
    #[serde(default)]
    pub newer_file_id: Option<u64>,
}

impl FileInfo {
    /// The newer-file hint with the zero sentinel made explicit.
    pub fn newest_file(&self) -> NewestFile {
        NewestFile::from_raw(self.newer_file_id)
    }
}

/// One download location (mirror).
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadUri {
    #[serde(rename = "URI")]
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
}

/// Game metadata; only the category list is interesting here.
#[derive(Debug, Clone, Deserialize)]
struct GameInfo {
    #[serde(default)]
    categories: Vec<RemoteCategory>,
}

/// Category entry as the service reports it. `parent_category` is `false`
/// for top-level categories and a number otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCategory {
    pub category_id: u64,
    pub name: String,
    #[serde(default, deserialize_with = "de_parent_category")]
    pub parent_category: Option<u64>,
}

fn de_parent_category<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ParentCategory;

    impl serde::de::Visitor<'_> for ParentCategory {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("false or a parent category id")
        }

        fn visit_bool<E: serde::de::Error>(self, _: bool) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_u64<E: serde::de::Error>(self, id: u64) -> std::result::Result<Self::Value, E> {
            Ok(Some(id))
        }

        fn visit_i64<E: serde::de::Error>(self, id: i64) -> std::result::Result<Self::Value, E> {
            Ok(u64::try_from(id).ok())
        }

        fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(ParentCategory)
}

/// Translate an HTTP status into the typed taxonomy.
/// `None` means success; `what` names the resource for diagnostics.
pub fn error_for_status(status: u16, what: &str) -> Option<CoreError> {
    match status {
        200..=299 => None,
        401 | 403 => Some(CoreError::Auth),
        404 => Some(CoreError::NotFound(what.to_string())),
        429 => Some(CoreError::RateLimit),
        other => Some(CoreError::Network(format!(
            "unexpected HTTP status {other} for {what}"
        ))),
    }
}

/// Asynchronous client for the metadata service.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a client against the default endpoint. The transport timeout
    /// is caller policy, not hard-coded here.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    /// Create a client against an explicit endpoint (tests, mirrors).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Client {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch canonical metadata for one file.
    pub async fn get_file_info(
        &self,
        ctx: &ApiContext,
        mod_id: u64,
        file_id: u64,
        game_id: &str,
    ) -> Result<FileInfo> {
        let url = format!(
            "{}/games/{}/mods/{}/files/{}.json",
            self.base_url, game_id, mod_id, file_id
        );
        self.get_json(ctx, &url).await
    }

    /// Fetch download locations for one file.
    ///
    /// An empty list is a legitimate result meaning "not yet available";
    /// callers must distinguish it from an unreachable service.
    pub async fn get_download_uris(
        &self,
        ctx: &ApiContext,
        mod_id: u64,
        file_id: u64,
        game_id: &str,
        key: Option<&str>,
        expires: Option<u64>,
    ) -> Result<Vec<DownloadUri>> {
        let mut url = format!(
            "{}/games/{}/mods/{}/files/{}/download_link.json",
            self.base_url, game_id, mod_id, file_id
        );
        // Time-limited authorization from the deep link, forwarded unchanged.
        if let Some(key) = key {
            url.push_str(&format!("?key={key}"));
            if let Some(expires) = expires {
                url.push_str(&format!("&expires={expires}"));
            }
        }
        self.get_json(ctx, &url).await
    }

    /// Fetch the full category taxonomy for a game.
    pub async fn get_category_list(&self, ctx: &ApiContext, game_id: &str) -> Result<Vec<Category>> {
        let url = format!("{}/games/{}.json", self.base_url, game_id);
        let info: GameInfo = self.get_json(ctx, &url).await?;
        Ok(info
            .categories
            .into_iter()
            .map(|c| Category {
                id: c.category_id,
                name: c.name,
                parent_id: c.parent_category,
            })
            .collect())
    }

    async fn get_json<T: DeserializeOwned>(&self, ctx: &ApiContext, url: &str) -> Result<T> {
        tracing::debug!(url, "metadata request");
        let resp = self
            .http
            .get(url)
            .header("apikey", &ctx.api_key)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if let Some(err) = error_for_status(status, url) {
            tracing::warn!(url, status, error = %err, "metadata request failed");
            return Err(err);
        }

        resp.json::<T>()
            .await
            .map_err(|e| CoreError::Network(format!("invalid response from {url}: {e}")))
    }
}
