//! NXM deep-link parsing.
//!
//! Browser "download with manager" buttons hand us an nxm:// URL; this module
//! turns it into structured identifiers. Parsing is pure and total: anything
//! that does not match the grammar is a [`CoreError::MalformedLink`], never a
//! panic.

use crate::error::{CoreError, Result};

/// Parsed nxm:// link.
///
/// Format: `nxm://game/mods/mod_id/files/file_id[?key=xxx&expires=yyy]`
///
/// `key` and `expires` authorize time-limited downloads and are carried
/// through unchanged when present. Other query parameters (e.g. `user_id`)
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NxmLink {
    pub game_id: String,
    pub mod_id: u64,
    pub file_id: u64,
    pub key: Option<String>,
    pub expires: Option<u64>,
}

impl NxmLink {
    /// Parse an nxm:// URL into its components.
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix("nxm://")
            .ok_or_else(|| malformed(raw, "missing nxm:// scheme"))?;

        // A URL with embedded whitespace or control characters was never a
        // valid URI to begin with.
        if rest.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(malformed(raw, "not a valid URI"));
        }

        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != 5 || parts[1] != "mods" || parts[3] != "files" {
            return Err(malformed(raw, "expected <game>/mods/<modId>/files/<fileId>"));
        }

        let game_id = parts[0].to_string();
        if game_id.is_empty() {
            return Err(malformed(raw, "empty game id"));
        }

        let mod_id = parse_positive(parts[2]).ok_or_else(|| malformed(raw, "invalid mod id"))?;
        let file_id = parse_positive(parts[4]).ok_or_else(|| malformed(raw, "invalid file id"))?;

        let mut key = None;
        let mut expires = None;
        if let Some(query) = query {
            for pair in query.split('&') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                if !valid_query_value(value) {
                    return Err(malformed(raw, "not a valid URI"));
                }
                match name {
                    "key" => key = Some(value.to_string()),
                    "expires" => {
                        expires = Some(
                            value
                                .parse::<u64>()
                                .map_err(|_| malformed(raw, "invalid expires"))?,
                        );
                    }
                    _ => {}
                }
            }
        }

        Ok(NxmLink {
            game_id,
            mod_id,
            file_id,
            key,
            expires,
        })
    }

    /// Create a unique lookup key for this link.
    pub fn lookup_key(&self) -> String {
        format!("{}:{}:{}", self.game_id, self.mod_id, self.file_id)
    }
}

fn malformed(raw: &str, why: &str) -> CoreError {
    CoreError::MalformedLink(format!("{why}: {raw}"))
}

/// Parse a strictly positive integer (ids are 1-based on the remote side).
fn parse_positive(s: &str) -> Option<u64> {
    match s.parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}

/// Reject query values with broken percent escapes.
fn valid_query_value(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Map a game id to the canonical domain the metadata service expects.
///
/// Game ids are case-insensitive; some games are known under an alias that
/// differs from their canonical domain. Idempotent: a canonical id passes
/// through unchanged. Every component that forwards a game id to the
/// metadata client goes through this.
pub fn normalize_game_id(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    for (alias, canonical) in GAME_ALIASES {
        if lower == *alias {
            return (*canonical).to_string();
        }
    }
    lower
}

/// Static alias table: alias (lowercase) -> canonical domain.
const GAME_ALIASES: &[(&str, &str)] = &[("skyrimse", "skyrimspecialedition")];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_link() {
        let url = "nxm://SkyrimSE/mods/42/files/7?key=abc&expires=99";
        let link = NxmLink::parse(url).unwrap();
        assert_eq!(link.game_id, "SkyrimSE");
        assert_eq!(link.mod_id, 42);
        assert_eq!(link.file_id, 7);
        assert_eq!(link.key.as_deref(), Some("abc"));
        assert_eq!(link.expires, Some(99));
    }

    #[test]
    fn test_parse_without_query() {
        let link = NxmLink::parse("nxm://fallout4/mods/1/files/2").unwrap();
        assert_eq!(link.game_id, "fallout4");
        assert_eq!(link.mod_id, 1);
        assert_eq!(link.file_id, 2);
        assert_eq!(link.key, None);
        assert_eq!(link.expires, None);
    }

    #[test]
    fn test_parse_ignores_unknown_params() {
        let url = "nxm://skyrimspecialedition/mods/12345/files/67890?key=abc123&expires=9999999999&user_id=42";
        let link = NxmLink::parse(url).unwrap();
        assert_eq!(link.key.as_deref(), Some("abc123"));
        assert_eq!(link.expires, Some(9999999999));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(NxmLink::parse("https://example.com").is_err());
        assert!(NxmLink::parse("nxm://game/invalid").is_err());
        assert!(NxmLink::parse("nxm:///mods/1/files/2").is_err()); // empty game
        assert!(NxmLink::parse("nxm://game/mods/0/files/2").is_err()); // zero id
        assert!(NxmLink::parse("nxm://game/mods/-1/files/2").is_err());
        assert!(NxmLink::parse("nxm://game/mods/x/files/2").is_err());
        assert!(NxmLink::parse("nxm://game/mods/1/files/2/extra").is_err());
        assert!(NxmLink::parse("nxm://game/mods/1/files/2?expires=soon").is_err());
        assert!(NxmLink::parse("nxm://ga me/mods/1/files/2").is_err()); // whitespace
        assert!(NxmLink::parse("nxm://game/mods/1/files/2?key=%zz").is_err()); // bad escape
    }

    #[test]
    fn test_malformed_is_typed() {
        let err = NxmLink::parse("nope").unwrap_err();
        assert!(matches!(err, CoreError::MalformedLink(_)));
    }

    #[test]
    fn test_lookup_key() {
        let link = NxmLink::parse("nxm://skyrimspecialedition/mods/12345/files/67890").unwrap();
        assert_eq!(link.lookup_key(), "skyrimspecialedition:12345:67890");
    }

    #[test]
    fn test_normalize_alias() {
        assert_eq!(normalize_game_id("SkyrimSE"), "skyrimspecialedition");
        assert_eq!(normalize_game_id("skyrimse"), "skyrimspecialedition");
    }

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize_game_id("SkyrimSE");
        assert_eq!(normalize_game_id(&once), once);
        assert_eq!(normalize_game_id("fallout4"), "fallout4");
    }
}
