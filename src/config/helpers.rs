use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

/// Matches `tier` as a whole word, so `NODE_DEBUG=http,tier` enables debug
/// output but `NODE_DEBUG=tiering` does not.
static NODE_DEBUG_TIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btier\b").expect("static regex is valid"));

/// Read an env var, treating unset and empty as absent.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("failed to read: {e}"),
        }),
    }
}

/// Whether the debug env vars ask for verbose client output.
///
/// `TIER_DEBUG` must be exactly `"1"`; `NODE_DEBUG` is a comma or space
/// separated list that must name `tier` (any case).
pub(crate) fn debug_enabled(tier_debug: Option<&str>, node_debug: Option<&str>) -> bool {
    tier_debug == Some("1") || node_debug.is_some_and(|s| NODE_DEBUG_TIER.is_match(s))
}
