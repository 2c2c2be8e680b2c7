//! Environment-backed runtime configuration.

use std::env;

use thiserror::Error;
use view_core::{DEFAULT_PAGE_LIMIT, SEARCH_DEBOUNCE_MS, SEARCH_MIN_TERM_LEN};

const DEFAULT_FETCH_RETRY_LIMIT: u32 = 3;

/// Tunables used by [`crate::ViewRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Local user ID; drives own-message detection and read receipts.
    pub local_user_id: String,
    /// History page size.
    pub page_limit: u16,
    /// Live-search quiescence window in milliseconds.
    pub search_debounce_ms: u64,
    /// Minimum trimmed search term length.
    pub search_min_len: usize,
    /// Retry budget for transient initial-page fetch failures.
    pub fetch_retry_limit: u32,
}

impl RuntimeConfig {
    /// Defaults for `local_user_id`.
    pub fn new(local_user_id: impl Into<String>) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            page_limit: DEFAULT_PAGE_LIMIT,
            search_debounce_ms: SEARCH_DEBOUNCE_MS,
            search_min_len: SEARCH_MIN_TERM_LEN,
            fetch_retry_limit: DEFAULT_FETCH_RETRY_LIMIT,
        }
    }

    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let local_user_id = lookup("QUILLCHAT_LOCAL_USER")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingValue {
                key: "QUILLCHAT_LOCAL_USER",
            })?;

        let page_limit =
            parse_with_default("QUILLCHAT_PAGE_LIMIT", DEFAULT_PAGE_LIMIT, &mut lookup)?;
        let search_debounce_ms = parse_with_default(
            "QUILLCHAT_SEARCH_DEBOUNCE_MS",
            SEARCH_DEBOUNCE_MS,
            &mut lookup,
        )?;
        let search_min_len =
            parse_with_default("QUILLCHAT_SEARCH_MIN_LEN", SEARCH_MIN_TERM_LEN, &mut lookup)?;
        let fetch_retry_limit = parse_with_default(
            "QUILLCHAT_FETCH_RETRY_LIMIT",
            DEFAULT_FETCH_RETRY_LIMIT,
            &mut lookup,
        )?;

        if page_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "QUILLCHAT_PAGE_LIMIT",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if search_debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "QUILLCHAT_SEARCH_DEBOUNCE_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            local_user_id,
            page_limit,
            search_debounce_ms,
            search_min_len,
            fetch_retry_limit,
        })
    }
}

/// Configuration parse/validation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or blank.
    #[error("missing required environment variable {key}")]
    MissingValue {
        /// Variable name.
        key: &'static str,
    },
    /// A variable holds an unusable value.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Offending raw value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

fn parse_with_default<T, F>(
    key: &'static str,
    default: T,
    lookup: &mut F,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: FnMut(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).map(|value| value.trim().to_owned()).filter(|v| !v.is_empty())
    else {
        return Ok(default);
    };
    raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw,
        reason: "expected a non-negative number".to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl FnMut(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn applies_defaults_when_only_user_is_set() {
        let config =
            RuntimeConfig::from_lookup(lookup_from(&[("QUILLCHAT_LOCAL_USER", "user-a")]))
                .expect("config should parse");
        assert_eq!(config.local_user_id, "user-a");
        assert_eq!(config.page_limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(config.search_debounce_ms, SEARCH_DEBOUNCE_MS);
    }

    #[test]
    fn requires_a_local_user() {
        let err = RuntimeConfig::from_lookup(lookup_from(&[("QUILLCHAT_LOCAL_USER", "  ")]))
            .expect_err("blank user must be rejected");
        assert_eq!(
            err,
            ConfigError::MissingValue {
                key: "QUILLCHAT_LOCAL_USER"
            }
        );
    }

    #[test]
    fn rejects_zero_page_limit() {
        let err = RuntimeConfig::from_lookup(lookup_from(&[
            ("QUILLCHAT_LOCAL_USER", "user-a"),
            ("QUILLCHAT_PAGE_LIMIT", "0"),
        ]))
        .expect_err("zero page limit must be rejected");
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "QUILLCHAT_PAGE_LIMIT"));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = RuntimeConfig::from_lookup(lookup_from(&[
            ("QUILLCHAT_LOCAL_USER", "user-a"),
            ("QUILLCHAT_SEARCH_DEBOUNCE_MS", "soon"),
        ]))
        .expect_err("garbage must be rejected");
        assert!(
            matches!(err, ConfigError::InvalidValue { value, .. } if value == "soon")
        );
    }

    #[test]
    fn overrides_win_over_defaults() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("QUILLCHAT_LOCAL_USER", "user-a"),
            ("QUILLCHAT_PAGE_LIMIT", "25"),
            ("QUILLCHAT_SEARCH_DEBOUNCE_MS", "150"),
            ("QUILLCHAT_FETCH_RETRY_LIMIT", "1"),
        ]))
        .expect("config should parse");
        assert_eq!(config.page_limit, 25);
        assert_eq!(config.search_debounce_ms, 150);
        assert_eq!(config.fetch_retry_limit, 1);
    }
}
