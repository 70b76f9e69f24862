//! Configuration sources.
//!
//! Configuration is read from key/value sources. In production the source is
//! the process environment (optionally seeded from a `.env` file by the
//! binary); tests pass a plain map so that no process-wide state is touched.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// A source of string configuration values.
pub trait ConfigSource: Send + Sync {
    /// Returns the raw value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns the trimmed value for `key`, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Returns the value for `key` or a configuration error naming the key.
    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
    }

    /// Parses the value for `key`, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("{key} has an invalid value {raw:?}: {e}"))),
            None => Ok(default),
        }
    }

    /// Reads a boolean flag. Accepts `true`/`false`, `1`/`0`, `yes`/`no`.
    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(Error::Config(format!(
                "{key} must be a boolean, got {raw:?}"
            ))),
        }
    }

    /// Reads a comma-separated list, dropping blank entries.
    fn list(&self, key: &str) -> Vec<String> {
        self.optional(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reads a duration given in milliseconds.
    fn millis_or(&self, key: &str, default: Duration) -> Result<Duration> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parse_or::<u64>(key, default_ms).map(Duration::from_millis)
    }
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}
