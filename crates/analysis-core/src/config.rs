use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
pub const DEFAULT_CACHE_DIR: &str = ".cache";
const DEFAULT_TIMEOUT_SECS: u64 = 12;

/// Session configuration, read once at start-up and passed down explicitly.
#[derive(Clone)]
pub struct Settings {
    /// `FMP_API_KEY`; `None` when unset or blank.
    pub api_key: Option<String>,
    /// `CACHE_DIR`; fundamentals are stored under `<cache_dir>/fundamentals`.
    pub cache_dir: PathBuf,
    /// `FMP_BASE_URL`
    pub base_url: String,
    /// `FMP_TIMEOUT_SECS`
    pub request_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let request_timeout = match non_blank("FMP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!("Ignoring invalid FMP_TIMEOUT_SECS={}, using {}s", raw, DEFAULT_TIMEOUT_SECS);
                    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Self {
            api_key: non_blank("FMP_API_KEY"),
            cache_dir: PathBuf::from(non_blank("CACHE_DIR").unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string())),
            base_url: non_blank("FMP_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn fundamentals_dir(&self) -> PathBuf {
        self.cache_dir.join("fundamentals")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("cache_dir", &self.cache_dir)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert!(settings.api_key.is_none());
        assert_eq!(settings.cache_dir, PathBuf::from(".cache"));
        assert_eq!(settings.fundamentals_dir(), PathBuf::from(".cache").join("fundamentals"));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.request_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let settings = Settings::from_lookup(lookup(&[("FMP_API_KEY", "   ")]));
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("FMP_API_KEY", "secret"),
            ("CACHE_DIR", "/tmp/buffett"),
            ("FMP_BASE_URL", "http://localhost:9999/"),
            ("FMP_TIMEOUT_SECS", "3"),
        ]));
        assert_eq!(settings.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/buffett"));
        assert_eq!(settings.base_url, "http://localhost:9999");
        assert_eq!(settings.request_timeout, Duration::from_secs(3));
        assert!(!format!("{:?}", settings).contains("secret"));
    }
}
