use std::{path::PathBuf, time::Duration};

use anyhow::Context;

use crate::reading::SyncPolicy;

#[derive(Debug)]
pub struct Config {
    pub api_base_url: String,
    pub api_key: String,
    pub cache_path: PathBuf,
    pub save_debounce: Duration,
}

const DEFAULT_CACHE_PATH: &str = "reading-progress.json";
const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 5_000;

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_base_url = lookup("READER_API_BASE_URL").unwrap_or_default();
        let api_key = lookup("READER_API_KEY").unwrap_or_default();
        let cache_path = lookup("READER_CACHE_PATH").unwrap_or(DEFAULT_CACHE_PATH.into());
        let save_debounce_ms = match lookup("READER_SAVE_DEBOUNCE_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid READER_SAVE_DEBOUNCE_MS: {}", raw))?,
            None => DEFAULT_SAVE_DEBOUNCE_MS,
        };
        Ok(Config {
            api_base_url,
            api_key,
            cache_path: PathBuf::from(cache_path),
            save_debounce: Duration::from_millis(save_debounce_ms),
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api_base_url.is_empty() {
            return Err("READER_API_BASE_URL is missing".into());
        }
        if self.save_debounce.is_zero() {
            return Err("READER_SAVE_DEBOUNCE_MS must be greater than zero".into());
        }
        Ok(())
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            save_debounce: self.save_debounce,
        }
    }
}
