use chrono_tz::Tz;

use crate::extract::ExtractMode;
use crate::format::{DEFAULT_LIST_CAP, DEFAULT_TRUNCATE_CHARS, LocaleHint};
use crate::resolver::ResolveStrategy;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

/// Engine settings shared by every agent in a process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub timezone: Tz,
    pub locale: LocaleHint,
    pub mode: ExtractMode,
    pub strategy: ResolveStrategy,
    pub truncate_chars: usize,
    pub list_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            locale: LocaleHint::default(),
            mode: ExtractMode::default(),
            strategy: ResolveStrategy::default(),
            truncate_chars: DEFAULT_TRUNCATE_CHARS,
            list_cap: DEFAULT_LIST_CAP,
        }
    }
}

impl EngineConfig {
    /// Read `KOTOBA_*` variables. Unknown values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(raw) = get("KOTOBA_TIMEZONE") {
            match raw.parse::<Tz>() {
                Ok(tz) => config.timezone = tz,
                Err(_) => tracing::warn!(value = %raw, "ignoring unknown KOTOBA_TIMEZONE"),
            }
        }
        if let Some(raw) = get("KOTOBA_LOCALE") {
            match LocaleHint::parse(&raw) {
                Some(locale) => config.locale = locale,
                None => tracing::warn!(value = %raw, "ignoring unknown KOTOBA_LOCALE"),
            }
        }
        if let Some(raw) = get("KOTOBA_STRICT") {
            config.mode = match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => ExtractMode::Strict,
                _ => ExtractMode::Lenient,
            };
        }
        if let Some(raw) = get("KOTOBA_RESOLVE_STRATEGY") {
            match ResolveStrategy::parse(&raw) {
                Some(strategy) => config.strategy = strategy,
                None => tracing::warn!(value = %raw, "ignoring unknown KOTOBA_RESOLVE_STRATEGY"),
            }
        }
        if let Some(raw) = get("KOTOBA_TRUNCATE_CHARS") {
            match raw.parse::<usize>() {
                Ok(chars) if chars > 0 => config.truncate_chars = chars,
                _ => tracing::warn!(value = %raw, "ignoring invalid KOTOBA_TRUNCATE_CHARS"),
            }
        }
        if let Some(raw) = get("KOTOBA_LIST_CAP") {
            match raw.parse::<usize>() {
                Ok(cap) if cap > 0 => config.list_cap = cap,
                _ => tracing::warn!(value = %raw, "ignoring invalid KOTOBA_LIST_CAP"),
            }
        }
        config
    }
}
