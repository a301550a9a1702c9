use std::time::Duration;

use jobboard_client_core::config::{SOURCE_DEFAULT, env_non_empty};

pub const ENV_DATA_SOURCE: &str = "JOBBOARD_DATA_SOURCE";
pub const ENV_BREAKER_THRESHOLD: &str = "JOBBOARD_BREAKER_THRESHOLD";
pub const ENV_BREAKER_COOLDOWN_MS: &str = "JOBBOARD_BREAKER_COOLDOWN_MS";

pub const DEFAULT_BREAKER_THRESHOLD: u32 = 3;
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 30_000;

/// Where messaging reads come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceMode {
    /// Backend only; failures surface to the caller.
    Live,
    /// Built-in fixtures only; no network traffic.
    Fixture,
    /// Backend behind a circuit breaker, fixtures when it is unavailable.
    Auto,
}

impl DataSourceMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fixture => "fixture",
            Self::Auto => "auto",
        }
    }

    #[must_use]
    pub fn uses_network(self) -> bool {
        !matches!(self, Self::Fixture)
    }

    #[must_use]
    pub fn falls_back(self) -> bool {
        matches!(self, Self::Auto)
    }
}

#[must_use]
pub fn parse_data_source_mode(raw: &str) -> Option<DataSourceMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "live" | "backend" | "remote" => Some(DataSourceMode::Live),
        "fixture" | "fixtures" | "mock" | "offline" => Some(DataSourceMode::Fixture),
        "auto" | "live_then_fixture" | "live-then-fixture" => Some(DataSourceMode::Auto),
        _ => None,
    }
}

#[must_use]
pub fn resolve_data_source_mode() -> (DataSourceMode, String) {
    if let Some(raw) = env_non_empty(ENV_DATA_SOURCE) {
        if let Some(mode) = parse_data_source_mode(&raw) {
            return (mode, ENV_DATA_SOURCE.to_string());
        }
        return (
            DataSourceMode::Auto,
            format!(
                "{ENV_DATA_SOURCE}:invalid({raw})->{}",
                DataSourceMode::Auto.as_str()
            ),
        );
    }
    (DataSourceMode::Auto, SOURCE_DEFAULT.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingSettings {
    pub mode: DataSourceMode,
    pub mode_source: String,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self::with_mode(DataSourceMode::Auto)
    }
}

impl MessagingSettings {
    #[must_use]
    pub fn with_mode(mode: DataSourceMode) -> Self {
        Self {
            mode,
            mode_source: SOURCE_DEFAULT.to_string(),
            breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
            breaker_cooldown: Duration::from_millis(DEFAULT_BREAKER_COOLDOWN_MS),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        let (mode, mode_source) = resolve_data_source_mode();
        let breaker_threshold = env_non_empty(ENV_BREAKER_THRESHOLD)
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_BREAKER_THRESHOLD);
        let breaker_cooldown = env_non_empty(ENV_BREAKER_COOLDOWN_MS)
            .and_then(|raw| raw.parse::<u64>().ok())
            .map_or(
                Duration::from_millis(DEFAULT_BREAKER_COOLDOWN_MS),
                Duration::from_millis,
            );
        tracing::debug!(
            target: "jobboard.config",
            mode = mode.as_str(),
            source = %mode_source,
            breaker_threshold,
            breaker_cooldown_ms = u64::try_from(breaker_cooldown.as_millis()).unwrap_or(u64::MAX),
            "resolved messaging settings",
        );
        Self {
            mode,
            mode_source,
            breaker_threshold,
            breaker_cooldown,
        }
    }
}
