//! Tick loop configuration.

use anyhow::{Context as _, Result, ensure};

/// Environment variable overriding [`TickConfig::tick_rate`].
pub const TICK_RATE_ENV: &str = "ENGINE_TICK_RATE";

/// Environment variable overriding [`TickConfig::max_ticks`].
pub const MAX_TICKS_ENV: &str = "ENGINE_MAX_TICKS";

/// Configuration for the fixed-timestep tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Defaults overridden by `ENGINE_TICK_RATE` and `ENGINE_MAX_TICKS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but does not parse, or if the
    /// resulting tick rate is not a positive finite number.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(TICK_RATE_ENV) {
            config.tick_rate = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {TICK_RATE_ENV}: {raw:?}"))?;
        }
        if let Some(raw) = lookup(MAX_TICKS_ENV) {
            config.max_ticks = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {MAX_TICKS_ENV}: {raw:?}"))?;
        }

        ensure!(
            config.tick_rate.is_finite() && config.tick_rate > 0.0,
            "tick rate must be positive, got {}",
            config.tick_rate
        );
        Ok(config)
    }

    /// Seconds per tick.
    #[must_use]
    pub fn tick_seconds(&self) -> f64 {
        1.0 / self.tick_rate
    }
}
