// Match configuration management

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSettings {
    pub starting_cash: f64,
    pub price_history_size: usize,
    /// Half-width of the drift noise between events (fraction).
    pub drift_pct: f64,
    /// Half-width of the realism noise added on impact application.
    pub impact_noise_pct: f64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            starting_cash: 100_000.0,
            price_history_size: 120,
            drift_pct: 0.0005,      // +/-0.05%
            impact_noise_pct: 0.001, // +/-0.1%
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    pub countdown_secs: u64,
    pub trading_secs: u64,
    pub event_count: usize,
    /// How far ahead of display time event generation starts.
    pub prefetch_lead_secs: u64,
    /// Delay between an event's display and its price impact.
    pub reaction_delay_secs: u64,
    pub decision_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub drift_interval_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 30,
            trading_secs: 600,
            event_count: 5,
            prefetch_lead_secs: 45,
            reaction_delay_secs: 15,
            decision_timeout_secs: 30,
            generation_timeout_secs: 20,
            drift_interval_secs: 5,
        }
    }
}

impl TimingSettings {
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn trading(&self) -> Duration {
        Duration::from_secs(self.trading_secs)
    }

    pub fn match_end(&self) -> Duration {
        Duration::from_secs(self.countdown_secs + self.trading_secs)
    }

    pub fn prefetch_lead(&self) -> Duration {
        Duration::from_secs(self.prefetch_lead_secs)
    }

    pub fn reaction_delay(&self) -> Duration {
        Duration::from_secs(self.reaction_delay_secs)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_secs(self.drift_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitSettings {
    /// Max fraction of total portfolio value in a single ticker.
    pub max_position_pct: f64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_position_pct: 0.40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub log_prices: bool,
    pub log_decisions: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_prices: false,
            log_decisions: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchConfig {
    pub market: MarketSettings,
    pub timing: TimingSettings,
    pub limits: LimitSettings,
    pub logging: LoggingSettings,
}

impl MatchConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: MatchConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create a default one if missing.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            println!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market.starting_cash <= 0.0 {
            return Err(ConfigError::Validation(
                "starting_cash must be positive".to_string(),
            ));
        }
        if self.market.price_history_size == 0 {
            return Err(ConfigError::Validation(
                "price_history_size must be greater than 0".to_string(),
            ));
        }
        if self.market.drift_pct < 0.0 || self.market.impact_noise_pct < 0.0 {
            return Err(ConfigError::Validation(
                "noise parameters must be non-negative".to_string(),
            ));
        }
        if self.timing.event_count == 0 {
            return Err(ConfigError::Validation(
                "event_count must be greater than 0".to_string(),
            ));
        }
        if self.timing.trading_secs == 0 {
            return Err(ConfigError::Validation(
                "trading_secs must be greater than 0".to_string(),
            ));
        }
        if self.timing.drift_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "drift_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.limits.max_position_pct <= 0.0 || self.limits.max_position_pct > 1.0 {
            return Err(ConfigError::Validation(
                "max_position_pct must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
