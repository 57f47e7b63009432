use std::env;
use std::fmt;

use crate::workflows::placement::CostPolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub costs: CostPolicy,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = CostPolicy::default();
        let costs = CostPolicy {
            minimum_wage: amount("ENGINE_MINIMUM_WAGE")?.unwrap_or(defaults.minimum_wage),
            special_needs_multiplier: multiplier("ENGINE_SPECIAL_NEEDS_MULTIPLIER")?
                .unwrap_or(defaults.special_needs_multiplier),
            sibling_multiplier: multiplier("ENGINE_SIBLING_MULTIPLIER")?
                .unwrap_or(defaults.sibling_multiplier),
            budget_ceiling: amount("ENGINE_BUDGET_CEILING")?.unwrap_or(defaults.budget_ceiling),
        };

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            costs,
        })
    }
}

fn amount<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidAmount { name }),
        Err(_) => Ok(None),
    }
}

fn multiplier(name: &'static str) -> Result<Option<f64>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|source| ConfigError::InvalidMultiplier { name, source }),
        Err(_) => Ok(None),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidAmount { name: &'static str },
    InvalidMultiplier {
        name: &'static str,
        source: std::num::ParseFloatError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAmount { name } => {
                write!(f, "{name} must be a whole number of currency units")
            }
            ConfigError::InvalidMultiplier { name, .. } => {
                write!(f, "{name} must be a decimal factor")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidAmount { .. } => None,
            ConfigError::InvalidMultiplier { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("ENGINE_MINIMUM_WAGE");
        env::remove_var("ENGINE_SPECIAL_NEEDS_MULTIPLIER");
        env::remove_var("ENGINE_SIBLING_MULTIPLIER");
        env::remove_var("ENGINE_BUDGET_CEILING");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.costs, CostPolicy::default());
    }

    #[test]
    fn load_reads_programme_rates() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_LOG_LEVEL", "debug");
        env::set_var("ENGINE_MINIMUM_WAGE", "1412");
        env::set_var("ENGINE_SPECIAL_NEEDS_MULTIPLIER", "0.6");
        env::set_var("ENGINE_SIBLING_MULTIPLIER", "0.25");
        env::set_var("ENGINE_BUDGET_CEILING", "750000");
        let config = AppConfig::load().expect("config loads");
        reset_env();
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.costs.minimum_wage, 1412);
        assert_eq!(config.costs.special_needs_multiplier, 0.6);
        assert_eq!(config.costs.sibling_multiplier, 0.25);
        assert_eq!(config.costs.budget_ceiling, 750_000);
    }

    #[test]
    fn rejects_a_malformed_wage() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ENGINE_MINIMUM_WAGE", "one wage");
        let result = AppConfig::load();
        reset_env();
        match result {
            Err(ConfigError::InvalidAmount { name }) => {
                assert_eq!(name, "ENGINE_MINIMUM_WAGE");
            }
            other => panic!("expected invalid amount, got {other:?}"),
        }
    }

    #[test]
    fn rejects_a_malformed_multiplier() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ENGINE_SIBLING_MULTIPLIER", "a third");
        let result = AppConfig::load();
        reset_env();
        match result {
            Err(ConfigError::InvalidMultiplier { name, .. }) => {
                assert_eq!(name, "ENGINE_SIBLING_MULTIPLIER");
            }
            other => panic!("expected invalid multiplier, got {other:?}"),
        }
    }
}
