//! Jobs configuration

use serde::Deserialize;

/// Configuration for one automation run
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Database URL
    pub database_url: String,
    /// Organisation the run targets
    pub org_id: String,
    /// Organisation locale for calendar windows
    pub timezone: String,
    /// Also run the annual materializer cycle
    pub run_annual: bool,
    /// Log level
    pub log_level: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/atelier".to_string(),
            org_id: String::new(),
            timezone: "UTC".to_string(),
            run_annual: false,
            log_level: "info".to_string(),
        }
    }
}

impl JobsConfig {
    /// Loads configuration from `JOBS_`-prefixed environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("JOBS"))
            .build()?
            .try_deserialize()
    }
}
