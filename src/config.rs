//! Runtime configuration, read from the environment.

use std::env;
use std::path::PathBuf;

use log::LevelFilter;

const DATABASE_VAR: &str = "SPLITLEDGER_DB";
const LOG_DIR_VAR: &str = "SPLITLEDGER_LOG_DIR";
const LOG_LEVEL_VAR: &str = "SPLITLEDGER_LOG_LEVEL";

const DEFAULT_DATABASE: &str = "splitledger.db";
const DEFAULT_LOG_DIR: &str = "log";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> Config {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Missing or empty values
    /// fall back to the defaults, as does an unknown log level.
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Config {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_path = get(DATABASE_VAR).unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let log_dir = get(LOG_DIR_VAR).unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
        let log_level = get(LOG_LEVEL_VAR)
            .and_then(|level| level.trim().parse().ok())
            .unwrap_or(LevelFilter::Info);

        Config {
            database_path: database_path.into(),
            log_dir: log_dir.into(),
            log_level,
        }
    }
}
