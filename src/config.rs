use std::{env, path::PathBuf};

use tracing::{debug, info};

use crate::store::RecordStore;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_ORIGIN: &str = "Namal";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Graph node every opportunity distance is measured from.
    pub origin: String,
}

impl Config {
    /// Flags win over the environment, the environment over defaults.
    pub fn load(data_dir: Option<PathBuf>, origin: Option<String>) -> Self {
        Self {
            data_dir: data_dir
                .unwrap_or_else(|| PathBuf::from(var_or("PLACEMENT_DATA_DIR", DEFAULT_DATA_DIR))),
            origin: origin.unwrap_or_else(|| var_or("PLACEMENT_ORIGIN", DEFAULT_ORIGIN)),
        }
    }

    pub fn store(&self) -> RecordStore {
        RecordStore::new(&self.data_dir)
    }
}

fn var_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            debug!("{key} read from environment");
            value.trim().to_string()
        }
        _ => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_values_win() {
        let config = Config::load(Some(PathBuf::from("/tmp/placement")), Some("Campus".to_string()));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/placement"));
        assert_eq!(config.origin, "Campus");
        assert_eq!(config.store().dir(), PathBuf::from("/tmp/placement").as_path());
    }
}
