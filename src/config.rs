//! Server configuration.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from("www")
}

/// Runtime configuration: where to listen and which directory to serve.
///
/// Loaded from a YAML file (path in the `CONFIG` environment variable,
/// `config.yaml` by default), with the `LISTEN` and `SERVER_ROOT`
/// environment variables taking precedence over the file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: default_listen_addr(),
            root: default_root(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_yaml::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path, error = %e, "invalid config file, using defaults");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        };

        if let Ok(addr) = std::env::var("LISTEN") {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("SERVER_ROOT") {
            config.root = PathBuf::from(root);
        }
        config
    }
}
