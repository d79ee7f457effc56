use crate::error::{ConfigErrorKind, InfraError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tcp_addr: String,              // e.g. "0.0.0.0:2323"
    pub bbs_name: String,              // shown in the banner and prompts
    pub max_nodes: u16,                // number of simultaneous callers
    pub idle_timeout_secs: Option<u64>, // hang up idle callers, None = never
    pub data_dir: Option<PathBuf>,     // menus.yaml and prompt files live here
    pub start_menu: String,            // menu a caller lands in after logon
    pub default_user_password: String, // password given to copied user records
    pub new_user_level: u32,           // security level of fresh signups
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tcp_addr: "0.0.0.0:2323".to_string(),
            bbs_name: "termgate".to_string(),
            max_nodes: 32,
            idle_timeout_secs: Some(600),
            data_dir: None,
            start_menu: "main".to_string(),
            default_user_password: "changeme".to_string(),
            new_user_level: 20,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InfraError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| InfraError::Config {
            path: path.to_path_buf(),
            source: ConfigErrorKind::Read(e),
        })?;
        toml::from_str(&data).map_err(|e| InfraError::Config {
            path: path.to_path_buf(),
            source: ConfigErrorKind::Parse(e),
        })
    }

    pub fn from_env() -> Result<Self, InfraError> {
        let _ = dotenvy::from_filename(".env");
        let d = Self::default();

        Ok(Self {
            tcp_addr: std::env::var("TCP_ADDR").unwrap_or(d.tcp_addr),
            bbs_name: std::env::var("BBS_NAME").unwrap_or(d.bbs_name),
            max_nodes: env_parse("MAX_NODES")?.unwrap_or(d.max_nodes),
            idle_timeout_secs: match env_parse::<u64>("IDLE_TIMEOUT_SECS")? {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => d.idle_timeout_secs,
            },
            data_dir: std::env::var("DATA_DIR").ok().map(PathBuf::from).or(d.data_dir),
            start_menu: std::env::var("START_MENU").unwrap_or(d.start_menu),
            default_user_password: std::env::var("DEFAULT_USER_PASSWORD").unwrap_or(d.default_user_password),
            new_user_level: env_parse("NEW_USER_LEVEL")?.unwrap_or(d.new_user_level),
        })
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, InfraError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| InfraError::Env(ConfigErrorKind::InvalidEnv(key.to_string(), raw))),
        Err(_) => Ok(None),
    }
}
