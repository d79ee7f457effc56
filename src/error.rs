use crate::db::error::DbError;
use crate::models::types::NodeNumber;
use thiserror::Error;

pub type AppResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Password(#[from] password_hash::Error),

    #[error("login error: {0}")]
    LoginError(#[from] LoginError),
}

/// Failures of the byte stream underneath a session. These never cross the session
/// boundary on close; `send` callers get them back.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("write failed: {0}")]
    Write(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("node {0} is already occupied")]
    NodeOccupied(NodeNumber),

    #[error("all {0} nodes are in use")]
    Full(u16),
}

#[derive(Debug, Error)]
pub enum ConfigErrorKind {
    #[error("failed to read file: {0}")]
    Read(std::io::Error),

    #[error("failed to parse file: {0}")]
    Parse(toml::de::Error),

    #[error("failed to parse yaml: {0}")]
    ParseYaml(serde_yaml::Error),

    #[error("invalid environment variable {0}: {1}")]
    InvalidEnv(String, String),
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("invalid configuration in {}: {source}", .path.display())]
    Config {
        path: std::path::PathBuf,
        #[source]
        source: ConfigErrorKind,
    },

    #[error("invalid configuration: {0}")]
    Env(ConfigErrorKind),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("user not found")]
    UserNotFound,
    #[error("invalid password")]
    InvalidPassword,
    #[error("too many attempts")]
    TooManyAttempts,
    #[error("handle already taken")]
    HandleTaken,
}
