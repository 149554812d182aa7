//! Errors raised before a job ever runs: configuration loading and job construction.

use std::path::PathBuf;

use thiserror::Error;

/// Repository configuration or environment could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("{0} must be set")]
    MissingEnv(&'static str),
}

/// A job could not be constructed. Nothing was scheduled.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Version(#[from] relkit_schema::VersionError),

    #[error("unknown architecture: {0}")]
    Arch(String),

    #[error("no repository definition named '{0}'")]
    UnknownDistro(String),

    #[error("repository '{distro}' is not built for {arch}")]
    UnsupportedArch { distro: String, arch: String },

    #[error("cannot determine the workspace directory: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("cannot open bucket {bucket}: {message}")]
    Store { bucket: String, message: String },
}
