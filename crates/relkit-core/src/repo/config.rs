//! Repository layout configuration, loaded from `relkit.toml`.
//!
//! ```toml
//! [indexer]
//! program = "createrepo"
//!
//! [signing]
//! method = "gpg"
//!
//! [[repos]]
//! name = "rhel8"
//! bucket = "downloads"
//! repos = ["yum/redhat/8/{profile}/{series}"]
//! architectures = ["x86_64", "aarch64"]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use relkit_schema::{Arch, ReleaseVersion};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::index_page::IndexPageBuilder;
use crate::signing::{CommandSigner, Ed25519Signer, GPG_ARGS, Signer};
use crate::tools::{ToolCommand, ToolRunner, indexer_command};

/// Static description of every repository relkit builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Overrides the workspace root used for local repository trees.
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub repos: Vec<RepositoryDefinition>,
}

impl RepositoryConfig {
    /// Load and validate a config file.
    ///
    /// A relative index template path is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let (Some(index), Some(dir)) = (&config.templates.index, path.parent()) {
            if index.is_relative() {
                config.templates.index = Some(dir.join(index));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repos.is_empty() {
            return Err(ConfigError::Invalid("no repositories defined".into()));
        }

        let mut names = HashSet::new();
        for repo in &self.repos {
            if repo.name.trim().is_empty() {
                return Err(ConfigError::Invalid("repository with an empty name".into()));
            }
            if !names.insert(repo.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "repository '{}' defined twice",
                    repo.name
                )));
            }
            if repo.bucket.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "repository '{}' has no bucket",
                    repo.name
                )));
            }
            if repo.repos.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "repository '{}' has no repo paths",
                    repo.name
                )));
            }
            if repo.architectures.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "repository '{}' lists no architectures",
                    repo.name
                )));
            }
        }

        if self.indexer.program.trim().is_empty() {
            return Err(ConfigError::Invalid("indexer program is empty".into()));
        }
        Ok(())
    }

    /// Repository definition named `name`.
    pub fn find(&self, name: &str) -> Option<&RepositoryDefinition> {
        self.repos.iter().find(|r| r.name == name)
    }

    /// Index page builder for the configured template.
    pub fn index_pages(&self) -> anyhow::Result<IndexPageBuilder> {
        match &self.templates.index {
            Some(path) => IndexPageBuilder::from_file(path),
            None => Ok(IndexPageBuilder::new()),
        }
    }
}

/// External metadata indexer (`createrepo` or compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub program: String,
    /// Pass `-d` to build the sqlite database alongside the XML metadata.
    pub database: bool,
    /// Checksum algorithm passed with `-s`.
    pub checksum: String,
    pub extra_args: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            program: "createrepo".to_string(),
            database: true,
            checksum: "sha".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl IndexerConfig {
    /// Arguments placed before the working directory.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.database {
            args.push("-d".to_string());
        }
        if !self.checksum.is_empty() {
            args.push("-s".to_string());
            args.push(self.checksum.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Invocation that rebuilds metadata for `dir`.
    pub fn command(&self, dir: &Path) -> ToolCommand {
        indexer_command(&self.program, &self.args(), dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMethod {
    /// External program, `gpg` by default.
    #[default]
    Gpg,
    /// Native ed25519 with the key from `RELKIT_SIGNING_KEY`.
    Ed25519,
}

/// How repository metadata is signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub method: SigningMethod,
    /// Program for [`SigningMethod::Gpg`].
    pub program: String,
    /// Arguments, with `{file}` and `{signature}` placeholders.
    pub args: Vec<String>,
    /// Signature file extension.
    pub extension: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            method: SigningMethod::Gpg,
            program: "gpg".to_string(),
            args: GPG_ARGS.iter().map(ToString::to_string).collect(),
            extension: "asc".to_string(),
        }
    }
}

impl SigningConfig {
    /// Build the configured signer.
    pub fn signer(&self, runner: Arc<dyn ToolRunner>) -> anyhow::Result<Arc<dyn Signer>> {
        let signer: Arc<dyn Signer> = match self.method {
            SigningMethod::Gpg => Arc::new(CommandSigner::new(
                self.program.clone(),
                self.args.clone(),
                runner,
            )),
            SigningMethod::Ed25519 => Arc::new(Ed25519Signer::from_env()?),
        };
        Ok(signer)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Custom `index.html` template with `{title}` and `{entries}`.
    #[serde(default)]
    pub index: Option<PathBuf>,
}

/// Package format of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    #[default]
    Rpm,
}

/// Layout of one distribution's repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: RepoKind,
    /// Bucket the repository trees live in.
    pub bucket: String,
    /// Remote repository paths. `{version}`, `{series}` and `{profile}`
    /// are substituted per build.
    pub repos: Vec<String>,
    pub architectures: Vec<Arch>,
}

impl RepositoryDefinition {
    /// Concrete repository paths for one build.
    pub fn repo_paths(&self, version: &ReleaseVersion, profile: &str) -> Vec<String> {
        let full = version.to_string();
        let series = version.series();
        self.repos
            .iter()
            .map(|template| {
                template
                    .replace("{version}", &full)
                    .replace("{series}", &series)
                    .replace("{profile}", profile)
                    .trim_matches('/')
                    .to_string()
            })
            .collect()
    }

    pub fn supports(&self, arch: Arch) -> bool {
        self.architectures.contains(&arch)
    }
}
