//! Detached signatures for repository metadata.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use tracing::{debug, info};

use crate::sync::path_exists;
use crate::tools::{ToolCommand, ToolRunner};

/// Environment variable holding the base64 ed25519 secret key.
pub const SIGNING_KEY_ENV: &str = "RELKIT_SIGNING_KEY";

/// Arguments of the default `gpg` invocation.
pub const GPG_ARGS: [&str; 7] = [
    "--batch",
    "--yes",
    "--armor",
    "--detach-sign",
    "--output",
    "{signature}",
    "{file}",
];

/// Produces a detached signature for one file.
#[async_trait]
pub trait Signer: Send + Sync + std::fmt::Debug {
    /// Sign `file`, writing the signature to `signature`.
    async fn sign(&self, file: &Path, signature: &Path) -> Result<()>;
}

/// `file` with `.ext` appended: `repomd.xml` becomes `repomd.xml.asc`.
pub fn signature_path(file: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(file.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Whether [`sign_file`] signed or found an existing signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    Signed,
    Exists,
}

/// Write a detached signature next to `file`.
///
/// With `overwrite` off, an existing signature is left alone.
pub async fn sign_file(
    signer: &dyn Signer,
    file: &Path,
    ext: &str,
    overwrite: bool,
) -> Result<(PathBuf, SignOutcome)> {
    let signature = signature_path(file, ext);
    if !overwrite
        && path_exists(&signature)
            .await
            .with_context(|| format!("checking {}", signature.display()))?
    {
        info!("signature {} exists; not overwriting", signature.display());
        return Ok((signature, SignOutcome::Exists));
    }

    signer
        .sign(file, &signature)
        .await
        .with_context(|| format!("signing {}", file.display()))?;
    debug!("signed {} -> {}", file.display(), signature.display());
    Ok((signature, SignOutcome::Signed))
}

/// Signs by running an external program such as `gpg`.
///
/// `{file}` and `{signature}` in the arguments are replaced per call. The
/// program runs in the directory of the file being signed.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
    runner: Arc<dyn ToolRunner>,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, args: Vec<String>, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            program: program.into(),
            args,
            runner,
        }
    }

    /// `gpg --batch --yes --armor --detach-sign`.
    pub fn gpg(runner: Arc<dyn ToolRunner>) -> Self {
        Self::new("gpg", GPG_ARGS.iter().map(ToString::to_string).collect(), runner)
    }

    fn command(&self, file: &Path, signature: &Path) -> ToolCommand {
        let dir = file.parent().filter(|dir| !dir.as_os_str().is_empty());
        let file = file.to_string_lossy();
        let signature = signature.to_string_lossy();
        let args = self
            .args
            .iter()
            .map(|arg| arg.replace("{file}", &file).replace("{signature}", &signature));

        let command = ToolCommand::new(&self.program).args(args);
        match dir {
            Some(dir) => command.current_dir(dir),
            None => command,
        }
    }
}

#[async_trait]
impl Signer for CommandSigner {
    async fn sign(&self, file: &Path, signature: &Path) -> Result<()> {
        let command = self.command(file, signature);
        self.runner.run(&command).await?;
        Ok(())
    }
}

/// Signs natively with an ed25519 key, writing a base64 signature.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public", &base64_encode(&self.key.verifying_key().to_bytes()))
            .finish_non_exhaustive()
    }
}

impl Ed25519Signer {
    /// Decode a base64 32-byte secret key.
    pub fn from_base64(secret: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(secret.trim())
            .context("Invalid Base64 signing key")?;
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("signing key must be a 32-byte Ed25519 private key"))?;
        Ok(Self {
            key: SigningKey::from_bytes(&key),
        })
    }

    /// Read the key from `RELKIT_SIGNING_KEY`.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(SIGNING_KEY_ENV)
            .with_context(|| format!("{SIGNING_KEY_ENV} not set"))?;
        Self::from_base64(&secret)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Base64 signature over `data`.
    pub fn sign_bytes(&self, data: &[u8]) -> String {
        base64_encode(&self.key.sign(data).to_bytes())
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    async fn sign(&self, file: &Path, signature: &Path) -> Result<()> {
        let data = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        tokio::fs::write(signature, self.sign_bytes(&data))
            .await
            .with_context(|| format!("Failed to write {}", signature.display()))
    }
}

/// A new ed25519 key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Base64 secret key, suitable for `RELKIT_SIGNING_KEY`.
    pub secret: String,
    /// Base64 public key.
    pub public: String,
}

/// Generate a fresh ed25519 key pair.
pub fn generate_keypair() -> KeyPair {
    use rand::RngCore;

    let mut secret_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut secret_bytes);
    let signing_key = SigningKey::from_bytes(&secret_bytes);

    KeyPair {
        secret: base64_encode(&signing_key.to_bytes()),
        public: base64_encode(&signing_key.verifying_key().to_bytes()),
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    #[test]
    fn signature_path_appends_extension() {
        assert_eq!(
            signature_path(Path::new("/r/repodata/repomd.xml"), "asc"),
            Path::new("/r/repodata/repomd.xml.asc")
        );
    }

    #[test]
    fn rejects_short_keys() {
        assert!(Ed25519Signer::from_base64("AAAA").is_err());
        assert!(Ed25519Signer::from_base64("not base64!").is_err());
    }

    #[tokio::test]
    async fn ed25519_signature_verifies() {
        let pair = generate_keypair();
        let signer = Ed25519Signer::from_base64(&pair.secret).unwrap();
        assert_eq!(
            base64_encode(&signer.verifying_key().to_bytes()),
            pair.public
        );

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("repomd.xml");
        std::fs::write(&file, "<repomd/>").unwrap();

        let (sig, outcome) = sign_file(&signer, &file, "asc", false).await.unwrap();
        assert_eq!(outcome, SignOutcome::Signed);

        let encoded = std::fs::read_to_string(&sig).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let signature = Signature::from_slice(&bytes).unwrap();
        signer
            .verifying_key()
            .verify(b"<repomd/>", &signature)
            .unwrap();
    }

    #[tokio::test]
    async fn no_overwrite_keeps_existing_signature() {
        let pair = generate_keypair();
        let signer = Ed25519Signer::from_base64(&pair.secret).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("repomd.xml");
        std::fs::write(&file, "<repomd/>").unwrap();
        std::fs::write(dir.path().join("repomd.xml.asc"), "old").unwrap();

        let (sig, outcome) = sign_file(&signer, &file, "asc", false).await.unwrap();
        assert_eq!(outcome, SignOutcome::Exists);
        assert_eq!(std::fs::read_to_string(sig).unwrap(), "old");

        let (_, outcome) = sign_file(&signer, &file, "asc", true).await.unwrap();
        assert_eq!(outcome, SignOutcome::Signed);
    }

    #[test]
    fn command_signer_substitutes_placeholders() {
        #[derive(Debug)]
        struct Unused;

        #[async_trait]
        impl ToolRunner for Unused {
            async fn run(&self, _: &ToolCommand) -> Result<String, crate::tools::ToolError> {
                Ok(String::new())
            }
        }

        let signer = CommandSigner::gpg(Arc::new(Unused));
        let cmd = signer.command(Path::new("/r/repomd.xml"), Path::new("/r/repomd.xml.asc"));
        assert_eq!(
            cmd.to_string(),
            "gpg --batch --yes --armor --detach-sign --output /r/repomd.xml.asc /r/repomd.xml"
        );
        assert_eq!(cmd.current_dir.as_deref(), Some(Path::new("/r")));
    }
}
