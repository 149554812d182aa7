//! keygen / sign

use std::path::Path;

use anyhow::{Context, Result};
use relkit_core::signing::{Ed25519Signer, generate_keypair, sign_file, signature_path};

/// Print a new key pair and write the secret to `output` unless it exists.
pub fn keygen(output: &Path) -> Result<()> {
    println!("  generating ed25519 keypair");
    let pair = generate_keypair();

    println!();
    println!("  secret (keep safe, export as RELKIT_SIGNING_KEY):");
    println!("  {}", pair.secret);
    println!();
    println!("  public (give to consumers):");
    println!("  {}", pair.public);
    println!();

    if output.exists() {
        println!("  {} exists; not overwriting", output.display());
    } else {
        std::fs::write(output, &pair.secret)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("  wrote {}", output.display());
    }
    Ok(())
}

/// Sign `file`, writing the signature to `output` or `<file>.sig`.
pub async fn sign(file: &Path, output: Option<&Path>) -> Result<()> {
    let signer = Ed25519Signer::from_env()?;
    let signature = match output {
        Some(path) => {
            relkit_core::Signer::sign(&signer, file, path).await?;
            path.to_path_buf()
        }
        None => sign_file(&signer, file, "sig", true).await?.0,
    };
    println!("  signed {} -> {}", file.display(), signature.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_signature_sits_next_to_file() {
        assert_eq!(
            signature_path(Path::new("dist/app.tar"), "sig"),
            Path::new("dist/app.tar.sig")
        );
    }
}
