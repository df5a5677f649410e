use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::cache::credential::Credential;

/// JSON file holding the latest refreshed credential, so a restart
/// does not fall back to a refresh token the provider already rotated.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<Credential>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let credential: Credential = serde_json::from_str(&content)
                    .with_context(|| format!("credentials file '{}' is not valid", self.path.display()))?;
                info!("credential loaded from '{}'", self.path.display());
                Ok(Some(credential))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("credentials file '{}' absent", self.path.display());
                Ok(None)
            }
            Err(err) => Err(err).with_context(|| format!("reading '{}'", self.path.display())),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    pub async fn store(&self, credential: &Credential) -> Result<()> {
        let content = serde_json::to_vec_pretty(credential)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &content)
            .await
            .with_context(|| format!("writing '{}'", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming '{}' to '{}'", tmp.display(), self.path.display()))?;
        debug!("credential persisted to '{}'", self.path.display());
        Ok(())
    }
}
