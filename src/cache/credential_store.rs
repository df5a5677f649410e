use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::credential::Credential;

/// Current credential of one identity. Cloning shares the same record.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    inner: Arc<RwLock<Credential>>,
}

impl CredentialStore {
    pub fn new(credential: Credential) -> Self {
        Self { inner: Arc::new(RwLock::new(credential)) }
    }

    pub async fn snapshot(&self) -> Credential {
        self.inner.read().await.clone()
    }

    /// Writers must hold the owning manager's refresh lock.
    pub(crate) async fn replace(&self, credential: Credential) {
        *self.inner.write().await = credential;
    }
}
