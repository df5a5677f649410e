//! Where publish adapters get their access tokens from.

use std::sync::Arc;

pub mod oauth2;
pub mod persist;

use oauth2::{TokenError, TokenManager};

#[derive(Debug, Clone)]
pub enum TokenProvider {
    /// Long-lived key from config, nothing to refresh.
    Static(String),
    Managed(Arc<TokenManager>),
}

impl TokenProvider {
    pub async fn token(&self) -> Result<String, TokenError> {
        match self {
            TokenProvider::Static(token) => Ok(token.clone()),
            TokenProvider::Managed(manager) => manager.get_token().await,
        }
    }

    pub fn is_refreshable(&self) -> bool {
        matches!(self, TokenProvider::Managed(_))
    }

    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String, TokenError> {
        match self {
            TokenProvider::Static(_) => Err(TokenError::CredentialsUnavailable(
                "static token cannot be refreshed".to_owned(),
            )),
            TokenProvider::Managed(manager) => manager.refresh_rejected(rejected).await,
        }
    }
}
