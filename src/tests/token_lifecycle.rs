#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use base64::Engine;
    use futures::future::join_all;

    use crate::cache::credential::Credential;
    use crate::helpers::time::now_i64;
    use crate::sources::oauth2::{OAuth2Client, TokenError, TokenManager};
    use crate::sources::persist::CredentialFile;
    use crate::tests::common::{build_reqwest_client, spawn_token_endpoint, token_manager, TokenEndpoint};

    fn expired(access: &str, refresh: &str) -> Credential {
        Credential::new(access.into(), refresh.into(), Some(now_i64() - 10))
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_calling_the_endpoint() {
        let client = build_reqwest_client();
        let (url, recorder) = spawn_token_endpoint(TokenEndpoint::default()).await;
        let manager = token_manager(&client, &url, Credential::new("T1".into(), "R1".into(), Some(now_i64() + 3600)));

        assert_eq!(manager.get_token().await.unwrap(), "T1");
        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_with_client_credentials() {
        let client = build_reqwest_client();
        let (url, recorder) = spawn_token_endpoint(TokenEndpoint::default()).await;
        let manager = token_manager(&client, &url, expired("T1", "R1"));

        let before = now_i64();
        assert_eq!(manager.get_token().await.unwrap(), "T2");
        assert_eq!(recorder.calls(), 1);

        assert_eq!(recorder.form_value("grant_type").as_deref(), Some("refresh_token"));
        assert_eq!(recorder.form_value("refresh_token").as_deref(), Some("R1"));
        assert_eq!(recorder.form_value("client_id").as_deref(), Some("client-1"));
        let expected_auth = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("client-1:secret-1")
        );
        assert_eq!(recorder.last_auth.lock().unwrap().as_deref(), Some(expected_auth.as_str()));

        // the endpoint did not rotate, the old refresh token stays
        let credential = manager.credential().await;
        assert_eq!(credential.refresh_token, "R1");
        let expires_at = credential.expires_at.unwrap();
        assert!(expires_at >= before + 3600 && expires_at <= now_i64() + 3600);

        // fresh again: no second call
        assert_eq!(manager.get_token().await.unwrap(), "T2");
        assert_eq!(recorder.calls(), 1);
    }

    #[tokio::test]
    async fn rotated_refresh_token_replaces_the_old_one() {
        let client = build_reqwest_client();
        let (url, recorder) = spawn_token_endpoint(TokenEndpoint { rotate: true, ..Default::default() }).await;
        let manager = token_manager(&client, &url, expired("T1", "R1"));

        assert_eq!(manager.get_token().await.unwrap(), "T2");
        assert_eq!(manager.credential().await.refresh_token, "R2");

        manager.force_refresh().await.unwrap();
        assert_eq!(recorder.form_value("refresh_token").as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn public_client_sends_no_basic_auth() {
        let client = build_reqwest_client();
        let (url, recorder) = spawn_token_endpoint(TokenEndpoint::default()).await;
        let oauth = OAuth2Client { token_url: url, client_id: Some("client-1".into()), client_secret: None };
        let manager = TokenManager::new("twitter", client, oauth, expired("T1", "R1"), 60);

        manager.get_token().await.unwrap();
        assert!(recorder.last_auth.lock().unwrap().is_none());
        assert_eq!(recorder.form_value("client_id").as_deref(), Some("client-1"));
    }

    #[tokio::test]
    async fn denied_refresh_keeps_the_last_known_credential() {
        let client = build_reqwest_client();
        let endpoint = TokenEndpoint { status: StatusCode::BAD_REQUEST, ..Default::default() };
        let (url, recorder) = spawn_token_endpoint(endpoint).await;
        let initial = expired("T1", "R1");
        let manager = token_manager(&client, &url, initial.clone());

        match manager.get_token().await {
            Err(TokenError::RefreshDenied { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(recorder.calls(), 1);
        assert_eq!(manager.credential().await, initial);
    }

    #[tokio::test]
    async fn failed_force_refresh_leaves_the_current_token_in_use() {
        let client = build_reqwest_client();
        let endpoint = TokenEndpoint { status: StatusCode::BAD_REQUEST, ..Default::default() };
        let (url, recorder) = spawn_token_endpoint(endpoint).await;
        let manager = token_manager(&client, &url, Credential::new("T1".into(), "R1".into(), Some(now_i64() + 3600)));

        assert!(matches!(manager.force_refresh().await, Err(TokenError::RefreshDenied { status: 400, .. })));
        assert_eq!(manager.get_token().await.unwrap(), "T1");
        assert_eq!(recorder.calls(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let client = build_reqwest_client();
        let manager = token_manager(&client, "http://127.0.0.1:1/oauth2/token", expired("T1", "R1"));

        assert!(matches!(manager.get_token().await, Err(TokenError::Transport(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let client = build_reqwest_client();
        let endpoint = TokenEndpoint { delay: Duration::from_millis(200), ..Default::default() };
        let (url, recorder) = spawn_token_endpoint(endpoint).await;
        let manager = Arc::new(token_manager(&client, &url, expired("T1", "R1")));

        let handles = (0..10).map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_token().await })
        });
        let tokens: Vec<String> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(recorder.calls(), 1);
        assert!(tokens.iter().all(|t| t == "T2"));
    }

    #[tokio::test]
    async fn missing_client_id_or_refresh_token_makes_no_call() {
        let client = build_reqwest_client();
        let (url, recorder) = spawn_token_endpoint(TokenEndpoint::default()).await;

        let oauth = OAuth2Client { token_url: url.clone(), client_id: None, client_secret: None };
        let no_client = TokenManager::new("twitter", client.clone(), oauth, expired("T1", "R1"), 60);
        assert!(matches!(no_client.get_token().await, Err(TokenError::CredentialsUnavailable(_))));

        let no_refresh = token_manager(&client, &url, expired("T1", ""));
        assert!(matches!(no_refresh.force_refresh().await, Err(TokenError::CredentialsUnavailable(_))));

        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn rejected_token_already_replaced_is_not_refreshed_again() {
        let client = build_reqwest_client();
        let (url, recorder) = spawn_token_endpoint(TokenEndpoint::default()).await;
        let manager = token_manager(&client, &url, Credential::bootstrap("T1".into(), "R1".into()));

        assert_eq!(manager.refresh_rejected("T1").await.unwrap(), "T2");
        assert_eq!(recorder.calls(), 1);

        // a second caller that was also holding T1
        assert_eq!(manager.refresh_rejected("T1").await.unwrap(), "T2");
        assert_eq!(recorder.calls(), 1);

        assert_eq!(manager.refresh_rejected("T2").await.unwrap(), "T3");
        assert_eq!(recorder.calls(), 2);
    }

    #[tokio::test]
    async fn refreshed_credential_is_persisted_and_reloaded() {
        let client = build_reqwest_client();
        let (url, _recorder) = spawn_token_endpoint(TokenEndpoint { rotate: true, ..Default::default() }).await;
        let dir = tempfile::tempdir().unwrap();
        let file = CredentialFile::new(dir.path().join("twitter.json"));
        let manager = token_manager(&client, &url, expired("T1", "R1")).with_credential_file(file.clone());

        manager.get_token().await.unwrap();

        let stored = file.load().await.unwrap().expect("credential persisted");
        assert_eq!(stored.access_token, "T2");
        assert_eq!(stored.refresh_token, "R2");
        assert_eq!(stored, manager.credential().await);
    }
}
