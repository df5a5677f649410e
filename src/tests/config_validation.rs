#[cfg(test)]
mod tests {
    use std::path::Path;

    use serial_test::serial;

    use crate::config::proc_loader::{file_to_config, parse_config};
    use crate::config::proc_validator::validate_service_config;
    use crate::config::ServiceConfig;
    use crate::targets::{build_targets, TargetBinding, TargetId};
    use crate::tests::common::build_reqwest_client;

    const DEMO_SECRETS: [&str; 11] = [
        "CLOUDINARY_CLOUD_NAME",
        "CLOUDINARY_API_KEY",
        "CLOUDINARY_API_SECRET",
        "TWITTER_CLIENT_ID",
        "TWITTER_CLIENT_SECRET",
        "TWITTER_ACCESS_TOKEN",
        "TWITTER_REFRESH_TOKEN",
        "INSTAGRAM_ACCOUNT_ID",
        "INSTAGRAM_ACCESS_TOKEN",
        "FACEBOOK_PAGE_ID",
        "FACEBOOK_PAGE_ACCESS_TOKEN",
    ];

    const MINIMAL: &str = r#"
settings:
  request_timeout_seconds: 20
inbound:
  telegram:
    bot_token: "123:abc"
targets:
  telegram_channel:
    channel_id: "@news"
"#;

    #[tokio::test]
    #[serial]
    async fn demo_config_is_valid_with_inbound_token_and_channel() {
        for var in DEMO_SECRETS {
            std::env::remove_var(var);
        }
        std::env::set_var("TELEGRAM_BOT_TOKEN", "123:abc");
        std::env::set_var("TELEGRAM_CHANNEL_ID", "@news");

        let service_config: ServiceConfig = file_to_config(Path::new("demos/post-relay.yaml"))
            .await
            .expect("demos/post-relay.yaml must exist in repo root for tests");

        std::env::remove_var("TELEGRAM_BOT_TOKEN");
        std::env::remove_var("TELEGRAM_CHANNEL_ID");

        assert_eq!(service_config.settings.default_caption, "Posted via post-relay");
        assert!(service_config.hosting.cloudinary.as_ref().is_some_and(|c| !c.is_complete()));

        let targets = build_targets(&service_config, &build_reqwest_client()).await.unwrap();
        let ids: Vec<TargetId> = targets.iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            vec![
                TargetId::Twitter,
                TargetId::InstagramFeed,
                TargetId::InstagramStory,
                TargetId::FacebookPage,
                TargetId::TelegramChannel,
            ]
        );
        let ready: Vec<TargetId> = targets.iter().filter(|t| t.is_ready()).map(|t| t.id).collect();
        assert_eq!(ready, vec![TargetId::TelegramChannel]);
        match &targets[0].binding {
            TargetBinding::Incomplete(reason) => assert_eq!(reason, "missing credentials: client_id, refresh_token"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn minimal_config_gets_defaults() {
        let cfg = parse_config(MINIMAL.to_owned()).await.unwrap();
        assert_eq!(cfg.settings.safety_margin_seconds(), 60);
        assert_eq!(cfg.settings.dispatch_deadline().as_secs(), 100);
        let telegram = cfg.inbound.telegram.as_ref().unwrap();
        assert_eq!(telegram.poll_timeout_seconds, 10);
        assert_eq!(telegram.api_base, "https://api.telegram.org");
        assert!(cfg.targets.twitter.is_none());
    }

    #[tokio::test]
    #[should_panic(expected = "config is not valid")]
    async fn invalid_config_reports_all_errors() {
        // poll timeout not below request timeout, bad url, bad ratio, no complete target
        let invalid_yaml = r#"
settings:
  request_timeout_seconds: 5
  dispatch_deadline_seconds: 2
  metrics:
    path: "metrics"
    is_enabled: true
  logging:
    level: loud
    format: compact
inbound:
  telegram:
    bot_token: ""
    poll_timeout_seconds: 10
targets:
  twitter:
    client_id: "abc"
    token_url: "ftp://token"
  instagram:
    account_id: "1"
    feed_aspect_ratio:
      min: 2.0
      max: 1.0
"#;
        parse_config(invalid_yaml.to_owned()).await.unwrap();
    }

    #[tokio::test]
    async fn every_problem_is_listed() {
        let cfg: ServiceConfig = serde_yaml::from_str(
            r#"
settings:
  request_timeout_seconds: 5
  dispatch_deadline_seconds: 2
inbound:
  telegram:
    poll_timeout_seconds: 10
targets:
  twitter:
    client_id: "abc"
    token_url: "ftp://token"
"#,
        )
        .unwrap();

        let errors = validate_service_config(&cfg).await.unwrap_err();
        let joined = errors.join("\n");
        assert!(joined.contains("dispatch_deadline_seconds"));
        assert!(joined.contains("bot_token must be set"));
        assert!(joined.contains("poll_timeout_seconds"));
        assert!(joined.contains("targets.twitter.token_url"));
        assert!(joined.contains("no publish target has complete credentials"));
        assert_eq!(errors.len(), 5);
    }

    #[tokio::test]
    async fn missing_inbound_section_is_an_error() {
        let cfg: ServiceConfig = serde_yaml::from_str("settings: {}\n").unwrap();
        let errors = validate_service_config(&cfg).await.unwrap_err();
        assert!(errors.iter().any(|e| e == "inbound.telegram is required"));
    }
}
