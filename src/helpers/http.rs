use std::time::Duration;

use anyhow::Result;
use reqwest::Client;

use crate::utils::constants::MAX_REASON_BODY_CHARS;

/// One client for every outbound call; the timeout bounds each request end to end.
pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

pub fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timeout".to_owned()
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

pub fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_REASON_BODY_CHARS {
        return body.to_owned();
    }
    let cut: String = body.chars().take(MAX_REASON_BODY_CHARS).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::truncate_body;

    #[test]
    fn long_bodies_are_cut() {
        let body = "x".repeat(1000);
        let cut = truncate_body(&body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() < 400);
        assert_eq!(truncate_body(" short "), "short");
    }
}
