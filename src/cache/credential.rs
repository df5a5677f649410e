use std::fmt;

use serde::{Deserialize, Serialize};

/// Access/refresh pair for one OAuth2 identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// unix seconds, `None` when the provider never told us
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl Credential {
    pub fn new(access_token: String, refresh_token: String, expires_at: Option<i64>) -> Self {
        Self { access_token, refresh_token, expires_at }
    }

    /// Pair obtained out of band (authorization-code exchange), expiry unknown.
    pub fn bootstrap(access_token: String, refresh_token: String) -> Self {
        Self::new(access_token, refresh_token, None)
    }

    /// A token with unknown expiry is used until a target rejects it.
    pub fn is_usable_at(&self, now: i64, safety_margin_seconds: u64) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => now < expires_at.saturating_sub(safety_margin_seconds as i64),
            None => true,
        }
    }

    /// Credential after a successful refresh grant.
    /// Providers that do not rotate omit `refresh_token`; the previous one stays valid then.
    pub fn refreshed(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        now: i64,
    ) -> Credential {
        let refresh_token = refresh_token
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| self.refresh_token.clone());
        Credential::new(access_token, refresh_token, Some(now.saturating_add(expires_in)))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn mask(value: &str) -> String {
    "*".repeat(value.len().min(8))
}

#[cfg(test)]
mod tests {
    use super::Credential;

    #[test]
    fn usable_respects_safety_margin() {
        let credential = Credential::new("T1".into(), "R1".into(), Some(1_000));
        assert!(credential.is_usable_at(900, 60));
        assert!(!credential.is_usable_at(940, 60));
        assert!(!credential.is_usable_at(1_000, 0));
    }

    #[test]
    fn unknown_expiry_is_usable_unless_empty() {
        assert!(Credential::bootstrap("T1".into(), "R1".into()).is_usable_at(i64::MAX, 60));
        assert!(!Credential::bootstrap(String::new(), "R1".into()).is_usable_at(0, 60));
    }

    #[test]
    fn refresh_keeps_previous_refresh_token_when_omitted() {
        let credential = Credential::bootstrap("T1".into(), "R1".into());

        let kept = credential.refreshed("T2".into(), None, 3600, 100);
        assert_eq!(kept.refresh_token, "R1");
        assert_eq!(kept.expires_at, Some(3700));

        let blank = credential.refreshed("T2".into(), Some(String::new()), 3600, 100);
        assert_eq!(blank.refresh_token, "R1");

        let rotated = credential.refreshed("T3".into(), Some("R2".into()), 60, 100);
        assert_eq!(rotated.refresh_token, "R2");
        assert_eq!(rotated.access_token, "T3");
    }

    #[test]
    fn extreme_lifetimes_saturate() {
        let credential = Credential::bootstrap("T1".into(), "R1".into());

        let forever = credential.refreshed("T2".into(), None, i64::MAX, 1_700_000_000);
        assert_eq!(forever.expires_at, Some(i64::MAX));
        assert!(forever.is_usable_at(1_700_000_000, 60));

        let already_gone = credential.refreshed("T2".into(), None, i64::MIN, 1_700_000_000);
        assert!(!already_gone.is_usable_at(1_700_000_000, 60));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let credential = Credential::bootstrap("secret-access".into(), "secret-refresh".into());
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("secret"));
    }
}
