//! Shared constants and invariants

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
/// Used when the token endpoint omits `expires_in`
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 7200;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 10;
pub const INBOUND_ERROR_BACKOFF_SECS: u64 = 5;

// Upstream endpoints
pub const TWITTER_API_BASE: &str = "https://api.twitter.com";
pub const TWITTER_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";

// Instagram feed accepts 4:5 up to 1.91:1
pub const INSTAGRAM_FEED_MIN_RATIO: f64 = 0.8;
pub const INSTAGRAM_FEED_MAX_RATIO: f64 = 1.91;

/// Graph API error code for an invalid or expired access token
pub const GRAPH_OAUTH_ERROR_CODE: i64 = 190;

/// Upstream bodies are cut to this many chars in outcome reasons
pub const MAX_REASON_BODY_CHARS: usize = 300;
