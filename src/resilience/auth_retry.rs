//! One publish unit: at most two attempts with a single refresh between them.
//!
//! Attempt1 -> (AuthFailure -> Refresh -> Attempt2) -> Done.
//! Done is reached after Attempt2 whatever its result, so a target that
//! keeps rejecting tokens costs exactly two publish calls and one refresh.

use tracing::{info, warn};

use crate::dispatch::outcome::OutcomeStatus;
use crate::dispatch::request::PublishPayload;
use crate::observability::metrics::get_metrics;
use crate::sources::TokenProvider;
use crate::targets::{PublishError, Published, TargetKind};

enum Step {
    FirstAttempt,
    Refresh { rejected: String, detail: String },
    SecondAttempt { token: String },
    Done(OutcomeStatus),
}

pub async fn publish_with_refresh(
    adapter: &TargetKind,
    tokens: &TokenProvider,
    payload: &PublishPayload,
) -> OutcomeStatus {
    let target = adapter.id();
    let metrics = get_metrics().await;
    let mut step = Step::FirstAttempt;

    loop {
        step = match step {
            Step::FirstAttempt => match tokens.token().await {
                Err(err) => Step::Done(OutcomeStatus::failed(format!("token unavailable: {}", err))),
                Ok(token) => {
                    metrics.publish_attempts.with_label_values(&[target.as_str()]).inc();
                    match adapter.publish(payload, &token).await {
                        Ok(published) => Step::Done(succeeded(published)),
                        Err(PublishError::AuthFailure(detail)) if tokens.is_refreshable() => {
                            Step::Refresh { rejected: token, detail }
                        }
                        Err(err) => Step::Done(OutcomeStatus::failed(err.to_string())),
                    }
                }
            },
            Step::Refresh { rejected, detail } => {
                warn!(target = %target, detail = %detail, "token rejected, refreshing once");
                match tokens.refresh_rejected(&rejected).await {
                    Ok(token) => Step::SecondAttempt { token },
                    Err(err) => Step::Done(OutcomeStatus::failed(format!(
                        "auth rejected ({}); token refresh failed: {}",
                        detail, err
                    ))),
                }
            }
            Step::SecondAttempt { token } => {
                metrics.publish_attempts.with_label_values(&[target.as_str()]).inc();
                match adapter.publish(payload, &token).await {
                    Ok(published) => {
                        info!(target = %target, "published after token refresh");
                        Step::Done(succeeded(published))
                    }
                    Err(err) => Step::Done(OutcomeStatus::failed(format!("after token refresh: {}", err))),
                }
            }
            Step::Done(status) => return status,
        }
    }
}

fn succeeded(published: Published) -> OutcomeStatus {
    OutcomeStatus::Succeeded { id: published.id }
}
