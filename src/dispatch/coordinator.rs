use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::settings::SettingsConfig;
use crate::dispatch::eligibility::{evaluate, Eligibility};
use crate::dispatch::outcome::{DispatchOutcome, DispatchSummary, OutcomeStatus};
use crate::dispatch::request::{DispatchRequest, ImageAttachment, ImageData, PayloadKind, PublishPayload};
use crate::helpers::time::get_instant;
use crate::hosting::cloudinary::CloudinaryHost;
use crate::observability::metrics::get_metrics;
use crate::resilience::auth_retry::publish_with_refresh;
use crate::sources::TokenProvider;
use crate::targets::{PublishTarget, TargetBinding, TargetId, TargetKind};

/// Fans one request out to every eligible target and collects the outcomes.
#[derive(Debug, Clone)]
pub struct DispatchCoordinator {
    targets: Arc<Vec<PublishTarget>>,
    hosting: Option<CloudinaryHost>,
    deadline: Duration,
    default_caption: String,
}

enum Planned {
    Run(usize),
    Skip(TargetId, String),
}

impl DispatchCoordinator {
    pub fn new(targets: Vec<PublishTarget>, hosting: Option<CloudinaryHost>, settings: &SettingsConfig) -> Self {
        Self {
            targets: Arc::new(targets),
            hosting,
            deadline: settings.dispatch_deadline(),
            default_caption: settings.default_caption.clone(),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn enabled_targets(&self) -> usize {
        self.targets.iter().filter(|t| t.is_ready()).count()
    }

    /// Never fails: every target-level problem becomes an outcome.
    /// The request's image file is deleted before this returns.
    pub async fn dispatch(&self, mut request: DispatchRequest) -> DispatchSummary {
        let attachment = request.image.take();
        let Some(kind) = payload_kind(&request, attachment.as_ref()) else {
            debug!("nothing to dispatch");
            release(attachment);
            return DispatchSummary::default();
        };

        get_metrics().await.dispatch_requests.with_label_values(&[kind.as_str()]).inc();
        info!(
            kind = kind.as_str(),
            chat_id = request.source.chat_id,
            message_id = request.source.message_id,
            "dispatching message"
        );

        let dimensions = attachment.as_ref().and_then(ImageAttachment::dimensions);
        let plan = self.plan(kind, dimensions);
        let payload = self.prepare(kind, request, attachment.as_ref(), &plan).await;
        release(attachment);

        let summary = self.run(plan, payload).await;
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "dispatch finished"
        );
        summary
    }

    fn plan(&self, kind: PayloadKind, dimensions: Option<(u32, u32)>) -> Vec<Planned> {
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(index, target)| match evaluate(target, kind, dimensions) {
                Eligibility::Eligible => Some(Planned::Run(index)),
                Eligibility::Skipped(reason) => {
                    info!(target = %target.id, reason = %reason, "target skipped");
                    Some(Planned::Skip(target.id, reason))
                }
                Eligibility::NotApplicable => None,
            })
            .collect()
    }

    /// Reads the image once and hosts it when a planned target needs a URL.
    async fn prepare(
        &self,
        kind: PayloadKind,
        request: DispatchRequest,
        attachment: Option<&ImageAttachment>,
        plan: &[Planned],
    ) -> Result<PublishPayload, String> {
        let DispatchRequest { text, source, .. } = request;
        let Some(attachment) = attachment else {
            return Ok(PublishPayload { kind, text, image: None });
        };

        let bytes = attachment
            .read()
            .await
            .map_err(|err| format!("image unreadable: {}", err))?;
        let mut image = ImageData {
            bytes: Arc::new(bytes),
            file_name: format!("{}_{}.jpg", source.chat_id, source.message_id),
            mime_type: attachment.mime_type.clone(),
            hosted_url: None,
        };

        let needs_url = plan.iter().any(|p| match p {
            Planned::Run(index) => self.targets[*index].capability.needs_hosted_url,
            Planned::Skip(..) => false,
        });
        if needs_url {
            image.hosted_url = self.host(&image).await;
        }

        let caption = text
            .filter(|t| !t.trim().is_empty())
            .or_else(|| Some(self.default_caption.clone()));
        Ok(PublishPayload { kind, text: caption, image: Some(image) })
    }

    async fn host(&self, image: &ImageData) -> Option<String> {
        let metrics = get_metrics().await;
        let Some(hosting) = &self.hosting else {
            warn!("image hosting not configured, URL based targets will fail");
            return None;
        };
        match hosting.upload(image).await {
            Ok(url) => {
                metrics.hosting_uploads.with_label_values(&["ok"]).inc();
                Some(url)
            }
            Err(err) => {
                metrics.hosting_uploads.with_label_values(&["error"]).inc();
                error!("image hosting failed: {:#}", err);
                None
            }
        }
    }

    /// Spawns one task per eligible target, then waits for all of them.
    async fn run(&self, plan: Vec<Planned>, payload: Result<PublishPayload, String>) -> DispatchSummary {
        let payload = payload.map(Arc::new);
        let mut handles: Vec<(TargetId, Result<JoinHandle<OutcomeStatus>, OutcomeStatus>)> = Vec::with_capacity(plan.len());

        for planned in plan {
            match planned {
                Planned::Skip(id, reason) => handles.push((id, Err(OutcomeStatus::Skipped(reason)))),
                Planned::Run(index) => {
                    let target = &self.targets[index];
                    let entry = match (&target.binding, &payload) {
                        (TargetBinding::Ready { adapter, tokens }, Ok(payload)) => {
                            let adapter = adapter.clone();
                            let tokens = tokens.clone();
                            let payload = payload.clone();
                            let deadline = self.deadline;
                            Ok(tokio::spawn(async move {
                                run_unit(adapter, tokens, payload, deadline).await
                            }))
                        }
                        (TargetBinding::Ready { .. }, Err(reason)) => Err(OutcomeStatus::failed(reason.clone())),
                        (TargetBinding::Incomplete(reason), _) => Err(OutcomeStatus::Skipped(reason.clone())),
                    };
                    handles.push((target.id, entry));
                }
            }
        }

        let (ids, pending): (Vec<TargetId>, Vec<_>) = handles.into_iter().unzip();
        let statuses = join_all(pending.into_iter().map(|entry| async move {
            match entry {
                Ok(handle) => handle
                    .await
                    .unwrap_or_else(|err| OutcomeStatus::failed(format!("publish task aborted: {}", err))),
                Err(status) => status,
            }
        }))
        .await;

        let metrics = get_metrics().await;
        let outcomes = ids
            .into_iter()
            .zip(statuses)
            .map(|(target, status)| {
                metrics.publish_outcomes.with_label_values(&[target.as_str(), status.as_str()]).inc();
                DispatchOutcome { target, status }
            })
            .collect();
        DispatchSummary { outcomes }
    }
}

async fn run_unit(
    adapter: TargetKind,
    tokens: TokenProvider,
    payload: Arc<PublishPayload>,
    deadline: Duration,
) -> OutcomeStatus {
    let target = adapter.id();
    let start = get_instant();
    let status = match tokio::time::timeout(deadline, publish_with_refresh(&adapter, &tokens, &payload)).await {
        Ok(status) => status,
        Err(_) => OutcomeStatus::failed("timeout"),
    };
    get_metrics()
        .await
        .publish_duration
        .with_label_values(&[target.as_str()])
        .observe(start.elapsed().as_secs_f64());

    match &status {
        OutcomeStatus::Failed(reason) => warn!(target = %target, reason = %reason, "publish failed"),
        _ => info!(target = %target, status = status.as_str(), "publish finished"),
    }
    status
}

fn payload_kind(request: &DispatchRequest, attachment: Option<&ImageAttachment>) -> Option<PayloadKind> {
    if attachment.is_some() {
        return Some(PayloadKind::Image);
    }
    request.payload_kind()
}

fn release(attachment: Option<ImageAttachment>) {
    let Some(attachment) = attachment else {
        return;
    };
    let path = attachment.path().display().to_string();
    match attachment.release() {
        Ok(()) => debug!("temporary image removed: {}", path),
        Err(err) => error!("temporary image '{}' not removed: {}", path, err),
    }
}
