//! Which targets take part in a dispatch. Pure: no network calls.

use crate::dispatch::request::PayloadKind;
use crate::targets::{Capability, PublishTarget, TargetBinding};

#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Eligible,
    /// reported to the submitter, no call is made
    Skipped(String),
    /// target cannot carry this payload kind at all; it gets no outcome
    NotApplicable,
}

pub fn aspect_ratio(width: u32, height: u32) -> Option<f64> {
    (width > 0 && height > 0).then(|| width as f64 / height as f64)
}

pub fn evaluate(target: &PublishTarget, kind: PayloadKind, dimensions: Option<(u32, u32)>) -> Eligibility {
    if !target.capability.accepts(kind) {
        return Eligibility::NotApplicable;
    }
    if let TargetBinding::Incomplete(reason) = &target.binding {
        return Eligibility::Skipped(reason.clone());
    }
    if kind == PayloadKind::Image {
        if let Some(reason) = shape_violation(&target.capability, dimensions) {
            return Eligibility::Skipped(reason);
        }
    }
    Eligibility::Eligible
}

fn shape_violation(capability: &Capability, dimensions: Option<(u32, u32)>) -> Option<String> {
    let range = capability.aspect_ratio?;
    let Some(ratio) = dimensions.and_then(|(w, h)| aspect_ratio(w, h)) else {
        return Some("image dimensions unknown".to_owned());
    };
    (!range.contains(ratio)).then(|| {
        format!("aspect ratio {:.2} outside [{}, {}]", ratio, range.min, range.max)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::instagram::{InstagramSurface, InstagramTarget, FEED_ASPECT_RATIO};
    use crate::targets::telegram::TelegramTarget;
    use crate::targets::{TargetId, TargetKind};
    use crate::sources::TokenProvider;

    fn instagram(surface: InstagramSurface) -> PublishTarget {
        let adapter = InstagramTarget::new(reqwest::Client::new(), "http://localhost".into(), "acct".into(), surface);
        PublishTarget::ready(
            TargetKind::Instagram(adapter),
            TokenProvider::Static("ig".into()),
            InstagramTarget::capability(surface, FEED_ASPECT_RATIO),
        )
    }

    #[test]
    fn tall_image_skips_feed_but_not_story() {
        let feed = instagram(InstagramSurface::Feed);
        let story = instagram(InstagramSurface::Story);

        match evaluate(&feed, PayloadKind::Image, Some((1000, 2000))) {
            Eligibility::Skipped(reason) => assert!(reason.contains("0.50"), "{}", reason),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(evaluate(&story, PayloadKind::Image, Some((1000, 2000))), Eligibility::Eligible);
        assert_eq!(evaluate(&feed, PayloadKind::Image, Some((1080, 1080))), Eligibility::Eligible);
    }

    #[test]
    fn range_bounds_are_inclusive_and_unknown_size_is_skipped() {
        let feed = instagram(InstagramSurface::Feed);
        assert_eq!(evaluate(&feed, PayloadKind::Image, Some((800, 1000))), Eligibility::Eligible);
        assert_eq!(evaluate(&feed, PayloadKind::Image, Some((1910, 1000))), Eligibility::Eligible);
        assert!(matches!(evaluate(&feed, PayloadKind::Image, None), Eligibility::Skipped(_)));
        assert!(matches!(evaluate(&feed, PayloadKind::Image, Some((0, 10))), Eligibility::Skipped(_)));
    }

    #[test]
    fn kind_mismatch_is_not_applicable_and_incomplete_is_skipped() {
        let feed = instagram(InstagramSurface::Feed);
        assert_eq!(evaluate(&feed, PayloadKind::Text, None), Eligibility::NotApplicable);

        let channel = PublishTarget::incomplete(TargetId::TelegramChannel, TelegramTarget::capability(), "missing credentials: channel_id");
        assert_eq!(
            evaluate(&channel, PayloadKind::Text, None),
            Eligibility::Skipped("missing credentials: channel_id".into())
        );
    }
}
