//! Decision policy: reduces a photo's signals to approve/reject.
//!
//! Rules are evaluated in a fixed order and the first one that fires decides
//! the outcome:
//!
//! ```text
//! blurry → no_face → group_photo → underage → nsfw → nsfw_check_failed → approved
//! ```
//!
//! The policy never looks at anything but the [`SignalSet`] and the
//! thresholds, so the same input always yields the same verdict. Face
//! fallback has already been resolved by the time the policy runs.

use crate::config::PolicyConfig;
use crate::types::{NsfwScores, RejectReason, SignalSet, Verdict};

/// Which NSFW bar caused an `nsfw` rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsfwTrigger {
    Porn,
    Sexy,
    Hentai,
    /// Over the safety net but under every category-specific bar
    SafetyNet,
}

/// A verdict plus the NSFW bar that produced it, for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub nsfw_trigger: Option<NsfwTrigger>,
}

/// The decision policy with its thresholds.
#[derive(Debug, Clone, Default)]
pub struct DecisionPolicy {
    config: PolicyConfig,
}

impl DecisionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Blur threshold shared with the sharpness check.
    pub fn blur_threshold(&self) -> f64 {
        self.config.blur_threshold
    }

    /// Decide a photo.
    pub fn decide(&self, signals: &SignalSet) -> Verdict {
        self.evaluate(signals).verdict
    }

    /// Decide a photo and report which NSFW bar fired, if any.
    pub fn evaluate(&self, signals: &SignalSet) -> Decision {
        let reject = |reason| Decision {
            verdict: Verdict::Rejected(reason),
            nsfw_trigger: None,
        };

        if signals.is_blurry {
            return reject(RejectReason::Blurry);
        }
        if !signals.has_face {
            return reject(RejectReason::NoFace);
        }
        if signals.face_count > 1 {
            return reject(RejectReason::GroupPhoto);
        }
        if let Some(age) = signals.estimated_age {
            if age < self.config.min_age {
                return reject(RejectReason::Underage);
            }
        }
        if let Some(trigger) = self.nsfw_trigger(&signals.nsfw) {
            return Decision {
                verdict: Verdict::Rejected(RejectReason::Nsfw),
                nsfw_trigger: Some(trigger),
            };
        }
        // An absent or broken classifier reports exact zeros; never treat that as clean.
        if signals.nsfw.is_all_zero() {
            return reject(RejectReason::NsfwCheckFailed);
        }

        Decision {
            verdict: Verdict::Approved,
            nsfw_trigger: None,
        }
    }

    /// Two-level NSFW check: the safety net gates the category-specific bars,
    /// and tripping the net alone is enough to reject.
    fn nsfw_trigger(&self, scores: &NsfwScores) -> Option<NsfwTrigger> {
        let net = self.config.nsfw_safety_net;
        if !(scores.porn > net || scores.sexy > net || scores.hentai > net) {
            return None;
        }
        let trigger = if scores.porn > self.config.nsfw_porn {
            NsfwTrigger::Porn
        } else if scores.sexy > self.config.nsfw_sexy {
            NsfwTrigger::Sexy
        } else if scores.hentai > self.config.nsfw_hentai {
            NsfwTrigger::Hentai
        } else {
            NsfwTrigger::SafetyNet
        };
        Some(trigger)
    }
}
