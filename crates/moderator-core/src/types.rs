//! Core data types for the moderation pipeline.
//!
//! Inbound job records, the per-photo signal bundle, per-photo results, and
//! the outbound batch result published once per batch.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::QueueError;

/// Maximum number of photos a single batch may carry.
pub const MAX_BATCH_PHOTOS: usize = 9;

/// One photo to moderate, as enqueued by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoJob {
    /// Media record the decision applies to
    pub media_id: String,

    /// Download URL of the uploaded image
    #[serde(default)]
    pub r2_url: String,

    /// Object key in the photo bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2_key: Option<String>,

    /// Bucket the object lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// A batch of 1..=9 photos submitted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_id: String,
    pub batch_id: String,
    pub user_id: String,
    pub telegram_id: i64,

    /// Photos in submission order
    pub photos: Vec<PhotoJob>,

    /// When the producer enqueued the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<FixedOffset>>,

    /// How many times the producer has re-enqueued this batch
    #[serde(default)]
    pub retry_count: u32,

    /// 1 = normal, 2 = high (retry)
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    1
}

impl BatchJob {
    /// Decode a queue payload and check batch invariants.
    pub fn from_payload(payload: &str) -> Result<Self, QueueError> {
        let job: BatchJob = serde_json::from_str(payload)?;
        job.validate()?;
        Ok(job)
    }

    /// A batch must carry between 1 and [`MAX_BATCH_PHOTOS`] photos.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.photos.is_empty() {
            return Err(QueueError::InvalidJob {
                job_id: self.job_id.clone(),
                message: "batch has no photos".to_string(),
            });
        }
        if self.photos.len() > MAX_BATCH_PHOTOS {
            return Err(QueueError::InvalidJob {
                job_id: self.job_id.clone(),
                message: format!(
                    "batch has {} photos (max {})",
                    self.photos.len(),
                    MAX_BATCH_PHOTOS
                ),
            });
        }
        Ok(())
    }
}

/// Explicit-content probabilities, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NsfwScores {
    pub porn: f32,
    pub sexy: f32,
    pub hentai: f32,
}

impl NsfwScores {
    pub fn new(porn: f32, sexy: f32, hentai: f32) -> Self {
        Self { porn, sexy, hentai }
    }

    /// True when every category is exactly zero, which is what an absent or
    /// degenerate classifier produces.
    pub fn is_all_zero(&self) -> bool {
        self.porn == 0.0 && self.sexy == 0.0 && self.hentai == 0.0
    }
}

/// Which detector produced the face signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceSource {
    /// The network detection service
    #[default]
    Primary,
    /// The local cascade, used after the service reported an error
    Fallback,
}

/// Face presence and age estimate for one image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceSignal {
    pub has_face: bool,
    pub face_count: u32,
    #[serde(default)]
    pub estimated_age: Option<f32>,
}

impl FaceSignal {
    /// Signal for `count` faces with an optional age estimate.
    pub fn faces(count: u32, estimated_age: Option<f32>) -> Self {
        Self {
            has_face: count > 0,
            face_count: count,
            estimated_age,
        }
    }

    /// The fail-closed signal: nothing detected.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Every signal measured for one photo, as read by the decision policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub blur_variance: f64,
    pub is_blurry: bool,
    pub has_face: bool,
    pub face_count: u32,
    pub estimated_age: Option<f32>,
    #[serde(default)]
    pub face_source: FaceSource,
    /// Error marker of the primary detector when the fallback was used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_error: Option<String>,
    #[serde(rename = "nsfw_scores", alias = "nsfw")]
    pub nsfw: NsfwScores,
    pub processing_time_ms: u64,
}

/// Closed set of rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Blurry,
    NoFace,
    GroupPhoto,
    Underage,
    Nsfw,
    NsfwCheckFailed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blurry => "blurry",
            Self::NoFace => "no_face",
            Self::GroupPhoto => "group_photo",
            Self::Underage => "underage",
            Self::Nsfw => "nsfw",
            Self::NsfwCheckFailed => "nsfw_check_failed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the decision policy for one photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn status(&self) -> PhotoStatus {
        match self {
            Self::Approved => PhotoStatus::Approved,
            Self::Rejected(_) => PhotoStatus::Rejected,
        }
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Approved => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

/// Terminal state of one photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    Approved,
    Rejected,
    /// Download or another job-level failure; reason holds the error text
    Failed,
}

/// Moderation result for one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoResult {
    pub media_id: String,
    pub status: PhotoStatus,
    /// Reason code for rejections, error text for failures, null when approved
    pub reason: Option<String>,
    /// Signals behind the decision; `{}` on the wire for failed photos
    #[serde(
        serialize_with = "serialize_scores",
        deserialize_with = "deserialize_scores",
        default
    )]
    pub scores: Option<SignalSet>,
}

impl PhotoResult {
    /// Result for a photo that went through the decision policy.
    pub fn decided(media_id: impl Into<String>, verdict: Verdict, scores: SignalSet) -> Self {
        Self {
            media_id: media_id.into(),
            status: verdict.status(),
            reason: verdict.reason().map(|r| r.as_str().to_string()),
            scores: Some(scores),
        }
    }

    /// Result for a photo that could not be evaluated.
    pub fn failed(media_id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            media_id: media_id.into(),
            status: PhotoStatus::Failed,
            reason: Some(error.to_string()),
            scores: None,
        }
    }
}

fn serialize_scores<S: Serializer>(
    scores: &Option<SignalSet>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match scores {
        Some(set) => set.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

fn deserialize_scores<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SignalSet>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(ref map) if map.is_empty() => Ok(None),
        other => SignalSet::deserialize(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Per-batch counts, always derived from the result list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Reason code → number of rejected photos with that reason
    pub reasons: BTreeMap<String, usize>,
}

impl BatchSummary {
    /// Recompute the summary from a result list.
    pub fn from_results(results: &[PhotoResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.status {
                PhotoStatus::Approved => summary.approved += 1,
                PhotoStatus::Rejected => {
                    summary.rejected += 1;
                    if let Some(reason) = &result.reason {
                        *summary.reasons.entry(reason.clone()).or_insert(0) += 1;
                    }
                }
                PhotoStatus::Failed => {}
            }
        }
        summary
    }

    /// Photos that could not be evaluated.
    pub fn failed(&self) -> usize {
        self.total - self.approved - self.rejected
    }
}

/// The record published once per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub job_id: String,
    pub batch_id: String,
    pub user_id: String,
    pub telegram_id: i64,
    /// One result per photo, in input order
    pub results: Vec<PhotoResult>,
    pub summary: BatchSummary,
    #[serde(with = "utc_seconds")]
    pub processed_at: DateTime<Utc>,
}

impl BatchResult {
    /// Assemble the outbound record; the summary is derived from `results`.
    pub fn new(job: &BatchJob, results: Vec<PhotoResult>, processed_at: DateTime<Utc>) -> Self {
        let summary = BatchSummary::from_results(&results);
        Self {
            job_id: job.job_id.clone(),
            batch_id: job.batch_id.clone(),
            user_id: job.user_id.clone(),
            telegram_id: job.telegram_id,
            results,
            summary,
            processed_at,
        }
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ` timestamps.
mod utc_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signals() -> SignalSet {
        SignalSet {
            blur_variance: 350.5,
            is_blurry: false,
            has_face: true,
            face_count: 1,
            estimated_age: Some(30.0),
            face_source: FaceSource::Primary,
            face_error: None,
            nsfw: NsfwScores::new(0.01, 0.01, 0.01),
            processing_time_ms: 420,
        }
    }

    fn job(photos: usize) -> BatchJob {
        BatchJob {
            job_id: "job-1".into(),
            batch_id: "batch-1".into(),
            user_id: "user-1".into(),
            telegram_id: 42,
            photos: (0..photos)
                .map(|i| PhotoJob {
                    media_id: format!("m{i}"),
                    r2_url: format!("https://r2.example/{i}.jpg"),
                    r2_key: None,
                    bucket: None,
                })
                .collect(),
            created_at: None,
            retry_count: 0,
            priority: 1,
        }
    }

    #[test]
    fn test_batch_job_from_producer_payload() {
        let payload = r#"{
            "job_id": "4f1c", "batch_id": "b-77", "user_id": "u-1", "telegram_id": 123456789,
            "photos": [{"media_id": "m-1", "r2_url": "https://r2/1.jpg", "r2_key": "u/1.jpg", "bucket": "lomi-photos"}],
            "created_at": "2025-03-04T10:11:12.123456+03:00", "retry_count": 0, "priority": 1
        }"#;
        let job = BatchJob::from_payload(payload).unwrap();
        assert_eq!(job.telegram_id, 123456789);
        assert_eq!(job.photos[0].r2_key.as_deref(), Some("u/1.jpg"));
        assert!(job.created_at.is_some());
    }

    #[test]
    fn test_batch_job_minimal_payload_defaults() {
        let payload = r#"{"job_id":"j","batch_id":"b","user_id":"u","telegram_id":1,
            "photos":[{"media_id":"m","r2_url":"https://r2/m.jpg"}]}"#;
        let job = BatchJob::from_payload(payload).unwrap();
        assert_eq!(job.priority, 1);
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn test_batch_job_rejects_empty_and_oversized() {
        assert!(matches!(
            job(0).validate(),
            Err(QueueError::InvalidJob { .. })
        ));
        assert!(job(9).validate().is_ok());
        let err = job(10).validate().unwrap_err();
        assert!(err.to_string().contains("10 photos"));
    }

    #[test]
    fn test_batch_job_malformed_payload() {
        let err = BatchJob::from_payload("{not json").unwrap_err();
        assert!(matches!(err, QueueError::Payload(_)));
    }

    #[test]
    fn test_failed_result_serializes_empty_scores() {
        let result = PhotoResult::failed("m-1", "Download failed for x: HTTP 404");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["scores"], serde_json::json!({}));
        assert_eq!(json["reason"], "Download failed for x: HTTP 404");

        let back: PhotoResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.scores, None);
    }

    #[test]
    fn test_decided_result_wire_shape() {
        let result = PhotoResult::decided("m-1", Verdict::Approved, signals());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "approved");
        assert!(json["reason"].is_null());
        assert_eq!(json["scores"]["face_count"], 1);
        assert_eq!(json["scores"]["face_source"], "primary");
        assert!(json["scores"]["nsfw_scores"]["porn"].is_number());
        assert!(json["scores"].get("face_error").is_none());
    }

    #[test]
    fn test_rejected_result_carries_reason_code() {
        let result = PhotoResult::decided(
            "m-2",
            Verdict::Rejected(RejectReason::NsfwCheckFailed),
            signals(),
        );
        assert_eq!(result.status, PhotoStatus::Rejected);
        assert_eq!(result.reason.as_deref(), Some("nsfw_check_failed"));
    }

    #[test]
    fn test_summary_invariants() {
        let results = vec![
            PhotoResult::decided("a", Verdict::Approved, signals()),
            PhotoResult::decided("b", Verdict::Rejected(RejectReason::Blurry), signals()),
            PhotoResult::decided("c", Verdict::Rejected(RejectReason::Blurry), signals()),
            PhotoResult::decided("d", Verdict::Rejected(RejectReason::Underage), signals()),
            PhotoResult::failed("e", "timeout"),
        ];
        let summary = BatchSummary::from_results(&results);

        assert_eq!(summary.total, results.len());
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.rejected, 3);
        assert_eq!(summary.failed(), 1);
        assert_eq!(
            summary.approved + summary.rejected + summary.failed(),
            summary.total
        );
        assert_eq!(summary.reasons.values().sum::<usize>(), summary.rejected);
        assert_eq!(summary.reasons["blurry"], 2);
        assert!(!summary.reasons.contains_key("timeout"));
    }

    #[test]
    fn test_batch_result_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 5).unwrap();
        let result = BatchResult::new(&job(1), vec![PhotoResult::failed("m0", "x")], at);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["processed_at"], "2025-06-01T08:30:05Z");
        assert_eq!(json["telegram_id"], 42);
        assert_eq!(json["summary"]["total"], 1);

        let back: BatchResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.processed_at, at);
    }

    #[test]
    fn test_signal_set_accepts_nsfw_alias() {
        let json = serde_json::json!({
            "blur_variance": 200.0, "is_blurry": false, "has_face": true, "face_count": 1,
            "estimated_age": null, "nsfw": {"porn": 0.1, "sexy": 0.0, "hentai": 0.0},
            "processing_time_ms": 10
        });
        let set: SignalSet = serde_json::from_value(json).unwrap();
        assert_eq!(set.nsfw.porn, 0.1);
        assert_eq!(set.face_source, FaceSource::Primary);
    }
}
