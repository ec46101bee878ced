use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

/// One turn of a voice-agent conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub role: Role,
    pub message: String,
    pub seconds_in_call: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    InProgress,
    Processing,
    Done,
    Failed,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::InProgress => "in_progress",
            TranscriptStatus::Processing => "processing",
            TranscriptStatus::Done => "done",
            TranscriptStatus::Failed => "failed",
        }
    }
}

impl FromStr for TranscriptStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(TranscriptStatus::InProgress),
            "processing" => Ok(TranscriptStatus::Processing),
            "done" => Ok(TranscriptStatus::Done),
            "failed" => Ok(TranscriptStatus::Failed),
            other => Err(ParseEnumError::new("transcript status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Failure,
    Unknown,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Unknown => "unknown",
        }
    }
}

impl FromStr for CallOutcome {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(CallOutcome::Success),
            "failure" => Ok(CallOutcome::Failure),
            "unknown" | "" => Ok(CallOutcome::Unknown),
            other => Err(ParseEnumError::new("call outcome", other)),
        }
    }
}

/// A record of one voice-agent conversation, produced by the call pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub status: TranscriptStatus,
    pub call_outcome: CallOutcome,
    pub created_at: DateTime<Utc>,
    pub data_points: Vec<DataPoint>,
}

/// Tag of an introduction clip recorded during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCategory {
    Exciting,
    Generic,
    Vulnerable,
}

impl AudioCategory {
    pub const ALL: [AudioCategory; 3] = [
        AudioCategory::Exciting,
        AudioCategory::Generic,
        AudioCategory::Vulnerable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCategory::Exciting => "exciting",
            AudioCategory::Generic => "generic",
            AudioCategory::Vulnerable => "vulnerable",
        }
    }
}

impl fmt::Display for AudioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exciting" => Ok(AudioCategory::Exciting),
            "generic" => Ok(AudioCategory::Generic),
            "vulnerable" => Ok(AudioCategory::Vulnerable),
            other => Err(ParseEnumError::new("audio category", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub id: String,
    pub category: AudioCategory,
    pub user_id: String,
    pub conversation_id: String,
    pub storage_path: String,
    /// Empty until the public URL has been resolved.
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub user_id: String,
    pub storage_path: String,
    pub display_order: i32,
    #[serde(default)]
    pub url: String,
}

/// Unchecked input for recording a new audio clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAudioArtifact {
    pub user_id: String,
    pub conversation_id: String,
    pub category: String,
    pub storage_path: String,
}

/// A new audio clip whose fields have passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAudioArtifact {
    pub user_id: String,
    pub conversation_id: String,
    pub category: AudioCategory,
    pub storage_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoOrderUpdate {
    pub photo_id: String,
    pub display_order: i32,
}

/// What the caller last recorded about a user's call status checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecheckAnchor {
    pub last_checked_at: Option<DateTime<Utc>>,
    pub latest_transcript_id: Option<String>,
    pub latest_transcript_at: Option<DateTime<Utc>>,
}

/// Point-in-time snapshot of the tunables used while classifying calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub broken_audio_threshold_secs: u32,
    pub recheck_threshold: Duration,
    pub max_artifacts_per_user: usize,
    pub max_photos_per_user: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broken_audio_threshold_secs: 10,
            recheck_threshold: Duration::seconds(300),
            max_artifacts_per_user: 6,
            max_photos_per_user: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

// Object style note:
// Implementations of these traits are the collaborators of the call status
// core. They are expected to be cheap handles around a pool or client, shared
// behind an `Arc` and called concurrently. None of them should cache data
// across calls; every call reflects the store as it is now.

#[async_trait]
pub trait TranscriptLookup: Send + Sync {
    /// All transcripts of a user, most recent first. A user without
    /// transcripts yields an empty list, not an error.
    async fn transcripts_for_user(&self, user_id: &str) -> Result<Vec<Transcript>>;
}

#[async_trait]
pub trait AudioArtifactLookup: Send + Sync {
    async fn audio_artifacts_for_user(&self, user_id: &str) -> Result<Vec<AudioArtifact>>;
}

#[async_trait]
pub trait PhotoLookup: Send + Sync {
    /// Photos of a user ordered by display order.
    async fn photos_for_user(&self, user_id: &str) -> Result<Vec<Photo>>;
}

#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn settings(&self) -> Result<Settings>;
}

#[async_trait]
pub trait PublicUrlResolver: Send + Sync {
    /// Resolve the public URL for an object stored at `storage_path`.
    async fn public_url(&self, storage_path: &str) -> Result<String>;
}

#[async_trait]
pub trait RecheckAnchorStore: Send + Sync {
    /// The stored anchor, or `RecheckAnchor::default()` if none was recorded.
    async fn load_anchor(&self, user_id: &str) -> Result<RecheckAnchor>;

    async fn persist_anchor(
        &self,
        user_id: &str,
        checked_at: DateTime<Utc>,
        latest_transcript_id: Option<&str>,
        latest_transcript_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    async fn insert_audio_artifact(&self, artifact: &ValidatedAudioArtifact) -> Result<AudioArtifact>;

    async fn update_photo_order(&self, user_id: &str, updates: &[PhotoOrderUpdate]) -> Result<()>;
}
