#![allow(dead_code)]

// Shared fixtures and in-memory collaborators for the integration tests.
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use call_status::types::{
    AudioArtifact, AudioCategory, CallOutcome, DataPoint, Photo, PhotoOrderUpdate, RecheckAnchor, Role, Settings,
    Transcript, TranscriptStatus, ValidatedAudioArtifact,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use interfaces::defs::{
    ArtifactWriter, AudioArtifactLookup, PhotoLookup, PublicUrlResolver, RecheckAnchorStore, SettingsProvider,
    TranscriptLookup,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

pub const USER_ID: &str = "user-1";

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
}

/// A transcript whose user turns last `user_secs` each, interleaved with
/// long agent turns that must never count towards the user's total.
pub fn transcript(
    id: &str,
    conversation_id: &str,
    status: TranscriptStatus,
    call_outcome: CallOutcome,
    user_secs: &[u32],
    minutes_ago: i64,
) -> Transcript {
    let mut data_points = Vec::new();
    for (turn, secs) in user_secs.iter().enumerate() {
        data_points.push(DataPoint {
            role: Role::Agent,
            message: format!("agent turn {}", turn),
            seconds_in_call: 30,
        });
        data_points.push(DataPoint {
            role: Role::User,
            message: format!("user turn {}", turn),
            seconds_in_call: *secs,
        });
    }

    Transcript {
        id: id.to_string(),
        user_id: USER_ID.to_string(),
        conversation_id: conversation_id.to_string(),
        status,
        call_outcome,
        created_at: base_time() - Duration::minutes(minutes_ago),
        data_points,
    }
}

pub fn successful(id: &str, conversation_id: &str, user_secs: &[u32], minutes_ago: i64) -> Transcript {
    transcript(
        id,
        conversation_id,
        TranscriptStatus::Done,
        CallOutcome::Success,
        user_secs,
        minutes_ago,
    )
}

pub fn in_progress(id: &str, conversation_id: &str, minutes_ago: i64) -> Transcript {
    transcript(
        id,
        conversation_id,
        TranscriptStatus::InProgress,
        CallOutcome::Unknown,
        &[],
        minutes_ago,
    )
}

pub fn audio(id: &str, category: AudioCategory, conversation_id: &str) -> AudioArtifact {
    AudioArtifact {
        id: id.to_string(),
        category,
        user_id: USER_ID.to_string(),
        conversation_id: conversation_id.to_string(),
        storage_path: format!("{}/{}.mp3", USER_ID, id),
        url: String::new(),
    }
}

/// One clip of every category for the conversation.
pub fn full_audio_set(conversation_id: &str) -> Vec<AudioArtifact> {
    AudioCategory::ALL
        .iter()
        .map(|category| {
            audio(
                &format!("{}-{}", conversation_id, category.as_str()),
                *category,
                conversation_id,
            )
        })
        .collect()
}

pub fn photo(id: &str, display_order: i32) -> Photo {
    Photo {
        id: id.to_string(),
        user_id: USER_ID.to_string(),
        storage_path: format!("{}/photos/{}.jpg", USER_ID, id),
        display_order,
        url: String::new(),
    }
}

/// In-memory stand-in for the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    pub transcripts: Mutex<Vec<Transcript>>,
    pub audio: Mutex<Vec<AudioArtifact>>,
    pub photos: Mutex<Vec<Photo>>,
    pub settings: Mutex<Settings>,
    pub anchors: Mutex<HashMap<String, RecheckAnchor>>,
    pub persist_calls: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcripts(self, transcripts: Vec<Transcript>) -> Self {
        *self.transcripts.lock().unwrap() = transcripts;
        self
    }

    pub fn with_audio(self, audio: Vec<AudioArtifact>) -> Self {
        *self.audio.lock().unwrap() = audio;
        self
    }

    pub fn with_photos(self, photos: Vec<Photo>) -> Self {
        *self.photos.lock().unwrap() = photos;
        self
    }

    pub fn with_anchor(self, anchor: RecheckAnchor) -> Self {
        self.anchors.lock().unwrap().insert(USER_ID.to_string(), anchor);
        self
    }

    pub fn anchor(&self) -> Option<RecheckAnchor> {
        self.anchors.lock().unwrap().get(USER_ID).cloned()
    }
}

#[async_trait]
impl TranscriptLookup for MemoryStore {
    async fn transcripts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Transcript>> {
        let mut transcripts: Vec<Transcript> = self
            .transcripts
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        transcripts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transcripts)
    }
}

#[async_trait]
impl AudioArtifactLookup for MemoryStore {
    async fn audio_artifacts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<AudioArtifact>> {
        Ok(self
            .audio
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PhotoLookup for MemoryStore {
    async fn photos_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Photo>> {
        let mut photos: Vec<Photo> = self
            .photos
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        photos.sort_by_key(|p| p.display_order);
        Ok(photos)
    }
}

#[async_trait]
impl SettingsProvider for MemoryStore {
    async fn settings(&self) -> anyhow::Result<Settings> {
        Ok(self.settings.lock().unwrap().clone())
    }
}

#[async_trait]
impl RecheckAnchorStore for MemoryStore {
    async fn load_anchor(&self, user_id: &str) -> anyhow::Result<RecheckAnchor> {
        Ok(self
            .anchors
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn persist_anchor(
        &self,
        user_id: &str,
        checked_at: DateTime<Utc>,
        latest_transcript_id: Option<&str>,
        latest_transcript_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        self.anchors.lock().unwrap().insert(
            user_id.to_string(),
            RecheckAnchor {
                last_checked_at: Some(checked_at),
                latest_transcript_id: latest_transcript_id.map(str::to_string),
                latest_transcript_at,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ArtifactWriter for MemoryStore {
    async fn insert_audio_artifact(&self, artifact: &ValidatedAudioArtifact) -> anyhow::Result<AudioArtifact> {
        let id = format!("audio-{}", self.writes.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = AudioArtifact {
            id,
            category: artifact.category,
            user_id: artifact.user_id.clone(),
            conversation_id: artifact.conversation_id.clone(),
            storage_path: artifact.storage_path.clone(),
            url: String::new(),
        };
        self.audio.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    // Adds the same context as the Postgres store so error rendering matches.
    async fn update_photo_order(&self, user_id: &str, updates: &[PhotoOrderUpdate]) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut photos = self.photos.lock().unwrap();
        for update in updates {
            let photo = photos
                .iter_mut()
                .find(|p| p.id == update.photo_id && p.user_id == user_id)
                .ok_or_else(|| anyhow!("photo {} not found", update.photo_id))
                .with_context(|| format!("update photo order for user {}", user_id))?;
            photo.display_order = update.display_order;
        }
        Ok(())
    }
}

/// Resolver that serves `https://cdn.test/<path>` and fails for chosen paths.
/// Tracks how many lookups ran and how many overlapped.
#[derive(Default)]
pub struct TestResolver {
    failing: HashSet<String>,
    delay_ms: u64,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl TestResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublicUrlResolver for TestResolver {
    async fn public_url(&self, storage_path: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(storage_path) {
            bail!("storage unavailable for {}", storage_path);
        }
        Ok(format!("https://cdn.test/{}", storage_path))
    }
}
