use crate::enricher::ConcurrentEnricher;
use crate::evaluator::{CallStateEvaluator, EvaluationInput};
use crate::recheck::RecheckGate;
use crate::types::{
    AudioArtifact, CallStatusReport, Enriched, NewAudioArtifact, Photo, PhotoOrderUpdate, RecheckState, Result,
};
use crate::validation::{validate_audio_artifact, validate_photo_order};
use chrono::{DateTime, Utc};
use interfaces::defs::{
    ArtifactWriter, AudioArtifactLookup, PhotoLookup, PublicUrlResolver, RecheckAnchorStore, SettingsProvider,
    TranscriptLookup,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The collaborators a `CallStatusService` is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub transcripts: Arc<dyn TranscriptLookup>,
    pub audio: Arc<dyn AudioArtifactLookup>,
    pub photos: Arc<dyn PhotoLookup>,
    pub settings: Arc<dyn SettingsProvider>,
    pub anchors: Arc<dyn RecheckAnchorStore>,
    pub writer: Arc<dyn ArtifactWriter>,
    pub resolver: Arc<dyn PublicUrlResolver>,
}

impl Collaborators {
    /// Use one store for every lookup and write, plus a URL resolver.
    pub fn from_store<S>(store: Arc<S>, resolver: Arc<dyn PublicUrlResolver>) -> Self
    where
        S: TranscriptLookup
            + AudioArtifactLookup
            + PhotoLookup
            + SettingsProvider
            + RecheckAnchorStore
            + ArtifactWriter
            + 'static,
    {
        Self {
            transcripts: store.clone(),
            audio: store.clone(),
            photos: store.clone(),
            settings: store.clone(),
            anchors: store.clone(),
            writer: store,
            resolver,
        }
    }
}

/// Orchestrates call status checks and artifact listings for single users.
pub struct CallStatusService {
    deps: Collaborators,
}

impl CallStatusService {
    pub fn new(deps: Collaborators) -> Self {
        Self { deps }
    }

    /// Classify the user's latest call.
    ///
    /// The recheck gate is consulted once; the same decision feeds the
    /// evaluator and decides whether a new anchor is stored.
    pub async fn check_call_status(&self, user_id: &str, now: DateTime<Utc>) -> Result<CallStatusReport> {
        let settings = self.deps.settings.settings().await?;
        let anchor = self.deps.anchors.load_anchor(user_id).await?;
        let transcripts = self.deps.transcripts.transcripts_for_user(user_id).await?;
        let audio_artifacts = self.deps.audio.audio_artifacts_for_user(user_id).await?;

        debug!(
            "Checking call status for user {}: {} transcripts, {} audio artifacts",
            user_id,
            transcripts.len(),
            audio_artifacts.len()
        );

        let gate = RecheckGate::new(settings.recheck_threshold);
        let mut state = RecheckState::new(anchor.last_checked_at);
        let rechecked = gate.check(&mut state, now);

        let classification = CallStateEvaluator::from_settings(&settings).evaluate(&EvaluationInput {
            transcripts: &transcripts,
            audio_artifacts: &audio_artifacts,
            last_known_transcript_id: anchor.latest_transcript_id.as_deref(),
            recheck_exceeded: rechecked,
        });

        if rechecked {
            let head = transcripts.first();
            self.deps
                .anchors
                .persist_anchor(
                    user_id,
                    now,
                    head.map(|t| t.id.as_str()),
                    head.map(|t| t.created_at),
                )
                .await?;
        }

        info!(
            "Call status for user {}: {} (rechecked: {})",
            user_id, classification.call_state, rechecked
        );

        Ok(CallStatusReport {
            user_id: user_id.to_string(),
            classification,
            rechecked,
            last_checked_at: state.last_checked_at,
        })
    }

    /// Audio clips of the user with public URLs filled in where they resolved.
    pub async fn audio_artifacts(&self, user_id: &str) -> Result<Enriched<AudioArtifact>> {
        let settings = self.deps.settings.settings().await?;
        let mut items = self.deps.audio.audio_artifacts_for_user(user_id).await?;

        let enricher = ConcurrentEnricher::new(settings.max_artifacts_per_user);
        let error = enricher
            .enrich_audio_urls(&mut items, self.deps.resolver.as_ref())
            .await
            .err();

        if let Some(err) = &error {
            warn!("Failed to resolve {} audio URLs for user {}: {}", err.len(), user_id, err);
        }

        Ok(Enriched { items, error })
    }

    /// Photos of the user in display order with public URLs filled in where they resolved.
    pub async fn photos(&self, user_id: &str) -> Result<Enriched<Photo>> {
        let settings = self.deps.settings.settings().await?;
        let mut items = self.deps.photos.photos_for_user(user_id).await?;

        let enricher = ConcurrentEnricher::new(settings.max_photos_per_user);
        let error = enricher
            .enrich_photo_urls(&mut items, self.deps.resolver.as_ref())
            .await
            .err();

        if let Some(err) = &error {
            warn!("Failed to resolve {} photo URLs for user {}: {}", err.len(), user_id, err);
        }

        Ok(Enriched { items, error })
    }

    /// Record a new audio clip. Invalid input is rejected before anything is written.
    pub async fn add_audio_artifact(&self, new: &NewAudioArtifact) -> Result<AudioArtifact> {
        let validated = validate_audio_artifact(new)?;
        let artifact = self.deps.writer.insert_audio_artifact(&validated).await?;
        Ok(artifact)
    }

    pub async fn reorder_photos(&self, user_id: &str, updates: &[PhotoOrderUpdate]) -> Result<()> {
        let settings = self.deps.settings.settings().await?;
        validate_photo_order(updates, settings.max_photos_per_user)?;
        self.deps.writer.update_photo_order(user_id, updates).await?;
        Ok(())
    }
}
