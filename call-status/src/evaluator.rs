use crate::types::{
    AudioArtifact, AudioCategory, CallOutcome, CallState, ClassificationResult, Role, Settings, Transcript,
    TranscriptStatus,
};
use std::collections::HashSet;

/// Every onboarding call has to leave one clip of each of these behind.
pub const REQUIRED_CATEGORIES: [AudioCategory; 3] = AudioCategory::ALL;

/// Everything the evaluator looks at for one user.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    /// Ordered most recent first.
    pub transcripts: &'a [Transcript],
    pub audio_artifacts: &'a [AudioArtifact],
    /// Head transcript id the caller recorded at its last check.
    pub last_known_transcript_id: Option<&'a str>,
    /// The recheck gate's decision for this pass.
    pub recheck_exceeded: bool,
}

/// Reconciles transcripts and audio clips into a single call state.
///
/// Rules, first match wins:
/// 1. a successful, non-broken transcript exists: `Successful`
/// 2. the store moved past the transcript the caller last saw: `Failed`
/// 3. the recheck threshold has been exceeded after at least one attempt: `Retry`
/// 4. otherwise: `WaitForSuccess`
#[derive(Debug, Clone, Copy)]
pub struct CallStateEvaluator {
    broken_audio_threshold_secs: u32,
}

impl CallStateEvaluator {
    pub fn new(broken_audio_threshold_secs: u32) -> Self {
        Self {
            broken_audio_threshold_secs,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.broken_audio_threshold_secs)
    }

    pub fn evaluate(&self, input: &EvaluationInput<'_>) -> ClassificationResult {
        let anchor = self.successful_transcript(input.transcripts);
        let has_broken_audio = input
            .transcripts
            .iter()
            .find(|t| is_completed_success(t))
            .is_some_and(|t| self.is_broken(t));
        let failed = call_failed(input.transcripts, input.last_known_transcript_id);
        let has_completed_artifact_set =
            anchor.is_some_and(|a| has_completed_artifact_set(a, input.audio_artifacts));

        let call_state = match anchor {
            Some(_) => CallState::Successful,
            _ if failed => CallState::Failed,
            _ if input.recheck_exceeded && !input.transcripts.is_empty() => CallState::Retry,
            _ => CallState::WaitForSuccess,
        };

        ClassificationResult {
            call_state,
            has_completed_artifact_set,
            has_successful_transcript: anchor.is_some(),
            has_broken_audio,
            anchor_transcript_id: anchor.map(|a| a.id.clone()),
        }
    }

    /// The most recent transcript that finished successfully with usable audio.
    pub fn successful_transcript<'t>(&self, transcripts: &'t [Transcript]) -> Option<&'t Transcript> {
        transcripts
            .iter()
            .find(|t| is_completed_success(t) && !self.is_broken(t))
    }

    /// A transcript is broken when the user spoke for less than the threshold.
    /// Transcripts without data points are never broken: their turns may
    /// still be arriving.
    pub fn is_broken(&self, transcript: &Transcript) -> bool {
        if transcript.data_points.is_empty() {
            return false;
        }
        user_seconds(transcript) < u64::from(self.broken_audio_threshold_secs)
    }
}

pub fn user_seconds(transcript: &Transcript) -> u64 {
    transcript
        .data_points
        .iter()
        .filter(|p| p.role == Role::User)
        .map(|p| u64::from(p.seconds_in_call))
        .sum()
}

fn is_completed_success(transcript: &Transcript) -> bool {
    transcript.status == TranscriptStatus::Done && transcript.call_outcome == CallOutcome::Success
}

/// True when the caller has seen a transcript and the store's head is a different one.
pub fn call_failed(transcripts: &[Transcript], last_known_transcript_id: Option<&str>) -> bool {
    match (last_known_transcript_id, transcripts.first()) {
        (Some(known), Some(head)) => known != head.id,
        _ => false,
    }
}

/// Whether every required clip exists for the anchor's conversation.
pub fn has_completed_artifact_set(anchor: &Transcript, audio_artifacts: &[AudioArtifact]) -> bool {
    let present: HashSet<AudioCategory> = audio_artifacts
        .iter()
        .filter(|a| a.conversation_id == anchor.conversation_id)
        .map(|a| a.category)
        .collect();

    REQUIRED_CATEGORIES.iter().all(|c| present.contains(c))
}
