use crate::settings::{materialize, SettingRow};
use crate::types::{
    AudioArtifact, AudioCategory, CallStatusError, DataPoint, Photo, PhotoOrderUpdate, RecheckAnchor, Result, Settings,
    Transcript, ValidatedAudioArtifact,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::defs::{
    ArtifactWriter, AudioArtifactLookup, PhotoLookup, RecheckAnchorStore, SettingsProvider, TranscriptLookup,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Postgres-backed implementation of every collaborator the service needs.
///
/// Expects the tables `transcripts`, `audio_artifacts`, `photos`, `settings`
/// and `call_recheck_anchors` to exist; migrations are run elsewhere.
#[derive(Clone)]
pub struct PgCallStore {
    db: Pool<Postgres>,
}

impl PgCallStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { db })
    }

    pub fn from_pool(db: Pool<Postgres>) -> Self {
        Self { db }
    }

    pub async fn get_transcripts(&self, user_id: &str) -> Result<Vec<Transcript>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, conversation_id, status, call_outcome, created_at, data_points
            FROM transcripts
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let transcripts = rows.iter().map(transcript_from_row).collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} transcripts for user {}", transcripts.len(), user_id);
        Ok(transcripts)
    }

    pub async fn get_audio_artifacts(&self, user_id: &str) -> Result<Vec<AudioArtifact>> {
        let rows = sqlx::query(
            r#"
            SELECT id, category, user_id, conversation_id, storage_path
            FROM audio_artifacts
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(audio_artifact_from_row).collect()
    }

    pub async fn get_photos(&self, user_id: &str) -> Result<Vec<Photo>> {
        let rows = sqlx::query(
            "SELECT id, user_id, storage_path, display_order FROM photos WHERE user_id = $1 ORDER BY display_order",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let mut photos = Vec::with_capacity(rows.len());
        for row in rows {
            photos.push(Photo {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                storage_path: row.try_get("storage_path")?,
                display_order: row.try_get("display_order")?,
                url: String::new(),
            });
        }
        Ok(photos)
    }

    pub async fn get_settings(&self) -> Result<Settings> {
        let rows = sqlx::query("SELECT key, kind, value FROM settings")
            .fetch_all(&self.db)
            .await?;

        let mut setting_rows = Vec::with_capacity(rows.len());
        for row in rows {
            setting_rows.push(SettingRow {
                key: row.try_get("key")?,
                kind: row.try_get("kind")?,
                value: row.try_get("value")?,
            });
        }

        Ok(materialize(setting_rows)?)
    }

    pub async fn get_anchor(&self, user_id: &str) -> Result<RecheckAnchor> {
        let row = sqlx::query(
            r#"
            SELECT last_checked_at, latest_transcript_id, latest_transcript_at
            FROM call_recheck_anchors
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(RecheckAnchor {
                last_checked_at: row.try_get::<Option<DateTime<Utc>>, _>("last_checked_at")?,
                latest_transcript_id: row.try_get("latest_transcript_id")?,
                latest_transcript_at: row.try_get::<Option<DateTime<Utc>>, _>("latest_transcript_at")?,
            }),
            None => Ok(RecheckAnchor::default()),
        }
    }

    /// Upsert the anchor inside a transaction. The stored check time never
    /// moves backwards, even if two checks race.
    pub async fn save_anchor(
        &self,
        user_id: &str,
        checked_at: DateTime<Utc>,
        latest_transcript_id: Option<&str>,
        latest_transcript_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO call_recheck_anchors (user_id, last_checked_at, latest_transcript_id, latest_transcript_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                last_checked_at = GREATEST(call_recheck_anchors.last_checked_at, EXCLUDED.last_checked_at),
                latest_transcript_id = EXCLUDED.latest_transcript_id,
                latest_transcript_at = EXCLUDED.latest_transcript_at
            "#,
        )
        .bind(user_id)
        .bind(checked_at)
        .bind(latest_transcript_id)
        .bind(latest_transcript_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!("Stored recheck anchor for user {} at {}", user_id, checked_at);
        Ok(())
    }

    pub async fn add_audio_artifact(&self, artifact: &ValidatedAudioArtifact) -> Result<AudioArtifact> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO audio_artifacts (id, category, user_id, conversation_id, storage_path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&id)
        .bind(artifact.category.as_str())
        .bind(&artifact.user_id)
        .bind(&artifact.conversation_id)
        .bind(&artifact.storage_path)
        .bind(now)
        .execute(&self.db)
        .await?;

        info!(
            "Added {} audio artifact {} for user {}",
            artifact.category, id, artifact.user_id
        );
        Ok(AudioArtifact {
            id,
            category: artifact.category,
            user_id: artifact.user_id.clone(),
            conversation_id: artifact.conversation_id.clone(),
            storage_path: artifact.storage_path.clone(),
            url: String::new(),
        })
    }

    /// Apply all order changes or none of them.
    pub async fn reorder_photos(&self, user_id: &str, updates: &[PhotoOrderUpdate]) -> Result<()> {
        let mut tx = self.db.begin().await?;

        for update in updates {
            let result = sqlx::query("UPDATE photos SET display_order = $1 WHERE id = $2 AND user_id = $3")
                .bind(update.display_order)
                .bind(&update.photo_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(CallStatusError::General(format!(
                    "photo {} not found for user {}",
                    update.photo_id, user_id
                )));
            }
        }

        tx.commit().await?;

        info!("Reordered {} photos for user {}", updates.len(), user_id);
        Ok(())
    }
}

fn transcript_from_row(row: &PgRow) -> Result<Transcript> {
    let data_points: Option<Json<Vec<DataPoint>>> = row.try_get("data_points")?;

    Ok(Transcript {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        conversation_id: row.try_get("conversation_id")?,
        status: parse_column(row, "status")?,
        call_outcome: parse_column(row, "call_outcome")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        data_points: data_points.map(|Json(points)| points).unwrap_or_default(),
    })
}

fn audio_artifact_from_row(row: &PgRow) -> Result<AudioArtifact> {
    Ok(AudioArtifact {
        id: row.try_get("id")?,
        category: parse_column::<AudioCategory>(row, "category")?,
        user_id: row.try_get("user_id")?,
        conversation_id: row.try_get("conversation_id")?,
        storage_path: row.try_get("storage_path")?,
        url: String::new(),
    })
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| {
        CallStatusError::Database(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
}

#[async_trait]
impl TranscriptLookup for PgCallStore {
    async fn transcripts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Transcript>> {
        self.get_transcripts(user_id)
            .await
            .with_context(|| format!("load transcripts for user {}", user_id))
    }
}

#[async_trait]
impl AudioArtifactLookup for PgCallStore {
    async fn audio_artifacts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<AudioArtifact>> {
        self.get_audio_artifacts(user_id)
            .await
            .with_context(|| format!("load audio artifacts for user {}", user_id))
    }
}

#[async_trait]
impl PhotoLookup for PgCallStore {
    async fn photos_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Photo>> {
        self.get_photos(user_id)
            .await
            .with_context(|| format!("load photos for user {}", user_id))
    }
}

#[async_trait]
impl SettingsProvider for PgCallStore {
    async fn settings(&self) -> anyhow::Result<Settings> {
        self.get_settings().await.context("load settings")
    }
}

#[async_trait]
impl RecheckAnchorStore for PgCallStore {
    async fn load_anchor(&self, user_id: &str) -> anyhow::Result<RecheckAnchor> {
        self.get_anchor(user_id)
            .await
            .with_context(|| format!("load recheck anchor for user {}", user_id))
    }

    async fn persist_anchor(
        &self,
        user_id: &str,
        checked_at: DateTime<Utc>,
        latest_transcript_id: Option<&str>,
        latest_transcript_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        self.save_anchor(user_id, checked_at, latest_transcript_id, latest_transcript_at)
            .await
            .with_context(|| format!("persist recheck anchor for user {}", user_id))
    }
}

#[async_trait]
impl ArtifactWriter for PgCallStore {
    async fn insert_audio_artifact(&self, artifact: &ValidatedAudioArtifact) -> anyhow::Result<AudioArtifact> {
        self.add_audio_artifact(artifact)
            .await
            .with_context(|| format!("insert audio artifact for user {}", artifact.user_id))
    }

    async fn update_photo_order(&self, user_id: &str, updates: &[PhotoOrderUpdate]) -> anyhow::Result<()> {
        self.reorder_photos(user_id, updates)
            .await
            .with_context(|| format!("update photo order for user {}", user_id))
    }
}
