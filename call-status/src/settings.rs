use crate::error_aggregator::{ErrorAggregator, ValidationError};
use crate::types::Settings;
use async_trait::async_trait;
use chrono::Duration;
use interfaces::defs::SettingsProvider;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Integer,
    Seconds,
    Flag,
    Text,
}

impl SettingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKind::Integer => "integer",
            SettingKind::Seconds => "seconds",
            SettingKind::Flag => "flag",
            SettingKind::Text => "text",
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(SettingKind::Integer),
            "seconds" => Ok(SettingKind::Seconds),
            "flag" => Ok(SettingKind::Flag),
            "text" => Ok(SettingKind::Text),
            other => Err(format!("unknown setting kind {:?}", other)),
        }
    }
}

/// A stored setting value, tagged with the kind it was stored as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Integer(i64),
    Seconds(Duration),
    Flag(bool),
    Text(String),
}

impl SettingValue {
    pub fn parse(kind: &str, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match kind.parse::<SettingKind>()? {
            SettingKind::Integer => raw
                .parse::<i64>()
                .map(SettingValue::Integer)
                .map_err(|_| format!("{:?} is not an integer", raw)),
            SettingKind::Seconds => match raw.parse::<i64>() {
                Ok(secs) if secs >= 0 => Ok(SettingValue::Seconds(Duration::seconds(secs))),
                _ => Err(format!("{:?} is not a number of seconds", raw)),
            },
            SettingKind::Flag => match raw {
                "true" | "1" => Ok(SettingValue::Flag(true)),
                "false" | "0" => Ok(SettingValue::Flag(false)),
                _ => Err(format!("{:?} is not a flag", raw)),
            },
            SettingKind::Text => Ok(SettingValue::Text(raw.to_string())),
        }
    }

    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Integer(_) => SettingKind::Integer,
            SettingValue::Seconds(_) => SettingKind::Seconds,
            SettingValue::Flag(_) => SettingKind::Flag,
            SettingValue::Text(_) => SettingKind::Text,
        }
    }
}

/// Settings this crate reads. Other keys in the table belong to other services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    BrokenAudioThresholdSecs,
    RecheckThreshold,
    MaxArtifactsPerUser,
    MaxPhotosPerUser,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::BrokenAudioThresholdSecs => "broken_audio_threshold_secs",
            SettingKey::RecheckThreshold => "recheck_threshold",
            SettingKey::MaxArtifactsPerUser => "max_artifacts_per_user",
            SettingKey::MaxPhotosPerUser => "max_photos_per_user",
        }
    }

    pub fn expected_kind(&self) -> SettingKind {
        match self {
            SettingKey::RecheckThreshold => SettingKind::Seconds,
            _ => SettingKind::Integer,
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broken_audio_threshold_secs" => Ok(SettingKey::BrokenAudioThresholdSecs),
            "recheck_threshold" => Ok(SettingKey::RecheckThreshold),
            "max_artifacts_per_user" => Ok(SettingKey::MaxArtifactsPerUser),
            "max_photos_per_user" => Ok(SettingKey::MaxPhotosPerUser),
            _ => Err(()),
        }
    }
}

/// One row of the settings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingRow {
    pub key: String,
    pub kind: String,
    pub value: String,
}

impl SettingRow {
    pub fn new(key: &str, kind: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }
}

/// Build a settings snapshot from stored rows.
///
/// Missing keys keep their defaults and unknown keys are ignored. Every bad
/// row is reported, not just the first one.
pub fn materialize<I>(rows: I) -> Result<Settings, ValidationError>
where
    I: IntoIterator<Item = SettingRow>,
{
    let mut settings = Settings::default();
    let problems = ErrorAggregator::new();

    for row in rows {
        let Ok(key) = row.key.parse::<SettingKey>() else {
            continue;
        };
        let applied = SettingValue::parse(&row.kind, &row.value)
            .and_then(|value| apply(&mut settings, key, value));
        if let Err(reason) = applied {
            problems.add_message(format!("{}: {}", key, reason));
        }
    }

    match ValidationError::from_aggregator("invalid settings", problems) {
        Some(err) => Err(err),
        None => Ok(settings),
    }
}

fn apply(settings: &mut Settings, key: SettingKey, value: SettingValue) -> Result<(), String> {
    match (key, value) {
        (SettingKey::BrokenAudioThresholdSecs, SettingValue::Integer(n)) => {
            settings.broken_audio_threshold_secs = u32::try_from(n).map_err(|_| format!("{} is out of range", n))?;
        }
        (SettingKey::RecheckThreshold, SettingValue::Seconds(threshold)) => {
            settings.recheck_threshold = threshold;
        }
        (SettingKey::MaxArtifactsPerUser, SettingValue::Integer(n)) => {
            settings.max_artifacts_per_user = positive(n)?;
        }
        (SettingKey::MaxPhotosPerUser, SettingValue::Integer(n)) => {
            settings.max_photos_per_user = positive(n)?;
        }
        (key, value) => {
            return Err(format!("expected {} value, got {}", key.expected_kind(), value.kind()));
        }
    }
    Ok(())
}

fn positive(n: i64) -> Result<usize, String> {
    match usize::try_from(n) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(format!("{} must be a positive number", n)),
    }
}

/// Settings provider that always hands out the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct FixedSettings(pub Settings);

#[async_trait]
impl SettingsProvider for FixedSettings {
    async fn settings(&self) -> anyhow::Result<Settings> {
        Ok(self.0.clone())
    }
}
