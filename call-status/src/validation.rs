use crate::error_aggregator::{ErrorAggregator, ValidationError};
use crate::types::{AudioCategory, NewAudioArtifact, PhotoOrderUpdate, ValidatedAudioArtifact};
use std::collections::HashSet;
use url::Url;

const INVALID_AUDIO: &str = "invalid audio artifact";
const INVALID_PHOTO_ORDER: &str = "invalid photo order";

pub fn validate_audio_artifact(new: &NewAudioArtifact) -> Result<ValidatedAudioArtifact, ValidationError> {
    let problems = ErrorAggregator::new();

    require(&problems, "user_id", &new.user_id);
    require(&problems, "conversation_id", &new.conversation_id);
    require(&problems, "storage_path", &new.storage_path);
    if let Some(problem) = storage_path_problem(new.storage_path.trim()) {
        problems.add_message(problem);
    }

    let category = new.category.trim().parse::<AudioCategory>();
    if let Err(err) = &category {
        problems.add_message(err.to_string());
    }

    match (category, ValidationError::from_aggregator(INVALID_AUDIO, problems)) {
        (_, Some(err)) => Err(err),
        (Ok(category), None) => Ok(ValidatedAudioArtifact {
            user_id: new.user_id.trim().to_string(),
            conversation_id: new.conversation_id.trim().to_string(),
            category,
            storage_path: new.storage_path.trim().to_string(),
        }),
        (Err(err), None) => Err(ValidationError::new(INVALID_AUDIO).with_detail(err.to_string())),
    }
}

/// Orders must fall in `0..max_photos` and neither photos nor orders may repeat.
pub fn validate_photo_order(updates: &[PhotoOrderUpdate], max_photos: usize) -> Result<(), ValidationError> {
    if updates.is_empty() {
        return Err(ValidationError::new(INVALID_PHOTO_ORDER).with_detail("at least one photo is required"));
    }

    let problems = ErrorAggregator::new();
    let mut photo_ids = HashSet::new();
    let mut orders = HashSet::new();

    for update in updates {
        if update.photo_id.trim().is_empty() {
            problems.add_message("photo_id is required");
        } else if !photo_ids.insert(update.photo_id.as_str()) {
            problems.add_message(format!("photo {} appears more than once", update.photo_id));
        }

        let in_range = usize::try_from(update.display_order).is_ok_and(|order| order < max_photos);
        if !in_range {
            problems.add_message(format!(
                "photo {}: display order {} is out of range 0..{}",
                update.photo_id, update.display_order, max_photos
            ));
        } else if !orders.insert(update.display_order) {
            problems.add_message(format!("display order {} is used more than once", update.display_order));
        }
    }

    match ValidationError::from_aggregator(INVALID_PHOTO_ORDER, problems) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Storage paths are relative to the public base; anything that could
/// resolve outside it is refused.
pub fn storage_path_problem(path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    if Url::parse(path).is_ok() {
        return Some(format!("storage_path {:?} must be relative, not an absolute URL", path));
    }
    let escapes = path
        .split(['/', '\\'])
        .any(|segment| matches!(segment.to_ascii_lowercase().as_str(), ".." | ".%2e" | "%2e." | "%2e%2e"));
    if escapes {
        return Some(format!("storage_path {:?} must not contain '..' segments", path));
    }
    None
}

fn require(problems: &ErrorAggregator, field: &str, value: &str) {
    if value.trim().is_empty() {
        problems.add_message(format!("{} is required", field));
    }
}
