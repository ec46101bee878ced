mod common;

use call_status::error_aggregator::MESSAGE_DELIMITER;
use call_status::{ErrorAggregator, ValidationError};
use common::init_tracing;
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use tracing::info;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_keep_every_error() {
    init_tracing();

    let aggregator = Arc::new(ErrorAggregator::new());
    let mut handles = Vec::new();
    for i in 0..100 {
        let aggregator = aggregator.clone();
        handles.push(tokio::spawn(async move {
            aggregator.add_message(format!("worker {} failed", i));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(aggregator.has_errors());
    assert_eq!(aggregator.len(), 100);

    let aggregator = Arc::try_unwrap(aggregator).unwrap();
    let collapsed = aggregator.collapse().unwrap();
    info!("Collected {} errors", collapsed.len());

    let messages: HashSet<String> = collapsed.messages().into_iter().collect();
    let expected: HashSet<String> = (0..100).map(|i| format!("worker {} failed", i)).collect();
    assert_eq!(messages, expected);
}

#[test]
fn test_empty_aggregator_collapses_to_none() {
    let aggregator = ErrorAggregator::default();
    assert!(!aggregator.has_errors());
    assert!(aggregator.is_empty());
    assert!(aggregator.collapse().is_none());

    assert!(ErrorAggregator::new().with_status_code(500).is_none());
}

#[test]
fn test_single_error_renders_like_itself() {
    let aggregator = ErrorAggregator::new();
    aggregator.add(io::Error::new(io::ErrorKind::NotFound, "clip missing"));

    let collapsed = aggregator.collapse().unwrap();
    assert_eq!(collapsed.to_string(), "clip missing");

    let single = collapsed.into_single().unwrap();
    let io_err = single.downcast_ref::<io::Error>().unwrap();
    assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
}

#[test]
fn test_multiple_errors_join_in_order() {
    let aggregator = ErrorAggregator::new();
    aggregator.add_message("first");
    aggregator.add_message("second");
    aggregator.add_message("third");

    let collapsed = aggregator.collapse().unwrap();
    assert_eq!(collapsed.len(), 3);
    assert_eq!(
        collapsed.to_string(),
        ["first", "second", "third"].join(MESSAGE_DELIMITER)
    );
    assert!(collapsed.into_single().is_err());
}

#[test]
fn test_status_code_wraps_aggregate() {
    let aggregator = ErrorAggregator::new();
    aggregator.add_message("photo p1 not found");
    aggregator.add_message("photo p2 not found");

    let err = aggregator.with_status_code(404).unwrap();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.messages(), vec!["photo p1 not found", "photo p2 not found"]);
    assert_eq!(err.to_string(), "photo p1 not found; photo p2 not found");
}

#[test]
fn test_validation_error_from_aggregator() {
    assert!(ValidationError::from_aggregator("invalid input", ErrorAggregator::new()).is_none());

    let problems = ErrorAggregator::new();
    problems.add_message("user_id is required");
    problems.add_message("unknown audio category: \"boring\"");

    let err = ValidationError::from_aggregator("invalid audio artifact", problems).unwrap();
    assert_eq!(err.message, "invalid audio artifact");
    assert_eq!(err.details.len(), 2);
    assert_eq!(
        err.to_string(),
        "invalid audio artifact: user_id is required; unknown audio category: \"boring\""
    );
}

#[test]
fn test_validation_error_without_details() {
    let err = ValidationError::new("invalid photo order");
    assert_eq!(err.to_string(), "invalid photo order");
}
