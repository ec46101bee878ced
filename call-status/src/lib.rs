pub mod types;
pub mod error_aggregator;
pub mod enricher;
pub mod recheck;
pub mod evaluator;
pub mod settings;
pub mod validation;
pub mod url_resolver;
pub mod store;
pub mod service;

pub use types::*;
pub use error_aggregator::{AggregatedError, BoxError, ErrorAggregator, StatusError, ValidationError};
pub use enricher::ConcurrentEnricher;
pub use recheck::{should_recheck_now, RecheckGate};
pub use evaluator::{CallStateEvaluator, EvaluationInput};
pub use settings::FixedSettings;
pub use url_resolver::{HttpUrlResolver, PrefixUrlResolver};
pub use store::PgCallStore;
pub use service::{CallStatusService, Collaborators};
