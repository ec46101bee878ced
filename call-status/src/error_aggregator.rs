use std::error::Error as StdError;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Separator placed between member messages when an aggregate is rendered.
pub const MESSAGE_DELIMITER: &str = "; ";

/// Collects independent failures from concurrent workers.
///
/// Every instance owns its lock, so unrelated batches never wait on each
/// other. `Default` gives an empty aggregator that allocates nothing until the
/// first error arrives.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    errors: Mutex<Vec<BoxError>>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<E>(&self, err: E)
    where
        E: Into<BoxError>,
    {
        self.lock().push(err.into());
    }

    pub fn add_message(&self, text: impl Into<String>) {
        self.add(text.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_errors()
    }

    /// Turn the collected errors into one error, `None` when nothing failed.
    pub fn collapse(self) -> Option<AggregatedError> {
        let errors = self.errors.into_inner().unwrap_or_else(PoisonError::into_inner);
        if errors.is_empty() {
            None
        } else {
            Some(AggregatedError { errors })
        }
    }

    /// Collapse and attach a status code for boundary layers.
    pub fn with_status_code(self, status_code: u16) -> Option<StatusError> {
        self.collapse()
            .map(|aggregate| StatusError::new(status_code, aggregate))
    }

    // A worker that panicked mid-push cannot leave the Vec half-written, so
    // recovering the guard from a poisoned lock is sound.
    fn lock(&self) -> MutexGuard<'_, Vec<BoxError>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Several failures reported as one.
///
/// Renders as the member messages joined by [`MESSAGE_DELIMITER`]; with a
/// single member it renders exactly like that member.
#[derive(Debug)]
pub struct AggregatedError {
    errors: Vec<BoxError>,
}

impl AggregatedError {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The lone member error, or the aggregate back if there are several.
    pub fn into_single(mut self) -> Result<BoxError, Self> {
        if self.errors.len() == 1 {
            Ok(self.errors.remove(0))
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(MESSAGE_DELIMITER)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl StdError for AggregatedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.errors.as_slice() {
            [single] => single.source(),
            _ => None,
        }
    }
}

/// An error carrying the status code a boundary layer should answer with.
#[derive(Debug)]
pub struct StatusError {
    status_code: u16,
    source: BoxError,
}

impl StatusError {
    pub fn new<E>(status_code: u16, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            status_code,
            source: err.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Member messages when wrapping an aggregate, otherwise the one message.
    pub fn messages(&self) -> Vec<String> {
        match self.source.downcast_ref::<AggregatedError>() {
            Some(aggregate) => aggregate.messages(),
            None => vec![self.source.to_string()],
        }
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl StdError for StatusError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Rejected user input, kept apart from infrastructure failures so the API
/// layer can answer with field-level messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub details: Vec<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// `None` if the aggregator collected nothing.
    pub fn from_aggregator(message: impl Into<String>, aggregator: ErrorAggregator) -> Option<Self> {
        aggregator
            .collapse()
            .map(|aggregate| Self::new(message).with_details(aggregate.messages()))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.details.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.message, self.details.join(MESSAGE_DELIMITER))
        }
    }
}

impl StdError for ValidationError {}
