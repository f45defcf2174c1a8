use thiserror::Error;

/// Top-level error type for the Stepwise library.
#[derive(Debug, Error)]
pub enum StepwiseError {
    #[error("Step error: {0}")]
    Step(#[from] StepFailure),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainFailure),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("{0}")]
    Other(String),
}

/// A queued call failed and the rest of its sequence was abandoned.
#[derive(Debug, Error)]
#[error("call #{index} ('{name}') failed, {skipped} skipped: {source}")]
pub struct StepFailure {
    /// Zero-based position of the failing call in its queue.
    pub index: usize,
    pub name: String,
    /// Number of queued calls that were never dispatched.
    pub skipped: usize,
    pub source: Box<StepwiseError>,
}

/// A continuation attached with `chain_function` failed.
#[derive(Debug, Error)]
#[error("continuation failed: {source}")]
pub struct ChainFailure {
    pub source: Box<StepwiseError>,
    /// Failure of the primary result, if it had failed before the continuation ran.
    pub primary: Option<Box<StepwiseError>>,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("resolver dropped before resolving")]
    Dropped,

    #[error("outcome already consumed")]
    Consumed,

    #[error("no async runtime available: {0}")]
    NoRuntime(String),
}

impl ExecutionError {
    /// Build a `Panicked` error from a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

pub type Result<T> = std::result::Result<T, StepwiseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failure_display() {
        let err = StepFailure {
            index: 2,
            name: "flush".into(),
            skipped: 1,
            source: Box::new(StepwiseError::Other("disk full".into())),
        };
        assert_eq!(err.to_string(), "call #2 ('flush') failed, 1 skipped: disk full");
    }

    #[test]
    fn chain_failure_display() {
        let err = ChainFailure {
            source: Box::new(StepwiseError::Other("cleanup".into())),
            primary: None,
        };
        assert_eq!(err.to_string(), "continuation failed: cleanup");
    }

    #[test]
    fn execution_error_display() {
        assert_eq!(
            ExecutionError::Dropped.to_string(),
            "resolver dropped before resolving"
        );
        assert_eq!(
            ExecutionError::Panicked("boom".into()).to_string(),
            "worker panicked: boom"
        );
    }

    #[test]
    fn stepwise_error_from_execution_error() {
        let err: StepwiseError = ExecutionError::Consumed.into();
        assert!(matches!(err, StepwiseError::Execution(ExecutionError::Consumed)));
        assert!(err.to_string().contains("already consumed"));
    }

    #[test]
    fn stepwise_error_from_serde() {
        let serde_err = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let err: StepwiseError = serde_err.into();
        assert!(matches!(err, StepwiseError::Serialization(_)));
    }

    #[test]
    fn panic_payload_str() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static message");
        let err = ExecutionError::from_panic(payload);
        assert!(matches!(err, ExecutionError::Panicked(ref m) if m == "static message"));
    }

    #[test]
    fn panic_payload_string() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let err = ExecutionError::from_panic(payload);
        assert!(matches!(err, ExecutionError::Panicked(ref m) if m == "owned"));
    }

    #[test]
    fn panic_payload_other() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        let err = ExecutionError::from_panic(payload);
        assert!(err.to_string().contains("non-string"));
    }
}
