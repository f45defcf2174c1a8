pub mod config;
pub mod context;
pub mod error;
pub mod pending;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::SequenceConfig;
    pub use crate::context::{InlineContext, TokioContext, WorkerContext};
    pub use crate::error::{ChainFailure, ExecutionError, Result, StepFailure, StepwiseError};
    pub use crate::pending::{PendingResult, Resolver};
}
