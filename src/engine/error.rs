use crate::data::error::DataError;
use crate::execution::error::ExecutionError;
use thiserror::Error;

/// All errors generated in the lobster::engine module.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete,

    #[error("Data: {0}")]
    Data(#[from] DataError),

    #[error("Execution: {0}")]
    Execution(#[from] ExecutionError),
}
