/*!
 * Pipe Types
 */

use thiserror::Error;

/// Arena id of a pipe control block.
pub type PipeId = u32;

/// Pipe operation result
pub type PipeResult<T> = Result<T, PipeError>;

/// Pipe errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipeError {
    /// The pipe control block no longer exists.
    #[error("Pipe not found: {0}")]
    NotFound(PipeId),

    /// Writing to a pipe whose read endpoint had already closed before the
    /// transfer started.
    #[error("Pipe {0} has no reader")]
    ReaderClosed(PipeId),
}
