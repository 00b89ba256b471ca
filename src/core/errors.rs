/*!
 * Error Types
 * Unified kernel error with conversions from per-module errors
 */

use thiserror::Error;

pub use crate::handles::HandleError;
pub use crate::ipc::pipe::PipeError;
pub use crate::ipc::socket::SocketError;
pub use crate::process::{ProcessError, ThreadError};

/// Unified error type for operations that cross subsystem boundaries
/// (handle dispatch in particular).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error(transparent)]
    Pipe(#[from] PipeError),

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error(transparent)]
    Handle(#[from] HandleError),
}
