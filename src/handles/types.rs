/*!
 * Handle Types
 */

use crate::core::types::Fid;
use thiserror::Error;

/// Handle operation result
pub type HandleResult<T> = Result<T, HandleError>;

/// Handle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// The caller's file-id table has no free slot.
    #[error("No free file-id slots")]
    NoFreeSlots,

    /// The fid is out of range or names no open handle.
    #[error("Bad file id: {0}")]
    BadFid(Fid),

    #[error("File id {0} is not readable")]
    NotReadable(Fid),

    #[error("File id {0} is not writable")]
    NotWritable(Fid),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}
