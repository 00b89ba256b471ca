/*!
 * Handle Management
 *
 * Per-process fid tables over a refcounted global arena of file-control
 * blocks, and the read/write/close syscalls that dispatch on them.
 */

mod io;
pub(crate) mod table;
mod types;

pub(crate) use table::{incref, reserve, Fcb, FcbId, StreamObj};
pub use types::{HandleError, HandleResult};
