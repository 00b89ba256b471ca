/*!
 * Pipes
 *
 * Bounded unidirectional byte streams with blocking flow control.
 */

mod engine;
pub(crate) mod pipe;
mod types;

pub use types::{PipeError, PipeId, PipeResult};
