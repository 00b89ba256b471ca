/*!
 * Sockets
 *
 * Port-addressed stream sockets: a listener per port, a queued rendezvous
 * between connect and accept, and connected peers backed by a pipe per
 * direction.
 */

mod rendezvous;
pub(crate) mod socket;
mod types;

pub use types::{ReqId, ShutdownMode, SockId, SocketError, SocketResult};
