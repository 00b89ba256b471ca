/*!
 * Socket Types
 */

use crate::core::types::{Fid, Port};
use thiserror::Error;

/// Arena id of a socket control block.
pub type SockId = u64;

/// Arena id of a connection request.
pub type ReqId = u64;

/// Which direction(s) of a connected socket to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    Read,
    Write,
    Both,
}

/// Socket operation result
pub type SocketResult<T> = Result<T, SocketError>;

/// Socket errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// The port is out of range, or `NOPORT` where a real port is needed.
    #[error("Invalid port: {0}")]
    InvalidPort(Port),

    /// The fid is open but does not name a socket.
    #[error("File id {0} is not a socket")]
    NotSocket(Fid),

    /// The socket is in the wrong shape for the operation (e.g. listening
    /// on an already-connected socket).
    #[error("Operation not valid for the socket's current shape")]
    WrongShape,

    /// Another listener already holds the port.
    #[error("Port {0} is already bound")]
    PortBusy(Port),

    /// No listener is registered on the port.
    #[error("No listener on port {0}")]
    NoListener(Port),

    /// The listener refused the connection or closed before admitting it.
    #[error("Connection refused")]
    ConnectionRefused,

    /// The connection was not admitted within the caller's deadline.
    #[error("Connection timed out")]
    Timeout,

    /// I/O or shutdown on a socket with no live connection in that
    /// direction.
    #[error("Socket is not connected")]
    NotConnected,

    /// The socket was closed out from under a blocked operation.
    #[error("Socket closed during operation")]
    Closed,
}
