/*!
 * System Limits and Constants
 *
 * Centralized location for all system-wide limits and defaults.
 */

use super::types::Port;

/// Default size of the process table. Record 0 is the idle process and
/// record 1 is the init process; both are parentless.
pub const MAX_PROC: usize = 4096;

/// Default number of handle slots per process.
pub const MAX_FILEID: usize = 16;

/// Default highest valid socket port. Port 0 is `NOPORT`.
pub const MAX_PORT: Port = 1023;

/// Default capacity of a pipe's circular buffer, in bytes.
pub const DEFAULT_PIPE_CAPACITY: usize = 16 * 1024;

/// Maximum number of argument bytes copied into a process-info record.
pub const PROCINFO_MAX_ARGS: usize = 128;
