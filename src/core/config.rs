/*!
 * Kernel Configuration
 * Table sizes and buffer capacities, overridable for tests
 */

use super::limits;
use super::types::Port;

/// Configuration for a [`crate::kernel::Kernel`] instance.
///
/// Defaults mirror the compiled-in limits; tests shrink `pipe_capacity` to
/// exercise flow control without megabytes of traffic.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Size of the process table.
    pub max_processes: usize,
    /// Handle slots per process.
    pub max_fileid: usize,
    /// Highest valid socket port.
    pub max_port: Port,
    /// Capacity of each pipe's circular buffer, in bytes.
    pub pipe_capacity: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: limits::MAX_PROC,
            max_fileid: limits::MAX_FILEID,
            max_port: limits::MAX_PORT,
            pipe_capacity: limits::DEFAULT_PIPE_CAPACITY,
        }
    }
}

impl KernelConfig {
    #[must_use]
    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.max_processes = max;
        self
    }

    #[must_use]
    pub fn with_max_fileid(mut self, max: usize) -> Self {
        self.max_fileid = max;
        self
    }

    #[must_use]
    pub fn with_max_port(mut self, max: Port) -> Self {
        self.max_port = max;
        self
    }

    #[must_use]
    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }
}
