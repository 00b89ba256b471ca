/*!
 * Pipe Control Block
 *
 * A bounded byte ring with one open/closed marker per endpoint. The block
 * stays in the arena until both endpoints have closed.
 */

use ringbuf::{traits::*, HeapRb};

pub(crate) struct PipeCb {
    buf: HeapRb<u8>,
    /// The read endpoint has not closed yet.
    pub reader_open: bool,
    /// The write endpoint has not closed yet.
    pub writer_open: bool,
}

impl PipeCb {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: HeapRb::new(capacity),
            reader_open: true,
            writer_open: true,
        }
    }

    /// Append as much of `data` as fits; returns the bytes accepted.
    pub fn push(&mut self, data: &[u8]) -> usize {
        self.buf.push_slice(data)
    }

    /// Drain up to `out.len()` buffered bytes; returns the bytes copied.
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        self.buf.pop_slice(out)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn occupied(&self) -> usize {
        self.buf.occupied_len()
    }
}
