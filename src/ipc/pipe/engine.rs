/*!
 * Pipe Transfers
 *
 * Blocking read/write over a pipe control block, plus endpoint close. Each
 * sleep releases the kernel lock and each wakeup re-fetches the block by
 * id, so a pipe freed mid-transfer ends the transfer with the progress
 * made so far instead of dangling.
 */

use super::pipe::PipeCb;
use super::types::{PipeError, PipeId};
use crate::core::errors::KernelError;
use crate::core::types::Fid;
use crate::handles::{reserve, HandleError, StreamObj};
use crate::kernel::context::current;
use crate::kernel::{Kernel, KernelState, WaitChannel, WaitClass};
use log::debug;
use parking_lot::MutexGuard;

impl Kernel {
    /// Create a pipe and return `(read_fid, write_fid)` in the caller's
    /// handle table.
    pub fn pipe(&self) -> Result<(Fid, Fid), KernelError> {
        let me = current();
        let mut st = self.lock();

        let pipe = st.alloc_pipe_id();
        st.pipes.insert(pipe, PipeCb::new(self.config.pipe_capacity));

        let streams = vec![StreamObj::PipeRead(pipe), StreamObj::PipeWrite(pipe)];
        match reserve(&mut st, me.pid, streams) {
            Some(fids) => {
                debug!("pipe {} created by process {}", pipe, me.pid);
                Ok((fids[0], fids[1]))
            }
            None => {
                st.pipes.remove(&pipe);
                Err(HandleError::NoFreeSlots.into())
            }
        }
    }

    /// Read into `buf`, blocking until it is full or the write endpoint
    /// closes. Returns the bytes read; 0 with an open writer never happens
    /// for a non-empty `buf`, so 0 means end of stream.
    pub(crate) fn pipe_read<'a>(
        &'a self,
        mut st: MutexGuard<'a, KernelState>,
        pipe: PipeId,
        buf: &mut [u8],
    ) -> Result<usize, PipeError> {
        if !st.pipes.contains_key(&pipe) {
            return Err(PipeError::NotFound(pipe));
        }

        let mut read = 0;
        loop {
            let Some(cb) = st.pipes.get_mut(&pipe) else {
                break;
            };
            read += cb.pop(&mut buf[read..]);
            if read == buf.len() {
                break;
            }
            // Everything buffered has been drained.
            debug_assert!(cb.is_empty());
            if !cb.writer_open {
                break;
            }
            // Writer still open: hand it the space and wait for more.
            self.wait.broadcast(WaitChannel::PipeSpace(pipe));
            self.sleep_on(st, WaitChannel::PipeData(pipe), WaitClass::Pipe, None);
            st = self.lock();
        }

        self.wait.broadcast(WaitChannel::PipeSpace(pipe));
        Ok(read)
    }

    /// Write `buf`, blocking while the ring is full. Fails if the read
    /// endpoint is already gone when the transfer starts; if it closes
    /// mid-transfer the bytes accepted so far are returned instead, so a
    /// short count is the writer's end-of-stream signal.
    pub(crate) fn pipe_write<'a>(
        &'a self,
        mut st: MutexGuard<'a, KernelState>,
        pipe: PipeId,
        buf: &[u8],
    ) -> Result<usize, PipeError> {
        {
            let cb = st.pipes.get(&pipe).ok_or(PipeError::NotFound(pipe))?;
            if !cb.reader_open {
                return Err(PipeError::ReaderClosed(pipe));
            }
        }

        let mut written = 0;
        loop {
            let Some(cb) = st.pipes.get_mut(&pipe) else {
                break;
            };
            if !cb.reader_open {
                break;
            }
            written += cb.push(&buf[written..]);
            if written == buf.len() {
                break;
            }
            debug_assert!(cb.occupied() > 0);
            self.wait.broadcast(WaitChannel::PipeData(pipe));
            self.sleep_on(st, WaitChannel::PipeSpace(pipe), WaitClass::Pipe, None);
            st = self.lock();
        }

        self.wait.broadcast(WaitChannel::PipeData(pipe));
        Ok(written)
    }

    /// Close the read endpoint. The second endpoint to close frees the
    /// block; otherwise blocked writers are woken to observe the closure.
    pub(crate) fn pipe_close_reader(&self, st: &mut KernelState, pipe: PipeId) {
        let Some(cb) = st.pipes.get_mut(&pipe) else {
            return;
        };
        cb.reader_open = false;
        if cb.writer_open {
            self.wait.broadcast(WaitChannel::PipeSpace(pipe));
        } else {
            st.pipes.remove(&pipe);
            debug!("pipe {} freed", pipe);
        }
    }

    /// Close the write endpoint; the counterpart of `pipe_close_reader`.
    pub(crate) fn pipe_close_writer(&self, st: &mut KernelState, pipe: PipeId) {
        let Some(cb) = st.pipes.get_mut(&pipe) else {
            return;
        };
        cb.writer_open = false;
        if cb.reader_open {
            self.wait.broadcast(WaitChannel::PipeData(pipe));
        } else {
            st.pipes.remove(&pipe);
            debug!("pipe {} freed", pipe);
        }
    }
}
