/*!
 * Handle Table
 *
 * Global arena of file-control blocks, shared across processes through
 * refcounts. Each process maps small integer fids onto arena ids through
 * its own fixed-size table; handle inheritance and duplication only ever
 * bump the refcount. The last reference closes the underlying stream.
 */

use crate::core::types::{Fid, Pid};
use crate::ipc::pipe::PipeId;
use crate::ipc::socket::SockId;
use crate::kernel::{Kernel, KernelState};
use log::trace;

/// Arena id of a file-control block.
pub(crate) type FcbId = u64;

/// The stream object behind a handle.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StreamObj {
    /// Read end of a pipe.
    PipeRead(PipeId),
    /// Write end of a pipe.
    PipeWrite(PipeId),
    /// A socket, in whatever shape it currently has.
    Socket(SockId),
    /// Process-info stream; the payload is the scan cursor.
    ProcInfo(Pid),
}

/// One file-control block.
pub(crate) struct Fcb {
    /// Fidt slots (across all processes) referencing this block.
    pub refcount: usize,
    pub stream: StreamObj,
}

/// Reserve one fid slot per stream in `pid`'s table, all or nothing, and
/// allocate a control block (refcount 1) behind each.
pub(crate) fn reserve(
    st: &mut KernelState,
    pid: Pid,
    streams: Vec<StreamObj>,
) -> Option<Vec<Fid>> {
    let slots: Vec<Fid> = {
        let proc = st.procs.get(pid)?;
        let mut found = Vec::with_capacity(streams.len());
        for (i, slot) in proc.fidt.iter().enumerate() {
            if slot.is_none() {
                found.push(i as Fid);
                if found.len() == streams.len() {
                    break;
                }
            }
        }
        if found.len() < streams.len() {
            return None;
        }
        found
    };

    let ids: Vec<FcbId> = streams
        .into_iter()
        .map(|stream| {
            let id = st.alloc_fcb_id();
            st.fcbs.insert(id, Fcb { refcount: 1, stream });
            id
        })
        .collect();

    let proc = st
        .procs
        .get_mut(pid)
        .unwrap_or_else(|| unreachable!("checked above"));
    for (&fid, id) in slots.iter().zip(ids) {
        proc.fidt[fid as usize] = Some(id);
    }
    Some(slots)
}

/// Add one reference to an open control block.
pub(crate) fn incref(st: &mut KernelState, id: FcbId) {
    let fcb = st
        .fcbs
        .get_mut(&id)
        .unwrap_or_else(|| panic!("incref on a freed handle {id}"));
    fcb.refcount += 1;
}

impl Kernel {
    /// Drop one reference; the last one frees the block and closes the
    /// stream behind it.
    pub(crate) fn fcb_decref(&self, st: &mut KernelState, id: FcbId) {
        let last = {
            let fcb = st
                .fcbs
                .get_mut(&id)
                .unwrap_or_else(|| panic!("decref on a freed handle {id}"));
            fcb.refcount -= 1;
            fcb.refcount == 0
        };
        if !last {
            return;
        }

        let fcb = st
            .fcbs
            .remove(&id)
            .unwrap_or_else(|| unreachable!("present above"));
        trace!("handle {} closed", id);
        match fcb.stream {
            StreamObj::PipeRead(pipe) => self.pipe_close_reader(st, pipe),
            StreamObj::PipeWrite(pipe) => self.pipe_close_writer(st, pipe),
            StreamObj::Socket(sock) => self.socket_close(st, sock),
            StreamObj::ProcInfo(_) => {}
        }
    }
}
