/*!
 * Process-Info Stream
 *
 * Read-only snapshot stream over the process table. Each read yields one
 * serialized [`ProcessInfo`] record; the stream's cursor lives in the
 * handle, so independently opened streams do not interfere.
 */

use super::types::ProcessInfo;
use crate::core::types::Pid;
use crate::handles::{FcbId, HandleError, StreamObj};
use crate::kernel::{Kernel, KernelState};

/// Serialize the next allocated record at or after the handle's cursor and
/// advance it. An empty result means the table is exhausted.
pub(crate) fn read_next(st: &mut KernelState, id: FcbId) -> Result<Vec<u8>, HandleError> {
    let cursor = {
        let fcb = st
            .fcbs
            .get(&id)
            .unwrap_or_else(|| panic!("handle {id} vanished while open"));
        match fcb.stream {
            StreamObj::ProcInfo(cursor) => cursor,
            _ => unreachable!("process-info read on a non-info stream"),
        }
    };

    let max = st.procs.capacity() as Pid;
    let mut pid = cursor;
    while pid < max {
        if let Some(proc) = st.procs.get(pid) {
            let record = snapshot(pid, proc).truncate_args();
            let bytes = bincode::serialize(&record).map_err(|e| {
                HandleError::Serialization(e.to_string())
            })?;
            set_cursor(st, id, pid + 1);
            return Ok(bytes);
        }
        pid += 1;
    }

    set_cursor(st, id, max);
    Ok(Vec::new())
}

fn set_cursor(st: &mut KernelState, id: FcbId, cursor: Pid) {
    let fcb = st
        .fcbs
        .get_mut(&id)
        .unwrap_or_else(|| panic!("handle {id} vanished while open"));
    fcb.stream = StreamObj::ProcInfo(cursor);
}

fn snapshot(pid: Pid, proc: &crate::process::table::Process) -> ProcessInfo {
    ProcessInfo {
        pid,
        ppid: proc.parent,
        alive: proc.state == super::types::ProcessState::Alive,
        thread_count: proc.thread_count,
        args: proc.args.clone(),
    }
}

impl Kernel {
    /// Snapshot of one process record, if allocated.
    pub fn process_info(&self, pid: Pid) -> Option<ProcessInfo> {
        let st = self.lock();
        st.procs
            .get(pid)
            .map(|proc| snapshot(pid, proc).truncate_args())
    }
}
