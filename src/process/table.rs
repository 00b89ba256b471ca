/*!
 * Process Table
 *
 * Fixed-size arena of process records with a LIFO free-list. A fresh table
 * hands out ids in ascending order, so the idle and init processes land on
 * ids 0 and 1.
 */

use super::thread::ThreadRecord;
use super::types::ProcessState;
use crate::core::types::{ExitCode, Map, Pid, Task, Tid};
use crate::handles::FcbId;
use std::collections::VecDeque;

/// One process-control record.
pub(crate) struct Process {
    pub state: ProcessState,
    /// Non-owning back-reference; `None` for the idle and init processes.
    pub parent: Option<Pid>,
    /// Every unharvested child, alive or zombie. Back-references only.
    pub children: Vec<Pid>,
    /// Exited-but-unharvested children; most recently exited at the front.
    pub exited: VecDeque<Pid>,
    /// Open-handle slots. Shared with other processes through refcounts.
    pub fidt: Vec<Option<FcbId>>,
    /// Entry task of the process, if any.
    pub main_task: Option<Task>,
    /// Argument block, deep-copied at creation and owned by this record.
    pub args: Vec<u8>,
    pub exitval: ExitCode,
    /// Number of threads that have not yet exited.
    pub thread_count: usize,
    /// Thread records; kept past exit while joiners still reference them.
    pub threads: Map<Tid, ThreadRecord>,
}

impl Process {
    fn new(max_fileid: usize) -> Self {
        Self {
            state: ProcessState::Alive,
            parent: None,
            children: Vec::new(),
            exited: VecDeque::new(),
            fidt: vec![None; max_fileid],
            main_task: None,
            args: Vec::new(),
            exitval: 0,
            thread_count: 0,
            threads: Map::default(),
        }
    }
}

/// The process table: `max_processes` slots plus a free-list.
pub(crate) struct ProcessTable {
    slots: Vec<Option<Process>>,
    /// LIFO free-list; built so that a fresh table pops 0, 1, 2, ...
    free: Vec<Pid>,
    max_fileid: usize,
}

impl ProcessTable {
    pub fn new(max_processes: usize, max_fileid: usize) -> Self {
        let mut slots = Vec::with_capacity(max_processes);
        slots.resize_with(max_processes, || None);
        Self {
            slots,
            free: (0..max_processes as Pid).rev().collect(),
            max_fileid,
        }
    }

    /// Take a record off the free-list, alive and empty.
    pub fn acquire(&mut self) -> Option<Pid> {
        let pid = self.free.pop()?;
        self.slots[pid as usize] = Some(Process::new(self.max_fileid));
        Some(pid)
    }

    /// Return a record to the free-list.
    pub fn release(&mut self, pid: Pid) {
        let slot = &mut self.slots[pid as usize];
        assert!(slot.is_some(), "releasing a free process record");
        *slot = None;
        self.free.push(pid);
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.slots.get(pid as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.slots.get_mut(pid as usize)?.as_mut()
    }

    /// Allocated records, in pid order.
    pub fn iter(&self) -> impl Iterator<Item = (Pid, &Process)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(pid, slot)| slot.as_ref().map(|p| (pid as Pid, p)))
    }

    pub fn count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
