//! Process Control Block.
//!
//! Grounded on the teacher's `process::pcb::Process` (PID newtype, state
//! enum, `Mutex`-guarded mutable fields) but flattened to the fixed-array,
//! no-alloc shape: one `Pcb` per slot, statically allocated, never boxed
//! or moved. There is exactly one slot pool for the whole kernel — no
//! per-process heap allocation, so fields that would be `Vec`/`String` in
//! the teacher become fixed-size arrays with explicit lengths.

use crate::config::{MAX_ARGS, MAX_NAME};
use crate::io::FdTable;

/// A process's scheduling status (spec-level: `None`/`Runnable`/`Blocked`,
/// where `None` means "slot free").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    None,
    Runnable,
    Blocked,
}

/// Per-process tick-virtualizer state (§4.6): the tick source is
/// programmed in hardware-tick units, independent of which fd (if any)
/// currently has it open.
#[derive(Debug, Clone, Copy)]
pub struct TickState {
    pub enabled: bool,
    /// Hardware ticks per virtual tick.
    pub interval: u32,
    /// Hardware ticks remaining until the next virtual tick fires.
    pub remaining: u32,
}

impl TickState {
    pub(crate) const fn new() -> Self {
        Self {
            enabled: false,
            interval: crate::timer::DEFAULT_TICK_INTERVAL,
            remaining: crate::timer::DEFAULT_TICK_INTERVAL,
        }
    }
}

/// The per-process record. One exists per slot in `table::PROCESS_TABLE`,
/// addressed by slot index rather than by pointer.
pub struct Pcb {
    pub in_use: bool,
    pub pid: u32,
    pub slot: usize,
    pub parent: Option<usize>,
    pub child: Option<usize>,
    pub terminal: usize,
    pub status: ProcessStatus,

    /// Saved kernel stack/frame pointers for `swap_context`. Zero means
    /// "never run" — the scheduler performs a first-time privilege
    /// transition instead of a context restore.
    pub saved_esp: u32,
    pub saved_ebp: u32,

    /// Entry point of the loaded image, kept so a root process can be
    /// relaunched (§4.8) without reloading its program frame.
    pub entry_point: u32,

    /// Exit status of the last child this process reaped, read back by
    /// `execute` once `halt` hands control back to it.
    pub last_child_status: i32,

    pub name: [u8; MAX_NAME],
    pub name_len: usize,
    pub args: [u8; MAX_ARGS],
    pub args_len: usize,

    pub fds: FdTable,
    pub tick: TickState,
}

impl Pcb {
    pub const fn empty(slot: usize) -> Self {
        Self {
            in_use: false,
            pid: 0,
            slot,
            parent: None,
            child: None,
            terminal: 0,
            status: ProcessStatus::None,
            saved_esp: 0,
            saved_ebp: 0,
            entry_point: 0,
            last_child_status: 0,
            name: [0; MAX_NAME],
            name_len: 0,
            args: [0; MAX_ARGS],
            args_len: 0,
            fds: FdTable::new(),
            tick: TickState::new(),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len]
    }

    pub fn args(&self) -> &[u8] {
        &self.args[..self.args_len]
    }

    pub fn has_never_run(&self) -> bool {
        self.saved_esp == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_pcb_is_unused_and_never_run() {
        let pcb = Pcb::empty(3);
        assert!(!pcb.in_use);
        assert_eq!(pcb.status, ProcessStatus::None);
        assert!(pcb.has_never_run());
        assert_eq!(pcb.slot, 3);
    }
}
