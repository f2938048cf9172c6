//! The fixed-size process table: `MAX_PROCS` slots, each holding one PCB.
//!
//! Grounded on the teacher's `process::table::ProcessTable`
//! `#[cfg(not(feature = "alloc"))]` path (a `Mutex`-guarded fixed array
//! plus a `&'static` accessor that casts through the guard) — this
//! kernel never turns on the `alloc` feature, so only that path is kept,
//! generalized from PID-keyed lookup to slot-keyed lookup since slots
//! (not PIDs) are the stable identity the paging and stack layout hang
//! off of.

use spin::Mutex;

use crate::config::MAX_PROCS;
use crate::error::{KernelError, KernelResult};
use crate::process::pcb::{Pcb, ProcessStatus};

struct ProcessArray {
    slots: [Pcb; MAX_PROCS],
}

impl ProcessArray {
    const fn new() -> Self {
        let mut slots = [const { Pcb::empty(0) }; MAX_PROCS];
        let mut i = 0;
        while i < MAX_PROCS {
            slots[i] = Pcb::empty(i);
            i += 1;
        }
        Self { slots }
    }
}

static TABLE: Mutex<ProcessArray> = Mutex::new(ProcessArray::new());

/// Monotonically increasing PID source. Slots are reused; PIDs are not.
static NEXT_PID: Mutex<u32> = Mutex::new(1);

fn next_pid() -> u32 {
    let mut pid = NEXT_PID.lock();
    let value = *pid;
    *pid += 1;
    value
}

pub fn init() {
    log::info!("process table initialized, {} slots", MAX_PROCS);
}

/// Scan for the lowest-indexed free slot and reserve it with a fresh PID.
/// Does not install paging or fill in the rest of the PCB — callers do
/// that with the `&'static mut Pcb` this returns.
pub fn allocate_slot() -> KernelResult<&'static mut Pcb> {
    let mut table = TABLE.lock();
    for slot in &mut table.slots {
        if !slot.in_use {
            *slot = Pcb::empty(slot.slot);
            slot.in_use = true;
            slot.pid = next_pid();
            slot.status = ProcessStatus::Runnable;
            // SAFETY: `slot` is one element of the statically allocated
            // `TABLE` array behind a `Mutex`. Slots are never moved or
            // deallocated; the cast extends the borrow past the guard,
            // which is sound because a slot's memory is stable for the
            // kernel's lifetime and exclusive mutable access to it is
            // still governed by the caller treating it as owned until
            // the process halts.
            return Ok(unsafe { &mut *(slot as *mut Pcb) });
        }
    }
    Err(KernelError::ResourceExhausted { resource: "process slot" })
}

/// Release `slot` back to the free pool.
pub fn free_slot(slot: usize) {
    let mut table = TABLE.lock();
    table.slots[slot] = Pcb::empty(slot);
}

/// Borrow slot `slot`'s PCB for the caller's lifetime.
///
/// # Safety
///
/// Same contract as `allocate_slot`: sound because slots are immovable
/// statics and the kernel has one CPU context operating on a PCB at a
/// time (interrupts disabled around scheduling decisions).
pub fn get(slot: usize) -> &'static mut Pcb {
    let mut table = TABLE.lock();
    let pcb = &mut table.slots[slot];
    // SAFETY: see function doc.
    unsafe { &mut *(pcb as *mut Pcb) }
}

/// Call `f` once per in-use slot whose process owns `terminal`.
pub fn for_each_on_terminal(terminal: usize, mut f: impl FnMut(usize)) {
    let table = TABLE.lock();
    for slot in &table.slots {
        if slot.in_use && slot.terminal == terminal {
            f(slot.slot);
        }
    }
}

/// Round-robin search starting one slot past `from`, wrapping, for the
/// next `Runnable` slot. Returns `None` if no other slot is runnable.
pub fn next_runnable_after(from: usize) -> Option<usize> {
    let table = TABLE.lock();
    for offset in 1..=MAX_PROCS {
        let candidate = (from + offset) % MAX_PROCS;
        if table.slots[candidate].status == ProcessStatus::Runnable {
            return Some(candidate);
        }
    }
    None
}

/// Call `f` once per in-use slot, for periodic per-process bookkeeping
/// (the tick virtualizer's per-hardware-tick countdown).
pub fn for_each_in_use(mut f: impl FnMut(&mut Pcb)) {
    let mut table = TABLE.lock();
    for slot in &mut table.slots {
        if slot.in_use {
            f(slot);
        }
    }
}

/// Reinitialize an in-use slot in place for a fresh run of the same
/// loaded image: a root shell has no parent to reap it, so rather than
/// freeing and reallocating its slot (§4.8), it is relaunched with a new
/// PID and a clean process state, keeping `entry_point`/`name` so the
/// caller does not need to reload the image.
///
/// # Safety
///
/// `slot` must already be in use.
pub fn relaunch(slot: usize) -> &'static mut Pcb {
    let mut table = TABLE.lock();
    let pcb = &mut table.slots[slot];
    pcb.pid = next_pid();
    pcb.status = ProcessStatus::Runnable;
    pcb.parent = None;
    pcb.child = None;
    pcb.saved_esp = 0;
    pcb.saved_ebp = 0;
    pcb.last_child_status = 0;
    pcb.args_len = 0;
    pcb.fds.reset_for_new_process();
    pcb.tick = crate::process::pcb::TickState::new();
    // SAFETY: see function doc; same reasoning as `allocate_slot`/`get`.
    unsafe { &mut *(pcb as *mut Pcb) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_picks_lowest_free_slot() {
        free_slot(0);
        free_slot(1);
        let pcb = allocate_slot().unwrap();
        assert_eq!(pcb.slot, 0);
        free_slot(pcb.slot);
    }

    #[test]
    fn free_slot_resets_in_use() {
        let slot = allocate_slot().unwrap().slot;
        free_slot(slot);
        assert!(!get(slot).in_use);
    }
}
