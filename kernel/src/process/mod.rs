//! Task/process subsystem: the PCB pool, the on-disk image loader, boot-
//! time root-shell spawning, and `execute`/`halt` orchestration (§4.3).
//!
//! Grounded on the teacher's `process::thread` lifecycle functions
//! (`spawn`, `exit`) for the overall shape — allocate a slot, fill in the
//! record, hand off to a privilege-transition primitive — generalized
//! from the teacher's single always-resident kernel thread model to
//! nested `execute`/`halt` pairs, since this kernel's "thread" is a full
//! user address space rather than a kernel-only coroutine.

pub mod exception;
pub mod kstack;
pub mod loader;
pub mod pcb;
pub mod table;

use crate::arch::x86::usermode::{prime_stack, swap_context};
use crate::config::NUM_TERMINALS;
use crate::error::{KernelError, KernelResult};
use crate::mm::{frames, vmm};
use crate::process::pcb::ProcessStatus;

/// One root shell per terminal (§4.9): all three load the same image,
/// the way the reference boots three identical shells on three terminals.
const ROOT_SHELLS: [&[u8]; NUM_TERMINALS] = [b"shell", b"shell", b"shell"];

pub fn init() {
    table::init();
    log::info!("process subsystem initialized");
}

/// Spawn the three boot-time root processes (§4.9's initial state: "three
/// root slots set Runnable during boot"). A shell that fails to load is
/// logged and skipped rather than panicking the kernel — the other
/// terminals should still come up.
pub fn spawn_root_shells() {
    for terminal in 0..NUM_TERMINALS {
        if let Err(e) = spawn_root_shell(terminal) {
            log::error!("failed to spawn root shell on terminal {terminal}: {e}");
        }
    }
}

fn spawn_root_shell(terminal: usize) -> KernelResult<()> {
    let pcb = table::allocate_slot()?;
    let slot = pcb.slot;
    pcb.terminal = terminal;
    pcb.fds.reset_for_new_process();

    let name = ROOT_SHELLS[terminal];
    let entry = match frames::with_frame_mut(slot, |frame| loader::load_image(name, frame)) {
        Ok(entry) => entry,
        Err(e) => {
            table::free_slot(slot);
            return Err(e);
        }
    };
    pcb.entry_point = entry;
    pcb.name[..name.len()].copy_from_slice(name);
    pcb.name_len = name.len();

    vmm::build_for_slot(slot, vmm::console_frame_for(terminal));
    Ok(())
}

/// `syscall_execute`: parse `command`, load the named image into a freshly
/// allocated child slot, and synchronously run it to completion, returning
/// its exit status. Collapses every failure kind to `-1` at this boundary,
/// matching every other syscall (§7).
pub fn execute(command: &[u8]) -> i32 {
    match execute_inner(command) {
        Ok(status) => status,
        Err(e) => {
            log::warn!("execute failed: {e}");
            e.to_syscall_result()
        }
    }
}

/// `execute` is all-or-nothing (§7): any failure before the child is
/// installed releases the child slot and leaves the parent untouched.
fn execute_inner(command: &[u8]) -> KernelResult<i32> {
    let parent_slot = crate::sched::current_slot();
    let parsed = loader::parse_command(command)?;

    let child_slot = {
        let child_pcb = table::allocate_slot()?;
        child_pcb.slot
    };

    let name = &parsed.name[..parsed.name_len];
    let entry = match frames::with_frame_mut(child_slot, |frame| loader::load_image(name, frame)) {
        Ok(entry) => entry,
        Err(e) => {
            table::free_slot(child_slot);
            return Err(e);
        }
    };

    let parent_terminal = table::get(parent_slot).terminal;
    vmm::build_for_slot(child_slot, vmm::console_frame_for(parent_terminal));

    let child = table::get(child_slot);
    child.parent = Some(parent_slot);
    child.terminal = parent_terminal;
    child.entry_point = entry;
    child.name[..parsed.name_len].copy_from_slice(&parsed.name[..parsed.name_len]);
    child.name_len = parsed.name_len;
    child.args[..parsed.args_len].copy_from_slice(&parsed.args[..parsed.args_len]);
    child.args_len = parsed.args_len;
    child.fds.reset_for_new_process();
    child.status = ProcessStatus::Runnable;

    let parent = table::get(parent_slot);
    parent.child = Some(child_slot);
    parent.status = ProcessStatus::Blocked;

    crate::sched::activate(child_slot);
    // SAFETY: `child_slot` was just allocated, so its kernel stack is
    // unused.
    let child_sp = unsafe { prime_stack(kstack::stack_top(child_slot), crate::sched::first_entry) };
    // SAFETY: `parent.saved_esp` is the parent PCB's own field, read back
    // only after a matching `swap_context` resumes it (from `halt`'s
    // non-root path below); `child_sp` was just primed for the slot
    // `activate` just installed.
    unsafe { swap_context(&mut parent.saved_esp, child_sp) };

    // Resumed here once the child halts (or faults): by that point
    // `terminate_current` has already reinstalled this slot as the
    // running context and recorded the child's exit status.
    Ok(table::get(parent_slot).last_child_status)
}

/// `syscall_halt`: terminate the calling process with `status` (widened
/// to `i32`, matching the ABI's 32-bit return type). Never returns to its
/// caller — control resumes either in the parent's suspended `execute`
/// call (non-root) or in a freshly relaunched copy of this same image
/// (root, §4.8).
pub fn syscall_halt(status: u8) -> ! {
    terminate_current(status as i32)
}

/// Shared by `syscall_halt` and the exception handler: a fault is
/// semantically a halt with a status the caller can't have produced
/// itself (see `exception::EXCEPTION_EXIT_STATUS`).
pub fn terminate_current(status: i32) -> ! {
    let slot = crate::sched::current_slot();
    let parent = table::get(slot).parent;

    match parent {
        None => {
            table::relaunch(slot);
            crate::sched::activate(slot);
            // SAFETY: relaunch discards the halted root's saved context;
            // its kernel stack is free to reprime.
            let sp = unsafe { prime_stack(kstack::stack_top(slot), crate::sched::first_entry) };
            let mut discard = 0u32;
            // SAFETY: `discard` is never read again — the halted root's
            // old context is abandoned for good, same as `sched::run`'s
            // boot context.
            unsafe { swap_context(&mut discard, sp) };
            unreachable!("a relaunched root's prior context is never resumed");
        }
        Some(parent_slot) => {
            table::free_slot(slot);

            let parent_pcb = table::get(parent_slot);
            parent_pcb.status = ProcessStatus::Runnable;
            parent_pcb.child = None;
            parent_pcb.last_child_status = status;

            crate::sched::activate(parent_slot);
            let mut discard = 0u32;
            // SAFETY: `parent_pcb.saved_esp` was written by the matching
            // `swap_context` call inside `execute_inner`, on a kernel
            // stack that call never touched again.
            unsafe { swap_context(&mut discard, parent_pcb.saved_esp) };
            unreachable!("a halted child's context is never resumed");
        }
    }
}
