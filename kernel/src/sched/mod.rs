//! Preemptive round-robin scheduler (§4.4).
//!
//! The teacher's `sched` module is a priority-queue, multi-core affair
//! (`scheduler.rs`, `load_balance.rs`, `numa.rs`) built for a kernel with
//! dynamic task allocation and SMP — none of which this single-core,
//! fixed-`MAX_PROCS` core wants (Non-goals: multi-processor support, no
//! dynamic allocation, no user-defined priorities). What carries over is
//! the shape of `scheduler.rs`'s tick handler: look up the running task,
//! pick the next one, hand off via one context-switch primitive. Here
//! that primitive is `arch::x86::usermode::swap_context`, and "next" is
//! the flat round-robin `process::table::next_runnable_after` instead of
//! a run queue.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::arch::x86::idt::VECTOR_TIMER;
use crate::arch::x86::usermode::{prime_stack, swap_context};
use crate::arch::x86::{gdt, pic};
use crate::config::{MAX_PROCS, PROGRAM_WINDOW_SIZE, PROGRAM_WINDOW_VADDR};
use crate::process::kstack::stack_top;
use crate::process::table;

/// The slot currently installed and executing. Distinct from
/// `mm::vmm`'s own `CURRENT_SLOT`: that one tracks which page directory
/// is live (needed even before a scheduler exists, e.g. for `install`),
/// this one is the scheduler's notion of "who is running", consulted by
/// `process::exception::handle_exception` and by `execute`/`halt`.
static CURRENT_SLOT: AtomicUsize = AtomicUsize::new(0);

/// The slot the CPU is currently executing on behalf of.
pub fn current_slot() -> usize {
    CURRENT_SLOT.load(Ordering::Relaxed)
}

/// Program the hardware preemption source. Run once from `boot`, after
/// `arch::init` (which remaps the PIC and wires `VECTOR_TIMER`) and
/// before interrupts are globally enabled.
pub fn init() {
    // SAFETY: single-call boot sequence, before `sti`.
    unsafe { crate::timer::pit::init() };
    log::info!("scheduler initialized: {MAX_PROCS} slots, round-robin");
}

/// Install `slot` as the running context: page directory, console-page
/// backing, and the ring0 stack the CPU loads on the next ring3 -> ring0
/// transition. The three steps §4.4 lists between "pick a target" and
/// "hand off control".
pub(crate) fn activate(slot: usize) {
    crate::mm::vmm::install(slot);
    let terminal = table::get(slot).terminal;
    crate::mm::vmm::set_console_frame(slot, crate::mm::vmm::console_frame_for(terminal));
    gdt::set_kernel_stack(stack_top(slot));
    CURRENT_SLOT.store(slot, Ordering::Relaxed);
}

/// Trampoline a never-run slot's primed kernel stack lands in: read back
/// which slot this now is (`activate` already ran, and `current_slot`
/// reflects it) and perform the first-time privilege transition. Shared
/// by the scheduler's boot kickoff, a later first-run-on-preemption, a
/// freshly `execute`d child, and a relaunched root.
pub(crate) extern "C" fn first_entry() -> ! {
    let pcb = table::get(current_slot());
    let entry = pcb.entry_point;
    let user_sp = PROGRAM_WINDOW_VADDR + PROGRAM_WINDOW_SIZE as u32;
    // SAFETY: `entry` was validated by `process::loader::load_image` for
    // this slot's program frame, and `activate` has already installed
    // this slot's page directory, mapping the program window at
    // `PROGRAM_WINDOW_VADDR` the caller's current cr3.
    unsafe { crate::arch::x86::usermode::enter_user(entry, user_sp) }
}

/// Boot-time kickoff: activate the lowest-indexed root slot spawned by
/// `process::spawn_root_shells` and transition into it. Never returns —
/// the boot stack is abandoned for good, exactly like any other slot
/// that is switched away from and never the target of a later
/// `swap_context` (nothing ever saves a pointer back to it).
pub fn run() -> ! {
    let slot = table::next_runnable_after(MAX_PROCS - 1).expect("no runnable slot at boot");
    activate(slot);
    // SAFETY: `stack_top(slot)` is `slot`'s unused kernel stack (nothing
    // has run on it yet), with far more than 24 bytes free below it.
    let sp = unsafe { prime_stack(stack_top(slot), first_entry) };
    let mut discard = 0u32;
    // SAFETY: `discard` is never read again; `sp` was just primed above
    // for this same slot's stack, which `activate` just installed.
    unsafe { swap_context(&mut discard, sp) };
    unreachable!("boot context is never resumed");
}

/// The timer-interrupt handler's entry point (`idt::timer_handler`).
/// Runs with interrupts disabled, on `current_slot`'s kernel stack.
///
/// `table::next_runnable_after` can report the caller itself back when
/// no *other* slot is runnable (it wraps all the way around); that case
/// and "nobody else runnable" are both a no-op here, not a self-switch.
pub fn on_tick() {
    let current = current_slot();
    let target = match table::next_runnable_after(current) {
        Some(target) if target != current => target,
        _ => {
            pic::end_of_interrupt(VECTOR_TIMER);
            return;
        }
    };

    let current_pcb = table::get(current);
    activate(target);
    let target_pcb = table::get(target);

    if target_pcb.has_never_run() {
        // SAFETY: `target`'s kernel stack is unused (it has never run).
        let sp = unsafe { prime_stack(stack_top(target), first_entry) };
        pic::end_of_interrupt(VECTOR_TIMER);
        // SAFETY: `current_pcb.saved_esp` is this running slot's own
        // saved-stack-pointer field; `sp` was just primed for `target`.
        unsafe { swap_context(&mut current_pcb.saved_esp, sp) };
    } else {
        pic::end_of_interrupt(VECTOR_TIMER);
        // SAFETY: `target_pcb.saved_esp` was written by a prior
        // `swap_context` call that suspended `target` on its own kernel
        // stack (either a previous `on_tick` or `process::execute`).
        unsafe { swap_context(&mut current_pcb.saved_esp, target_pcb.saved_esp) };
    }
}
