//! CPU exception handling for user-mode faults.
//!
//! Per the preferred behavior this kernel follows: a fault is reported on
//! the faulting process's own terminal only, never by clearing whatever
//! terminal happens to be active. The faulting process is then torn down
//! exactly like a normal `halt`, with a status distinguishing "exception"
//! from an ordinary exit code (see the exception-status resolution on
//! `exception_exit_code` below).

use crate::arch::x86::idt;

/// Human-readable names for the vectors this kernel installs handlers
/// for, matched against `idt::VECTOR_*`.
fn exception_name(vector: u8) -> &'static str {
    match vector {
        idt::VECTOR_DIVIDE_ERROR => "divide error",
        idt::VECTOR_GENERAL_PROTECTION => "general protection fault",
        idt::VECTOR_PAGE_FAULT => "page fault",
        _ => "unhandled exception",
    }
}

/// The status value this kernel's `halt`/`execute` boundary uses to mark
/// "process terminated by exception", distinct from any 8-bit exit code
/// a program can pass to `halt` itself.
///
/// The reference source is inconsistent here: one file uses 256 (out of
/// range for an 8-bit status), another truncates to 8 bits before
/// returning it to the parent. This kernel keeps the parent-visible
/// return value as the `i32` the ABI already uses (`syscall_execute`
/// never narrows it to `u8`), so 256 survives intact and is
/// distinguishable from every normal `0..=255` exit code.
pub const EXCEPTION_EXIT_STATUS: i32 = 256;

/// Called from an `extern "x86-interrupt"` exception handler in
/// `arch::x86::idt`. Runs with interrupts disabled.
pub fn handle_exception(vector: u8, error_code: u32) {
    let slot = crate::sched::current_slot();
    let pcb = crate::process::table::get(slot);
    let terminal = pcb.terminal;

    crate::console::terminal::report_fault(
        terminal,
        exception_name(vector),
        vector,
        error_code,
    );

    crate::process::terminate_current(EXCEPTION_EXIT_STATUS);
}
