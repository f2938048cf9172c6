//! Privilege-transition and context-switch primitives.
//!
//! Per the design note in the reference this kernel is built from: inline
//! assembly for privilege transition, context switch, and halt-return is
//! isolated into this one thin platform module. Three primitives live
//! here — `enter_user`, `swap_context`, and `prime_stack` — so every other
//! subsystem (the task loader, `process::execute`/`halt`, the scheduler)
//! is platform-independent and uniform: every switch, first run included,
//! goes through `swap_context`. A slot that has never run gets its saved
//! stack pointer set by `prime_stack` instead of being left at zero and
//! special-cased, so `swap_context`'s ordinary restore half lands it in a
//! small trampoline that performs the first-time privilege transition —
//! the classic "fabricated kernel stack frame" technique, standing in for
//! the reference's `pcb->regs.esp == NULL` branch inside its
//! `context_switch`.

use core::arch::asm;

use super::gdt::{USER_CODE_SELECTOR, USER_DATA_SELECTOR};

/// User `eflags` value used for every privilege transition: interrupts
/// enabled (bit 9), plus the reserved always-1 bit 1.
const USER_EFLAGS: u32 = (1 << 9) | (1 << 1);

/// Build an interrupt-return frame on the current (kernel) stack and
/// `iret` into user mode at `entry`, with the user stack pointer set to
/// `user_sp`. Never returns: control resumes only via a later interrupt,
/// exception, or the syscall gate.
///
/// # Safety
///
/// `entry` must be a valid user-mode instruction pointer inside the
/// caller's program window, and `user_sp` must point at the top of that
/// same window. The caller's page directory must already be installed.
pub unsafe fn enter_user(entry: u32, user_sp: u32) -> ! {
    // SAFETY: pushes the five-word iret frame `iret` expects (ss, esp,
    // eflags, cs, eip) with user-mode selectors, then `iret`s into it.
    // Segment registers are reloaded with the user data selector first so
    // ds/es/fs/gs never observe a stale kernel selector in ring 3.
    unsafe {
        asm!(
            "mov ax, {user_data:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "push {user_data:e}",
            "push {user_sp:e}",
            "push {eflags:e}",
            "push {user_code:e}",
            "push {entry:e}",
            "iretd",
            user_data = in(reg) USER_DATA_SELECTOR as u32,
            user_code = in(reg) USER_CODE_SELECTOR as u32,
            user_sp = in(reg) user_sp,
            eflags = in(reg) USER_EFLAGS,
            entry = in(reg) entry,
            options(noreturn)
        );
    }
}

/// Fabricate a resumption point on a never-run slot's otherwise-empty
/// kernel stack, so that a later [`swap_context`] into the returned value
/// restores into `trampoline` rather than into a stack that was never
/// actually suspended.
///
/// Writes the same six words [`swap_context`]'s restore half expects to
/// pop, in ascending-address order from the returned pointer: `ebp`,
/// `edi`, `esi`, `ebx`, `eflags`, then the return address (`trampoline`)
/// at `stack_top - 4`, where `ret` will find it. The returned stack
/// pointer is `stack_top - 24`; installing it as a slot's saved stack
/// pointer makes that slot indistinguishable, to `swap_context`, from one
/// that is merely suspended mid-call.
///
/// # Safety
///
/// `stack_top` must be the top (highest address, growing down) of a
/// kernel stack not currently in use, with at least 24 bytes free below
/// it, and must stay valid and unaliased until the primed value is
/// consumed by a matching `swap_context`.
pub unsafe fn prime_stack(stack_top: u32, trampoline: extern "C" fn() -> !) -> u32 {
    // SAFETY: stack_top - 24..stack_top is caller-guaranteed free and
    // writable; each store targets a distinct, in-bounds word.
    unsafe {
        let frame = (stack_top - 24) as *mut u32;
        frame.add(0).write(0); // ebp
        frame.add(1).write(0); // edi
        frame.add(2).write(0); // esi
        frame.add(3).write(0); // ebx
        frame.add(4).write(USER_EFLAGS); // eflags
        frame.add(5).write(trampoline as u32); // return address
        stack_top - 24
    }
}

/// Save the current callee-saved registers and stack pointer into
/// `*prev_sp`, then switch to `next_sp` and restore its saved registers.
///
/// This is the one primitive every suspend/resume point in the kernel
/// goes through, in both directions: the scheduler uses it to preempt
/// the running slot and resume (or first-enter, via a [`prime_stack`]ed
/// `next_sp`) another one, and `process::execute`/`process::halt` use it
/// the same way to suspend a parent at its `execute` call site (`next_sp`
/// primed for the child's first entry) and later resume exactly there
/// once the child halts (`next_sp` = the parent's saved stack pointer).
/// `*prev_sp` becomes a valid `next_sp` for a future call the moment this
/// one executes — there is no separate "just save" primitive; a context
/// that is never going to be resumed (the boot stack, a halting child)
/// simply passes a throwaway local as `prev_sp`.
///
/// # Safety
///
/// `prev_sp` must point at a location that will remain valid until it is
/// later consumed as some future call's `next_sp` (typically the current
/// PCB's saved-stack-pointer field, or a throwaway local when the caller
/// will never be resumed), and `next_sp` must be a stack pointer either
/// primed by [`prime_stack`] or previously saved by a matching
/// `swap_context` call, on a kernel stack belonging to the target slot.
///
/// Written as `#[unsafe(naked)]`, the same way `nimbus_syscall_entry`
/// (`arch::x86::idt`) is: correctness here hinges on `esp` pointing at
/// exactly the six-word frame [`prime_stack`] describes at the moment of
/// the final `ret`, which an ordinary `fn`'s compiler-generated
/// prologue/epilogue (a frame pointer push/pop, or spilled locals around
/// the `asm!` block) is free to disturb around a raw `mov esp, ...`.
/// cdecl passes this function's two arguments on the stack, not in
/// registers, so they are read directly off it below rather than bound
/// as asm operands (naked bodies admit only `sym`/`const` operands).
#[unsafe(naked)]
pub unsafe extern "C" fn swap_context(_prev_sp: &mut u32, _next_sp: u32) {
    // At entry: [esp] = return address, [esp+4] = prev_sp, [esp+8] = next_sp.
    core::arch::naked_asm!(
        "pushfd",
        "push ebx",
        "push esi",
        "push edi",
        "push ebp",
        "mov eax, [esp + 24]", // prev_sp: 5 pushes (20 bytes) + return address
        "mov [eax], esp",
        "mov eax, [esp + 28]", // next_sp
        "mov esp, eax",
        "pop ebp",
        "pop edi",
        "pop esi",
        "pop ebx",
        "popfd",
        "ret",
    );
}
