//! 32-bit protected-mode architecture support.
//!
//! Everything the core needs from the CPU and the legacy PC chipset: port
//! I/O, the 8259 PIC, the GDT/TSS, the IDT, the serial console, and the
//! ring0<->ring3 privilege-transition primitives. Grounded on the
//! teacher's `arch::x86_64` module, reimplemented for a 32-bit target
//! since none of the teacher's hardware crates (`x86_64`, `pic8259`,
//! `uart_16550`) build outside long mode.

pub mod gdt;
pub mod idt;
pub mod pic;
pub mod port;
pub mod serial;
pub mod usermode;

/// The CPU-pushed frame every `extern "x86-interrupt"` handler receives.
/// Exception handlers that push an error code see it as a second
/// argument ahead of this frame; IRQ handlers and the syscall trap gate
/// do not.
#[repr(C)]
pub struct InterruptStackFrame {
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    /// Present only on a ring3 -> ring0 transition; undefined to read
    /// when the interrupt was already running in ring 0.
    pub esp: u32,
    pub ss: u32,
}

/// Bring up the CPU-facing half of the kernel: segmentation, interrupts,
/// the programmable interrupt controller, and the logging facade.
///
/// # Safety
///
/// Must run exactly once, early in boot, before any other subsystem.
pub fn init() {
    // SAFETY: single-call boot sequence; nothing else touches the GDT,
    // IDT or PIC concurrently at this point (interrupts are still off).
    unsafe {
        gdt::init();
        idt::init();
        pic::init();
    }
    crate::klog::init();
    // `pic::init` unmasks IRQ0/1/8 immediately; `sti` stays off here and is
    // the boot sequence's job, once every IRQ handler's subsystem (timer,
    // console, scheduler) is actually initialized.
}

/// Enable maskable interrupts (`sti`).
pub fn enable_interrupts() {
    // SAFETY: `sti` is always safe to execute; it only affects whether
    // the CPU accepts further interrupts.
    unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
}

/// Disable maskable interrupts (`cli`).
pub fn disable_interrupts() {
    // SAFETY: `cli` is always safe to execute.
    unsafe { core::arch::asm!("cli", options(nomem, nostack)) };
}

/// Run `f` with interrupts disabled, restoring the prior interrupt flag
/// on return. Grounded on the teacher's `x86_64::instructions::interrupts
/// ::without_interrupts`; hand-rolled here since that helper lives in the
/// `x86_64` crate.
pub fn without_interrupts<F: FnOnce() -> R, R>(f: F) -> R {
    let was_enabled = interrupts_enabled();
    disable_interrupts();
    let result = f();
    if was_enabled {
        enable_interrupts();
    }
    result
}

fn interrupts_enabled() -> bool {
    let eflags: u32;
    // SAFETY: `pushfd`/`pop` only reads CPU flags onto the stack and back
    // into a register; no side effects beyond the instruction itself.
    unsafe {
        core::arch::asm!(
            "pushfd",
            "pop {0:e}",
            out(reg) eflags,
            options(nomem, preserves_flags)
        );
    }
    eflags & (1 << 9) != 0
}

/// Halt the CPU until the next interrupt (`hlt`), used as the busy-wait
/// primitive for every suspension point (console read, tick-source read,
/// the idle loop when no slot is runnable).
pub fn halt() {
    // SAFETY: `hlt` stops fetching until an interrupt arrives; always safe
    // with interrupts enabled, and a no-op-until-interrupt otherwise.
    unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
}

/// Spin forever with interrupts disabled. Used for non-recoverable
/// kernel-mode faults.
pub fn halt_forever() -> ! {
    disable_interrupts();
    loop {
        halt();
    }
}
