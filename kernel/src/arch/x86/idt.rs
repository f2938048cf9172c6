//! 32-bit Interrupt Descriptor Table.
//!
//! The teacher builds this with the `x86_64` crate's typed
//! `InterruptDescriptorTable`, whose gate descriptors are 16 bytes (long
//! mode). A 32-bit gate descriptor is 8 bytes; this hand-rolls the table
//! and installs it with `lidt`, the same way the teacher's `idt.rs`
//! installs its IDT with `idt.load()` — only the encoding differs.

use core::arch::asm;
use core::mem::size_of;

use lazy_static::lazy_static;
use spin::Mutex;

use super::gdt::KERNEL_CODE_SELECTOR;
use super::pic::{self, PIC1_OFFSET, PIC2_OFFSET};

const IDT_ENTRIES: usize = 256;

pub const VECTOR_DIVIDE_ERROR: u8 = 0;
pub const VECTOR_PAGE_FAULT: u8 = 14;
pub const VECTOR_GENERAL_PROTECTION: u8 = 13;
pub const VECTOR_TIMER: u8 = PIC1_OFFSET; // IRQ0
pub const VECTOR_KEYBOARD: u8 = PIC1_OFFSET + 1; // IRQ1
pub const VECTOR_RTC: u8 = PIC2_OFFSET; // IRQ8, the tick-virtualizer source
pub const VECTOR_SYSCALL: u8 = 0x80;

#[derive(Clone, Copy)]
#[repr(C, packed)]
struct GateDescriptor {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl GateDescriptor {
    const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, type_attr: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CODE_SELECTOR,
            zero: 0,
            type_attr,
            offset_high: (handler >> 16) as u16,
        }
    }
}

/// Interrupt gate, ring 0 only (present | 32-bit interrupt gate | DPL0).
const INTERRUPT_GATE_RING0: u8 = 0x8E;
/// Interrupt gate reachable from ring 3, used only for the `int 0x80`
/// syscall gate (present | 32-bit interrupt gate | DPL3). An *interrupt*
/// gate, not a trap gate: it clears IF on entry, so the dispatcher runs
/// with interrupts disabled like every other kernel entry point (§5's
/// "the dispatcher enters with interrupts disabled"), matching the
/// reference's `SET_IDT_ENTRY`, which installs vector 0x80 the same way
/// as every other gate (`reserved3 = 0`, i.e. an interrupt gate).
const INTERRUPT_GATE_RING3: u8 = 0xEE;

#[repr(C, align(8))]
struct Idt([GateDescriptor; IDT_ENTRIES]);

lazy_static! {
    static ref IDT: Mutex<Idt> = Mutex::new(Idt([GateDescriptor::missing(); IDT_ENTRIES]));
}

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

macro_rules! exception_handler {
    ($name:ident, $vector:expr, $with_error_code:expr) => {
        extern "x86-interrupt" fn $name(_frame: super::InterruptStackFrame) {
            crate::process::exception::handle_exception($vector, 0);
        }
    };
}

macro_rules! exception_handler_ec {
    ($name:ident, $vector:expr) => {
        extern "x86-interrupt" fn $name(_frame: super::InterruptStackFrame, error_code: u32) {
            crate::process::exception::handle_exception($vector, error_code);
        }
    };
}

exception_handler!(divide_error, VECTOR_DIVIDE_ERROR, false);
exception_handler_ec!(general_protection_fault, VECTOR_GENERAL_PROTECTION);
exception_handler_ec!(page_fault, VECTOR_PAGE_FAULT);

extern "x86-interrupt" fn timer_handler(_frame: super::InterruptStackFrame) {
    // `on_tick` may switch to another slot and never return on this
    // invocation, so it owns sending the EOI itself (before the switch)
    // rather than this wrapper sending it on a return path that might not
    // be taken.
    crate::sched::on_tick();
}

extern "x86-interrupt" fn keyboard_handler(_frame: super::InterruptStackFrame) {
    crate::console::keyboard::on_scancode();
    pic::end_of_interrupt(VECTOR_KEYBOARD);
}

extern "x86-interrupt" fn rtc_handler(_frame: super::InterruptStackFrame) {
    crate::timer::on_hardware_tick();
    pic::end_of_interrupt(VECTOR_RTC);
}

// The syscall gate cannot be an `extern "x86-interrupt" fn": that ABI
// transparently saves and restores every register around the call, which
// is the opposite of what a syscall needs (it must overwrite eax with a
// return value the interrupted code observes after `iret`). Instead this
// is a hand-written entry point in the classic "save GPRs, call a plain
// `extern "C"` handler, splice its return value into the saved eax slot,
// restore GPRs, iret" shape.
core::arch::global_asm!(
    ".global nimbus_syscall_entry",
    "nimbus_syscall_entry:",
    "push ebp",
    "push edi",
    "push esi",
    "push edx",
    "push ecx",
    "push ebx",
    "push eax",
    "push edx",
    "push ecx",
    "push ebx",
    "push eax",
    "call {handler}",
    "add esp, 16",
    "mov [esp], eax",
    "pop eax",
    "pop ebx",
    "pop ecx",
    "pop edx",
    "pop esi",
    "pop edi",
    "pop ebp",
    "iretd",
    handler = sym crate::syscall::dispatch,
);

extern "C" {
    fn nimbus_syscall_entry();
}

/// Build the IDT and install it with `lidt`.
///
/// # Safety
///
/// Must run once during boot, after `gdt::init`, before `sti`.
pub unsafe fn init() {
    {
        let mut idt = IDT.lock();
        idt.0[VECTOR_DIVIDE_ERROR as usize] =
            GateDescriptor::new(divide_error as u32, INTERRUPT_GATE_RING0);
        idt.0[VECTOR_GENERAL_PROTECTION as usize] =
            GateDescriptor::new(general_protection_fault as u32, INTERRUPT_GATE_RING0);
        idt.0[VECTOR_PAGE_FAULT as usize] =
            GateDescriptor::new(page_fault as u32, INTERRUPT_GATE_RING0);
        idt.0[VECTOR_TIMER as usize] = GateDescriptor::new(timer_handler as u32, INTERRUPT_GATE_RING0);
        idt.0[VECTOR_KEYBOARD as usize] =
            GateDescriptor::new(keyboard_handler as u32, INTERRUPT_GATE_RING0);
        idt.0[VECTOR_RTC as usize] = GateDescriptor::new(rtc_handler as u32, INTERRUPT_GATE_RING0);
        idt.0[VECTOR_SYSCALL as usize] =
            GateDescriptor::new(nimbus_syscall_entry as u32, INTERRUPT_GATE_RING3);
    }

    let idt_ptr = {
        let idt = IDT.lock();
        IdtPointer {
            limit: (size_of::<[GateDescriptor; IDT_ENTRIES]>() - 1) as u16,
            base: idt.0.as_ptr() as u32,
        }
    };

    // SAFETY: `idt_ptr` points at the `'static` IDT just populated above.
    unsafe {
        asm!("lidt [{0}]", in(reg) &idt_ptr, options(readonly, nostack, preserves_flags));
    }
}
