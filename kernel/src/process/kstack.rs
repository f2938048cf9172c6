//! Per-slot kernel stack pool.
//!
//! Grounded on `mm::frames`'s statically allocated, `Mutex`-guarded array
//! of slot-indexed regions — the same pattern, applied to kernel stacks
//! instead of program frames, rather than a second bespoke allocation
//! scheme.

use spin::Mutex;

use crate::config::{KERNEL_STACK_SIZE, MAX_PROCS};

#[repr(C, align(16))]
struct Stack([u8; KERNEL_STACK_SIZE]);

impl Stack {
    const fn zeroed() -> Self {
        Self([0; KERNEL_STACK_SIZE])
    }
}

static STACKS: Mutex<[Stack; MAX_PROCS]> = Mutex::new([const { Stack::zeroed() }; MAX_PROCS]);

/// The top (highest address, growing down) of `slot`'s kernel stack: the
/// value `gdt::set_kernel_stack` and `usermode::prime_stack` both take.
pub fn stack_top(slot: usize) -> u32 {
    let stacks = STACKS.lock();
    let base = stacks[slot].0.as_ptr() as u32;
    base + KERNEL_STACK_SIZE as u32
}
