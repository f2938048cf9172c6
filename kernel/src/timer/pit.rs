//! 8253/8254 Programmable Interval Timer, channel 0: the scheduler's
//! hardware preemption source (§4.4), distinct from the RTC-backed tick
//! virtualizer the rest of this module implements.
//!
//! Grounded on `original_source/.../pit.c`: the same command byte and
//! channel-0 reload-value write, confirming `SCHEDULER_HZ` is a PIT
//! divisor rather than an arbitrary constant.

use crate::arch::x86::port::outb;
use crate::config::SCHEDULER_HZ;

const PIT_CHANNEL0_DATA: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

/// Channel 0, lobyte/hibyte access, mode 3 (square wave generator), binary.
const PIT_COMMAND_CHANNEL0_MODE3: u8 = 0x36;

/// The PIT's fixed input frequency.
const PIT_INPUT_HZ: u32 = 1_193_182;

/// Program channel 0 to fire at `SCHEDULER_HZ`.
///
/// # Safety
///
/// Must run once during boot, after the PIC has remapped IRQ0 to
/// `idt::VECTOR_TIMER` and before interrupts are enabled.
pub unsafe fn init() {
    let divisor = (PIT_INPUT_HZ / SCHEDULER_HZ) as u16;

    // SAFETY: the standard PIT programming sequence (command byte, then
    // low byte, then high byte of the reload value to the same channel
    // data port) run once from `sched::init`, before `sti`.
    unsafe {
        outb(PIT_COMMAND, PIT_COMMAND_CHANNEL0_MODE3);
        outb(PIT_CHANNEL0_DATA, (divisor & 0xFF) as u8);
        outb(PIT_CHANNEL0_DATA, (divisor >> 8) as u8);
    }

    log::info!("pit initialized: {SCHEDULER_HZ} Hz scheduler tick");
}
