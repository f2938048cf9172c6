//! Per-process tick virtualizer, driven by the Real-Time Clock.
//!
//! Grounded on the reference `rtc.c`: programming register A's rate bits
//! to pick the interrupt frequency, and reading register C after every
//! interrupt to let the next one through, are both copied from there.
//! What changes is the read semantics above that: the reference blocks
//! the whole kernel on one global `rtc_tick_flag`; here each process gets
//! its own virtual rate (`PCB::tick`), hardware-tick-counted down by
//! `on_hardware_tick` and consumed by `tick_read`, so one process opening
//! the tick source at a slow rate never delays another's fast one.

use crate::arch::x86::port::{inb, outb};
use crate::config::TICK_SOURCE_HZ;
use crate::error::{KernelError, KernelResult};
use crate::process::pcb::Pcb;

pub mod pit;

const CMOS_ADDRESS: u16 = 0x70;
const CMOS_DATA: u16 = 0x71;
const RTC_REG_A: u8 = 0x8A; // NMI disabled (bit 7) | register A
const RTC_REG_B: u8 = 0x8B;
const RTC_REG_C: u8 = 0x8C;
const RTC_ENABLE_PERIODIC_INT: u8 = 0x40; // bit 6 of register B

/// Hardware ticks per virtual tick when a process first opens the tick
/// source, before any `write` has programmed a rate: 2 Hz, matching the
/// reference driver's `rtc_open` default.
pub const DEFAULT_TICK_INTERVAL: u32 = TICK_SOURCE_HZ / 2;

/// Program the RTC to interrupt at `TICK_SOURCE_HZ` and enable its
/// periodic-interrupt bit. `arch::init` has already remapped the PICs and
/// unmasked IRQ8 by the time this runs.
pub fn init() {
    let rate = hz_to_rate(TICK_SOURCE_HZ);

    // SAFETY: the standard two-step CMOS register access (select index,
    // then read/write data), matching the reference `rtc_write`/`rtc_open`
    // sequence. Runs once from `boot`, before any process can race it.
    unsafe {
        outb(CMOS_ADDRESS, RTC_REG_A);
        let prev = inb(CMOS_DATA);
        outb(CMOS_ADDRESS, RTC_REG_A);
        outb(CMOS_DATA, (prev & 0xF0) | rate);

        outb(CMOS_ADDRESS, RTC_REG_B);
        let prev = inb(CMOS_DATA);
        outb(CMOS_ADDRESS, RTC_REG_B);
        outb(CMOS_DATA, prev | RTC_ENABLE_PERIODIC_INT);
    }

    log::info!("timer initialized: {TICK_SOURCE_HZ} Hz hardware tick");
}

/// `32768 >> (rate - 1) == hz`, solved for `rate`; `hz` must already be a
/// power of two in `[2, 8192]`.
fn hz_to_rate(hz: u32) -> u8 {
    let mut rate: u8 = 15;
    let mut temp = hz;
    while temp != 2 {
        temp >>= 1;
        rate -= 1;
    }
    rate
}

/// Called from the RTC interrupt handler. Acknowledges the interrupt at
/// the CMOS level (register C must be read or the RTC latches no further
/// ones) and counts every enabled process's tick source down by one
/// hardware tick.
pub fn on_hardware_tick() {
    // SAFETY: reading register C is the documented way to re-arm the next
    // RTC interrupt; its value (which bits fired) is not needed here.
    unsafe {
        outb(CMOS_ADDRESS, RTC_REG_C);
        inb(CMOS_DATA);
    }

    crate::process::table::for_each_in_use(|pcb| {
        if pcb.tick.enabled && pcb.tick.remaining > 0 {
            pcb.tick.remaining -= 1;
        }
    });
}

/// `syscall_read` on an open tick-source descriptor: block (with
/// interrupts enabled, so `on_hardware_tick` can keep counting down) until
/// this process's virtual tick fires, then rearm it. Mirrors
/// `console::terminal_read`'s busy-wait shape.
pub fn tick_read(pcb: &mut Pcb) -> usize {
    loop {
        let fired = crate::arch::without_interrupts(|| pcb.tick.remaining == 0);
        if fired {
            break;
        }
        crate::arch::enable_interrupts();
        crate::arch::halt();
    }

    crate::arch::without_interrupts(|| {
        pcb.tick.remaining = pcb.tick.interval;
    });
    0
}

/// `syscall_write` on an open tick-source descriptor: `rate` must be a
/// power of two in `[2, 1024]`.
pub fn tick_write(pcb: &mut Pcb, rate: u32) -> KernelResult<()> {
    if !is_valid_rate(rate) {
        return Err(KernelError::InvalidArgument {
            reason: "tick rate must be a power of two in [2, 1024]",
        });
    }
    pcb.tick.interval = TICK_SOURCE_HZ / rate;
    pcb.tick.remaining = pcb.tick.interval;
    Ok(())
}

fn is_valid_rate(rate: u32) -> bool {
    (2..=1024).contains(&rate) && (rate & (rate - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_rates_are_powers_of_two_in_range() {
        assert!(is_valid_rate(2));
        assert!(is_valid_rate(1024));
        assert!(is_valid_rate(512));
        assert!(!is_valid_rate(1));
        assert!(!is_valid_rate(2048));
        assert!(!is_valid_rate(3));
        assert!(!is_valid_rate(0));
    }

    #[test]
    fn hz_to_rate_matches_known_points() {
        assert_eq!(hz_to_rate(1024), 6);
        assert_eq!(hz_to_rate(2), 15);
    }
}
