//! 8259 Programmable Interrupt Controller driver.
//!
//! The teacher depends on the `pic8259` crate for this; that crate's port
//! I/O goes through the `x86_64` crate and does not build for a 32-bit
//! target, so this hand-rolls the same remap/mask/EOI sequence directly.

use spin::Mutex;

use super::port::{inb, io_wait, outb};

const PIC1_CMD: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_CMD: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;

const CMD_EOI: u8 = 0x20;

/// IRQ vector offsets the PICs are remapped to. Chosen past the CPU
/// exception range (0..=31) the same way every 32-bit protected-mode
/// kernel must: `set_handler`/exception vectors and IRQ vectors cannot
/// overlap in the IDT.
pub const PIC1_OFFSET: u8 = 0x20;
pub const PIC2_OFFSET: u8 = 0x28;

pub struct ChainedPics {
    master_mask: u8,
    slave_mask: u8,
}

impl ChainedPics {
    const fn new() -> Self {
        Self {
            master_mask: 0xFF,
            slave_mask: 0xFF,
        }
    }

    /// Remap the PICs so IRQs 0..15 land on vectors `PIC1_OFFSET..+16` and
    /// mask every line. Callers unmask individual lines as drivers come up.
    ///
    /// # Safety
    ///
    /// Must run once, early, before interrupts are enabled.
    unsafe fn init(&mut self) {
        // SAFETY: standard 8259 ICW1..ICW4 remap sequence; each `outb` targets
        // a PIC command/data port and the `io_wait` between them gives the
        // (possibly very old) chipset time to latch each byte.
        unsafe {
            let saved_mask1 = inb(PIC1_DATA);
            let saved_mask2 = inb(PIC2_DATA);

            outb(PIC1_CMD, ICW1_INIT | ICW1_ICW4);
            io_wait();
            outb(PIC2_CMD, ICW1_INIT | ICW1_ICW4);
            io_wait();

            outb(PIC1_DATA, PIC1_OFFSET);
            io_wait();
            outb(PIC2_DATA, PIC2_OFFSET);
            io_wait();

            outb(PIC1_DATA, 4); // tell master PIC there's a slave at IRQ2
            io_wait();
            outb(PIC2_DATA, 2); // tell slave PIC its cascade identity
            io_wait();

            outb(PIC1_DATA, ICW4_8086);
            io_wait();
            outb(PIC2_DATA, ICW4_8086);
            io_wait();

            outb(PIC1_DATA, saved_mask1);
            outb(PIC2_DATA, saved_mask2);

            self.master_mask = saved_mask1;
            self.slave_mask = saved_mask2;
        }
    }

    /// Unmask (enable) a single IRQ line in `0..16`.
    fn unmask(&mut self, irq: u8) {
        if irq < 8 {
            self.master_mask &= !(1 << irq);
            // SAFETY: writes only the cached mask byte back to PIC1's data port.
            unsafe { outb(PIC1_DATA, self.master_mask) };
        } else {
            self.slave_mask &= !(1 << (irq - 8));
            // SAFETY: writes only the cached mask byte back to PIC2's data port.
            unsafe { outb(PIC2_DATA, self.slave_mask) };
            // the cascade line (IRQ2) must stay unmasked for slave IRQs to reach the CPU
            self.master_mask &= !(1 << 2);
            // SAFETY: as above, for PIC1.
            unsafe { outb(PIC1_DATA, self.master_mask) };
        }
    }

    /// Acknowledge an interrupt on `vector` (the IDT vector number, not the
    /// raw IRQ line).
    fn end_of_interrupt(&mut self, vector: u8) {
        if vector >= PIC2_OFFSET {
            // SAFETY: EOI write to the slave PIC's command port.
            unsafe { outb(PIC2_CMD, CMD_EOI) };
        }
        // SAFETY: EOI write to the master PIC's command port. Required even
        // for slave-PIC interrupts: they chain through the master's cascade line.
        unsafe { outb(PIC1_CMD, CMD_EOI) };
    }
}

pub static PICS: Mutex<ChainedPics> = Mutex::new(ChainedPics::new());

/// IRQ line numbers used by Nimbus.
pub const IRQ_TIMER: u8 = 0;
pub const IRQ_KEYBOARD: u8 = 1;
pub const IRQ_RTC: u8 = 8;

/// Remap both PICs and unmask the timer, keyboard and RTC lines.
///
/// # Safety
///
/// Must be called exactly once during boot, before `sti`.
pub unsafe fn init() {
    let mut pics = PICS.lock();
    // SAFETY: delegated to `ChainedPics::init`'s contract; this is the one call site.
    unsafe { pics.init() };
    pics.unmask(IRQ_TIMER);
    pics.unmask(IRQ_KEYBOARD);
    pics.unmask(IRQ_RTC);
}

/// Acknowledge the interrupt on `vector`. Call this at the end of every
/// hardware IRQ handler.
pub fn end_of_interrupt(vector: u8) {
    PICS.lock().end_of_interrupt(vector);
}
