//! Hand-rolled 16550-compatible UART driver for COM1.
//!
//! The teacher delegates this to the `uart_16550` crate, which is built on
//! top of the `x86_64` crate's port wrapper and does not target 32-bit.
//! This reimplements the same handful of registers directly.

use core::fmt;

use lazy_static::lazy_static;
use spin::Mutex;

use super::port::{inb, outb};

const COM1: u16 = 0x3F8;

struct SerialPort {
    base: u16,
}

impl SerialPort {
    /// # Safety
    ///
    /// `base` must be a COM port's I/O base address, and no other code may
    /// program the same port concurrently without going through this type.
    unsafe fn new(base: u16) -> Self {
        let mut port = Self { base };
        port.init();
        port
    }

    fn init(&mut self) {
        // SAFETY: standard 16550 initialization sequence: disable
        // interrupts, set the baud-rate divisor latch, program 8N1 framing,
        // enable and test the FIFO, then take the port out of loopback.
        unsafe {
            outb(self.base + 1, 0x00); // disable all UART interrupts
            outb(self.base + 3, 0x80); // enable DLAB to set baud rate divisor
            outb(self.base, 0x03); // divisor low byte: 38400 baud
            outb(self.base + 1, 0x00); // divisor high byte
            outb(self.base + 3, 0x03); // 8 bits, no parity, one stop bit
            outb(self.base + 2, 0xC7); // enable FIFO, clear, 14-byte threshold
            outb(self.base + 4, 0x0B); // IRQs enabled, RTS/DSR set
        }
    }

    fn transmit_empty(&self) -> bool {
        // SAFETY: reads the line status register; no side effect beyond
        // observing hardware state.
        (unsafe { inb(self.base + 5) } & 0x20) != 0
    }

    fn write_byte(&mut self, byte: u8) {
        while !self.transmit_empty() {
            core::hint::spin_loop();
        }
        // SAFETY: transmit holding register write, guarded by the busy-wait above.
        unsafe { outb(self.base, byte) };
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            match byte {
                b'\n' => {
                    self.write_byte(b'\r');
                    self.write_byte(b'\n');
                }
                byte => self.write_byte(byte),
            }
        }
        Ok(())
    }
}

lazy_static! {
    static ref SERIAL1: Mutex<SerialPort> = Mutex::new(
        // SAFETY: COM1 is exclusively owned by this module from this point on.
        unsafe { SerialPort::new(COM1) }
    );
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    SERIAL1.lock().write_fmt(args).expect("serial write failed");
}

/// A minimal `log::Log` sink that writes formatted records to COM1.
///
/// Grounded on the teacher's dependency on the `log` facade crate; unlike
/// the teacher (which has no installed logger and relies on direct
/// `print!`/`println!` calls), Nimbus installs this once so `log::info!`
/// and friends are usable from every subsystem without importing the
/// serial module directly.
pub struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= crate::klog::LOG_LEVEL
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            use core::fmt::Write;
            let mut port = SERIAL1.lock();
            let _ = writeln!(port, "[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
