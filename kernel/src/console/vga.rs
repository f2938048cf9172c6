//! Physical VGA text-mode framebuffer access.
//!
//! Grounded on the teacher's `arch::x86_64::vga::Writer` (volatile writes
//! to the 80x25 cell array at `0xB8000`, a `lazy_static` `Mutex<Writer>`,
//! a `fmt::Write` impl feeding `print!`/`println!`). The cell layout and
//! writer logic are unchanged; cursor programming is added here since the
//! teacher's VGA module left cursor placement to the `x86_64` crate,
//! which isn't available on this target.

use core::fmt;
use core::ptr::{read_volatile, write_volatile};

use lazy_static::lazy_static;
use spin::Mutex;

use crate::arch::x86::port::outb;
use crate::config::{VGA_HEIGHT, VGA_PHYS_BASE, VGA_WIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ColorCode(pub u8);

impl ColorCode {
    pub const fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode(((background as u8) << 4) | (foreground as u8))
    }
}

/// One VGA text cell: code point in the low byte, attribute in the high
/// byte. This is the on-the-wire layout each terminal's shadow frame also
/// uses, so a frame can be `memcpy`'d straight into physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ScreenChar {
    pub ascii_character: u8,
    pub color_code: ColorCode,
}

impl ScreenChar {
    pub const fn blank() -> Self {
        Self {
            ascii_character: b' ',
            color_code: ColorCode::new(Color::LightGray, Color::Black),
        }
    }
}

pub const CELLS: usize = VGA_WIDTH * VGA_HEIGHT;

#[repr(transparent)]
struct Buffer {
    chars: [[ScreenChar; VGA_WIDTH]; VGA_HEIGHT],
}

pub struct Writer {
    column_position: usize,
    color_code: ColorCode,
    buffer: &'static mut Buffer,
}

impl Writer {
    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            byte => {
                if self.column_position >= VGA_WIDTH {
                    self.new_line();
                }
                let row = VGA_HEIGHT - 1;
                let col = self.column_position;
                let color_code = self.color_code;
                // SAFETY: 0xB8000 is memory-mapped I/O; write_volatile keeps
                // the write from being optimized away. row/col are in bounds
                // by construction above.
                unsafe {
                    write_volatile(
                        &mut self.buffer.chars[row][col],
                        ScreenChar {
                            ascii_character: byte,
                            color_code,
                        },
                    );
                }
                self.column_position += 1;
            }
        }
    }

    fn new_line(&mut self) {
        for row in 1..VGA_HEIGHT {
            for col in 0..VGA_WIDTH {
                // SAFETY: row in 1..VGA_HEIGHT, col in 0..VGA_WIDTH, both
                // within the framebuffer; row-1 is always a valid index.
                let character = unsafe { read_volatile(&self.buffer.chars[row][col]) };
                unsafe {
                    write_volatile(&mut self.buffer.chars[row - 1][col], character);
                }
            }
        }
        self.clear_row(VGA_HEIGHT - 1);
        self.column_position = 0;
    }

    fn clear_row(&mut self, row: usize) {
        let blank = ScreenChar {
            ascii_character: b' ',
            color_code: self.color_code,
        };
        for col in 0..VGA_WIDTH {
            // SAFETY: row is caller-supplied and always < VGA_HEIGHT in
            // this module's call sites; col is bounded by the loop range.
            unsafe { write_volatile(&mut self.buffer.chars[row][col], blank) };
        }
    }

    pub fn write_string(&mut self, s: &str) {
        for byte in s.bytes() {
            match byte {
                0x20..=0x7e | b'\n' => self.write_byte(byte),
                _ => self.write_byte(0xfe),
            }
        }
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}

lazy_static! {
    pub static ref WRITER: Mutex<Writer> = Mutex::new(Writer {
        column_position: 0,
        color_code: ColorCode::new(Color::White, Color::Black),
        // SAFETY: VGA_PHYS_BASE is the well-known physical address of the
        // VGA text buffer, identity-mapped into kernel space by the
        // virtual-memory manager's 0..4MB small-page region.
        buffer: unsafe { &mut *(VGA_PHYS_BASE as *mut Buffer) },
    });
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    crate::arch::without_interrupts(|| {
        WRITER.lock().write_fmt(args).expect("VGA write_fmt failed");
    });
}

/// Copy `frame` (a terminal's shadow buffer, `CELLS` cells) into the
/// physical framebuffer.
pub fn blit_frame(frame: &[ScreenChar; CELLS]) {
    let dst = VGA_PHYS_BASE as *mut ScreenChar;
    for (i, cell) in frame.iter().enumerate() {
        // SAFETY: `i < CELLS` and the physical framebuffer is exactly
        // `CELLS` cells, identity-mapped.
        unsafe { write_volatile(dst.add(i), *cell) };
    }
}

/// Copy the physical framebuffer into `frame` (a terminal's shadow buffer).
pub fn snapshot_frame(frame: &mut [ScreenChar; CELLS]) {
    let src = VGA_PHYS_BASE as *const ScreenChar;
    for (i, cell) in frame.iter_mut().enumerate() {
        // SAFETY: see `blit_frame`.
        unsafe { *cell = read_volatile(src.add(i)) };
    }
}

/// Program the CRTC hardware cursor to `(x, y)` via index registers 14/15
/// at the command/data ports.
pub fn set_hardware_cursor(x: usize, y: usize) {
    let pos = (y * VGA_WIDTH + x) as u16;
    // SAFETY: standard CRTC cursor-location programming sequence; ports
    // 0x3D4/0x3D5 are the VGA CRT controller index/data registers.
    unsafe {
        outb(0x3D4, 14);
        outb(0x3D5, (pos >> 8) as u8);
        outb(0x3D4, 15);
        outb(0x3D5, (pos & 0xFF) as u8);
    }
}
