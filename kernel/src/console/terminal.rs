//! Three logical terminals sharing one physical display and one keyboard.
//!
//! Grounded on the teacher's `VgaConsole` cell/cursor model
//! (`drivers/console.rs`), generalized from a single console device into
//! `NUM_TERMINALS` independent ones, exactly one of which backs the
//! physical framebuffer at any instant; the other two keep their state in
//! a shadow frame.

use spin::Mutex;

use crate::config::NUM_TERMINALS;
use crate::console::line_buffer::LineBuffer;
use crate::console::vga::{self, ScreenChar, CELLS};

pub struct Terminal {
    pub input: LineBuffer,
    /// Number of unconsumed newlines currently buffered in `input`.
    pub lines_available: usize,
    pub shadow: [ScreenChar; CELLS],
    pub cursor_x: usize,
    pub cursor_y: usize,
    /// How many columns the most recently typed tab's echoed spaces
    /// advanced the cursor by, if that tab is still the buffer's tail
    /// byte. Backspacing it has to undo exactly that many columns, not a
    /// fixed `TAB_STOP` (the tab may have started anywhere in its stop).
    /// Cleared by any other input so it only ever describes the tail.
    pub pending_tab_width: Option<usize>,
}

impl Terminal {
    const fn new() -> Self {
        Self {
            input: LineBuffer::new(),
            lines_available: 0,
            shadow: [ScreenChar::blank(); CELLS],
            cursor_x: 0,
            cursor_y: 0,
            pending_tab_width: None,
        }
    }
}

pub struct Console {
    pub terminals: [Terminal; NUM_TERMINALS],
    pub active: usize,
}

impl Console {
    const fn new() -> Self {
        Self {
            terminals: [Terminal::new(), Terminal::new(), Terminal::new()],
            active: 0,
        }
    }
}

pub static CONSOLE: Mutex<Console> = Mutex::new(Console::new());

pub fn init() {
    // Terminal 0 is active at boot; its shadow is blank, matching the
    // blanked physical framebuffer, so there is nothing to blit yet.
    vga::set_hardware_cursor(0, 0);
}

/// Switch the active terminal from whatever it currently is to
/// `target`. A no-op if `target` is already active.
///
/// Sequence (per the line-discipline/console invariant that the active
/// terminal's shadow and the physical framebuffer stay byte-equal at
/// quiescence): snapshot the physical frame into the outgoing terminal's
/// shadow, flip `active`, blit the incoming terminal's shadow to the
/// physical frame, then reprogram the hardware cursor.
pub fn switch_to(target: usize) {
    debug_assert!(target < NUM_TERMINALS);
    let mut console = CONSOLE.lock();
    if console.active == target {
        return;
    }
    let prev = console.active;
    vga::snapshot_frame(&mut console.terminals[prev].shadow);
    console.active = target;
    let shadow = console.terminals[target].shadow;
    vga::blit_frame(&shadow);
    let (x, y) = (console.terminals[target].cursor_x, console.terminals[target].cursor_y);
    drop(console);
    vga::set_hardware_cursor(x, y);
    crate::mm::vmm::retarget_console_pages(prev, target);
}

pub fn active_index() -> usize {
    CONSOLE.lock().active
}

/// Column width a tab expands to; cursor lands on the next multiple of
/// this value.
const TAB_STOP: usize = 4;

fn advance_cursor(frame: &mut [ScreenChar; CELLS], x: &mut usize, y: &mut usize, byte: u8) {
    match byte {
        b'\n' => {
            *x = 0;
            *y += 1;
        }
        byte => {
            frame[*y * crate::config::VGA_WIDTH + *x] = ScreenChar {
                ascii_character: byte,
                color_code: vga::ColorCode::new(vga::Color::LightGray, vga::Color::Black),
            };
            *x += 1;
            if *x >= crate::config::VGA_WIDTH {
                *x = 0;
                *y += 1;
            }
        }
    }
    if *y >= crate::config::VGA_HEIGHT {
        scroll(frame);
        *y = crate::config::VGA_HEIGHT - 1;
    }
}

fn scroll(frame: &mut [ScreenChar; CELLS]) {
    let width = crate::config::VGA_WIDTH;
    let height = crate::config::VGA_HEIGHT;
    for row in 1..height {
        for col in 0..width {
            frame[(row - 1) * width + col] = frame[row * width + col];
        }
    }
    for col in 0..width {
        frame[(height - 1) * width + col] = ScreenChar::blank();
    }
}

/// Write one byte to terminal `idx`'s output, routing to the physical
/// framebuffer if `idx` is active or to its shadow frame otherwise, and
/// advancing that terminal's cursor. Used by both stdout writes and
/// keyboard echo.
pub fn write_bytes(idx: usize, bytes: &[u8]) {
    let mut console = CONSOLE.lock();
    let active = console.active;
    if idx == active {
        let mut frame = [ScreenChar::blank(); CELLS];
        vga::snapshot_frame(&mut frame);
        {
            let term = &mut console.terminals[idx];
            for &b in bytes {
                advance_cursor(&mut frame, &mut term.cursor_x, &mut term.cursor_y, b);
            }
        }
        vga::blit_frame(&frame);
        let (x, y) = (console.terminals[idx].cursor_x, console.terminals[idx].cursor_y);
        drop(console);
        vga::set_hardware_cursor(x, y);
    } else {
        let term = &mut console.terminals[idx];
        let (shadow, cursor_x, cursor_y) = (&mut term.shadow, &mut term.cursor_x, &mut term.cursor_y);
        for &b in bytes {
            advance_cursor(shadow, cursor_x, cursor_y, b);
        }
    }
}

/// Blank terminal `idx`'s visible area and reset its cursor to the top
/// left. If `idx` is the active terminal, the physical framebuffer is
/// blanked too (not just the shadow `write_bytes` would otherwise
/// snapshot stale content back out of).
fn clear_terminal(idx: usize) {
    let mut console = CONSOLE.lock();
    let term = &mut console.terminals[idx];
    term.shadow = [ScreenChar::blank(); CELLS];
    term.cursor_x = 0;
    term.cursor_y = 0;
    if console.active == idx {
        vga::blit_frame(&[ScreenChar::blank(); CELLS]);
        drop(console);
        vga::set_hardware_cursor(0, 0);
    }
}

/// Report a fatal user-mode exception on terminal `idx` only: clear that
/// terminal's visible area and print a one-line description plus the
/// vector/error-code pair, leaving every other terminal untouched. This
/// is the preferred behavior over the reference's global console clear.
pub fn report_fault(idx: usize, description: &str, vector: u8, error_code: u32) {
    clear_terminal(idx);

    let mut line = [0u8; 64];
    let mut w = crate::console::line_buffer::SliceWriter::new(&mut line);
    let _ = core::fmt::write(
        &mut w,
        format_args!("exception: {} (vector {} code {:#x})\n", description, vector, error_code),
    );
    let written = w.len();
    write_bytes(idx, &line[..written]);
}

/// Clear terminal `idx`'s visible area (Ctrl+L) and replay `replay` at the
/// top-left, without touching the underlying input buffer.
pub fn clear_and_replay(idx: usize, replay: &[u8]) {
    clear_terminal(idx);
    write_bytes(idx, replay);
}
