//! PS/2 keyboard driver: scancode decode, modifier tracking, hot-switch
//! and line-discipline input editing.
//!
//! The teacher decodes scancodes with the `pc_keyboard` crate
//! (`drivers/keyboard.rs`). That crate's built-in layouts target a richer
//! keyboard model than this kernel's fixed 4-plane table, so this hand
//! rolls the decode table the way the original C reference's
//! `keyboard.c` does, grounded on its scancode-set-1 table and modifier
//! handling; the ring-buffer production pattern (single producer in the
//! ISR, single consumer elsewhere) is kept from the teacher.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::x86::port::inb;
use crate::console::terminal;

const SCANCODE_PORT: u16 = 0x60;
const TAB_STOP: usize = 4;

const ESCAPE_PREFIX: u8 = 0xE0;
const DISCARDED_PREFIX: u8 = 0xE1;

const LSHIFT_MAKE: u8 = 0x2A;
const RSHIFT_MAKE: u8 = 0x36;
const LSHIFT_BREAK: u8 = LSHIFT_MAKE | 0x80;
const RSHIFT_BREAK: u8 = RSHIFT_MAKE | 0x80;
const CTRL_MAKE: u8 = 0x1D;
const CTRL_BREAK: u8 = CTRL_MAKE | 0x80;
const ALT_MAKE: u8 = 0x38;
const ALT_BREAK: u8 = ALT_MAKE | 0x80;
const CAPSLOCK_MAKE: u8 = 0x3A;

const KEY_L: u8 = 0x26;
const KEY_F1: u8 = 0x3B;
const KEY_F2: u8 = 0x3C;
const KEY_F3: u8 = 0x3D;

#[cfg(feature = "kbd_test_hooks")]
const KEY_1: u8 = 0x02;
#[cfg(feature = "kbd_test_hooks")]
const KEY_2: u8 = 0x03;
#[cfg(feature = "kbd_test_hooks")]
const KEY_3: u8 = 0x04;
#[cfg(feature = "kbd_test_hooks")]
const KEY_4: u8 = 0x05;
#[cfg(feature = "kbd_test_hooks")]
const KEY_5: u8 = 0x06;

static SHIFT_HELD: AtomicBool = AtomicBool::new(false);
static CTRL_HELD: AtomicBool = AtomicBool::new(false);
static ALT_HELD: AtomicBool = AtomicBool::new(false);
static CAPSLOCK_ON: AtomicBool = AtomicBool::new(false);
static DISCARD_NEXT: AtomicBool = AtomicBool::new(false);

/// 4-plane scancode -> ASCII table: [unshifted, shifted, caps,
/// caps+shifted], indexed by the scancode's low 7 bits. `0` means "no
/// printable mapping"; backspace/tab/enter are handled separately as
/// line-discipline events, not table lookups.
const TABLE_UNSHIFTED: [u8; 0x3A] = build_row(false, false);
const TABLE_SHIFTED: [u8; 0x3A] = build_row(true, false);
const TABLE_CAPS: [u8; 0x3A] = build_row(false, true);
const TABLE_CAPS_SHIFTED: [u8; 0x3A] = build_row(true, true);

const fn build_row(shift: bool, caps: bool) -> [u8; 0x3A] {
    let unshifted: [u8; 0x3A] = [
        0, 0x1B, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
        b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's',
        b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
        b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ',
    ];
    let shifted: [u8; 0x3A] = [
        0, 0x1B, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
        b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0, b'A', b'S',
        b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V',
        b'B', b'N', b'M', b'<', b'>', b'?', 0, b'*', 0, b' ',
    ];

    let mut row = if shift { shifted } else { unshifted };
    if caps {
        let mut i = 0;
        while i < row.len() {
            let c = row[i];
            if c.is_ascii_lowercase() {
                row[i] = c.to_ascii_uppercase();
            } else if c.is_ascii_uppercase() && !shift {
                row[i] = c.to_ascii_lowercase();
            }
            i += 1;
        }
    }
    row
}

fn translate(scancode: u8, shift: bool, caps: bool) -> u8 {
    let idx = scancode as usize;
    if idx >= TABLE_UNSHIFTED.len() {
        return 0;
    }
    match (shift, caps) {
        (false, false) => TABLE_UNSHIFTED[idx],
        (true, false) => TABLE_SHIFTED[idx],
        (false, true) => TABLE_CAPS[idx],
        (true, true) => TABLE_CAPS_SHIFTED[idx],
    }
}

/// Called from the keyboard IRQ (vector `VECTOR_KEYBOARD`). Reads the
/// pending scancode from port 0x60 and processes it.
pub fn on_scancode() {
    // SAFETY: IRQ1 fired, so the PS/2 controller has a byte latched in
    // its output buffer at port 0x60.
    let code = unsafe { inb(SCANCODE_PORT) };
    handle_scancode(code);
}

fn handle_scancode(code: u8) {
    if DISCARD_NEXT.swap(false, Ordering::Relaxed) {
        return;
    }
    if code == DISCARDED_PREFIX {
        DISCARD_NEXT.store(true, Ordering::Relaxed);
        return;
    }
    if code == ESCAPE_PREFIX {
        return; // extended-key prefix; Nimbus's table has no extended keys
    }

    match code {
        LSHIFT_MAKE | RSHIFT_MAKE => SHIFT_HELD.store(true, Ordering::Relaxed),
        LSHIFT_BREAK | RSHIFT_BREAK => SHIFT_HELD.store(false, Ordering::Relaxed),
        CTRL_MAKE => CTRL_HELD.store(true, Ordering::Relaxed),
        CTRL_BREAK => CTRL_HELD.store(false, Ordering::Relaxed),
        ALT_MAKE => ALT_HELD.store(true, Ordering::Relaxed),
        ALT_BREAK => ALT_HELD.store(false, Ordering::Relaxed),
        CAPSLOCK_MAKE => {
            let cur = CAPSLOCK_ON.load(Ordering::Relaxed);
            CAPSLOCK_ON.store(!cur, Ordering::Relaxed);
        }
        _ => handle_key_make(code),
    }
}

fn handle_key_make(code: u8) {
    if code & 0x80 != 0 {
        return; // break code of a non-modifier key: ignored
    }

    let ctrl = CTRL_HELD.load(Ordering::Relaxed);
    let alt = ALT_HELD.load(Ordering::Relaxed);

    if ctrl && code == KEY_L {
        do_ctrl_l();
        return;
    }
    if alt {
        match code {
            KEY_F1 => terminal::switch_to(0),
            KEY_F2 => terminal::switch_to(1),
            KEY_F3 => terminal::switch_to(2),
            _ => {}
        }
        return;
    }
    #[cfg(feature = "kbd_test_hooks")]
    if ctrl {
        if let Some(suite) = match code {
            KEY_1 => Some(1u8),
            KEY_2 => Some(2),
            KEY_3 => Some(3),
            KEY_4 => Some(4),
            KEY_5 => Some(5),
            _ => None,
        } {
            run_test_hook(suite);
            return;
        }
    }
    if ctrl {
        return; // other Ctrl+key combinations are not line-discipline input
    }

    let shift = SHIFT_HELD.load(Ordering::Relaxed);
    let caps = CAPSLOCK_ON.load(Ordering::Relaxed);
    let byte = translate(code, shift, caps);
    if byte != 0 {
        feed_line_discipline(byte);
    }
}

/// Ctrl+1..Ctrl+5 test-suite side channel, preserved from the original C
/// reference's `keyboard.c` as an explicit, off-by-default extension
/// point rather than a product of the kernel: it only logs which suite
/// was requested, leaving the actual test runner to whatever harness
/// enables this feature.
#[cfg(feature = "kbd_test_hooks")]
fn run_test_hook(suite: u8) {
    log::info!("kbd_test_hooks: ctrl+{suite} requested");
}

fn do_ctrl_l() {
    let idx = terminal::active_index();
    let mut replay = [0u8; crate::config::LINE_BUFFER_CAPACITY];
    let n = terminal::CONSOLE.lock().terminals[idx].input.copy_unconsumed(&mut replay);
    terminal::clear_and_replay(idx, &replay[..n]);
}

/// Cooked-mode editing: backspace/newline/tab/printable rules from the
/// line-discipline spec, applied to the active terminal's input buffer
/// and echoed to its frame.
fn feed_line_discipline(byte: u8) {
    let idx = terminal::active_index();
    let mut console = terminal::CONSOLE.lock();
    let term = &mut console.terminals[idx];

    match byte {
        0x08 => {
            // Backspace: no-op on empty buffer or when the preceding byte
            // is a newline (can't erase past a line the reader already saw).
            match term.input.peek_tail() {
                None => return,
                Some(b'\n') => return,
                Some(b'\t') => {
                    term.input.pop_tail();
                    // Only valid while the tab we just popped is still the
                    // one `pending_tab_width` describes; any later input
                    // would have cleared it.
                    let n = term.pending_tab_width.take().unwrap_or(TAB_STOP);
                    drop(console);
                    for _ in 0..n {
                        terminal::write_bytes(idx, b"\x08");
                    }
                    return;
                }
                Some(_) => {
                    term.input.pop_tail();
                    term.pending_tab_width = None;
                    drop(console);
                    terminal::write_bytes(idx, b"\x08");
                    return;
                }
            }
        }
        b'\n' => {
            if term.input.len() >= term.input.capacity() {
                return;
            }
            term.input.put_byte(b'\n');
            term.lines_available += 1;
            term.pending_tab_width = None;
            drop(console);
            terminal::write_bytes(idx, b"\n");
        }
        b'\t' => {
            if term.input.len() >= term.input.capacity() - 1 {
                return;
            }
            term.input.put_byte(b'\t');
            let column = term.cursor_x;
            let remainder = column % TAB_STOP;
            let spaces = if remainder == 0 { TAB_STOP } else { TAB_STOP - remainder };
            term.pending_tab_width = Some(spaces);
            drop(console);
            for _ in 0..spaces {
                terminal::write_bytes(idx, b" ");
            }
        }
        printable => {
            if term.input.len() >= term.input.capacity() - 1 {
                return;
            }
            term.input.put_byte(printable);
            term.pending_tab_width = None;
            drop(console);
            terminal::write_bytes(idx, &[printable]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unshifted_letter_row_is_lowercase() {
        assert_eq!(translate(0x10, false, false), b'q');
    }

    #[test]
    fn shift_uppercases_letters() {
        assert_eq!(translate(0x10, true, false), b'Q');
    }

    #[test]
    fn capslock_uppercases_without_shift() {
        assert_eq!(translate(0x10, false, true), b'Q');
    }

    #[test]
    fn capslock_plus_shift_lowercases_letters() {
        assert_eq!(translate(0x10, true, true), b'q');
    }

    #[test]
    fn capslock_does_not_affect_digits() {
        assert_eq!(translate(0x02, false, true), b'1');
        assert_eq!(translate(0x02, true, true), b'!');
    }

    #[test]
    fn unmapped_scancode_is_zero() {
        assert_eq!(translate(0xFF, false, false), 0);
    }
}
