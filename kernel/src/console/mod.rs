//! Console multiplexor: three logical terminals sharing one physical
//! display and one PS/2 keyboard.

pub mod keyboard;
pub mod line_buffer;
pub mod terminal;
pub mod vga;

pub fn init() {
    terminal::init();
}

/// Block (with interrupts enabled) until terminal `idx` has at least one
/// buffered, newline-terminated line, then copy at most
/// `min(buf.len(), bytes-through-first-newline)` bytes into `buf`.
/// Returns the number of bytes copied.
pub fn terminal_read(idx: usize, buf: &mut [u8]) -> usize {
    loop {
        let ready = crate::arch::without_interrupts(|| {
            terminal::CONSOLE.lock().terminals[idx].lines_available > 0
        });
        if ready {
            break;
        }
        crate::arch::enable_interrupts();
        crate::arch::halt();
    }

    crate::arch::without_interrupts(|| {
        let mut console = terminal::CONSOLE.lock();
        let term = &mut console.terminals[idx];
        let through_newline = term
            .input
            .find(b'\n')
            .map(|offset| offset + 1)
            .unwrap_or_else(|| term.input.len());
        let n = buf.len().min(through_newline);
        let copied = term.input.get(&mut buf[..n]);
        if buf[..copied].contains(&b'\n') {
            term.lines_available -= 1;
        }
        copied
    })
}

/// Write `data` to terminal `idx`'s output (physical framebuffer if it is
/// the active terminal, its shadow frame otherwise).
pub fn terminal_write(idx: usize, data: &[u8]) {
    terminal::write_bytes(idx, data);
}
