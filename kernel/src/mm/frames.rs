//! The slot-indexed program frame pool backing the per-process "program
//! window" large page.
//!
//! `vmm::build_for_slot` maps each slot's program window to the fixed
//! symbolic physical address `PROG_PHYS_BASE + slot * PROGRAM_WINDOW_SIZE`
//! from `config`. This module owns the frames themselves as one
//! statically allocated, 4 MB-aligned array per slot — the loader writes
//! into a slot's frame directly as kernel memory (this kernel's image and
//! static data are always mapped, regardless of which slot's directory is
//! installed), rather than through the user-visible program-window
//! mapping that only the installed slot gets. The two addresses
//! (`config::PROG_PHYS_BASE`-relative vs. this array's real location)
//! are not the same value; reconciling them is a linker-script concern
//! this kernel does not model, same as `mm::vmm`'s `SLOT_TABLES`.

use spin::Mutex;

use crate::config::{MAX_PROCS, PROGRAM_WINDOW_SIZE};

#[repr(C, align(4096))]
struct Frame([u8; PROGRAM_WINDOW_SIZE]);

impl Frame {
    const fn zeroed() -> Self {
        Self([0; PROGRAM_WINDOW_SIZE])
    }
}

static FRAMES: Mutex<[Frame; MAX_PROCS]> = Mutex::new([const { Frame::zeroed() }; MAX_PROCS]);

/// Zero `slot`'s program frame and hand back a scoped mutable view of it.
/// `f` runs with the frame pool's lock held; kept short (one image load).
pub fn with_frame_mut<R>(slot: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
    let mut frames = FRAMES.lock();
    let frame = &mut frames[slot].0;
    frame.fill(0);
    f(frame)
}
