//! Architecture layer.
//!
//! The teacher selects among `x86_64`/`aarch64`/`riscv64` behind
//! `cfg(target_arch = ...)`. Nimbus targets exactly one platform — 32-bit
//! protected-mode x86 — so there is a single module and no arch-selection
//! indirection.

pub mod x86;

pub use x86::{disable_interrupts, enable_interrupts, halt, halt_forever, without_interrupts};

pub fn init() {
    x86::init();
}
