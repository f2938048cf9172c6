//! Kernel entry point.
//!
//! Deliberately thin: everything from segmentation setup onward belongs to
//! `nimbus_kernel::boot`, in the library crate, so the subsystem sequencing
//! is exercised the same way whether this binary or a host-side test
//! harness drives it. Grounded on the teacher's `main.rs`, minus the parts
//! the bootloader/descriptor-table handoff already covers before `_start`
//! runs (out of scope per this kernel's boundaries).

#![no_std]
#![no_main]

#[no_mangle]
pub extern "C" fn _start() -> ! {
    nimbus_kernel::boot()
}
