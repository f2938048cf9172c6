//! Compile-time kernel configuration.
//!
//! Nimbus has no writable configuration store: no heap, no filesystem
//! writes. Every tunable here is a `pub const`, grounded on the teacher's
//! practice of pinning pool sizes next to the types that use them
//! (`process::MAX_PROCESSES`) rather than centralizing them in a loaded
//! config file.

/// Number of process slots. Each slot owns one PCB, one kernel stack
/// region, one program frame and one page-directory storage region.
pub const MAX_PROCS: usize = 6;

/// Size of a process's file-descriptor table.
pub const N_FD: usize = 8;

/// Number of logical terminals multiplexed onto the one physical display.
pub const NUM_TERMINALS: usize = 3;

/// Hardware scheduler preemption rate.
pub const SCHEDULER_HZ: u32 = 100;

/// Hardware rate the per-process tick source is divided down from.
pub const TICK_SOURCE_HZ: u32 = 1024;

/// VGA text-mode grid dimensions.
pub const VGA_WIDTH: usize = 80;
pub const VGA_HEIGHT: usize = 25;

/// Size of each process's kernel stack region (and, by construction, of
/// its PCB-holding low end).
pub const KERNEL_STACK_SIZE: usize = 8 * 1024;

/// Size of the per-process "program window": the 4 MB large-page virtual
/// region holding the loaded image and the user stack.
pub const PROGRAM_WINDOW_SIZE: usize = 4 * 1024 * 1024;

/// Fixed user virtual address of the program window.
pub const PROGRAM_WINDOW_VADDR: u32 = 0x0800_0000;

/// Offset within the program window at which the loaded image begins.
pub const PROGRAM_IMAGE_OFFSET: u32 = 0x0004_8000;

/// Size of the per-process console-page mapping.
pub const CONSOLE_PAGE_SIZE: usize = 4 * 1024;

/// Fixed user virtual address of the per-process console page.
pub const CONSOLE_PAGE_VADDR: u32 = 0x0840_0000;

/// Maximum bytes for a loaded program's name (NUL-terminated).
pub const MAX_NAME: usize = 32;

/// Maximum bytes for a process's argument string (NUL-terminated).
pub const MAX_ARGS: usize = 128;

/// ELF magic bytes and the offset of the little-endian entry-point word.
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
pub const ELF_ENTRY_OFFSET: usize = 24;

/// Capacity of each terminal's cooked-mode input line buffer.
pub const LINE_BUFFER_CAPACITY: usize = 128;

/// Physical base address of the VGA text-mode framebuffer.
pub const VGA_PHYS_BASE: usize = 0xB8000;

/// Physical base address of the read-only on-disk file system image.
///
/// The bootloader handoff that loads this module is out of the core's
/// scope (§1); this only needs to know where the already-loaded image
/// ends up. Placed inside the kernel-image region (4..8 MB) that
/// `mm::vmm` maps present for every slot, well past a ~10k-line kernel's
/// own code and data, rather than the low 4 MB identity region (which
/// §4.1 maps with only the framebuffer page present).
pub const FS_IMAGE_PHYS_BASE: u32 = 0x0060_0000;

/// Physical base of the slot-indexed program frame pool:
/// `PROG_PHYS_BASE + slot * PROGRAM_WINDOW_SIZE`.
///
/// Sits past the kernel image (4..8MB) and the kernel window holding
/// page-directory storage (8..12MB), so the `MAX_PROCS` program frames
/// never overlap either region.
pub const PROG_PHYS_BASE: usize = 0x00C0_0000;
