//! Per-slot virtual-memory manager.
//!
//! Builds and installs the fixed per-slot page-directory layout: an
//! identity-mapped low 4 MB (framebuffer page only present), a 4 MB
//! large-page kernel image, a large-page kernel window over page-directory
//! storage, a per-process 4 MB program window, and a per-process 4 KB
//! console page backed by either the physical framebuffer or a
//! per-terminal shadow frame.
//!
//! Grounded on the teacher's `mm::page_table` + `mm::VirtualAddressSpace`
//! split (a typed table wrapper plus an owning "address space" object
//! install/switch API), generalized from a dynamically constructed
//! per-process tree to a fixed, statically sized pool of `MAX_PROCS`
//! pre-allocated slot tables — matching the Non-goal against dynamic
//! memory allocation for kernel objects.

use core::arch::asm;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::config::{
    CONSOLE_PAGE_SIZE, CONSOLE_PAGE_VADDR, MAX_PROCS, PROGRAM_WINDOW_SIZE, PROGRAM_WINDOW_VADDR,
    PROG_PHYS_BASE, VGA_PHYS_BASE,
};
use crate::mm::page_table::{dir_index, table_index, EntryFlags, PageTable, PAGE_SIZE_4K};

/// Physical base of the 4 MB region reserved for kernel image and the
/// page-directory storage window. The kernel is linked to load at this
/// address; `SLOT_TABLES` below physically lives inside the 4 MB "kernel
/// window" region that follows it, so it stays mapped no matter which
/// slot's directory is currently installed.
const KERNEL_IMAGE_PHYS_BASE: u32 = 0x0040_0000;
const KERNEL_WINDOW_PHYS_BASE: u32 = 0x0080_0000;

struct SlotTables {
    directory: PageTable,
    low_table: PageTable,
    console_table: PageTable,
}

impl SlotTables {
    const fn new() -> Self {
        Self {
            directory: PageTable::new(),
            low_table: PageTable::new(),
            console_table: PageTable::new(),
        }
    }
}

/// One array of `MAX_PROCS` slot table sets, statically allocated —
/// "page-directory storage" never grows or shrinks, only gets
/// reinitialized by `build_for_slot`.
static SLOT_TABLES: Mutex<[SlotTables; MAX_PROCS]> =
    Mutex::new([const { SlotTables::new() }; MAX_PROCS]);

static CURRENT_SLOT: AtomicUsize = AtomicUsize::new(usize::MAX);

/// Which physical frame backs a console page.
#[derive(Clone, Copy)]
pub enum ConsoleFrame {
    /// The real framebuffer — this process's terminal is active.
    Framebuffer,
    /// A per-terminal shadow frame's physical address.
    Shadow(u32),
}

impl ConsoleFrame {
    fn phys_addr(self) -> u32 {
        match self {
            ConsoleFrame::Framebuffer => VGA_PHYS_BASE as u32,
            ConsoleFrame::Shadow(addr) => addr,
        }
    }
}

/// (Re)initialize `slot`'s page tables to the fixed layout, with the
/// console page backed by `console_frame`. Idempotent.
pub fn build_for_slot(slot: usize, console_frame: ConsoleFrame) {
    let mut tables = SLOT_TABLES.lock();
    let set = &mut tables[slot];

    set.directory.zero();
    set.low_table.zero();
    set.console_table.zero();

    // 0..4MB: identity-mapped small pages, only the framebuffer page present.
    let fb_page_index = table_index(VGA_PHYS_BASE as u32);
    set.low_table
        .entry_mut(fb_page_index)
        .set(VGA_PHYS_BASE as u32, EntryFlags::PRESENT | EntryFlags::WRITABLE);
    let low_table_phys = set.low_table.as_phys_addr();
    set.directory
        .entry_mut(dir_index(0))
        .set(low_table_phys, EntryFlags::PRESENT | EntryFlags::WRITABLE);

    // 4..8MB: kernel image, one large page, kernel-only.
    set.directory.entry_mut(dir_index(KERNEL_IMAGE_PHYS_BASE)).set(
        KERNEL_IMAGE_PHYS_BASE,
        EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::HUGE_PAGE,
    );

    // Kernel window over page-directory storage, so the core can rewrite
    // slot tables regardless of which directory is currently installed.
    set.directory.entry_mut(dir_index(KERNEL_WINDOW_PHYS_BASE)).set(
        KERNEL_WINDOW_PHYS_BASE,
        EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::HUGE_PAGE,
    );

    // Per-process 4 MB program window, user-accessible.
    let program_phys = PROG_PHYS_BASE as u32 + (slot as u32) * PROGRAM_WINDOW_SIZE as u32;
    set.directory.entry_mut(dir_index(PROGRAM_WINDOW_VADDR)).set(
        program_phys,
        EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER | EntryFlags::HUGE_PAGE,
    );

    // Per-process 4 KB console page.
    set.console_table.entry_mut(table_index(CONSOLE_PAGE_VADDR)).set(
        console_frame.phys_addr(),
        EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER,
    );
    let console_table_phys = set.console_table.as_phys_addr();
    set.directory.entry_mut(dir_index(CONSOLE_PAGE_VADDR)).set(
        console_table_phys,
        EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER,
    );

    // every other directory entry is left absent (zeroed above).
}

/// Install `slot`'s page directory as the live translation (`cr3`).
pub fn install(slot: usize) {
    let phys = {
        let tables = SLOT_TABLES.lock();
        tables[slot].directory.as_phys_addr()
    };
    // SAFETY: `phys` is the physical address of a fully built page
    // directory for `slot`, produced by `build_for_slot`.
    unsafe {
        asm!("mov cr3, {0:e}", in(reg) phys, options(nostack, preserves_flags));
    }
    CURRENT_SLOT.store(slot, Ordering::Relaxed);
    invalidate_page(CONSOLE_PAGE_VADDR);
}

/// Update only `slot`'s console-page mapping to back `frame`, then
/// invalidate the stale translation.
pub fn set_console_frame(slot: usize, frame: ConsoleFrame) {
    {
        let mut tables = SLOT_TABLES.lock();
        tables[slot]
            .console_table
            .entry_mut(table_index(CONSOLE_PAGE_VADDR))
            .set(frame.phys_addr(), EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER);
    }
    if CURRENT_SLOT.load(Ordering::Relaxed) == slot {
        invalidate_page(CONSOLE_PAGE_VADDR);
    }
}

fn invalidate_page(vaddr: u32) {
    // SAFETY: `invlpg` only flushes a stale TLB entry; always safe.
    unsafe {
        asm!("invlpg [{0:e}]", in(reg) vaddr, options(nostack, preserves_flags));
    }
}

/// Which physical frame currently backs `terminal`'s console page:
/// the real framebuffer if it is the active terminal, otherwise its
/// shadow frame.
pub fn console_frame_for(terminal: usize) -> ConsoleFrame {
    if terminal == crate::console::terminal::active_index() {
        ConsoleFrame::Framebuffer
    } else {
        let shadow_phys =
            crate::console::terminal::CONSOLE.lock().terminals[terminal].shadow.as_ptr() as u32;
        ConsoleFrame::Shadow(shadow_phys)
    }
}

/// Called by the console multiplexor after switching the active terminal
/// from `prev` to `next`: every process owning terminal `prev` now backs
/// its console page with that terminal's shadow frame, and every process
/// owning terminal `next` now backs it with the real framebuffer.
pub fn retarget_console_pages(prev: usize, next: usize) {
    crate::process::table::for_each_on_terminal(prev, |slot| {
        set_console_frame(slot, console_frame_for(prev));
    });
    crate::process::table::for_each_on_terminal(next, |slot| {
        set_console_frame(slot, console_frame_for(next));
    });
}

/// Enable the Page Size Extension (`cr4` bit 4), required for the 4 MB
/// large-page directory entries this layout depends on.
///
/// # Safety
///
/// Must run once, before any page directory built by this module is
/// installed.
unsafe fn enable_pse() {
    // SAFETY: sets cr4.PSE; the caller's contract is that this runs
    // before paging depending on it is enabled.
    unsafe {
        asm!(
            "mov {tmp:e}, cr4",
            "or {tmp:e}, 0x10",
            "mov cr4, {tmp:e}",
            tmp = out(reg) _,
            options(nostack, preserves_flags)
        );
    }
}

pub fn init() {
    // SAFETY: called once from `mm::init`, before any slot's directory is built.
    unsafe { enable_pse() };
}

pub const CONSOLE_PAGE_LEN: usize = CONSOLE_PAGE_SIZE;
pub const _ASSERT_PAGE_SIZES: () = assert!(PAGE_SIZE_4K == CONSOLE_PAGE_SIZE);
