//! 32-bit Global Descriptor Table and Task State Segment.
//!
//! The teacher builds its GDT/TSS through the `x86_64` crate's typed
//! `GlobalDescriptorTable`/`TaskStateSegment` builders, which describe
//! long-mode descriptors and do not fit a 32-bit protected-mode layout.
//! This builds the eight-byte segment descriptors by hand instead.
//!
//! Layout (selectors are byte offsets into the table):
//! - 0x00: null descriptor
//! - 0x08: kernel code segment (ring 0)
//! - 0x10: kernel data segment (ring 0)
//! - 0x18: user code segment (ring 3, selector 0x1B with RPL)
//! - 0x20: user data segment (ring 3, selector 0x23 with RPL)
//! - 0x28: TSS descriptor

use core::arch::asm;
use core::mem::size_of;

use lazy_static::lazy_static;
use spin::Mutex;

pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
const TSS_SELECTOR: u16 = 0x28;

const GDT_ENTRIES: usize = 6;

/// One flat 32-bit segment descriptor, access byte and flags set per the
/// usual "flat model" convention (base 0, limit 0xFFFFF with 4 KB
/// granularity, covering the full 4 GB address space).
const fn flat_descriptor(access: u8, flags: u8) -> u64 {
    let limit_low: u64 = 0xFFFF;
    let base: u64 = 0;
    let limit_high_and_flags: u64 = 0xF | ((flags as u64) << 4);
    limit_low
        | (base & 0xFFFFFF) << 16
        | (access as u64) << 40
        | limit_high_and_flags << 48
        | ((base >> 24) & 0xFF) << 56
}

/// 32-bit hardware TSS. Only `ss0`/`esp0` are used by Nimbus (there is no
/// hardware task switching; the TSS exists purely to supply ring0's stack
/// pointer on a ring3->ring0 interrupt/trap).
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Tss {
    prev_task: u16,
    _r0: u16,
    pub esp0: u32,
    pub ss0: u16,
    _r1: u16,
    esp1: u32,
    ss1: u16,
    _r2: u16,
    esp2: u32,
    ss2: u16,
    _r3: u16,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u16,
    _r4: u16,
    cs: u16,
    _r5: u16,
    ss: u16,
    _r6: u16,
    ds: u16,
    _r7: u16,
    fs: u16,
    _r8: u16,
    gs: u16,
    _r9: u16,
    ldt: u16,
    _r10: u16,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Self {
            prev_task: 0,
            _r0: 0,
            esp0: 0,
            ss0: KERNEL_DATA_SELECTOR,
            _r1: 0,
            esp1: 0,
            ss1: 0,
            _r2: 0,
            esp2: 0,
            ss2: 0,
            _r3: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            _r4: 0,
            cs: 0,
            _r5: 0,
            ss: 0,
            _r6: 0,
            ds: 0,
            _r7: 0,
            fs: 0,
            _r8: 0,
            gs: 0,
            _r9: 0,
            ldt: 0,
            _r10: 0,
            trap: 0,
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

static TSS: Mutex<Tss> = Mutex::new(Tss::new());

#[repr(C, align(8))]
struct Gdt([u64; GDT_ENTRIES]);

lazy_static! {
    static ref GDT: Mutex<Gdt> = Mutex::new(build_gdt());
}

fn build_gdt() -> Gdt {
    let mut entries = [0u64; GDT_ENTRIES];
    entries[0] = 0;
    entries[1] = flat_descriptor(0x9A, 0xC); // kernel code: present, ring0, exec/read
    entries[2] = flat_descriptor(0x92, 0xC); // kernel data: present, ring0, read/write
    entries[3] = flat_descriptor(0xFA, 0xC); // user code: present, ring3, exec/read
    entries[4] = flat_descriptor(0xF2, 0xC); // user data: present, ring3, read/write
    entries[5] = 0; // patched with the TSS descriptor by `init`
    Gdt(entries)
}

fn tss_descriptor(base: u32, limit: u32) -> u64 {
    let access: u64 = 0x89; // present, ring0, 32-bit available TSS
    (limit as u64 & 0xFFFF)
        | (base as u64 & 0xFFFFFF) << 16
        | access << 40
        | ((limit as u64 >> 16) & 0xF) << 48
        | ((base as u64 >> 24) & 0xFF) << 56
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

/// Install the GDT and TSS and reload every segment register.
///
/// # Safety
///
/// Must run once during boot, before any ring transition.
pub unsafe fn init() {
    let tss_addr = &*TSS.lock() as *const Tss as u32;
    let tss_limit = (size_of::<Tss>() - 1) as u32;

    {
        let mut gdt = GDT.lock();
        gdt.0[5] = tss_descriptor(tss_addr, tss_limit);
    }

    let gdt_ptr = {
        let gdt = GDT.lock();
        GdtPointer {
            limit: (size_of::<[u64; GDT_ENTRIES]>() - 1) as u16,
            base: gdt.0.as_ptr() as u32,
        }
    };

    // SAFETY: `gdt_ptr` points at a `'static`-lifetime table (the
    // `lazy_static` GDT), and the selectors reloaded below are exactly the
    // ones just installed. `ltr` loads the task register with the TSS
    // selector at offset 0x28.
    unsafe {
        asm!(
            "lgdt [{0}]",
            in(reg) &gdt_ptr,
            options(readonly, nostack, preserves_flags)
        );
        reload_segments();
        asm!("ltr {0:x}", in(reg) TSS_SELECTOR, options(nostack, preserves_flags));
    }
}

/// Reload CS via a far jump and the data segment registers directly.
///
/// # Safety
///
/// Must only run immediately after `lgdt` with the selectors Nimbus's GDT
/// actually defines.
unsafe fn reload_segments() {
    // SAFETY: `2f` label is a valid return target for the far jump;
    // KERNEL_CODE_SELECTOR/KERNEL_DATA_SELECTOR were just installed.
    unsafe {
        asm!(
            "push {code_sel}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            "mov ax, {data_sel:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            code_sel = in(reg) KERNEL_CODE_SELECTOR as u32,
            data_sel = in(reg) KERNEL_DATA_SELECTOR,
            tmp = out(reg) _,
        );
    }
}

/// Update the ring0 stack pointer the CPU loads into `esp` on a ring3 ->
/// ring0 transition (interrupt, exception, or the syscall software
/// interrupt). Called by the scheduler on every context switch.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}
