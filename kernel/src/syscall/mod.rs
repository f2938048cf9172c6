//! System-call gate (§4.7): the ten numbered calls, argument validation,
//! and the boundary where every failure collapses to `-1`.
//!
//! `dispatch` is the `extern "C"` handler `arch::x86::idt`'s hand-written
//! trampoline calls; its four-argument shape (`eax, ebx, ecx, edx`) is
//! dictated by that trampoline's push order, not chosen here. Grounded on
//! the teacher's capability-syscall dispatcher
//! (`cap::syscall`/`ipc::syscall`) for the "validate, then route to a
//! core operation, collapsing every error to one sentinel" shape; the
//! teacher's calls are capability-handle based; these are POSIX-shaped
//! per the reference ABI (§6), so the routing table differs but the
//! validate-then-dispatch skeleton does not.

use crate::config::{CONSOLE_PAGE_VADDR, MAX_ARGS, MAX_NAME, PROGRAM_WINDOW_SIZE, PROGRAM_WINDOW_VADDR};
use crate::error::{KernelError, KernelResult};
use crate::process::pcb::Pcb;

const SYS_HALT: i32 = 1;
const SYS_EXECUTE: i32 = 2;
const SYS_READ: i32 = 3;
const SYS_WRITE: i32 = 4;
const SYS_OPEN: i32 = 5;
const SYS_CLOSE: i32 = 6;
const SYS_GETARGS: i32 = 7;
const SYS_VIDMAP: i32 = 8;
const SYS_SET_HANDLER: i32 = 9;
const SYS_SIGRETURN: i32 = 10;

/// `execute`'s command line never exceeds name + one space + args.
const MAX_COMMAND_LEN: usize = MAX_NAME + 1 + MAX_ARGS;

fn current_pcb() -> &'static mut Pcb {
    crate::process::table::get(crate::sched::current_slot())
}

/// Validate that `[ptr, ptr + len)` lies entirely within the calling
/// process's program window (§4.2/§4.7: every user pointer is checked
/// before dereference).
fn validate_user_range(ptr: u32, len: usize) -> KernelResult<()> {
    let end = ptr
        .checked_add(len as u32)
        .ok_or(KernelError::InvalidArgument { reason: "buffer overflows address space" })?;
    let window_end = PROGRAM_WINDOW_VADDR + PROGRAM_WINDOW_SIZE as u32;
    if ptr >= PROGRAM_WINDOW_VADDR && end <= window_end {
        Ok(())
    } else {
        Err(KernelError::InvalidArgument { reason: "buffer outside program window" })
    }
}

/// Copy a NUL-terminated user string of at most `max_len` bytes
/// (including the NUL) into `out`, validating the source range first.
fn copy_user_cstr(ptr: u32, max_len: usize, out: &mut [u8]) -> KernelResult<usize> {
    validate_user_range(ptr, max_len)?;
    // SAFETY: `validate_user_range` confirmed `[ptr, ptr + max_len)` lies
    // inside the currently installed process's program window, which is
    // mapped present and user-readable.
    let src = unsafe { core::slice::from_raw_parts(ptr as *const u8, max_len) };
    let len = src.iter().position(|&b| b == 0).unwrap_or(max_len);
    if len > out.len() {
        return Err(KernelError::InvalidArgument { reason: "string too long" });
    }
    out[..len].copy_from_slice(&src[..len]);
    Ok(len)
}

/// Borrow a validated, mutable user buffer for the duration of `f`.
fn with_user_buf_mut<R>(ptr: u32, len: usize, f: impl FnOnce(&mut [u8]) -> R) -> KernelResult<R> {
    validate_user_range(ptr, len)?;
    // SAFETY: see `validate_user_range`'s contract above.
    let buf = unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len) };
    Ok(f(buf))
}

fn with_user_buf<R>(ptr: u32, len: usize, f: impl FnOnce(&[u8]) -> R) -> KernelResult<R> {
    validate_user_range(ptr, len)?;
    // SAFETY: see `validate_user_range`'s contract above.
    let buf = unsafe { core::slice::from_raw_parts(ptr as *const u8, len) };
    Ok(f(buf))
}

fn sys_execute(command_ptr: u32) -> i32 {
    let mut buf = [0u8; MAX_COMMAND_LEN];
    match copy_user_cstr(command_ptr, MAX_COMMAND_LEN, &mut buf) {
        Ok(len) => crate::process::execute(&buf[..len]),
        Err(e) => e.to_syscall_result(),
    }
}

fn sys_open(name_ptr: u32) -> i32 {
    let mut buf = [0u8; crate::fs::MAX_FILE_NAME_LEN];
    let len = match copy_user_cstr(name_ptr, crate::fs::MAX_FILE_NAME_LEN, &mut buf) {
        Ok(len) => len,
        Err(e) => return e.to_syscall_result(),
    };
    match crate::io::open(current_pcb(), &buf[..len]) {
        Ok(fd) => fd as i32,
        Err(e) => e.to_syscall_result(),
    }
}

fn sys_close(fd: u32) -> i32 {
    match crate::io::close(current_pcb(), fd as usize) {
        Ok(()) => 0,
        Err(e) => e.to_syscall_result(),
    }
}

fn sys_read(fd: u32, buf_ptr: u32, n: u32) -> i32 {
    let result = with_user_buf_mut(buf_ptr, n as usize, |buf| crate::io::read(current_pcb(), fd as usize, buf));
    match result {
        Ok(Ok(read)) => read as i32,
        Ok(Err(e)) | Err(e) => e.to_syscall_result(),
    }
}

fn sys_write(fd: u32, buf_ptr: u32, n: u32) -> i32 {
    let result = with_user_buf(buf_ptr, n as usize, |buf| crate::io::write(current_pcb(), fd as usize, buf));
    match result {
        Ok(Ok(written)) => written as i32,
        Ok(Err(e)) | Err(e) => e.to_syscall_result(),
    }
}

fn sys_getargs(buf_ptr: u32, n: u32) -> i32 {
    let pcb = current_pcb();
    let args_len = pcb.args().len();
    if (n as usize) < args_len + 1 {
        return KernelError::InvalidArgument { reason: "getargs buffer too small" }.to_syscall_result();
    }
    let result = with_user_buf_mut(buf_ptr, n as usize, |buf| {
        buf[..args_len].copy_from_slice(pcb.args());
        buf[args_len] = 0;
    });
    match result {
        Ok(()) => 0,
        Err(e) => e.to_syscall_result(),
    }
}

fn sys_vidmap(out_ptr: u32) -> i32 {
    let result = with_user_buf_mut(out_ptr, 4, |buf| {
        buf.copy_from_slice(&CONSOLE_PAGE_VADDR.to_ne_bytes());
    });
    match result {
        Ok(()) => 0,
        Err(e) => e.to_syscall_result(),
    }
}

/// Route one system call. Unknown call numbers and every validation
/// failure return `-1`, per §4.7 and §7's policy that the ABI boundary
/// never distinguishes failure kinds.
pub extern "C" fn dispatch(number: i32, arg1: u32, arg2: u32, arg3: u32) -> i32 {
    match number {
        SYS_HALT => crate::process::syscall_halt(arg1 as u8),
        SYS_EXECUTE => sys_execute(arg1),
        SYS_READ => sys_read(arg1, arg2, arg3),
        SYS_WRITE => sys_write(arg1, arg2, arg3),
        SYS_OPEN => sys_open(arg1),
        SYS_CLOSE => sys_close(arg1),
        SYS_GETARGS => sys_getargs(arg1, arg2),
        SYS_VIDMAP => sys_vidmap(arg1),
        SYS_SET_HANDLER | SYS_SIGRETURN => -1,
        _ => -1,
    }
}
