//! Kernel-wide error type.
//!
//! Every fallible kernel operation returns a [`KernelResult`]. The variant
//! set mirrors the taxonomy the syscall layer maps back onto the -1 ABI:
//! negative-return POSIX-style syscalls collapse everything down to "it
//! failed", but the kernel's internal call graph keeps the detail so logs
//! and the fatal-exception report can say why.

use core::fmt;

/// Main kernel error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Name does not resolve in the file system.
    NotFound { resource: &'static str },
    /// `execute` target is not an ELF (magic mismatch) or the image is
    /// smaller than a minimal loadable program.
    InvalidImage { reason: &'static str },
    /// No free PCB slot, no free capability/fd index, process table full.
    ResourceExhausted { resource: &'static str },
    /// Bad fd, buffer outside the program window, tick rate not a power of
    /// two in `[2, 1024]`, `getargs` buffer too small, and similar
    /// argument-shaped mistakes.
    InvalidArgument { reason: &'static str },
    /// Write on a read-only kind, read on a write-only kind.
    NotSupported { operation: &'static str },
    /// A CPU exception (page fault, GPF, divide-by-zero, ...) from user
    /// mode. Carries enough to build the one-line terminal report.
    Fatal {
        exception: &'static str,
        faulting_eip: u32,
    },
    /// Subsystem method called before its `init()` ran.
    NotInitialized { subsystem: &'static str },
}

/// Result type alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Maps a [`KernelError`] onto the syscall ABI's single failure value.
    ///
    /// Every Nimbus syscall returns `i32`; success is `>= 0` and failure is
    /// always exactly `-1` (the kernel does not expose `errno`-style codes
    /// to user programs). Kept as an associated fn rather than a `From`
    /// impl so the conversion reads as "syscall result", not "arbitrary i32
    /// coercion", at each call site.
    pub fn to_syscall_result(self) -> i32 {
        -1
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { resource } => write!(f, "not found: {resource}"),
            Self::InvalidImage { reason } => write!(f, "invalid executable image: {reason}"),
            Self::ResourceExhausted { resource } => write!(f, "resource exhausted: {resource}"),
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::NotSupported { operation } => write!(f, "not supported: {operation}"),
            Self::Fatal {
                exception,
                faulting_eip,
            } => write!(f, "{exception} at eip=0x{faulting_eip:08x}"),
            Self::NotInitialized { subsystem } => {
                write!(f, "subsystem not initialized: {subsystem}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_maps_to_minus_one() {
        let errs = [
            KernelError::NotFound { resource: "file" },
            KernelError::InvalidImage { reason: "bad magic" },
            KernelError::ResourceExhausted { resource: "pcb" },
            KernelError::InvalidArgument { reason: "bad fd" },
            KernelError::NotSupported { operation: "write" },
            KernelError::Fatal {
                exception: "page fault",
                faulting_eip: 0,
            },
            KernelError::NotInitialized { subsystem: "fs" },
        ];
        for e in errs {
            assert_eq!(e.to_syscall_result(), -1);
        }
    }

    /// No `alloc` in this crate (Non-goal: no dynamic memory allocation),
    /// so `Display` is exercised through a fixed buffer instead of
    /// `format!`, which would need a heap-backed `String`.
    struct BufWriter<'a> {
        buf: &'a mut [u8],
        len: usize,
    }

    impl fmt::Write for BufWriter<'_> {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let n = s.len().min(self.buf.len() - self.len);
            self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
            self.len += n;
            Ok(())
        }
    }

    #[test]
    fn display_includes_detail() {
        let e = KernelError::InvalidArgument {
            reason: "tick rate not a power of two",
        };
        let mut buf = [0u8; 64];
        let mut w = BufWriter { buf: &mut buf, len: 0 };
        fmt::write(&mut w, format_args!("{e}")).unwrap();
        let s = core::str::from_utf8(&buf[..w.len]).unwrap();
        assert!(s.contains("tick rate"));
    }
}
