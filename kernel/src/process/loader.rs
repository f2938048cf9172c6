//! On-disk program image loading and the `execute` argument grammar.
//!
//! Grounded on the teacher's `process::thread` entry-point handling style
//! (load, validate, then hand a raw entry address to the privilege-
//! transition primitive) adapted to this kernel's fixed-offset ELF
//! loading convention (§4.3, §6) instead of a generic loader.

use crate::config::{ELF_ENTRY_OFFSET, ELF_MAGIC, MAX_ARGS, MAX_NAME, PROGRAM_IMAGE_OFFSET};
use crate::error::{KernelError, KernelResult};

/// `name` (bounded to `MAX_NAME`) and `args` (bounded to `MAX_ARGS`),
/// both NUL-terminated, split from one invocation string on its first
/// run of spaces.
pub struct ParsedCommand {
    pub name: [u8; MAX_NAME],
    pub name_len: usize,
    pub args: [u8; MAX_ARGS],
    pub args_len: usize,
}

pub fn parse_command(command: &[u8]) -> KernelResult<ParsedCommand> {
    let mut i = 0;
    while i < command.len() && command[i] == b' ' {
        i += 1;
    }
    let name_start = i;
    while i < command.len() && command[i] != b' ' {
        i += 1;
    }
    let name_bytes = &command[name_start..i];
    if name_bytes.is_empty() || name_bytes.len() >= MAX_NAME {
        return Err(KernelError::InvalidArgument { reason: "program name empty or too long" });
    }

    while i < command.len() && command[i] == b' ' {
        i += 1;
    }
    let args_bytes = &command[i..];
    if args_bytes.len() >= MAX_ARGS {
        return Err(KernelError::InvalidArgument { reason: "argument string too long" });
    }

    let mut name = [0u8; MAX_NAME];
    name[..name_bytes.len()].copy_from_slice(name_bytes);
    let mut args = [0u8; MAX_ARGS];
    args[..args_bytes.len()].copy_from_slice(args_bytes);

    Ok(ParsedCommand {
        name,
        name_len: name_bytes.len(),
        args,
        args_len: args_bytes.len(),
    })
}

/// Read `name` from the root directory into `program_frame` at
/// `PROGRAM_IMAGE_OFFSET`, validate the ELF magic, and return its
/// little-endian entry point.
pub fn load_image(name: &[u8], program_frame: &mut [u8]) -> KernelResult<u32> {
    let dest = &mut program_frame[PROGRAM_IMAGE_OFFSET as usize..];
    let read = crate::fs::read_file_by_name(name, dest)?;

    if read <= ELF_MAGIC.len() || dest[..ELF_MAGIC.len()] != ELF_MAGIC[..] {
        return Err(KernelError::InvalidImage { reason: "missing or mismatched ELF magic" });
    }

    let entry_bytes: [u8; 4] = dest[ELF_ENTRY_OFFSET..ELF_ENTRY_OFFSET + 4]
        .try_into()
        .map_err(|_| KernelError::InvalidImage { reason: "image shorter than entry-point field" })?;
    Ok(u32::from_le_bytes(entry_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_space_run() {
        let parsed = parse_command(b"shell   -x foo").unwrap();
        assert_eq!(&parsed.name[..parsed.name_len], b"shell");
        assert_eq!(&parsed.args[..parsed.args_len], b"-x foo");
    }

    #[test]
    fn parse_with_no_args() {
        let parsed = parse_command(b"ls").unwrap();
        assert_eq!(&parsed.name[..parsed.name_len], b"ls");
        assert_eq!(parsed.args_len, 0);
    }

    #[test]
    fn parse_rejects_empty_name() {
        assert!(parse_command(b"   ").is_err());
    }

    #[test]
    fn parse_rejects_oversized_name() {
        let long = [b'a'; MAX_NAME + 1];
        assert!(parse_command(&long).is_err());
    }
}
