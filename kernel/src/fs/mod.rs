//! Read-only on-disk file system.
//!
//! The image is a flat byte blob, laid out once at build time and loaded
//! somewhere the bootloader handoff leaves it (out of this core's scope):
//! one boot block, then `num_inodes` inode blocks, then the data blocks,
//! every block `BLOCK_SIZE` bytes. Grounded directly on
//! `fs/ece391_fs.c`/`include/fs/ece391_fs.h`: the three on-disk record
//! shapes (`RawDentry`/`BootBlock`/`InodeBlock`) and `read_data`'s
//! block-walking loop are a line-for-line port of that driver, expressed
//! as packed structs and slices instead of casts through `void *`.
//! `fs/fs.c`'s thin `file_read`/`dir_read` bridge is folded into
//! `io::read` instead of kept as a separate layer, since every kind's
//! dispatch already lives in one place there.

use crate::config::FS_IMAGE_PHYS_BASE;
use crate::error::{KernelError, KernelResult};

pub const BLOCK_SIZE: usize = 4096;
pub const MAX_FILE_NAME_LEN: usize = 32;
pub const MAX_DIRECTORY_ENTRIES: usize = 63;
pub const MAX_DATA_BLOCKS_PER_INODE: usize = 1023;

/// On-disk file type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// The virtualized periodic tick source, opened like any other name.
    TickSource,
    Directory,
    RegularFile,
}

impl FileType {
    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(FileType::TickSource),
            1 => Some(FileType::Directory),
            2 => Some(FileType::RegularFile),
            _ => None,
        }
    }
}

#[repr(C, packed)]
struct RawDentry {
    name: [u8; MAX_FILE_NAME_LEN],
    file_type: u32,
    inode: u32,
    reserved: [u8; 24],
}

#[repr(C, packed)]
struct BootBlock {
    num_dentries: u32,
    num_inodes: u32,
    num_data_blocks: u32,
    reserved: [u8; 52],
    dentries: [RawDentry; MAX_DIRECTORY_ENTRIES],
}

#[repr(C, packed)]
struct InodeBlock {
    file_length: u32,
    data_blocks: [u32; MAX_DATA_BLOCKS_PER_INODE],
}

/// A directory entry, resolved out of the raw on-disk layout into a
/// NUL-free name slice and a typed `FileType`.
#[derive(Clone, Copy)]
pub struct Dentry {
    pub file_type: FileType,
    pub inode: u32,
    name: [u8; MAX_FILE_NAME_LEN],
    name_len: usize,
}

impl Dentry {
    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len]
    }
}

fn boot_block() -> &'static BootBlock {
    // SAFETY: `FS_IMAGE_PHYS_BASE` sits inside the 4 MB kernel-image region
    // every slot's page directory maps present and kernel-only
    // (`mm::vmm::build_for_slot`), so it is valid and readable regardless
    // of which slot is currently installed. The image is never written
    // after boot, so this shared reference never aliases a mutation.
    unsafe { &*(FS_IMAGE_PHYS_BASE as *const BootBlock) }
}

fn inode_block(inode: u32) -> &'static InodeBlock {
    // SAFETY: the inode table immediately follows the one-block boot
    // block; callers range-check `inode` against `num_inodes` first.
    unsafe {
        let base = (FS_IMAGE_PHYS_BASE as usize + BLOCK_SIZE) as *const InodeBlock;
        &*base.add(inode as usize)
    }
}

fn data_block(block: u32, num_inodes: u32) -> &'static [u8; BLOCK_SIZE] {
    // SAFETY: the data region follows the boot block and the inode table;
    // callers range-check `block` against `num_data_blocks` first.
    unsafe {
        let base =
            (FS_IMAGE_PHYS_BASE as usize + BLOCK_SIZE * (1 + num_inodes as usize)) as *const u8;
        &*(base.add(block as usize * BLOCK_SIZE) as *const [u8; BLOCK_SIZE])
    }
}

pub fn init() {
    let boot = boot_block();
    let (entries, inodes, blocks) = (boot.num_dentries, boot.num_inodes, boot.num_data_blocks);
    log::info!("fs initialized: {entries} entries, {inodes} inodes, {blocks} data blocks");
}

fn to_dentry(raw: &RawDentry) -> Option<Dentry> {
    let file_type = FileType::from_raw(raw.file_type)?;
    let name_len = raw.name.iter().position(|&b| b == 0).unwrap_or(MAX_FILE_NAME_LEN);
    Some(Dentry {
        file_type,
        inode: raw.inode,
        name: raw.name,
        name_len,
    })
}

/// Resolve `name` against the root directory. `None` on no match or an
/// unrecognized on-disk file type.
pub fn read_dentry_by_name(name: &[u8]) -> Option<Dentry> {
    let boot = boot_block();
    let count = (boot.num_dentries as usize).min(MAX_DIRECTORY_ENTRIES);
    for raw in &boot.dentries[..count] {
        let entry_len = raw.name.iter().position(|&b| b == 0).unwrap_or(MAX_FILE_NAME_LEN);
        if &raw.name[..entry_len] == name {
            return to_dentry(raw);
        }
    }
    None
}

/// Copy the `index`-th directory entry's name into `buf`. Returns the
/// number of bytes copied, `0` if `index` is out of range.
pub fn read_dentry_by_index(index: u32, buf: &mut [u8]) -> usize {
    let boot = boot_block();
    if index >= boot.num_dentries || index as usize >= MAX_DIRECTORY_ENTRIES {
        return 0;
    }
    let Some(dentry) = to_dentry(&boot.dentries[index as usize]) else {
        return 0;
    };
    let n = buf.len().min(dentry.name_len);
    buf[..n].copy_from_slice(&dentry.name()[..n]);
    n
}

/// Split a byte offset into `(data-block index within the inode,
/// within-block offset)`.
fn block_coords(offset: usize) -> (usize, usize) {
    (offset / BLOCK_SIZE, offset % BLOCK_SIZE)
}

/// Read up to `buf.len()` bytes of `inode`'s data starting at `offset`,
/// capped at EOF. Returns the number of bytes actually copied (`0` at or
/// past EOF, never an error for that case).
pub fn read_data(inode: u32, offset: u32, buf: &mut [u8]) -> KernelResult<usize> {
    let boot = boot_block();
    if inode >= boot.num_inodes {
        return Err(KernelError::InvalidArgument { reason: "inode out of range" });
    }
    let node = inode_block(inode);
    if offset >= node.file_length {
        return Ok(0);
    }
    let remaining = (node.file_length - offset) as usize;
    let to_read = buf.len().min(remaining);

    let mut written = 0;
    while written < to_read {
        let (block_num, block_pos) = block_coords(offset as usize + written);
        if block_num >= MAX_DATA_BLOCKS_PER_INODE {
            break;
        }
        let block_index = node.data_blocks[block_num];
        if block_index >= boot.num_data_blocks {
            return Err(KernelError::InvalidArgument { reason: "data block out of range" });
        }
        let block = data_block(block_index, boot.num_inodes);
        let n = (BLOCK_SIZE - block_pos).min(to_read - written);
        buf[written..written + n].copy_from_slice(&block[block_pos..block_pos + n]);
        written += n;
    }
    Ok(written)
}

/// Resolve `name` and read its contents from the start into `buf`.
pub fn read_file_by_name(name: &[u8], buf: &mut [u8]) -> KernelResult<usize> {
    let dentry = read_dentry_by_name(name).ok_or(KernelError::NotFound { resource: "file" })?;
    read_data(dentry.inode, 0, buf)
}

#[cfg(test)]
mod tests {
    use super::block_coords;

    #[test]
    fn block_coords_splits_offset() {
        assert_eq!(block_coords(0), (0, 0));
        assert_eq!(block_coords(4095), (0, 4095));
        assert_eq!(block_coords(4096), (1, 0));
        assert_eq!(block_coords(9000), (2, 9000 - 2 * 4096));
    }
}
