mod bitmap;
mod block;
mod directory_entry;
mod index_block;
mod superblock;

use bitvec::prelude::*;
use bytemuck::{Pod, Zeroable};

use crate::filesystem::Disk;
use crate::Error;

pub use directory_entry::EntryName;

pub const DEFAULT_BLOCK_SIZE: u32 = 512;
pub const MAX_BLOCK_SIZE: u32 = 8192;
/// Superblock, one bitmap block, root directory and one data block
pub const MINIMUM_BLOCKS: u32 = 4;
pub const SUPERBLOCK_INDEX: u32 = 0;
pub const BITMAP_START: u32 = 1;
pub const ENTRY_SIZE: usize = 64;
/// Name field length including the terminating NUL
pub const NAME_CAPACITY: usize = 55;
pub const MAX_NAME_LENGTH: usize = NAME_CAPACITY - 1;
pub const POINTER_SIZE: usize = 4;
/// Pointer value meaning "no block assigned"
pub const NULL_BLOCK: u32 = u32::MAX;
pub const MAGIC_SIGNATURE: u32 = 0x4946_5331;
pub const VERSION: u32 = 1;

pub(crate) trait PermanentIndexed: Sized {
    fn load(disk: &mut Disk, index: u32) -> Result<Self, Error>;
    fn flush(&self, disk: &mut Disk) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Superblock {
    /// Total count of blocks in the volume
    pub total_blocks: u32,
    /// First block of the bitmap, always [`BITMAP_START`]
    pub bitmap_start: u32,
    /// Count of blocks occupied by the bitmap
    pub bitmap_blocks: u32,
    /// Block holding the root directory table
    pub directory_block: u32,
    /// Count of blocks not marked in the bitmap
    pub free_blocks: u32,
    /// Block size in bytes
    pub block_size: u32,
    /// Magic signature
    pub magic: u32,
    /// On-disk format version
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct Bitmap {
    /// Bits mapping to block indexes, padded to whole bitmap blocks
    pub(crate) bits: BitVec<u8, Lsb0>,
    /// Number of valid indexes
    pub(crate) count: u32,
    /// First block of the bitmap region
    pub(crate) position: u32,
    pub(crate) block_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block's index
    pub(crate) index: u32,
    /// Raw data as bytes
    pub(crate) data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    RegularFile,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DirEntry {
    /// NUL-terminated name, empty for a free slot
    pub(crate) name: [u8; NAME_CAPACITY],
    /// [`FileKind`] marker byte
    pub(crate) kind: u8,
    /// Index block owned by the entry
    pub(crate) index_block: u32,
    /// Size in bytes
    pub(crate) size: u32,
}

/// One block of directory entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTable {
    pub(crate) index: u32,
    pub(crate) entries: Vec<DirEntry>,
}

/// Direct pointers followed by a single indirect pointer.
/// The indirect block shares this layout, its own indirect slot is unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBlock {
    pub(crate) index: u32,
    pub(crate) direct: Vec<u32>,
    pub(crate) indirect: u32,
}
