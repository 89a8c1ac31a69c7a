mod block_cursor;
mod directory;
mod raw_file;
mod regular_file;

use crate::structs::{DirEntry, IndexBlock};

pub use directory::Entries;

#[derive(Debug, Clone)]
pub struct BlockCursor {
    pub(crate) block_size: usize,
    pub(crate) current_block: u64,
    pub(crate) current_byte: usize,
}

/// Byte-addressed contents reachable from one index block
#[derive(Debug, Clone)]
pub struct RawFile {
    pub(crate) index_block: u32,
    pub(crate) cursor: BlockCursor,
}

/// Index block and its indirect block as loaded for one operation
#[derive(Debug)]
pub(crate) struct ExtentMap {
    pub(crate) primary: IndexBlock,
    pub(crate) secondary: Option<IndexBlock>,
    pub(crate) primary_modified: bool,
    pub(crate) secondary_modified: bool,
}

/// Directory whose tables an operation works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directory {
    Root,
    /// Sub-directory in root table slot `slot`, owning `index_block`
    Child { slot: usize, index_block: u32 },
}

/// An entry together with the table slot it lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub(crate) parent: Directory,
    pub(crate) table: u32,
    pub(crate) slot: usize,
    pub(crate) entry: DirEntry,
}

#[derive(Debug, Clone)]
pub struct RegularFile {
    pub(crate) location: Located,
    pub(crate) file: RawFile,
}
