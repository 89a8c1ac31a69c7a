use std::fmt::Display;

use super::*;

impl Superblock {
    /// Lay out a fresh volume of `total_blocks` blocks
    pub fn new(total_blocks: u32, block_size: u32) -> Result<Self, Error> {
        if !Self::valid_block_size(block_size) {
            return Err(Error::InvalidBlockSize);
        }
        if total_blocks < MINIMUM_BLOCKS {
            return Err(Error::InsufficientBlocks);
        }
        let bitmap_blocks = Self::bitmap_blocks_for(total_blocks, block_size);
        let directory_block = BITMAP_START + bitmap_blocks;
        if directory_block + 1 >= total_blocks {
            return Err(Error::InsufficientBlocks);
        }
        Ok(Self {
            total_blocks,
            bitmap_start: BITMAP_START,
            bitmap_blocks,
            directory_block,
            free_blocks: total_blocks - (directory_block + 1),
            block_size,
            magic: MAGIC_SIGNATURE,
            version: VERSION,
        })
    }

    pub fn valid_block_size(block_size: u32) -> bool {
        block_size.is_power_of_two() && (DEFAULT_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size)
    }

    pub(crate) fn bitmap_blocks_for(total_blocks: u32, block_size: u32) -> u32 {
        let bits_per_block = block_size as u64 * 8;
        ((total_blocks as u64 + bits_per_block - 1) / bits_per_block) as u32
    }

    /// Count of direct pointers in an index block
    pub fn direct_pointers(&self) -> usize {
        self.block_size as usize / POINTER_SIZE - 1
    }

    /// Count of entries in one directory table block
    pub fn entries_per_block(&self) -> usize {
        self.block_size as usize / ENTRY_SIZE
    }

    /// Largest file the direct and indirect pointers can address
    pub fn max_file_size(&self) -> u64 {
        2 * self.direct_pointers() as u64 * self.block_size as u64
    }

    /// End offset of a `length` byte write at `offset`, if the file can hold it
    pub fn write_end(&self, offset: u64, length: usize) -> Result<u64, Error> {
        offset
            .checked_add(length as u64)
            .filter(|&end| end <= self.max_file_size())
            .ok_or(Error::OutOfRange)
    }

    /// Blocks holding the superblock, bitmap and root directory
    pub fn is_reserved(&self, index: u32) -> bool {
        index <= self.directory_block
    }

    /// Load superblock from block 0 and switch `disk` to its block size
    pub fn load(disk: &mut Disk) -> Result<Self, Error> {
        disk.set_block_size(DEFAULT_BLOCK_SIZE);
        let mut buffer = vec![0u8; DEFAULT_BLOCK_SIZE as usize];
        disk.read_block(SUPERBLOCK_INDEX, &mut buffer)?;
        let superblock: Superblock =
            bytemuck::pod_read_unaligned(&buffer[..std::mem::size_of::<Superblock>()]);
        superblock.validate()?;
        disk.set_block_size(superblock.block_size);
        if disk.length()? < superblock.total_blocks as u64 * superblock.block_size as u64 {
            return Err(Error::Corrupted("image shorter than volume"));
        }
        Ok(superblock)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.magic != MAGIC_SIGNATURE {
            return Err(Error::NotFormatted);
        }
        if self.version != VERSION {
            return Err(Error::Corrupted("unsupported version"));
        }
        if !Self::valid_block_size(self.block_size) {
            return Err(Error::Corrupted("block size"));
        }
        if self.bitmap_start != BITMAP_START
            || self.bitmap_blocks != Self::bitmap_blocks_for(self.total_blocks, self.block_size)
            || self.directory_block != self.bitmap_start + self.bitmap_blocks
            || self.directory_block >= self.total_blocks
        {
            return Err(Error::Corrupted("superblock layout"));
        }
        if self.free_blocks > self.total_blocks - (self.directory_block + 1) {
            return Err(Error::Corrupted("free block count"));
        }
        Ok(())
    }

    /// Persist superblock to block 0
    pub fn flush(&self, disk: &mut Disk) -> Result<(), Error> {
        let mut buffer = vec![0u8; self.block_size as usize];
        let raw = bytemuck::bytes_of(self);
        buffer[..raw.len()].copy_from_slice(raw);
        disk.write_block(SUPERBLOCK_INDEX, &buffer)
    }
}

impl Display for Superblock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total blocks:    {}", self.total_blocks)?;
        writeln!(f, "Block size:      {}", self.block_size)?;
        writeln!(f, "Bitmap start:    {}", self.bitmap_start)?;
        writeln!(f, "Bitmap blocks:   {}", self.bitmap_blocks)?;
        writeln!(f, "Directory block: {}", self.directory_block)?;
        write!(f, "Free blocks:     {}", self.free_blocks)
    }
}
