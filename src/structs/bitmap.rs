use std::fmt::Display;

use super::*;

const BITS_IN_BYTE: u32 = 8;

impl Bitmap {
    /// Bitmap of a freshly formatted volume: only the reserved region is in use
    pub fn new(superblock: &Superblock) -> Self {
        let bytes = superblock.bitmap_blocks as usize * superblock.block_size as usize;
        let mut bitmap = Self {
            bits: BitVec::from_vec(vec![0u8; bytes]),
            count: superblock.total_blocks,
            position: superblock.bitmap_start,
            block_size: superblock.block_size,
        };
        bitmap.bits[..=superblock.directory_block as usize].fill(true);
        bitmap
    }

    /// Modify occupancy
    pub(crate) fn set(&mut self, index: u32, value: bool) -> Result<(), Error> {
        if index >= self.count {
            return Err(Error::InvalidBlock);
        }
        self.bits.set(index as usize, value);
        Ok(())
    }

    /// Get occupancy
    pub(crate) fn get(&self, index: u32) -> Result<bool, Error> {
        if index >= self.count {
            return Err(Error::InvalidBlock);
        }
        Ok(self.bits[index as usize])
    }

    /// First clear bit at or after `start`
    pub(crate) fn next_free(&self, start: u32) -> Option<u32> {
        if start >= self.count {
            return None;
        }
        self.bits[start as usize..self.count as usize]
            .first_zero()
            .map(|offset| start + offset as u32)
    }

    pub(crate) fn count_free(&self) -> u32 {
        self.bits[..self.count as usize].count_zeros() as u32
    }

    pub(crate) fn count_used(&self) -> u32 {
        self.bits[..self.count as usize].count_ones() as u32
    }

    /// Indexes of every clear bit, ascending
    pub(crate) fn free_indexes(&self) -> Vec<u32> {
        self.bits[..self.count as usize]
            .iter_zeros()
            .map(|index| index as u32)
            .collect()
    }

    /// Bitmap block holding the bit for `index`
    pub(crate) fn block_of(&self, index: u32) -> u32 {
        self.position + index / (self.block_size * BITS_IN_BYTE)
    }

    /// Load bitmap from its blocks on the device
    pub(crate) fn load(&mut self, disk: &mut Disk) -> Result<(), Error> {
        let block_size = self.block_size as usize;
        let raw = self.bits.as_raw_mut_slice();
        for (offset, chunk) in raw.chunks_mut(block_size).enumerate() {
            disk.read_block(self.position + offset as u32, chunk)?;
        }
        Ok(())
    }

    /// Flush every bitmap block to the device
    pub(crate) fn flush(&self, disk: &mut Disk) -> Result<(), Error> {
        let blocks = self.bits.as_raw_slice().len() / self.block_size as usize;
        for offset in 0..blocks as u32 {
            self.flush_block(disk, self.position + offset)?;
        }
        Ok(())
    }

    /// Flush only the bitmap block `block`
    pub(crate) fn flush_block(&self, disk: &mut Disk, block: u32) -> Result<(), Error> {
        let block_size = self.block_size as usize;
        let start = (block - self.position) as usize * block_size;
        disk.write_block(block, &self.bits.as_raw_slice()[start..start + block_size])
    }
}

impl Display for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, bit) in self.bits[..self.count as usize].iter().enumerate() {
            if index > 0 && index % 64 == 0 {
                writeln!(f)?;
            }
            write!(f, "{}", if *bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}
