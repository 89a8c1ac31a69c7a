use log::debug;

use crate::structs::{Block, IndexBlock, NULL_BLOCK};
use crate::{Error, FileSystem};

use super::{BlockCursor, ExtentMap, RawFile};

impl ExtentMap {
    pub(crate) fn load(fs: &mut FileSystem, index_block: u32) -> Result<Self, Error> {
        Ok(Self {
            primary: fs.load_index(index_block)?,
            secondary: None,
            primary_modified: false,
            secondary_modified: false,
        })
    }

    /// Direct pointer capacity of one index block
    fn capacity(&self) -> usize {
        self.primary.direct.len()
    }

    /// Make the indirect block available, allocating it when `allocate`.
    /// Returns false if it does not exist and was not allocated.
    fn load_secondary(&mut self, fs: &mut FileSystem, allocate: bool) -> Result<bool, Error> {
        if self.secondary.is_some() {
            return Ok(true);
        }
        if self.primary.indirect == NULL_BLOCK {
            if !allocate {
                return Ok(false);
            }
            let index = fs.allocate()?;
            debug!(
                "Index block {} gains indirect block {index}",
                self.primary.index
            );
            self.primary.indirect = index;
            self.primary_modified = true;
            self.secondary = Some(IndexBlock::empty(index, fs.block_size()));
            self.secondary_modified = true;
        } else {
            self.secondary = Some(fs.load_index(self.primary.indirect)?);
        }
        Ok(true)
    }

    /// Physical block behind `logical`, allocating on first touch when
    /// `allocate`. The flag is true for a block allocated by this call.
    pub(crate) fn resolve(
        &mut self,
        fs: &mut FileSystem,
        logical: usize,
        allocate: bool,
    ) -> Result<Option<(u32, bool)>, Error> {
        let capacity = self.capacity();
        if logical >= 2 * capacity {
            return Err(Error::OutOfRange);
        }
        let (table, slot, modified) = if logical < capacity {
            (&mut self.primary, logical, &mut self.primary_modified)
        } else {
            if !self.load_secondary(fs, allocate)? {
                return Ok(None);
            }
            match self.secondary.as_mut() {
                Some(secondary) => (secondary, logical - capacity, &mut self.secondary_modified),
                None => return Ok(None),
            }
        };
        if table.direct[slot] != NULL_BLOCK {
            return Ok(Some((table.direct[slot], false)));
        }
        if !allocate {
            return Ok(None);
        }
        let index = fs.allocate()?;
        table.direct[slot] = index;
        *modified = true;
        Ok(Some((index, true)))
    }

    /// Write back whichever index blocks changed
    pub(crate) fn flush(&mut self, fs: &mut FileSystem) -> Result<(), Error> {
        if self.secondary_modified {
            if let Some(secondary) = &self.secondary {
                fs.flush_index(secondary)?;
            }
            self.secondary_modified = false;
        }
        if self.primary_modified {
            fs.flush_index(&self.primary)?;
            self.primary_modified = false;
        }
        Ok(())
    }
}

impl RawFile {
    pub fn new(index_block: u32, block_size: u32) -> Self {
        Self {
            index_block,
            cursor: BlockCursor::new(block_size),
        }
    }

    /// Allocate a fresh index block with every pointer unallocated
    pub fn create(fs: &mut FileSystem) -> Result<Self, Error> {
        let index_block = fs.allocate()?;
        fs.flush_index(&IndexBlock::empty(index_block, fs.block_size()))?;
        Ok(Self::new(index_block, fs.block_size()))
    }

    pub fn index_block(&self) -> u32 {
        self.index_block
    }

    /// Physical data blocks in logical order
    pub fn blocks(&self, fs: &mut FileSystem) -> Result<Vec<u32>, Error> {
        let mut map = ExtentMap::load(fs, self.index_block)?;
        let mut blocks = map.primary.allocated().collect::<Vec<u32>>();
        if map.load_secondary(fs, false)? {
            if let Some(secondary) = &map.secondary {
                blocks.extend(secondary.allocated());
            }
        }
        Ok(blocks)
    }

    /// Physical block behind logical block `logical`, allocating (and
    /// zeroing) it when `allocate`
    pub fn block_at(
        &self,
        fs: &mut FileSystem,
        logical: usize,
        allocate: bool,
    ) -> Result<Option<u32>, Error> {
        let mut map = ExtentMap::load(fs, self.index_block)?;
        let result = Self::resolve_zeroed(&mut map, fs, logical, allocate);
        map.flush(fs)?;
        result
    }

    fn resolve_zeroed(
        map: &mut ExtentMap,
        fs: &mut FileSystem,
        logical: usize,
        allocate: bool,
    ) -> Result<Option<u32>, Error> {
        match map.resolve(fs, logical, allocate)? {
            Some((index, true)) => {
                fs.flush_block(&Block::empty(index, fs.block_size()))?;
                Ok(Some(index))
            }
            Some((index, false)) => Ok(Some(index)),
            None => Ok(None),
        }
    }

    /// Write `data` at byte `offset`. Every block before the written range
    /// is allocated too, so files never contain holes.
    pub fn write(&mut self, fs: &mut FileSystem, offset: u64, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        fs.superblock.write_end(offset, data.len())?;
        let mut map = ExtentMap::load(fs, self.index_block)?;
        let result = self.write_through(&mut map, fs, offset, data);
        map.flush(fs)?;
        result
    }

    fn write_through(
        &mut self,
        map: &mut ExtentMap,
        fs: &mut FileSystem,
        offset: u64,
        data: &[u8],
    ) -> Result<(), Error> {
        let block_size = fs.block_size();
        self.cursor.set(offset);
        for logical in 0..self.cursor.block() as usize {
            Self::resolve_zeroed(map, fs, logical, true)?;
        }
        let mut remaining = data;
        while !remaining.is_empty() {
            let (index, fresh) = map
                .resolve(fs, self.cursor.block() as usize, true)?
                .ok_or(Error::OutOfRange)?;
            let whole = self.cursor.byte() == 0 && remaining.len() >= block_size as usize;
            let mut block = if fresh || whole {
                Block::empty(index, block_size)
            } else {
                fs.load_block(index)?
            };
            let before = remaining.len();
            remaining = block.write_bytes(self.cursor.byte(), remaining);
            fs.flush_block(&block)?;
            self.cursor.advance((before - remaining.len()) as u64);
        }
        Ok(())
    }

    /// Fill `buffer` from byte `offset`. Unallocated blocks are out of range.
    pub fn read(&mut self, fs: &mut FileSystem, offset: u64, buffer: &mut [u8]) -> Result<(), Error> {
        if buffer.is_empty() {
            return Ok(());
        }
        let mut map = ExtentMap::load(fs, self.index_block)?;
        self.cursor.set(offset);
        let mut total_read_bytes = 0;
        while total_read_bytes < buffer.len() {
            let (index, _) = map
                .resolve(fs, self.cursor.block() as usize, false)?
                .ok_or(Error::OutOfRange)?;
            let block = fs.load_block(index)?;
            let read_bytes = usize::min(buffer.len() - total_read_bytes, self.cursor.remaining());
            let start = self.cursor.byte();
            buffer[total_read_bytes..total_read_bytes + read_bytes]
                .copy_from_slice(&block.data[start..start + read_bytes]);
            total_read_bytes += read_bytes;
            self.cursor.advance(read_bytes as u64);
        }
        Ok(())
    }

    /// Free every block reachable from the index block, then the index block
    pub fn release(self, fs: &mut FileSystem) -> Result<(), Error> {
        let primary = fs.load_index(self.index_block)?;
        for block in primary.allocated() {
            fs.free(block)?;
        }
        if primary.indirect != NULL_BLOCK {
            let secondary = fs.load_index(primary.indirect)?;
            for block in secondary.allocated() {
                fs.free(block)?;
            }
            fs.free(primary.indirect)?;
        }
        fs.free(self.index_block)?;
        debug!("Released index block {}", self.index_block);
        Ok(())
    }
}
