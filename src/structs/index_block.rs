use std::fmt::Display;

use super::*;

impl IndexBlock {
    /// Index block at `index` with every pointer unallocated
    pub fn empty(index: u32, block_size: u32) -> Self {
        Self {
            index,
            direct: vec![NULL_BLOCK; Self::capacity(block_size)],
            indirect: NULL_BLOCK,
        }
    }

    /// Count of direct pointers for a block size
    pub fn capacity(block_size: u32) -> usize {
        block_size as usize / POINTER_SIZE - 1
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn direct(&self) -> &[u32] {
        &self.direct
    }

    pub fn indirect(&self) -> u32 {
        self.indirect
    }

    /// Allocated direct pointers, in slot order
    pub fn allocated(&self) -> impl Iterator<Item = u32> + '_ {
        self.direct.iter().copied().filter(|&ptr| ptr != NULL_BLOCK)
    }

    pub fn is_empty(&self) -> bool {
        self.indirect == NULL_BLOCK && self.allocated().next().is_none()
    }

    fn from_block(block: &Block) -> Self {
        let capacity = Self::capacity(block.data.len() as u32);
        let direct = (0..capacity)
            .map(|slot| block.read_any::<u32>(slot * POINTER_SIZE))
            .collect();
        Self {
            index: block.index,
            direct,
            indirect: block.read_any::<u32>(capacity * POINTER_SIZE),
        }
    }

    fn to_block(&self, block_size: u32) -> Block {
        let mut block = Block::empty(self.index, block_size);
        for (slot, ptr) in self.direct.iter().enumerate() {
            block.write_any(slot * POINTER_SIZE, ptr);
        }
        block.write_any(self.direct.len() * POINTER_SIZE, &self.indirect);
        block
    }
}

impl PermanentIndexed for IndexBlock {
    fn load(disk: &mut Disk, index: u32) -> Result<Self, Error> {
        Ok(Self::from_block(&Block::load(disk, index)?))
    }

    fn flush(&self, disk: &mut Disk) -> Result<(), Error> {
        self.to_block(disk.block_size()).flush(disk)
    }
}

impl Display for IndexBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Index block {}", self.index)?;
        write!(f, "Direct pointers:")?;
        for ptr in self.allocated() {
            write!(f, " {ptr}")?;
        }
        writeln!(f)?;
        if self.indirect == NULL_BLOCK {
            write!(f, "Indirect pointer: none")
        } else {
            write!(f, "Indirect pointer: {}", self.indirect)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_block_is_all_sentinels() {
        let index = IndexBlock::empty(4, 512);
        assert_eq![index.direct.len(), 127];
        assert![index.is_empty()];
        let block = index.to_block(512);
        assert![block.data.iter().all(|&b| b == 0xFF)];
    }

    #[test]
    fn load_and_flush() {
        let dev = Cursor::new(Vec::new());
        let mut disk = Disk::create(Box::new(dev), 8 * 512, 512).unwrap();
        let mut index = IndexBlock::empty(5, 512);
        index.direct[0] = 6;
        index.direct[126] = 7;
        index.indirect = 3;
        index.flush(&mut disk).unwrap();
        let loaded = IndexBlock::load(&mut disk, 5).unwrap();
        assert_eq![loaded, index];
        assert_eq![loaded.allocated().collect::<Vec<_>>(), vec![6, 7]];
    }
}
