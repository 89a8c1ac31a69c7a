use std::fs::OpenOptions;
use std::path::Path;

use log::{debug, info, warn};

use crate::filetypes::RawFile;
use crate::structs::*;
use crate::Error;

mod device;
mod operations;

pub use device::{BlockDevice, Disk};

/// A formatted volume. The superblock, bitmap and root directory are
/// mirrored in memory and written through on every change.
#[derive(Debug)]
pub struct FileSystem {
    pub(crate) superblock: Superblock,
    pub(crate) bitmap: Bitmap,
    pub(crate) root: DirectoryTable,
    pub(crate) disk: Disk,
}

impl FileSystem {
    /// Lay out an empty volume of `total_blocks` blocks on `device`
    pub fn format(
        device: Box<dyn BlockDevice>,
        total_blocks: u32,
        block_size: u32,
    ) -> Result<Self, Error> {
        let superblock = Superblock::new(total_blocks, block_size)?;
        let total_bytes = total_blocks as u64 * block_size as u64;
        let mut disk = Disk::create(device, total_bytes, block_size)?;
        let bitmap = Bitmap::new(&superblock);
        let root = DirectoryTable::empty(superblock.directory_block, block_size);
        superblock.flush(&mut disk)?;
        bitmap.flush(&mut disk)?;
        root.flush(&mut disk)?;
        info!(
            "Formatted volume with {total_blocks} blocks of {block_size} bytes, {} free",
            superblock.free_blocks
        );
        Ok(Self {
            superblock,
            bitmap,
            root,
            disk,
        })
    }

    /// Create or truncate the image at `path` and format it
    pub fn format_image<P: AsRef<Path>>(
        path: P,
        total_blocks: u32,
        block_size: u32,
    ) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::format(Box::new(file), total_blocks, block_size)
    }

    /// Load an existing volume from `device`
    pub fn mount(device: Box<dyn BlockDevice>) -> Result<Self, Error> {
        let mut disk = Disk::open(device);
        let superblock = Superblock::load(&mut disk)?;
        let mut bitmap = Bitmap::new(&superblock);
        bitmap.load(&mut disk)?;
        let root = DirectoryTable::load(&mut disk, superblock.directory_block)?;
        let fs = Self {
            superblock,
            bitmap,
            root,
            disk,
        };
        fs.verify_free_count()?;
        info!(
            "Mounted volume with {} blocks of {} bytes, {} free",
            fs.superblock.total_blocks, fs.superblock.block_size, fs.superblock.free_blocks
        );
        Ok(fs)
    }

    /// Open the image at `path` and mount it
    pub fn mount_image<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::mount(Box::new(file))
    }

    /// Release the backing store
    pub fn into_device(self) -> Box<dyn BlockDevice> {
        self.disk.into_inner()
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn block_size(&self) -> u32 {
        self.superblock.block_size
    }

    /// Ids of every free block, ascending
    pub fn free_block_list(&self) -> Vec<u32> {
        self.bitmap.free_indexes()
    }

    /// Popcount of the bitmap
    pub fn used_blocks(&self) -> u32 {
        self.bitmap.count_used()
    }

    fn verify_free_count(&self) -> Result<(), Error> {
        let counted = self.bitmap.count_free();
        if counted != self.superblock.free_blocks {
            return Err(Error::InternalInconsistency {
                counted,
                recorded: self.superblock.free_blocks,
            });
        }
        Ok(())
    }

    /// Claim the lowest free block
    pub fn allocate(&mut self) -> Result<u32, Error> {
        let next = self.bitmap.next_free(0);
        let index = match (next, self.superblock.free_blocks) {
            (None, 0) => return Err(Error::NoFreeBlocks),
            (Some(index), recorded) if recorded > 0 => index,
            (_, recorded) => {
                return Err(Error::InternalInconsistency {
                    counted: self.bitmap.count_free(),
                    recorded,
                })
            }
        };
        if self.superblock.is_reserved(index) {
            return Err(Error::Corrupted("reserved block marked free"));
        }
        debug!("Allocate block {index}");
        self.bitmap.set(index, true)?;
        self.superblock.free_blocks -= 1;
        self.persist_allocation(index)?;
        Ok(index)
    }

    /// Return `index` to the free pool. Freeing an already free block is a
    /// caller error and corrupts the free counter.
    pub fn free(&mut self, index: u32) -> Result<(), Error> {
        if index >= self.superblock.total_blocks || self.superblock.is_reserved(index) {
            return Err(Error::InvalidBlock);
        }
        if !self.bitmap.get(index)? {
            warn!("Freeing block {index} which is already free");
        }
        debug!("Free block {index}");
        self.bitmap.set(index, false)?;
        self.superblock.free_blocks += 1;
        self.persist_allocation(index)?;
        Ok(())
    }

    fn persist_allocation(&mut self, index: u32) -> Result<(), Error> {
        let bitmap_block = self.bitmap.block_of(index);
        self.bitmap.flush_block(&mut self.disk, bitmap_block)?;
        self.superblock.flush(&mut self.disk)
    }

    fn ensure_in_use(&self, index: u32) -> Result<(), Error> {
        if !self.bitmap.get(index)? {
            return Err(Error::Corrupted("pointer to free block"));
        }
        Ok(())
    }

    /// Load data block referenced by a pointer
    pub(crate) fn load_block(&mut self, index: u32) -> Result<Block, Error> {
        self.ensure_in_use(index)?;
        Block::load(&mut self.disk, index)
    }

    pub(crate) fn flush_block(&mut self, block: &Block) -> Result<(), Error> {
        block.flush(&mut self.disk)
    }

    pub(crate) fn load_index(&mut self, index: u32) -> Result<IndexBlock, Error> {
        self.ensure_in_use(index)?;
        IndexBlock::load(&mut self.disk, index)
    }

    pub(crate) fn flush_index(&mut self, index: &IndexBlock) -> Result<(), Error> {
        debug!("Flush index block {}", index.index);
        index.flush(&mut self.disk)
    }

    /// Load a directory table, served from the mirror for the root table
    pub(crate) fn load_table(&mut self, index: u32) -> Result<DirectoryTable, Error> {
        if index == self.superblock.directory_block {
            return Ok(self.root.clone());
        }
        self.ensure_in_use(index)?;
        DirectoryTable::load(&mut self.disk, index)
    }

    /// Persist a directory table, refreshing the root mirror when needed
    pub(crate) fn flush_table(&mut self, table: &DirectoryTable) -> Result<(), Error> {
        debug!("Flush directory table {}", table.index);
        table.flush(&mut self.disk)?;
        if table.index == self.superblock.directory_block {
            self.root = table.clone();
        }
        Ok(())
    }

    /// Raw contents of any block, used or not
    pub fn read_block(&mut self, index: u32) -> Result<Block, Error> {
        if index >= self.superblock.total_blocks {
            return Err(Error::InvalidBlock);
        }
        Block::load(&mut self.disk, index)
    }

    /// Raw contents of the first `count` blocks, clamped to the volume
    pub fn leading_blocks(&mut self, count: u32) -> Result<Vec<Block>, Error> {
        (0..count.min(self.superblock.total_blocks))
            .map(|index| Block::load(&mut self.disk, index))
            .collect()
    }

    /// Any block decoded as an index block
    pub fn read_index_block(&mut self, index: u32) -> Result<IndexBlock, Error> {
        if index >= self.superblock.total_blocks {
            return Err(Error::InvalidBlock);
        }
        IndexBlock::load(&mut self.disk, index)
    }

    /// Verify bitmap, counters and every pointer reachable from the
    /// directory tree
    pub fn check(&mut self) -> Result<(), Error> {
        info!("Checking volume");
        self.verify_free_count()?;
        for index in 0..=self.superblock.directory_block {
            if !self.bitmap.get(index)? {
                return Err(Error::Corrupted("reserved block marked free"));
            }
        }
        let mut seen = bitvec::bitvec![0; self.superblock.total_blocks as usize];
        let mut pending = vec![self.superblock.directory_block];
        while let Some(table) = pending.pop() {
            let table = DirectoryTable::load(&mut self.disk, table)?;
            for entry in table.entries().copied().collect::<Vec<_>>() {
                let kind = entry.kind()?;
                let index_block = entry.index_block();
                if index_block >= self.superblock.total_blocks
                    || self.superblock.is_reserved(index_block)
                {
                    return Err(Error::Corrupted("index block out of range"));
                }
                let file = RawFile::new(index_block, self.block_size());
                let data = file.blocks(self)?;
                let mut owned = vec![index_block];
                let primary = self.load_index(index_block)?;
                if primary.indirect() != NULL_BLOCK {
                    owned.push(primary.indirect());
                }
                owned.extend(data.iter().copied());
                for block in owned {
                    if block >= self.superblock.total_blocks || self.superblock.is_reserved(block) {
                        return Err(Error::Corrupted("pointer out of range"));
                    }
                    self.ensure_in_use(block)?;
                    if seen.replace(block as usize, true) {
                        return Err(Error::Corrupted("block referenced twice"));
                    }
                }
                if kind == FileKind::Directory {
                    pending.extend(data);
                }
            }
        }
        debug!("Volume is consistent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{BlockDevice, FileSystem};
    use crate::Error;

    fn volume(blocks: u32) -> FileSystem {
        let dev = Cursor::new(Vec::new());
        FileSystem::format(Box::new(dev), blocks, 512).unwrap()
    }

    fn conserved(fs: &FileSystem) -> bool {
        fs.superblock.free_blocks == fs.superblock.total_blocks - fs.used_blocks()
    }

    #[test]
    fn format_sixteen_blocks() {
        let fs = volume(16);
        assert_eq![fs.superblock.bitmap_blocks, 1];
        assert_eq![fs.superblock.directory_block, 2];
        assert_eq![fs.superblock.free_blocks, 13];
        assert_eq![fs.free_block_list(), (3..16).collect::<Vec<u32>>()];
    }

    #[test]
    fn format_rejects_three_blocks() {
        let dev = Cursor::new(Vec::new());
        assert![matches!(
            FileSystem::format(Box::new(dev), 3, 512),
            Err(Error::InsufficientBlocks)
        )];
    }

    #[test]
    fn load_and_flush() {
        let mut fs = volume(64);
        assert_eq![fs.allocate().unwrap(), 3];
        let dev = fs.into_device();
        let fs = FileSystem::mount(dev).unwrap();
        assert![fs.bitmap.get(3).unwrap()];
        assert_eq![fs.superblock.free_blocks, 64 - 3 - 1];
    }

    #[test]
    fn mount_rejects_unformatted_image() {
        let dev: Box<dyn BlockDevice> = Box::new(Cursor::new(vec![0u8; 16 * 512]));
        assert![matches!(FileSystem::mount(dev), Err(Error::NotFormatted))];
    }

    #[test]
    fn allocate_and_free_block() {
        let mut fs = volume(16);
        assert_eq![fs.allocate().unwrap(), 3];
        assert_eq![fs.allocate().unwrap(), 4];
        assert_eq![fs.allocate().unwrap(), 5];
        assert![fs.free(4).is_ok()];
        assert_eq![fs.allocate().unwrap(), 4];
        assert_eq![fs.allocate().unwrap(), 6];
        assert![conserved(&fs)];
    }

    #[test]
    fn allocate_until_exhausted() {
        let mut fs = volume(16);
        let mut taken = Vec::new();
        while let Ok(index) = fs.allocate() {
            assert![index > fs.superblock.directory_block];
            assert![!taken.contains(&index)];
            taken.push(index);
            assert![conserved(&fs)];
        }
        assert_eq![taken.len(), 13];
        assert![matches!(fs.allocate(), Err(Error::NoFreeBlocks))];
        for index in taken {
            fs.free(index).unwrap();
            assert![conserved(&fs)];
        }
        assert_eq![fs.superblock.free_blocks, 13];
    }

    #[test]
    fn free_rejects_invalid_blocks() {
        let mut fs = volume(16);
        assert![matches!(fs.free(16), Err(Error::InvalidBlock))];
        assert![matches!(fs.free(0), Err(Error::InvalidBlock))];
        assert![matches!(fs.free(2), Err(Error::InvalidBlock))];
    }

    #[test]
    fn detect_counter_mismatch() {
        let mut fs = volume(16);
        fs.superblock.free_blocks = 0;
        assert![matches!(
            fs.allocate(),
            Err(Error::InternalInconsistency {
                counted: 13,
                recorded: 0
            })
        )];
        assert![matches!(
            fs.check(),
            Err(Error::InternalInconsistency { .. })
        )];
    }

    #[test]
    fn detect_full_bitmap_with_free_counter() {
        let mut fs = volume(16);
        for index in 3..16 {
            fs.bitmap.set(index, true).unwrap();
        }
        assert![matches!(
            fs.allocate(),
            Err(Error::InternalInconsistency {
                counted: 0,
                recorded: 13
            })
        )];
        assert_eq![fs.superblock.free_blocks, 13];
    }

    #[test]
    fn leading_blocks_clamp_to_volume() {
        let mut fs = volume(16);
        let blocks = fs.leading_blocks(3).unwrap();
        assert_eq![
            blocks.iter().map(|block| block.index()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        ];
        assert_eq![&blocks[1].data()[..1], &[0b0000_0111]];
        assert_eq![fs.leading_blocks(100).unwrap().len(), 16];
        assert![fs.leading_blocks(0).unwrap().is_empty()];
    }

    #[test]
    fn tampered_counter_fails_mount() {
        let mut fs = volume(16);
        fs.superblock.free_blocks = 7;
        fs.superblock.flush(&mut fs.disk).unwrap();
        let dev = fs.into_device();
        assert![matches!(
            FileSystem::mount(dev),
            Err(Error::InternalInconsistency { .. })
        )];
    }
}
