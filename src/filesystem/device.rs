use std::fmt::Debug;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use log::debug;

use crate::structs::DEFAULT_BLOCK_SIZE;
use crate::Error;

pub trait BlockDevice: Read + Write + Seek + Debug {
    /// Resize backing store to exactly `length` bytes
    fn set_length(&mut self, length: u64) -> std::io::Result<()>;
}

impl BlockDevice for std::fs::File {
    fn set_length(&mut self, length: u64) -> std::io::Result<()> {
        self.set_len(length)
    }
}

impl BlockDevice for Cursor<Vec<u8>> {
    fn set_length(&mut self, length: u64) -> std::io::Result<()> {
        self.get_mut().resize(length as usize, 0);
        Ok(())
    }
}

/// Fixed-size block access on top of a [`BlockDevice`]
#[derive(Debug)]
pub struct Disk {
    device: Box<dyn BlockDevice>,
    block_size: u32,
}

impl Disk {
    /// Wrap an existing store. Block size defaults to the smallest
    /// supported one until the superblock says otherwise.
    pub fn open(device: Box<dyn BlockDevice>) -> Self {
        Self {
            device,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Truncate or extend the store to `total_bytes` of zeros
    pub fn create(
        device: Box<dyn BlockDevice>,
        total_bytes: u64,
        block_size: u32,
    ) -> Result<Self, Error> {
        let mut disk = Self { device, block_size };
        disk.device.set_length(0)?;
        disk.device.set_length(total_bytes)?;
        debug!("Created backing store of {total_bytes} bytes");
        Ok(disk)
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub(crate) fn set_block_size(&mut self, block_size: u32) {
        self.block_size = block_size;
    }

    /// Length of the backing store in bytes
    pub fn length(&mut self) -> Result<u64, Error> {
        Ok(self.device.seek(SeekFrom::End(0))?)
    }

    fn position(&mut self, index: u32) -> Result<u64, Error> {
        let position = index as u64 * self.block_size as u64;
        if position >= self.length()? {
            return Err(Error::OutOfBounds);
        }
        Ok(position)
    }

    /// Read block `index` into `buffer`, which must be exactly one block long
    pub fn read_block(&mut self, index: u32, buffer: &mut [u8]) -> Result<(), Error> {
        debug_assert_eq!(buffer.len(), self.block_size as usize);
        let position = self.position(index)?;
        self.device.seek(SeekFrom::Start(position))?;
        self.device.read_exact(buffer)?;
        Ok(())
    }

    /// Write one block worth of `buffer` to block `index`
    pub fn write_block(&mut self, index: u32, buffer: &[u8]) -> Result<(), Error> {
        debug_assert_eq!(buffer.len(), self.block_size as usize);
        let position = self.position(index)?;
        self.device.seek(SeekFrom::Start(position))?;
        self.device.write_all(buffer)?;
        self.device.flush()?;
        Ok(())
    }

    pub(crate) fn into_inner(self) -> Box<dyn BlockDevice> {
        self.device
    }
}
