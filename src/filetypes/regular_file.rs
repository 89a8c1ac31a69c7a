use log::debug;

use super::{Located, RawFile, RegularFile};
use crate::structs::FileKind;
use crate::{Error, FileSystem};

impl RegularFile {
    pub fn open(fs: &FileSystem, location: Located) -> Result<Self, Error> {
        match location.entry.kind()? {
            FileKind::RegularFile => Ok(Self {
                file: RawFile::new(location.entry.index_block(), fs.block_size()),
                location,
            }),
            FileKind::Directory => Err(Error::IsADirectory),
        }
    }

    pub fn size(&self) -> u64 {
        self.location.entry.size() as u64
    }

    /// Read up to `size` bytes from `offset`, stopping at end of file
    pub fn read(&mut self, fs: &mut FileSystem, offset: u64, size: u64) -> Result<Vec<u8>, Error> {
        let lookahead_size = self.size().saturating_sub(offset);
        let mut buffer = vec![0; u64::min(size, lookahead_size) as usize];
        self.file.read(fs, offset, &mut buffer)?;
        Ok(buffer)
    }

    /// Write `data` at `offset`, growing the recorded size when it ends
    /// past the current end of file
    pub fn write(&mut self, fs: &mut FileSystem, offset: u64, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        let end = fs.superblock.write_end(offset, data.len())?;
        self.file.write(fs, offset, data)?;
        if end > self.size() {
            debug!(
                "File with index block {} grows to {end} bytes",
                self.file.index_block()
            );
            self.location.entry.size = end as u32;
            self.location.store(fs)?;
        }
        Ok(())
    }
}
