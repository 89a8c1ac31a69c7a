use log::info;

use super::FileSystem;
use crate::filetypes::{Directory, Entries, Located, RegularFile};
use crate::structs::{DirEntry, EntryName, FileKind};
use crate::Error;

/// Split `dir/name` into at most two components
fn components(path: &str) -> Result<Vec<&str>, Error> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parts = trimmed.split('/').collect::<Vec<&str>>();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(Error::InvalidName);
    }
    if parts.len() > 2 {
        return Err(Error::TooDeep);
    }
    Ok(parts)
}

impl FileSystem {
    /// Directory at `path`, empty path being the root
    pub fn directory(&mut self, path: &str) -> Result<Directory, Error> {
        match components(path)?.as_slice() {
            [] => Ok(Directory::Root),
            [name] => Directory::Root
                .lookup(self, &EntryName::try_from(*name)?)?
                .as_directory(),
            _ => Err(Error::TooDeep),
        }
    }

    fn split_parent<'p>(&mut self, path: &'p str) -> Result<(Directory, &'p str), Error> {
        match components(path)?.as_slice() {
            [] => Err(Error::InvalidName),
            [name] => Ok((Directory::Root, *name)),
            [parent, name] => Ok((self.directory(parent)?, *name)),
            _ => Err(Error::TooDeep),
        }
    }

    fn locate(&mut self, path: &str) -> Result<Located, Error> {
        let (parent, name) = self.split_parent(path)?;
        parent.lookup(self, &EntryName::try_from(name)?)
    }

    /// Create an empty file or directory
    pub fn create(&mut self, path: &str, kind: FileKind) -> Result<DirEntry, Error> {
        info!("Create {kind} {path:?}");
        let (parent, name) = self.split_parent(path)?;
        Ok(*parent.create(self, name, kind)?.entry())
    }

    pub fn stat(&mut self, path: &str) -> Result<DirEntry, Error> {
        Ok(*self.locate(path)?.entry())
    }

    /// Remove a file or an empty directory, reclaiming all of its blocks
    pub fn delete(&mut self, path: &str) -> Result<(), Error> {
        info!("Delete {path:?}");
        self.locate(path)?.remove(self)
    }

    pub fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<(), Error> {
        info!("Write {} bytes to {path:?} at offset {offset}", data.len());
        let located = self.locate(path)?;
        RegularFile::open(self, located)?.write(self, offset, data)
    }

    pub fn read(&mut self, path: &str, offset: u64, size: u64) -> Result<Vec<u8>, Error> {
        info!("Read {size} bytes from {path:?} at offset {offset}");
        let located = self.locate(path)?;
        RegularFile::open(self, located)?.read(self, offset, size)
    }

    pub fn read_all(&mut self, path: &str) -> Result<Vec<u8>, Error> {
        let located = self.locate(path)?;
        let mut file = RegularFile::open(self, located)?;
        let size = file.size();
        file.read(self, 0, size)
    }

    /// Live entries of the directory at `path`, read lazily from disk
    pub fn list(&mut self, path: &str) -> Result<Entries<'_>, Error> {
        let directory = self.directory(path)?;
        directory.entries(self)
    }
}
