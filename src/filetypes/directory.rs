use log::{debug, info};

use super::{Directory, Located, RawFile};
use crate::structs::{DirEntry, DirectoryTable, EntryName, FileKind, PermanentIndexed};
use crate::{Error, FileSystem};

/// Live entries of a directory, read table by table from the disk
#[derive(Debug)]
pub struct Entries<'a> {
    fs: &'a mut FileSystem,
    tables: std::vec::IntoIter<u32>,
    current: std::vec::IntoIter<DirEntry>,
}

impl Iterator for Entries<'_> {
    type Item = Result<DirEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(Ok(entry));
            }
            let index = self.tables.next()?;
            match DirectoryTable::load(&mut self.fs.disk, index) {
                Ok(table) => {
                    self.current = table.entries().copied().collect::<Vec<_>>().into_iter();
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl Directory {
    /// Blocks holding this directory's tables, in order
    pub fn tables(&self, fs: &mut FileSystem) -> Result<Vec<u32>, Error> {
        match *self {
            Self::Root => Ok(vec![fs.superblock.directory_block]),
            Self::Child { index_block, .. } => {
                RawFile::new(index_block, fs.block_size()).blocks(fs)
            }
        }
    }

    /// First entry named `name`
    pub fn lookup(&self, fs: &mut FileSystem, name: &EntryName) -> Result<Located, Error> {
        for table in self.tables(fs)? {
            let loaded = fs.load_table(table)?;
            if let Some(slot) = loaded.find(name) {
                return Ok(Located {
                    parent: *self,
                    table,
                    slot,
                    entry: *loaded.get(slot),
                });
            }
        }
        Err(Error::NotFound)
    }

    /// Add an entry owning a fresh, empty index block
    pub fn create(&self, fs: &mut FileSystem, name: &str, kind: FileKind) -> Result<Located, Error> {
        let name = EntryName::try_from(name)?;
        if kind == FileKind::Directory && *self != Self::Root {
            return Err(Error::TooDeep);
        }
        match self.lookup(fs, &name) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }
        let (mut table, slot) = self.free_slot(fs)?;
        let file = RawFile::create(fs)?;
        let entry = DirEntry::new(name, kind, file.index_block());
        table.set(slot, entry);
        fs.flush_table(&table)?;
        info!(
            "Created {kind} {} with index block {}",
            entry.name(),
            entry.index_block()
        );
        Ok(Located {
            parent: *self,
            table: table.index(),
            slot,
            entry,
        })
    }

    /// Table with a free slot. A sub-directory grows by one table block
    /// when all of its tables are full.
    fn free_slot(&self, fs: &mut FileSystem) -> Result<(DirectoryTable, usize), Error> {
        let tables = self.tables(fs)?;
        for &index in tables.iter() {
            let table = fs.load_table(index)?;
            if let Some(slot) = table.first_free() {
                return Ok((table, slot));
            }
        }
        match *self {
            Self::Root => Err(Error::DirectoryFull),
            Self::Child { slot, index_block } => {
                let logical = tables.len();
                if logical >= 2 * fs.superblock.direct_pointers() {
                    return Err(Error::DirectoryFull);
                }
                let block_size = fs.block_size();
                let index = RawFile::new(index_block, block_size)
                    .block_at(fs, logical, true)?
                    .ok_or(Error::DirectoryFull)?;
                debug!("Directory with index block {index_block} grows to table {index}");
                let mut root = fs.load_table(fs.superblock.directory_block)?;
                let mut own = *root.get(slot);
                own.size = (logical as u32 + 1) * block_size;
                root.set(slot, own);
                fs.flush_table(&root)?;
                Ok((DirectoryTable::empty(index, block_size), 0))
            }
        }
    }

    pub fn is_empty(&self, fs: &mut FileSystem) -> Result<bool, Error> {
        for table in self.tables(fs)? {
            if !fs.load_table(table)?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Lazily iterate live entries in table order
    pub fn entries<'a>(&self, fs: &'a mut FileSystem) -> Result<Entries<'a>, Error> {
        let tables = self.tables(fs)?;
        Ok(Entries {
            fs,
            tables: tables.into_iter(),
            current: Vec::new().into_iter(),
        })
    }
}

impl Located {
    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    /// Open the entry as a directory
    pub fn as_directory(&self) -> Result<Directory, Error> {
        match self.entry.kind()? {
            FileKind::Directory if self.parent == Directory::Root => Ok(Directory::Child {
                slot: self.slot,
                index_block: self.entry.index_block(),
            }),
            FileKind::Directory => Err(Error::TooDeep),
            FileKind::RegularFile => Err(Error::NotADirectory),
        }
    }

    /// Write the entry back into its slot
    pub(crate) fn store(&self, fs: &mut FileSystem) -> Result<(), Error> {
        let mut table = fs.load_table(self.table)?;
        table.set(self.slot, self.entry);
        fs.flush_table(&table)
    }

    /// Free every block the entry owns and clear its slot
    pub fn remove(self, fs: &mut FileSystem) -> Result<(), Error> {
        if self.entry.kind()? == FileKind::Directory && !self.as_directory()?.is_empty(fs)? {
            return Err(Error::DirectoryNotEmpty);
        }
        RawFile::new(self.entry.index_block(), fs.block_size()).release(fs)?;
        let mut table = fs.load_table(self.table)?;
        table.clear(self.slot);
        fs.flush_table(&table)?;
        info!("Removed {}", self.entry.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Directory;
    use crate::structs::{EntryName, FileKind};
    use crate::{Error, FileSystem};
    use std::io::Cursor;

    fn volume(blocks: u32) -> FileSystem {
        let dev = Cursor::new(Vec::new());
        FileSystem::format(Box::new(dev), blocks, 512).unwrap()
    }

    fn names(fs: &mut FileSystem, dir: Directory) -> Vec<String> {
        dir.entries(fs)
            .unwrap()
            .map(|entry| entry.unwrap().name())
            .collect()
    }

    #[test]
    fn create_and_lookup() {
        let mut fs = volume(32);
        let free = fs.superblock.free_blocks;
        let created = Directory::Root
            .create(&mut fs, "a.txt", FileKind::RegularFile)
            .unwrap();
        assert_eq![fs.superblock.free_blocks, free - 1];
        let name = EntryName::try_from("a.txt").unwrap();
        let found = Directory::Root.lookup(&mut fs, &name).unwrap();
        assert_eq![found, created];
        assert_eq![found.entry().size(), 0];
        assert![matches!(
            Directory::Root.lookup(&mut fs, &"b.txt".try_into().unwrap()),
            Err(Error::NotFound)
        )];
    }

    #[test]
    fn reject_duplicate_names() {
        let mut fs = volume(32);
        Directory::Root
            .create(&mut fs, "same", FileKind::RegularFile)
            .unwrap();
        let free = fs.superblock.free_blocks;
        assert![matches!(
            Directory::Root.create(&mut fs, "same", FileKind::Directory),
            Err(Error::AlreadyExists)
        )];
        assert_eq![fs.superblock.free_blocks, free];
    }

    #[test]
    fn root_fills_up() {
        let mut fs = volume(32);
        for index in 0..8 {
            Directory::Root
                .create(&mut fs, &format!("f{index}"), FileKind::RegularFile)
                .unwrap();
        }
        let free = fs.superblock.free_blocks;
        assert![matches!(
            Directory::Root.create(&mut fs, "f8", FileKind::RegularFile),
            Err(Error::DirectoryFull)
        )];
        assert_eq![fs.superblock.free_blocks, free];
    }

    #[test]
    fn list_in_table_order() {
        let mut fs = volume(32);
        for name in ["c", "a", "b"] {
            Directory::Root
                .create(&mut fs, name, FileKind::RegularFile)
                .unwrap();
        }
        let a = Directory::Root.lookup(&mut fs, &"a".try_into().unwrap()).unwrap();
        a.remove(&mut fs).unwrap();
        Directory::Root
            .create(&mut fs, "d", FileKind::RegularFile)
            .unwrap();
        assert_eq![names(&mut fs, Directory::Root), vec!["c", "d", "b"]];
        assert_eq![names(&mut fs, Directory::Root), vec!["c", "d", "b"]];
    }

    #[test]
    fn sub_directory_grows_tables() {
        let mut fs = volume(64);
        let docs = Directory::Root
            .create(&mut fs, "docs", FileKind::Directory)
            .unwrap()
            .as_directory()
            .unwrap();
        assert![docs.tables(&mut fs).unwrap().is_empty()];
        for index in 0..9 {
            docs.create(&mut fs, &format!("n{index}"), FileKind::RegularFile)
                .unwrap();
        }
        assert_eq![docs.tables(&mut fs).unwrap().len(), 2];
        assert_eq![names(&mut fs, docs).len(), 9];
        let entry = Directory::Root
            .lookup(&mut fs, &"docs".try_into().unwrap())
            .unwrap();
        assert_eq![entry.entry().size(), 1024];
        assert![matches!(
            docs.create(&mut fs, "deeper", FileKind::Directory),
            Err(Error::TooDeep)
        )];
        assert![fs.check().is_ok()];
    }

    #[test]
    fn non_empty_directory_is_kept() {
        let mut fs = volume(64);
        let free = fs.superblock.free_blocks;
        let located = Directory::Root
            .create(&mut fs, "docs", FileKind::Directory)
            .unwrap();
        let docs = located.as_directory().unwrap();
        let child = docs
            .create(&mut fs, "note", FileKind::RegularFile)
            .unwrap();
        assert![matches!(
            located.remove(&mut fs),
            Err(Error::DirectoryNotEmpty)
        )];
        child.remove(&mut fs).unwrap();
        let located = Directory::Root
            .lookup(&mut fs, &"docs".try_into().unwrap())
            .unwrap();
        located.remove(&mut fs).unwrap();
        assert_eq![fs.superblock.free_blocks, free];
        assert![Directory::Root.is_empty(&mut fs).unwrap()];
    }

    #[test]
    fn file_is_not_a_directory() {
        let mut fs = volume(32);
        let file = Directory::Root
            .create(&mut fs, "plain", FileKind::RegularFile)
            .unwrap();
        assert![matches!(file.as_directory(), Err(Error::NotADirectory))];
    }
}
