use std::fmt::Display;

use super::*;

const FILE_MARKER: u8 = b'F';
const DIRECTORY_MARKER: u8 = b'D';

/// Validated entry name: 1 to 54 bytes, no `/` and no NUL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryName([u8; NAME_CAPACITY]);

impl EntryName {
    pub fn as_bytes(&self) -> &[u8] {
        let length = self.0.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LENGTH);
        &self.0[..length]
    }
}

impl TryFrom<&str> for EntryName {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        if name.is_empty() || name.bytes().any(|b| b == b'/' || b == 0) {
            return Err(Error::InvalidName);
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong);
        }
        let mut raw = [0u8; NAME_CAPACITY];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self(raw))
    }
}

impl FileKind {
    fn marker(self) -> u8 {
        match self {
            Self::RegularFile => FILE_MARKER,
            Self::Directory => DIRECTORY_MARKER,
        }
    }
}

impl TryFrom<u8> for FileKind {
    type Error = Error;

    fn try_from(marker: u8) -> Result<Self, Self::Error> {
        match marker {
            FILE_MARKER => Ok(Self::RegularFile),
            DIRECTORY_MARKER => Ok(Self::Directory),
            _ => Err(Error::Corrupted("unknown entry kind")),
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegularFile => write!(f, "file"),
            Self::Directory => write!(f, "dir"),
        }
    }
}

impl DirEntry {
    pub fn new(name: EntryName, kind: FileKind, index_block: u32) -> Self {
        Self {
            name: name.0,
            kind: kind.marker(),
            index_block,
            size: 0,
        }
    }

    /// Free slot
    pub fn vacant() -> Self {
        Self {
            name: [0; NAME_CAPACITY],
            kind: 0,
            index_block: NULL_BLOCK,
            size: 0,
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.name[0] == 0
    }

    pub fn name_bytes(&self) -> &[u8] {
        let length = self
            .name
            .iter()
            .take(MAX_NAME_LENGTH)
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LENGTH);
        &self.name[..length]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn kind(&self) -> Result<FileKind, Error> {
        FileKind::try_from(self.kind)
    }

    pub fn index_block(&self) -> u32 {
        self.index_block
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub(crate) fn matches(&self, name: &EntryName) -> bool {
        !self.is_vacant() && self.name_bytes() == name.as_bytes()
    }
}

impl Display for DirEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind() {
            Ok(kind) => kind.to_string(),
            Err(_) => "?".to_owned(),
        };
        write!(
            f,
            "{:<4} {:>8} {:>6}  {}",
            kind,
            self.size,
            self.index_block,
            self.name()
        )
    }
}

impl DirectoryTable {
    /// Table at `index` with every slot free
    pub fn empty(index: u32, block_size: u32) -> Self {
        Self {
            index,
            entries: vec![DirEntry::vacant(); block_size as usize / ENTRY_SIZE],
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Live entries in slot order
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> + '_ {
        self.entries.iter().filter(|entry| !entry.is_vacant())
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Slot of the first entry named `name`
    pub fn find(&self, name: &EntryName) -> Option<usize> {
        self.entries.iter().position(|entry| entry.matches(name))
    }

    pub fn first_free(&self) -> Option<usize> {
        self.entries.iter().position(DirEntry::is_vacant)
    }

    pub fn get(&self, slot: usize) -> &DirEntry {
        &self.entries[slot]
    }

    pub fn set(&mut self, slot: usize, entry: DirEntry) {
        self.entries[slot] = entry;
    }

    /// Zero the slot
    pub fn clear(&mut self, slot: usize) {
        self.entries[slot] = DirEntry::vacant();
    }

    fn from_block(block: &Block) -> Result<Self, Error> {
        let entries = (0..block.data.len() / ENTRY_SIZE)
            .map(|slot| block.read_any::<DirEntry>(slot * ENTRY_SIZE))
            .collect::<Vec<DirEntry>>();
        for entry in entries.iter().filter(|entry| !entry.is_vacant()) {
            entry.kind()?;
        }
        Ok(Self {
            index: block.index,
            entries,
        })
    }

    fn to_block(&self, block_size: u32) -> Block {
        let mut block = Block::empty(self.index, block_size);
        for (slot, entry) in self.entries.iter().enumerate() {
            block.write_any(slot * ENTRY_SIZE, entry);
        }
        block
    }
}

impl PermanentIndexed for DirectoryTable {
    fn load(disk: &mut Disk, index: u32) -> Result<Self, Error> {
        Self::from_block(&Block::load(disk, index)?)
    }

    fn flush(&self, disk: &mut Disk) -> Result<(), Error> {
        self.to_block(disk.block_size()).flush(disk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn entry_is_sixty_four_bytes() {
        assert_eq![std::mem::size_of::<DirEntry>(), ENTRY_SIZE];
    }

    #[test]
    fn name_validation() {
        assert![EntryName::try_from("a.txt").is_ok()];
        assert![EntryName::try_from("x".repeat(54).as_str()).is_ok()];
        assert![matches!(
            EntryName::try_from("x".repeat(55).as_str()),
            Err(Error::NameTooLong)
        )];
        assert![matches!(EntryName::try_from(""), Err(Error::InvalidName))];
        assert![matches!(EntryName::try_from("a/b"), Err(Error::InvalidName))];
    }

    #[test]
    fn names_compare_case_sensitive() {
        let name = EntryName::try_from("Notes").unwrap();
        let entry = DirEntry::new(name, FileKind::RegularFile, 9);
        assert![entry.matches(&name)];
        assert![!entry.matches(&EntryName::try_from("notes").unwrap())];
        assert![!entry.matches(&EntryName::try_from("Notes2").unwrap())];
    }

    #[test]
    fn table_slots() {
        let mut table = DirectoryTable::empty(2, 512);
        assert_eq![table.entries.len(), 8];
        assert_eq![table.first_free(), Some(0)];
        let name = EntryName::try_from("a").unwrap();
        table.set(0, DirEntry::new(name, FileKind::Directory, 4));
        assert_eq![table.find(&name), Some(0)];
        assert_eq![table.first_free(), Some(1)];
        table.clear(0);
        assert![table.is_empty()];
        assert_eq![table.get(0).index_block(), NULL_BLOCK];
    }

    #[test]
    fn load_and_flush() {
        let dev = Cursor::new(Vec::new());
        let mut disk = Disk::create(Box::new(dev), 8 * 512, 512).unwrap();
        let mut table = DirectoryTable::empty(2, 512);
        let name = EntryName::try_from("hello.txt").unwrap();
        let mut entry = DirEntry::new(name, FileKind::RegularFile, 5);
        entry.size = 600;
        table.set(3, entry);
        table.flush(&mut disk).unwrap();
        let loaded = DirectoryTable::load(&mut disk, 2).unwrap();
        assert_eq![loaded, table];
        let live = loaded.entries().collect::<Vec<_>>();
        assert_eq![live.len(), 1];
        assert_eq![live[0].name(), "hello.txt"];
        assert_eq![live[0].size(), 600];
        assert_eq![live[0].kind().unwrap(), FileKind::RegularFile];
    }

    #[test]
    fn unknown_kind_is_corruption() {
        let mut block = Block::empty(2, 512);
        let mut entry = DirEntry::new(EntryName::try_from("x").unwrap(), FileKind::RegularFile, 5);
        entry.kind = b'?';
        block.write_any(0, &entry);
        assert![matches!(
            DirectoryTable::from_block(&block),
            Err(Error::Corrupted(_))
        )];
    }
}
