use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    /// Bitmap has no clear bit left
    NoFreeBlocks,
    /// Block index outside the volume or inside the reserved region
    InvalidBlock,
    NotFound,
    NameTooLong,
    InvalidName,
    AlreadyExists,
    DirectoryFull,
    DirectoryNotEmpty,
    NotADirectory,
    IsADirectory,
    /// Directories may only be nested one level below root
    TooDeep,
    /// Logical offset beyond direct and indirect capacity,
    /// or an unallocated pointer hit while reading
    OutOfRange,
    /// Block lies past the end of the backing store
    OutOfBounds,
    InsufficientBlocks,
    InvalidBlockSize,
    NotFormatted,
    Corrupted(&'static str),
    /// Free block counter disagrees with the bitmap
    InternalInconsistency { counted: u32, recorded: u32 },
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFreeBlocks => write!(f, "no free blocks"),
            Self::InvalidBlock => write!(f, "invalid block"),
            Self::NotFound => write!(f, "not found"),
            Self::NameTooLong => write!(f, "name too long"),
            Self::InvalidName => write!(f, "invalid name"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::DirectoryFull => write!(f, "directory full"),
            Self::DirectoryNotEmpty => write!(f, "directory not empty"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::IsADirectory => write!(f, "is a directory"),
            Self::TooDeep => write!(f, "directories nest only one level deep"),
            Self::OutOfRange => write!(f, "out of range"),
            Self::OutOfBounds => write!(f, "out of bounds"),
            Self::InsufficientBlocks => write!(f, "insufficient blocks"),
            Self::InvalidBlockSize => write!(f, "invalid block size"),
            Self::NotFormatted => write!(f, "not formatted"),
            Self::Corrupted(what) => write!(f, "corrupted: {what}"),
            Self::InternalInconsistency { counted, recorded } => write!(
                f,
                "internal inconsistency: bitmap has {counted} free blocks, superblock records {recorded}"
            ),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
