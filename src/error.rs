use thiserror::Error;

/// Errors produced while decoding an XFS image or resolving a path against it.
#[derive(Error, Debug)]
pub enum XfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic number in {0}")]
    BadMagic(&'static str),

    #[error("parse error: {0}")]
    Parse(&'static str),

    #[error("corrupt superblock: {0}")]
    CorruptSuperblock(&'static str),

    #[error("corrupt allocation group {agno}: {reason}")]
    CorruptAg { agno: u32, reason: &'static str },

    #[error("corrupt inode {ino}: {reason}")]
    CorruptInode { ino: u64, reason: &'static str },

    #[error("corrupt directory block: {0}")]
    CorruptDirBlock(&'static str),

    #[error("unsupported inode format: {0}")]
    UnsupportedInodeFormat(&'static str),

    /// Distinguished sentinel (spec.md §4.6/§7): an unrecognized `dir2` data
    /// block magic. Directory listing catches this, warns, and stops
    /// iterating the remainder of that directory's block list.
    #[error("unsupported dir2 block header magic 0x{0:08x}")]
    UnsupportedDir2BlockHeader(u32),

    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("invalid path {path:?}: {reason}")]
    Invalid { path: String, reason: &'static str },

    #[error("not found: {0:?}")]
    NotFound(String),

    #[error("not a directory: {0:?}")]
    NotADirectory(String),

    #[error("is a directory: {0:?}")]
    IsDirectory(String),
}

impl XfsError {
    /// True for the one error kind that directory iteration is allowed to
    /// downgrade to a warning instead of aborting (spec.md §7).
    pub fn is_unsupported_dir_header(&self) -> bool {
        matches!(self, XfsError::UnsupportedDir2BlockHeader(_))
    }
}
