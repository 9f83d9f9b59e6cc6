//! Directory content decoders (spec.md §4.6).

pub mod block;
pub mod shortform;

/// One decoded directory entry: a name plus the child inode it resolves to.
///
/// `file_type` is the on-disk `ftype` byte when the filesystem carries one
/// (spec.md §6), 0 otherwise — callers that need a type for such entries
/// fall back to opening the child inode and reading its mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: Vec<u8>,
    pub ino: u64,
    pub file_type: u8,
}
