//! The byte source: a seekable, randomly-addressable source of bytes over
//! an XFS image (spec.md §4.1).

mod file_source;
mod slice_source;

pub use file_source::FileByteSource;
pub use slice_source::SliceByteSource;

use crate::error::XfsError;

/// Minimal interface every higher layer in this crate reads through.
///
/// Every read is framed by the absolute byte offset the caller computed from
/// superblock geometry (spec.md §5: "every read is driven by a caller
/// query"). Implementations use positional reads (`pread`-style) rather than
/// a shared seek cursor, per spec.md §9's design note — this keeps the
/// trait safely callable from multiple independent `XfsImage` handles
/// without the implicit global state a `seek` + `read` pair would create.
pub trait ByteSource {
    /// Read exactly `len` bytes starting at `offset`. Short reads at the end
    /// of the image are reported as `XfsError::ShortRead`, not silently
    /// truncated, since every caller in this crate already knows the exact
    /// size it expects (a block, an inode, a superblock).
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, XfsError>;

    /// Size of the underlying image in bytes, if known.
    fn len(&self) -> Option<u64> {
        None
    }
}
