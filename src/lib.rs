//! A read-only reader for on-disk XFS filesystem images.
//!
//! [`fs::XfsImage`] opens an image through any [`io::ByteSource`] and
//! resolves paths against it with `stat`, `read_dir`, `open_file` and
//! `read`. Everything under [`xfs`] is a pure decoder from bytes to
//! structured values; [`fs`] is the only layer that knows about paths.

pub mod error;
pub mod fs;
pub mod io;
pub mod testutil;
pub mod xfs;

pub use error::XfsError;
pub use fs::{File, FileInfo, XfsImage};
pub use io::{ByteSource, FileByteSource, SliceByteSource};
