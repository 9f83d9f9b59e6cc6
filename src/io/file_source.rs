use std::fs::File;
use std::os::fd::AsRawFd;

use tracing::trace;

use crate::error::XfsError;
use crate::io::ByteSource;

/// A [`ByteSource`] backed by an open file (a regular image file or a block
/// device), read with positional `pread(2)` calls.
///
/// Grounded in the teacher crate's `IoEngine::read_at`, stripped of the
/// O_DIRECT/alignment/io_uring machinery that exists there to optimize
/// whole-disk sequential scans. A path-driven facade issues many small,
/// scattered reads instead, so the buffered page cache path plain `pread`
/// takes is the right default; nothing here prevents a caller from handing
/// in a `File` opened with platform-specific direct-I/O flags if they want.
pub struct FileByteSource {
    file: File,
    len: u64,
}

impl FileByteSource {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, XfsError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    pub fn from_file(file: File) -> Result<Self, XfsError> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileByteSource {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, XfsError> {
        trace!(offset, len, "read_at");
        let mut buf = vec![0u8; len];
        let mut total = 0usize;
        while total < len {
            let ret = unsafe {
                libc::pread(
                    self.file.as_raw_fd(),
                    buf[total..].as_mut_ptr() as *mut libc::c_void,
                    len - total,
                    (offset + total as u64) as libc::off_t,
                )
            };
            if ret < 0 {
                return Err(XfsError::Io(std::io::Error::last_os_error()));
            }
            if ret == 0 {
                break; // EOF
            }
            total += ret as usize;
        }
        if total != len {
            return Err(XfsError::ShortRead {
                expected: len,
                got: total,
            });
        }
        Ok(buf)
    }

    fn len(&self) -> Option<u64> {
        Some(self.len)
    }
}
