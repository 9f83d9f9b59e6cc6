use crate::error::XfsError;
use crate::io::ByteSource;

/// An in-memory [`ByteSource`], used by tests to drive the facade against a
/// synthetic image without touching the filesystem.
pub struct SliceByteSource {
    data: Vec<u8>,
}

impl SliceByteSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteSource for SliceByteSource {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, XfsError> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .ok_or(XfsError::ShortRead { expected: len, got: 0 })?;
        if end > self.data.len() {
            let got = self.data.len().saturating_sub(start);
            return Err(XfsError::ShortRead { expected: len, got });
        }
        Ok(self.data[start..end].to_vec())
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}
