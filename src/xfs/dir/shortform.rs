use zerocopy::{FromBytes, Immutable, KnownLayout};
use zerocopy::byteorder::big_endian::{U32, U64};

use crate::error::XfsError;
use crate::xfs::dir::DirEntry;
use crate::xfs::superblock::FsContext;

/// Shortform directory header (parent inode stored in 4 bytes).
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct XfsDirSfHdr4 {
    pub count: u8,
    pub i8count: u8,
    pub parent: U32,
}

/// Shortform directory header (parent inode stored in 8 bytes).
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct XfsDirSfHdr8 {
    pub count: u8,
    pub i8count: u8,
    pub parent: U64,
}

/// Decode a short-form (in-inode) directory, synthesizing "." and ".."
/// ahead of the on-disk entries.
pub fn parse_shortform_dir(
    fork_buf: &[u8],
    parent_ino: u64,
    ctx: &FsContext,
) -> Result<Vec<DirEntry>, XfsError> {
    if fork_buf.len() < 6 {
        return Err(XfsError::CorruptDirBlock("shortform dir too small"));
    }

    // i8count > 0 selects 8-byte inode numbers for the whole entry list.
    let i8count = fork_buf[1];
    let use_8byte = i8count > 0;

    let (entry_count, hdr_parent_ino, hdr_size) = if use_8byte {
        let hdr = XfsDirSfHdr8::ref_from_prefix(fork_buf)
            .map_err(|_| XfsError::CorruptDirBlock("shortform hdr8 parse failed"))?
            .0;
        (hdr.i8count as usize, hdr.parent.get(), 10usize)
    } else {
        let hdr = XfsDirSfHdr4::ref_from_prefix(fork_buf)
            .map_err(|_| XfsError::CorruptDirBlock("shortform hdr4 parse failed"))?
            .0;
        (hdr.count as usize, hdr.parent.get() as u64, 6usize)
    };

    let mut entries = Vec::with_capacity(entry_count + 2);
    entries.push(DirEntry {
        name: b".".to_vec(),
        ino: parent_ino,
        file_type: 0,
    });
    entries.push(DirEntry {
        name: b"..".to_vec(),
        ino: hdr_parent_ino,
        file_type: 0,
    });

    let ino_size: usize = if use_8byte { 8 } else { 4 };
    let mut offset = hdr_size;

    for _ in 0..entry_count {
        if offset >= fork_buf.len() {
            return Err(XfsError::CorruptDirBlock("shortform entry past end"));
        }

        let namelen = fork_buf[offset] as usize;
        // namelen(1) + offset(2), then the name bytes.
        let name_start = offset + 1 + 2;
        let name_end = name_start + namelen;

        if name_end > fork_buf.len() {
            return Err(XfsError::CorruptDirBlock("shortform entry name out of bounds"));
        }

        let name = fork_buf[name_start..name_end].to_vec();

        // ftype comes before the inode number on disk when present.
        let ftype_size = if ctx.has_ftype { 1 } else { 0 };
        let ftype = if ctx.has_ftype { fork_buf[name_end] } else { 0 };

        let ino_start = name_end + ftype_size;
        let child_ino = if use_8byte {
            if ino_start + 8 > fork_buf.len() {
                return Err(XfsError::CorruptDirBlock("shortform 8-byte ino out of bounds"));
            }
            u64::from_be_bytes(fork_buf[ino_start..ino_start + 8].try_into().unwrap())
        } else {
            if ino_start + 4 > fork_buf.len() {
                return Err(XfsError::CorruptDirBlock("shortform 4-byte ino out of bounds"));
            }
            u32::from_be_bytes(fork_buf[ino_start..ino_start + 4].try_into().unwrap()) as u64
        };

        entries.push(DirEntry {
            name,
            ino: child_ino,
            file_type: ftype,
        });

        offset = ino_start + ino_size;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_ctx;

    /// Build a 4-byte-inode shortform dir fork with one entry: "a" -> 99.
    fn fork_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(1u8); // count
        buf.push(0u8); // i8count == 0 -> 4-byte inode numbers
        buf.extend_from_slice(&42u32.to_be_bytes()); // parent ino
        // entry: namelen, 2-byte offset (unused by the decoder), name, ino
        buf.push(1u8);
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.push(b'a');
        buf.extend_from_slice(&99u32.to_be_bytes());
        buf
    }

    #[test]
    fn decodes_dot_dotdot_and_entry() {
        let ctx = test_ctx(4096, 1024);
        let buf = fork_bytes();
        let entries = parse_shortform_dir(&buf, 7, &ctx).unwrap();
        assert_eq!(entries[0].name, b".");
        assert_eq!(entries[0].ino, 7);
        assert_eq!(entries[1].name, b"..");
        assert_eq!(entries[1].ino, 42);
        assert_eq!(entries[2].name, b"a");
        assert_eq!(entries[2].ino, 99);
    }

    #[test]
    fn rejects_truncated_fork() {
        let ctx = test_ctx(4096, 1024);
        let err = parse_shortform_dir(&[0u8; 2], 7, &ctx).unwrap_err();
        assert!(matches!(err, XfsError::CorruptDirBlock(_)));
    }
}
