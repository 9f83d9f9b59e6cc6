use zerocopy::{FromBytes, Immutable, KnownLayout};
use zerocopy::byteorder::big_endian::U64;

use crate::error::XfsError;
use crate::xfs::superblock::FsContext;

/// On-disk XFS extent record (packed 128-bit / 16-byte).
///
/// Bit layout (big-endian, 128 bits total):
/// - Bit 127:        extent flag (1 = unwritten)
/// - Bits 126..73:   logical file offset (54 bits)
/// - Bits 72..21:    absolute filesystem block number (52 bits)
/// - Bits 20..0:     block count (21 bits)
#[derive(FromBytes, KnownLayout, Immutable, Clone, Copy)]
#[repr(C)]
pub struct XfsBmbtRec {
    pub l0: U64,
    pub l1: U64,
}

/// Unpacked extent with decomposed AG information.
#[derive(Debug, Clone)]
pub struct Extent {
    pub logical_offset: u64,
    pub ag_number: u32,
    pub ag_block: u32,
    pub block_count: u64,
    pub is_unwritten: bool,
}

impl XfsBmbtRec {
    /// Unpack a packed extent record, decomposing its filesystem block
    /// number into AG-relative coordinates via `ctx`.
    pub fn unpack_with_context(&self, ctx: &FsContext) -> Extent {
        let l0 = self.l0.get();
        let l1 = self.l1.get();

        let is_unwritten = (l0 >> 63) != 0;
        let logical_offset = (l0 >> 9) & 0x003F_FFFF_FFFF_FFFF; // 54 bits
        let fsblock = ((l0 & 0x1FF) << 43) | (l1 >> 21); // 52 bits
        let block_count = l1 & 0x001F_FFFF; // 21 bits

        let (ag_number, ag_block) = fsblock_to_ag(ctx, fsblock);

        Extent {
            logical_offset,
            ag_number,
            ag_block,
            block_count,
            is_unwritten,
        }
    }
}

/// Decode the extent list of an inode's `FMT_EXTENTS` data fork. `fork_buf`
/// is the data fork portion of the inode buffer; `nextents` is the extent
/// count taken from the inode core (or its NREXT64 override).
pub fn parse_extent_list(
    fork_buf: &[u8],
    nextents: u32,
    ctx: &FsContext,
    ino: u64,
) -> Result<Vec<Extent>, XfsError> {
    let rec_size = std::mem::size_of::<XfsBmbtRec>();
    let mut extents = Vec::with_capacity(nextents as usize);

    for i in 0..nextents as usize {
        let start = i * rec_size;
        if start + rec_size > fork_buf.len() {
            return Err(XfsError::CorruptInode {
                ino,
                reason: "extent record out of bounds",
            });
        }
        let rec = XfsBmbtRec::ref_from_prefix(&fork_buf[start..])
            .map_err(|_| XfsError::CorruptInode {
                ino,
                reason: "failed to parse extent record",
            })?
            .0;
        extents.push(rec.unpack_with_context(ctx));
    }

    Ok(extents)
}

impl Extent {
    /// Starting byte offset of this extent on disk.
    pub fn start_byte(&self, ctx: &FsContext) -> u64 {
        ctx.ag_block_to_byte(self.ag_number, self.ag_block)
    }
}

/// Convert an absolute filesystem block number to a byte offset on disk.
pub fn fsblock_to_byte(ctx: &FsContext, fsblock: u64) -> u64 {
    let (agno, agblock) = fsblock_to_ag(ctx, fsblock);
    ctx.ag_block_to_byte(agno, agblock)
}

/// Convert an absolute filesystem block number to (agno, agblock).
pub fn fsblock_to_ag(ctx: &FsContext, fsblock: u64) -> (u32, u32) {
    let agno = (fsblock >> ctx.ag_blk_log as u64) as u32;
    let agblock = (fsblock & ((1u64 << ctx.ag_blk_log as u64) - 1)) as u32;
    (agno, agblock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_ctx;

    fn pack(is_unwritten: bool, logical_offset: u64, fsblock: u64, block_count: u64) -> XfsBmbtRec {
        let flag: u64 = if is_unwritten { 1 } else { 0 };
        let l0 = (flag << 63) | ((logical_offset & 0x003F_FFFF_FFFF_FFFF) << 9) | (fsblock >> 43);
        let l1 = ((fsblock & 0x7FFF_FFFF_FFF) << 21) | (block_count & 0x001F_FFFF);
        XfsBmbtRec {
            l0: U64::new(l0),
            l1: U64::new(l1),
        }
    }

    #[test]
    fn unpacks_extent_fields() {
        let ctx = test_ctx(4096, 1024);
        let fsblock = (2u64 << ctx.ag_blk_log) | 7;
        let rec = pack(false, 10, fsblock, 3);
        let extent = rec.unpack_with_context(&ctx);
        assert_eq!(extent.logical_offset, 10);
        assert_eq!(extent.ag_number, 2);
        assert_eq!(extent.ag_block, 7);
        assert_eq!(extent.block_count, 3);
        assert!(!extent.is_unwritten);
    }

    #[test]
    fn unwritten_flag_survives_unpack() {
        let ctx = test_ctx(4096, 1024);
        let rec = pack(true, 0, 5, 1);
        let extent = rec.unpack_with_context(&ctx);
        assert!(extent.is_unwritten);
    }

    #[test]
    fn parse_extent_list_rejects_truncated_buffer() {
        let ctx = test_ctx(4096, 1024);
        let err = parse_extent_list(&[0u8; 10], 1, &ctx, 128).unwrap_err();
        assert!(matches!(err, XfsError::CorruptInode { ino: 128, .. }));
    }
}
