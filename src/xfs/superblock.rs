use zerocopy::{FromBytes, Immutable, KnownLayout};
use zerocopy::byteorder::big_endian::{U16, U32, U64};

use crate::error::XfsError;

/// Byte offset of `sb_crc` in the on-disk superblock. Unlike every other
/// multi-byte field here, `sb_crc` is stored little-endian on disk — a
/// long-standing wart in the V5 metadata format, not a bug in this reader.
const SB_CRC_OFFSET: usize = 224;

/// XFS superblock magic: "XFSB"
const XFS_SB_MAGIC: u32 = 0x5846_5342;

/// `sb_features2` bit for FTYPE on V4 filesystems.
const XFS_SB_VERSION2_FTYPE: u32 = 0x0200;
/// `sb_features_incompat` bit for 64-bit extent counters (NREXT64).
const XFS_SB_FEAT_INCOMPAT_NREXT64: u32 = 1 << 5;

/// On-disk XFS superblock (first 264 bytes, enough for every field this
/// core needs; V5-only trailing fields such as `sb_features_incompat` are
/// read separately from the raw buffer since they sit past this struct).
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct XfsDsb {
    pub sb_magicnum: U32,
    pub sb_blocksize: U32,
    pub sb_dblocks: U64,
    pub sb_rblocks: U64,
    pub sb_rextents: U64,
    pub sb_uuid: [u8; 16],
    pub sb_logstart: U64,
    pub sb_rootino: U64,
    pub sb_rbmino: U64,
    pub sb_rsumino: U64,
    pub sb_rextsize: U32,
    pub sb_agblocks: U32,
    pub sb_agcount: U32,
    pub sb_rbmblocks: U32,
    pub sb_logblocks: U32,
    pub sb_versionnum: U16,
    pub sb_sectsize: U16,
    pub sb_inodesize: U16,
    pub sb_inopblock: U16,
    pub sb_fname: [u8; 12],
    pub sb_blocklog: u8,
    pub sb_sectlog: u8,
    pub sb_inodelog: u8,
    pub sb_inopblog: u8,
    pub sb_agblklog: u8,
    pub sb_rextslog: u8,
    pub sb_inprogress: u8,
    pub sb_imax_pct: u8,
    pub sb_icount: U64,
    pub sb_ifree: U64,
    pub sb_fdblocks: U64,
    pub sb_frextents: U64,
    pub sb_uquotino: U64,
    pub sb_gquotino: U64,
    pub sb_qflags: U16,
    pub sb_flags: u8,
    pub sb_shared_vn: u8,
    pub sb_inoalignmt: U32,
    pub sb_unit: U32,
    pub sb_width: U32,
    pub sb_dirblklog: u8,
    pub sb_logsectlog: u8,
    pub sb_logsectsize: U16,
    pub sb_logsunit: U32,
    pub sb_features2: U32,
    pub sb_bad_features2: U32,
    // V5 fields (sb_features_compat .. sb_lsn) follow but aren't needed by
    // name; the one we do need, sb_features_incompat, is read by raw byte
    // offset below rather than growing this struct with fields nothing uses.
}

/// Byte offset of `sb_features_incompat` in the on-disk superblock.
const SB_FEATURES_INCOMPAT_OFFSET: usize = 216;

/// Which XFS format generation we're dealing with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V4,
    V5,
}

/// Filesystem geometry and feature flags derived from the superblock —
/// the "canonical geometry" of spec.md §3, plus the address-arithmetic
/// helpers every other decoder in this crate calls through.
#[derive(Debug, Clone)]
pub struct FsContext {
    pub version: FormatVersion,
    pub block_size: u32,
    pub block_log: u8,
    pub ag_count: u32,
    pub ag_blocks: u32,
    pub ag_blk_log: u8,
    pub inode_size: u16,
    pub inodes_per_block: u16,
    pub inop_blog: u8,
    pub dir_blk_log: u8,
    pub root_ino: u64,
    pub sect_size: u16,
    /// Does the filesystem store `ftype` in directory entries?
    pub has_ftype: bool,
    /// NREXT64: extent counts stored as 64-bit at inode offset 24.
    pub has_nrext64: bool,
}

impl FsContext {
    /// Parse the superblock from the first bytes of the image and derive a
    /// context. `buf` must be at least 264 bytes, the fixed portion of the
    /// superblock spec.md §4.2 calls "a fixed-size record from byte 0".
    pub fn from_superblock(buf: &[u8]) -> Result<Self, XfsError> {
        let sb = XfsDsb::ref_from_prefix(buf)
            .map_err(|_| XfsError::CorruptSuperblock("buffer too small for superblock"))?
            .0;

        if sb.sb_magicnum.get() != XFS_SB_MAGIC {
            return Err(XfsError::BadMagic("superblock"));
        }

        let block_size = sb.sb_blocksize.get();
        let ag_blocks = sb.sb_agblocks.get();
        if !block_size.is_power_of_two() || !ag_blocks.is_power_of_two() {
            return Err(XfsError::CorruptSuperblock(
                "block_size/ag_blocks must be powers of two",
            ));
        }

        let versionnum = sb.sb_versionnum.get();
        // V5 superblocks carry version 5 in the low nibble of sb_versionnum.
        let version = if (versionnum & 0x000f) >= 5 {
            FormatVersion::V5
        } else {
            FormatVersion::V4
        };

        let features2 = sb.sb_features2.get();
        let has_ftype_v4 = (features2 & XFS_SB_VERSION2_FTYPE) != 0;
        // V5 always carries ftype.
        let has_ftype = version == FormatVersion::V5 || has_ftype_v4;

        let has_nrext64 = version == FormatVersion::V5
            && buf.len() >= SB_FEATURES_INCOMPAT_OFFSET + 4
            && {
                let o = SB_FEATURES_INCOMPAT_OFFSET;
                let incompat = u32::from_be_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
                (incompat & XFS_SB_FEAT_INCOMPAT_NREXT64) != 0
            };

        if version == FormatVersion::V5 {
            check_superblock_crc(buf);
        }

        Ok(FsContext {
            version,
            block_size,
            block_log: sb.sb_blocklog,
            ag_count: sb.sb_agcount.get(),
            ag_blocks,
            ag_blk_log: sb.sb_agblklog,
            inode_size: sb.sb_inodesize.get(),
            inodes_per_block: sb.sb_inopblock.get(),
            inop_blog: sb.sb_inopblog,
            dir_blk_log: sb.sb_dirblklog,
            root_ino: sb.sb_rootino.get(),
            sect_size: sb.sb_sectsize.get(),
            has_ftype,
            has_nrext64,
        })
    }

    /// Absolute inode number -> AG number (spec.md §3 inode-number packing).
    pub fn ino_to_agno(&self, ino: u64) -> u32 {
        (ino >> (self.inop_blog as u64 + self.ag_blk_log as u64)) as u32
    }

    /// Absolute inode number -> AG-relative inode number.
    pub fn ino_to_agino(&self, ino: u64) -> u32 {
        let mask = (1u64 << (self.inop_blog as u64 + self.ag_blk_log as u64)) - 1;
        (ino & mask) as u32
    }

    /// (AG number, AG-relative inode) -> absolute inode number.
    pub fn agino_to_ino(&self, agno: u32, agino: u32) -> u64 {
        ((agno as u64) << (self.inop_blog as u64 + self.ag_blk_log as u64)) | (agino as u64)
    }

    /// Byte offset of an AG-relative block within the whole image.
    pub fn ag_block_to_byte(&self, agno: u32, agblock: u32) -> u64 {
        let abs_block = (agno as u64) * (self.ag_blocks as u64) + (agblock as u64);
        abs_block << self.block_log as u64
    }

    /// Byte offset of the start of an AG.
    pub fn ag_start_byte(&self, agno: u32) -> u64 {
        (agno as u64) * (self.ag_blocks as u64) * (self.block_size as u64)
    }

    /// Byte offset of the AGF header for a given AG (disk sector 1; sector 0
    /// is the superblock sector, a backup copy of which AG0 carries but
    /// every AG reserves).
    pub fn agf_byte_offset(&self, agno: u32) -> u64 {
        self.ag_start_byte(agno) + self.sect_size as u64
    }

    /// Byte offset of the AGI header for a given AG (disk sector 2).
    pub fn agi_byte_offset(&self, agno: u32) -> u64 {
        self.ag_start_byte(agno) + 2 * self.sect_size as u64
    }

    /// Byte offset of the AGFL header for a given AG (disk sector 3).
    pub fn agfl_byte_offset(&self, agno: u32) -> u64 {
        self.ag_start_byte(agno) + 3 * self.sect_size as u64
    }

    /// Number of filesystem blocks in one directory block.
    pub fn dir_blk_fsblocks(&self) -> u32 {
        1u32 << self.dir_blk_log
    }

    /// Size in bytes of one directory block.
    pub fn dir_blk_size(&self) -> u32 {
        self.block_size * self.dir_blk_fsblocks()
    }

    /// Given an absolute inode number, return the byte offset of the block
    /// containing it and the byte offset of the inode within that block
    /// (spec.md §3's `absByteOffset` formula, split so callers can batch
    /// reads at block granularity).
    pub fn ino_to_disk_position(&self, ino: u64) -> (u64, usize) {
        let agno = self.ino_to_agno(ino);
        let agino = self.ino_to_agino(ino);
        let ag_block = agino >> self.inop_blog;
        let block_byte = self.ag_block_to_byte(agno, ag_block);
        let within =
            (agino & ((1u32 << self.inop_blog) - 1)) as usize * self.inode_size as usize;
        (block_byte, within)
    }

    /// Absolute byte offset of an inode (spec.md §3 `absByteOffset`).
    pub fn ino_to_byte_offset(&self, ino: u64) -> u64 {
        let (block_byte, within) = self.ino_to_disk_position(ino);
        block_byte + within as u64
    }
}

/// Recompute the V5 superblock's CRC32C and warn on mismatch. Never returns
/// an error: CRC enforcement is an explicit Non-goal (spec.md §1), so this
/// exists purely to surface silent corruption to whoever is watching logs.
/// Only covers the bytes actually read at open time, not the full on-disk
/// sector — enough to catch a superblock that's been zeroed or truncated,
/// not a guarantee of bit-for-bit metadata integrity.
fn check_superblock_crc(buf: &[u8]) {
    if buf.len() < SB_CRC_OFFSET + 4 {
        return;
    }

    let stored = u32::from_le_bytes(buf[SB_CRC_OFFSET..SB_CRC_OFFSET + 4].try_into().unwrap());

    let mut scratch = buf.to_vec();
    scratch[SB_CRC_OFFSET..SB_CRC_OFFSET + 4].fill(0);
    let computed = crc32c::crc32c(&scratch);

    if computed != stored {
        tracing::warn!(stored, computed, "superblock CRC mismatch (not enforced)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::build_superblock;

    #[test]
    fn rejects_bad_magic() {
        let mut buf = build_superblock(4096, 4, 512, 1024);
        buf[0] = 0;
        let err = FsContext::from_superblock(&buf).unwrap_err();
        assert!(matches!(err, XfsError::BadMagic("superblock")));
    }

    #[test]
    fn superblock_roundtrip_logs() {
        let buf = build_superblock(4096, 4, 512, 1024);
        let ctx = FsContext::from_superblock(&buf).unwrap();
        assert_eq!(ctx.block_size, 1 << ctx.block_log);
        assert_eq!(ctx.ag_blocks, 1 << ctx.ag_blk_log);
        assert_eq!(ctx.ag_count, 4);
        assert_eq!(ctx.inode_size, 512);
    }

    #[test]
    fn inode_number_packing_roundtrips() {
        let buf = build_superblock(4096, 4, 512, 1024);
        let ctx = FsContext::from_superblock(&buf).unwrap();
        for agno in 0..ctx.ag_count {
            for agino in [0u32, 1, 63, 4096] {
                let ino = ctx.agino_to_ino(agno, agino);
                assert_eq!(ctx.ino_to_agno(ino), agno);
                assert_eq!(ctx.ino_to_agino(ino), agino);
            }
        }
    }
}
