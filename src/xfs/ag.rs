use zerocopy::{FromBytes, Immutable, KnownLayout};
use zerocopy::byteorder::big_endian::U32;

use crate::error::XfsError;
use crate::xfs::superblock::FormatVersion;

/// AGF magic: "XAGF"
const XFS_AGF_MAGIC: u32 = 0x5841_4746;
/// AGI magic: "XAGI"
const XFS_AGI_MAGIC: u32 = 0x5841_4749;
/// AGFL magic: "XAFL" (V5 only; V4 AGFL carries no magic)
const XFS_AGFL_MAGIC: u32 = 0x5841_464c;

/// On-disk AG free space header (AGF). Only the fields this core checks or
/// surfaces are named; the rest of the real header follows in the buffer.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct XfsAgf {
    pub agf_magicnum: U32,
    pub agf_versionnum: U32,
    pub agf_seqno: U32,
    pub agf_length: U32,
    pub agf_roots: [U32; 4],
    pub agf_spare0: U32,
    pub agf_levels: [U32; 4],
    pub agf_spare1: U32,
    pub agf_flfirst: U32,
    pub agf_fllast: U32,
    pub agf_flcount: U32,
    pub agf_freeblks: U32,
    pub agf_longest: U32,
}

/// On-disk AG inode header (AGI).
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct XfsAgi {
    pub agi_magicnum: U32,
    pub agi_versionnum: U32,
    pub agi_seqno: U32,
    pub agi_length: U32,
    pub agi_count: U32,
    pub agi_root: U32,
    pub agi_level: U32,
    pub agi_freecount: U32,
    pub agi_newino: U32,
    pub agi_dirino: U32,
    pub agi_unlinked: [U32; 64],
    // V5 fields (uuid, crc, pad, lsn) follow but aren't needed.
}

/// On-disk AG free list header (AGFL). V5 prefixes a magic/uuid/lsn/crc
/// block this core checks tolerantly; V4 has none and starts directly with
/// the first/last/bno array.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct XfsAgflV5Hdr {
    pub agfl_magicnum: U32,
    pub agfl_seqno: U32,
    pub agfl_uuid: [u8; 16],
    pub agfl_lsn: zerocopy::byteorder::big_endian::U64,
    pub agfl_crc: U32,
}

/// Parsed AGF fields needed for a sanity check against the superblock.
#[derive(Debug, Clone)]
pub struct AgfInfo {
    pub ag_number: u32,
    pub length: u32,
    pub freeblks: u32,
    pub longest: u32,
}

impl AgfInfo {
    /// Parse an AGF header. Returns `CorruptAg` on bad magic or a sequence
    /// number mismatch; this core doesn't validate the AGF's CRC (spec.md
    /// Non-goals: no CRC enforcement).
    pub fn from_buf(buf: &[u8], agno: u32) -> Result<Self, XfsError> {
        let agf = XfsAgf::ref_from_prefix(buf)
            .map_err(|_| XfsError::CorruptAg {
                agno,
                reason: "buffer too small for AGF",
            })?
            .0;

        if agf.agf_magicnum.get() != XFS_AGF_MAGIC {
            return Err(XfsError::BadMagic("AGF header"));
        }
        if agf.agf_seqno.get() != agno {
            return Err(XfsError::CorruptAg {
                agno,
                reason: "AGF sequence number mismatch",
            });
        }

        Ok(AgfInfo {
            ag_number: agno,
            length: agf.agf_length.get(),
            freeblks: agf.agf_freeblks.get(),
            longest: agf.agf_longest.get(),
        })
    }
}

/// Parsed AGI information: inode B+tree root, used by inode-number sanity
/// checks rather than by btree traversal (this core addresses inodes
/// directly from their packed number, it never walks the inobt).
#[derive(Debug, Clone)]
pub struct AgiInfo {
    pub ag_number: u32,
    pub inobt_root: u32,
    pub inobt_level: u32,
    pub count: u32,
    pub freecount: u32,
}

impl AgiInfo {
    pub fn from_buf(buf: &[u8], agno: u32, _version: FormatVersion) -> Result<Self, XfsError> {
        let agi = XfsAgi::ref_from_prefix(buf)
            .map_err(|_| XfsError::CorruptAg {
                agno,
                reason: "buffer too small for AGI",
            })?
            .0;

        if agi.agi_magicnum.get() != XFS_AGI_MAGIC {
            return Err(XfsError::BadMagic("AGI header"));
        }
        if agi.agi_seqno.get() != agno {
            return Err(XfsError::CorruptAg {
                agno,
                reason: "AGI sequence number mismatch",
            });
        }

        Ok(AgiInfo {
            ag_number: agno,
            inobt_root: agi.agi_root.get(),
            inobt_level: agi.agi_level.get(),
            count: agi.agi_count.get(),
            freecount: agi.agi_freecount.get(),
        })
    }
}

/// Parsed AGFL header (V5 only — V4 carries no header to validate).
#[derive(Debug, Clone)]
pub struct AgflInfo {
    pub ag_number: u32,
}

impl AgflInfo {
    /// Parse the V5 AGFL header. On a V4 filesystem the AGFL has no magic
    /// to check, so callers shouldn't call this for V4 images.
    pub fn from_buf(buf: &[u8], agno: u32) -> Result<Self, XfsError> {
        let hdr = XfsAgflV5Hdr::ref_from_prefix(buf)
            .map_err(|_| XfsError::CorruptAg {
                agno,
                reason: "buffer too small for AGFL",
            })?
            .0;

        if hdr.agfl_magicnum.get() != XFS_AGFL_MAGIC {
            return Err(XfsError::BadMagic("AGFL header"));
        }
        if hdr.agfl_seqno.get() != agno {
            return Err(XfsError::CorruptAg {
                agno,
                reason: "AGFL sequence number mismatch",
            });
        }

        Ok(AgflInfo { ag_number: agno })
    }
}

/// The three AG header decodes bundled together, as read at image-open time
/// (spec.md §4.3: "the facade uses this to build a list of AGs").
#[derive(Debug, Clone)]
pub struct AgSummary {
    pub agf: AgfInfo,
    pub agi: AgiInfo,
    /// `None` on V4 filesystems, whose AGFL carries no header to decode.
    pub agfl: Option<AgflInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agf_rejects_bad_magic() {
        let buf = vec![0u8; 64];
        let err = AgfInfo::from_buf(&buf, 0).unwrap_err();
        assert!(matches!(err, XfsError::BadMagic("AGF header")));
    }

    #[test]
    fn agi_rejects_seqno_mismatch() {
        let mut buf = vec![0u8; 256];
        buf[0..4].copy_from_slice(&XFS_AGI_MAGIC.to_be_bytes());
        buf[8..12].copy_from_slice(&7u32.to_be_bytes()); // agi_seqno
        let err = AgiInfo::from_buf(&buf, 0, FormatVersion::V4).unwrap_err();
        assert!(matches!(err, XfsError::CorruptAg { agno: 0, .. }));
    }
}
