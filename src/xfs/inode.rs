use zerocopy::{FromBytes, Immutable, KnownLayout};
use zerocopy::byteorder::big_endian::{U16, U32, U64};

use crate::error::XfsError;
use crate::xfs::dir::shortform::parse_shortform_dir;
use crate::xfs::dir::DirEntry;
use crate::xfs::extent::{parse_extent_list, Extent};
use crate::xfs::superblock::{FormatVersion, FsContext};

/// Inode magic: "IN"
const XFS_DINODE_MAGIC: u16 = 0x494e;

/// Inode data fork format codes.
pub const XFS_DINODE_FMT_DEV: u8 = 0;
pub const XFS_DINODE_FMT_LOCAL: u8 = 1;
pub const XFS_DINODE_FMT_EXTENTS: u8 = 2;
pub const XFS_DINODE_FMT_BTREE: u8 = 3;
pub const XFS_DINODE_FMT_UUID: u8 = 4;

/// S_IFMT mask and the file-type bits this core cares about.
pub const S_IFMT: u16 = 0o170000;
pub const S_IFDIR: u16 = 0o040000;
pub const S_IFREG: u16 = 0o100000;
pub const S_IFLNK: u16 = 0o120000;

/// On-disk XFS dinode core (V4 layout; V5 prefixes the same layout and
/// appends a v3 extension this core doesn't need field-by-field).
/// V4 core is 96 bytes; V5 core is 176 bytes.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct XfsDinodeCore {
    pub di_magic: U16,
    pub di_mode: U16,
    pub di_version: u8,
    pub di_format: u8,
    pub di_onlink: U16,
    pub di_uid: U32,
    pub di_gid: U32,
    pub di_nlink: U32,
    pub di_projid: U16,
    pub di_projid_hi: U16,
    pub di_pad: [u8; 6],
    pub di_flushiter: U16,
    pub di_atime: XfsTimestamp,
    pub di_mtime: XfsTimestamp,
    pub di_ctime: XfsTimestamp,
    pub di_size: U64,
    pub di_nblocks: U64,
    pub di_extsize: U32,
    pub di_nextents: U32,
    pub di_anextents: U16,
    pub di_forkoff: u8,
    pub di_aformat: u8,
    pub di_dmevmask: U32,
    pub di_dmstate: U16,
    pub di_flags: U16,
    pub di_gen: U32,
}

/// On-disk XFS timestamp.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct XfsTimestamp {
    pub t_sec: U32,
    pub t_nsec: U32,
}

/// Size of the V4 dinode core.
pub const V4_CORE_SIZE: usize = 96;
/// Size of the V5 dinode core.
pub const V5_CORE_SIZE: usize = 176;

/// The fixed-size portion of a decoded inode (spec.md §3 `core`).
#[derive(Debug, Clone)]
pub struct InodeCore {
    pub ino: u64,
    pub mode: u16,
    pub format: u8,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub nextents: u32,
    pub mtime_sec: u32,
    pub mtime_nsec: u32,
    pub atime_sec: u32,
    pub atime_nsec: u32,
    pub ctime_sec: u32,
    pub ctime_nsec: u32,
    pub nblocks: u64,
    /// Whether this inode carries an attribute fork (`di_forkoff != 0`).
    /// Identified only, per spec.md §1's "attribute forks beyond
    /// identification" Non-goal — this crate never decodes attribute
    /// values, just records that the data fork's usable space is reduced
    /// by the attribute fork's share of the literal area.
    pub has_attr_fork: bool,
}

impl InodeCore {
    pub fn is_dir(&self) -> bool {
        (self.mode & S_IFMT) == S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        (self.mode & S_IFMT) == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        (self.mode & S_IFMT) == S_IFLNK
    }
}

/// The inode's data fork, collapsed into a single tagged variant instead of
/// the three mutually-exclusive nullable fields spec.md §3 describes
/// (per spec.md §9's redesign note).
#[derive(Debug, Clone)]
pub enum DataFork {
    /// Short-form directory: already decoded, since decoding it needs
    /// nothing beyond the bytes already in hand plus `FsContext`.
    LocalDir(Vec<DirEntry>),
    /// `FMT_EXTENTS` data fork, directory or regular file: the extent list.
    /// Interpreting the blocks it points at is the caller's job (directory
    /// decoder vs. plain byte concatenation for a regular file).
    Extents(Vec<Extent>),
    /// Anything this core doesn't decode: `FMT_BTREE` (extent B+tree data
    /// fork), `FMT_DEV`/`FMT_UUID`, or an inline (`FMT_LOCAL`) regular file
    /// (spec.md §3: "rare, not supported by this core"). Carries the raw
    /// format code for diagnostics.
    Unsupported(u8),
}

/// A fully decoded inode: fixed core plus dispatched data fork.
#[derive(Debug, Clone)]
pub struct Inode {
    pub core: InodeCore,
    pub fork: DataFork,
}

/// Parse the fixed dinode core from `buf` (inode bytes, starting at byte 0
/// of the inode). Returns the core plus the byte offset where the data
/// fork begins.
fn parse_inode_core(
    buf: &[u8],
    ino: u64,
    ctx: &FsContext,
) -> Result<(InodeCore, usize), XfsError> {
    let core = XfsDinodeCore::ref_from_prefix(buf)
        .map_err(|_| XfsError::CorruptInode {
            ino,
            reason: "buffer too small for dinode core",
        })?
        .0;

    if core.di_magic.get() != XFS_DINODE_MAGIC {
        return Err(XfsError::BadMagic("dinode"));
    }

    let is_v5 = ctx.version == FormatVersion::V5;
    let data_fork_offset = if is_v5 { V5_CORE_SIZE } else { V4_CORE_SIZE };

    // With NREXT64, di_nextents (offset 76) is zeroed; the real data-fork
    // extent count is the lower 48 bits of a big-endian u64 at inode byte
    // offset 24 (overlapping the legacy di_pad + di_flushiter fields).
    let nextents = if ctx.has_nrext64 {
        if buf.len() < 32 {
            return Err(XfsError::CorruptInode {
                ino,
                reason: "buffer too small for nrext64 extent count",
            });
        }
        let big = u64::from_be_bytes(buf[24..32].try_into().unwrap());
        (big & 0x0000_FFFF_FFFF_FFFF) as u32
    } else {
        core.di_nextents.get()
    };

    Ok((
        InodeCore {
            ino,
            mode: core.di_mode.get(),
            format: core.di_format,
            size: core.di_size.get(),
            uid: core.di_uid.get(),
            gid: core.di_gid.get(),
            nlink: core.di_nlink.get(),
            nextents,
            mtime_sec: core.di_mtime.t_sec.get(),
            mtime_nsec: core.di_mtime.t_nsec.get(),
            atime_sec: core.di_atime.t_sec.get(),
            atime_nsec: core.di_atime.t_nsec.get(),
            ctime_sec: core.di_ctime.t_sec.get(),
            ctime_nsec: core.di_ctime.t_nsec.get(),
            nblocks: core.di_nblocks.get(),
            has_attr_fork: core.di_forkoff != 0,
        },
        data_fork_offset,
    ))
}

impl Inode {
    /// Decode an inode and dispatch its data fork, per spec.md §4.4.
    pub fn decode(buf: &[u8], ino: u64, ctx: &FsContext) -> Result<Inode, XfsError> {
        let (core, fork_offset) = parse_inode_core(buf, ino, ctx)?;

        let is_dir = core.is_dir();
        let is_regular = core.is_regular();

        let fork = match core.format {
            XFS_DINODE_FMT_LOCAL if is_dir => {
                let fork_end = fork_offset
                    .checked_add(core.size as usize)
                    .filter(|&end| end <= buf.len())
                    .ok_or(XfsError::CorruptInode {
                        ino,
                        reason: "shortform dir fork out of bounds",
                    })?;
                let fork_buf = &buf[fork_offset..fork_end];
                let entries = parse_shortform_dir(fork_buf, ino, ctx)?;
                DataFork::LocalDir(entries)
            }
            XFS_DINODE_FMT_EXTENTS if is_dir || is_regular => {
                let fork_buf = buf.get(fork_offset..).unwrap_or(&[]);
                let extents = parse_extent_list(fork_buf, core.nextents, ctx, ino)?;
                DataFork::Extents(extents)
            }
            other => DataFork::Unsupported(other),
        };

        Ok(Inode { core, fork })
    }
}
