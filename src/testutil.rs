//! Fixture builders shared by this crate's unit and integration tests.
//!
//! No binary XFS image ships with this crate, so tests build minimal
//! synthetic on-disk structures byte-by-byte instead of reading a captured
//! filesystem. Kept as a regular (non-`cfg(test)`) module so both `src/`
//! unit tests and the integration tests under `tests/` can reach it.

use crate::xfs::superblock::{FormatVersion, FsContext};

fn log2(mut n: u32) -> u8 {
    let mut log = 0u8;
    while n > 1 {
        n >>= 1;
        log += 1;
    }
    log
}

/// Build a minimal, valid V5 superblock image prefix recognized by
/// [`FsContext::from_superblock`]. `block_size`/`ag_blocks`/`inode_size`
/// must be powers of two.
pub fn build_superblock(block_size: u32, ag_count: u32, inode_size: u16, ag_blocks: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 264];

    // sb_magicnum
    buf[0..4].copy_from_slice(&0x5846_5342u32.to_be_bytes());
    // sb_blocksize
    buf[4..8].copy_from_slice(&block_size.to_be_bytes());
    // sb_rootino (byte offset 56, 8 bytes) — use inode 128 as a nominal root.
    buf[56..64].copy_from_slice(&128u64.to_be_bytes());
    // sb_agblocks (offset 84)
    buf[84..88].copy_from_slice(&ag_blocks.to_be_bytes());
    // sb_agcount (offset 88)
    buf[88..92].copy_from_slice(&ag_count.to_be_bytes());
    // sb_versionnum (offset 100, 2 bytes) — low nibble 5 selects V5.
    buf[100..102].copy_from_slice(&5u16.to_be_bytes());
    // sb_sectsize (offset 102)
    buf[102..104].copy_from_slice(&512u16.to_be_bytes());
    // sb_inodesize (offset 104)
    buf[104..106].copy_from_slice(&inode_size.to_be_bytes());
    // sb_inopblock (offset 106)
    let inopblock = (block_size / inode_size as u32) as u16;
    buf[106..108].copy_from_slice(&inopblock.to_be_bytes());
    // sb_blocklog (offset 120)
    buf[120] = log2(block_size);
    // sb_sectlog (offset 121)
    buf[121] = log2(512);
    // sb_inodelog (offset 122)
    buf[122] = log2(inode_size as u32);
    // sb_inopblog (offset 123)
    buf[123] = log2(inopblock as u32);
    // sb_agblklog (offset 124)
    buf[124] = log2(ag_blocks);

    buf
}

/// Fixed dinode core fields this builder writes; mirrors
/// `xfs::inode::XfsDinodeCore`'s byte layout exactly (the first 96 bytes of
/// every dinode, V4 or V5).
struct CoreFields {
    mode: u16,
    format: u8,
    size: u64,
    nextents: u32,
    nblocks: u64,
}

fn write_inode_core(slot: &mut [u8], fields: &CoreFields) {
    slot[0..2].copy_from_slice(&0x494eu16.to_be_bytes()); // di_magic "IN"
    slot[2..4].copy_from_slice(&fields.mode.to_be_bytes());
    slot[4] = 3; // di_version
    slot[5] = fields.format;
    slot[56..64].copy_from_slice(&fields.size.to_be_bytes());
    slot[64..72].copy_from_slice(&fields.nblocks.to_be_bytes());
    slot[76..80].copy_from_slice(&fields.nextents.to_be_bytes());
}

fn write_shortform_entry(buf: &mut Vec<u8>, name: &[u8], ino: u32, ftype: u8, has_ftype: bool) {
    buf.push(name.len() as u8);
    buf.extend_from_slice(&0u16.to_be_bytes()); // offset tag, unused by the decoder
    buf.extend_from_slice(name);
    if has_ftype {
        buf.push(ftype);
    }
    buf.extend_from_slice(&ino.to_be_bytes());
}

/// A minimal synthetic V5 image: root directory with a subdirectory, a
/// small regular file with one extent, and a zero-length regular file.
/// Used by the facade's integration tests in place of a captured fixture.
pub struct MinimalFixture {
    pub image: Vec<u8>,
    pub root_ino: u64,
    pub subdir_ino: u64,
    pub hello_ino: u64,
    pub empty_ino: u64,
    pub hello_contents: &'static [u8],
}

pub fn build_minimal_fixture() -> MinimalFixture {
    const BLOCK_SIZE: u32 = 4096;
    const AG_BLOCKS: u32 = 32;
    const INODE_SIZE: u16 = 256;
    const SECT_SIZE: u16 = 512;

    let inopblock = (BLOCK_SIZE / INODE_SIZE as u32) as u16;
    let inop_blog = log2(inopblock as u32);
    let ag_blk_log = log2(AG_BLOCKS);

    let root_agino: u32 = 1 << inop_blog; // slot 0 of inode block (ag block 1)
    let subdir_agino = root_agino + 1;
    let hello_agino = root_agino + 2;
    let empty_agino = root_agino + 3;

    let root_ino = root_agino as u64;
    let subdir_ino = subdir_agino as u64;
    let hello_ino = hello_agino as u64;
    let empty_ino = empty_agino as u64;

    let image_len = (AG_BLOCKS as usize) * (BLOCK_SIZE as usize);
    let mut image = vec![0u8; image_len];

    // Superblock at byte 0.
    {
        let sb = &mut image[0..264];
        sb[0..4].copy_from_slice(&0x5846_5342u32.to_be_bytes());
        sb[4..8].copy_from_slice(&BLOCK_SIZE.to_be_bytes());
        sb[56..64].copy_from_slice(&root_ino.to_be_bytes());
        sb[84..88].copy_from_slice(&AG_BLOCKS.to_be_bytes());
        sb[88..92].copy_from_slice(&1u32.to_be_bytes()); // sb_agcount
        sb[100..102].copy_from_slice(&5u16.to_be_bytes()); // sb_versionnum -> V5
        sb[102..104].copy_from_slice(&SECT_SIZE.to_be_bytes());
        sb[104..106].copy_from_slice(&INODE_SIZE.to_be_bytes());
        sb[106..108].copy_from_slice(&inopblock.to_be_bytes());
        sb[120] = log2(BLOCK_SIZE);
        sb[121] = log2(SECT_SIZE as u32);
        sb[122] = log2(INODE_SIZE as u32);
        sb[123] = inop_blog;
        sb[124] = ag_blk_log;
    }

    // AG 0's header cluster: AGF at sector 1, AGI at sector 2, AGFL (V5) at
    // sector 3 — `XfsImage::open` decodes these for every AG and requires
    // AG 0's to be valid (spec.md §4.3/§4.7).
    {
        let agf = &mut image[SECT_SIZE as usize..SECT_SIZE as usize + 76];
        agf[0..4].copy_from_slice(&0x5841_4746u32.to_be_bytes()); // "XAGF"
        agf[8..12].copy_from_slice(&0u32.to_be_bytes()); // agf_seqno
        agf[12..16].copy_from_slice(&AG_BLOCKS.to_be_bytes()); // agf_length
    }
    {
        let agi_off = 2 * SECT_SIZE as usize;
        let agi = &mut image[agi_off..agi_off + 296];
        agi[0..4].copy_from_slice(&0x5841_4749u32.to_be_bytes()); // "XAGI"
        agi[8..12].copy_from_slice(&0u32.to_be_bytes()); // agi_seqno
    }
    {
        let agfl_off = 3 * SECT_SIZE as usize;
        let agfl = &mut image[agfl_off..agfl_off + 36];
        agfl[0..4].copy_from_slice(&0x5841_464cu32.to_be_bytes()); // "XAFL"
        agfl[4..8].copy_from_slice(&0u32.to_be_bytes()); // agfl_seqno
    }

    let inode_block_byte = (1u64) * BLOCK_SIZE as u64; // ag_block 1, agno 0
    let data_fork_offset = 176usize; // V5 core size

    fn inode_slot(image: &mut [u8], inode_block_byte: u64, inode_size: u16, slot_index: u32) -> &mut [u8] {
        let start = inode_block_byte as usize + slot_index as usize * inode_size as usize;
        &mut image[start..start + inode_size as usize]
    }

    // Root directory: shortform dir fork listing "subdir", "hello.txt",
    // "empty_file". V5 filesystems always carry ftype.
    let mut root_fork = Vec::new();
    root_fork.push(3u8); // count
    root_fork.push(0u8); // i8count -> 4-byte inode numbers
    root_fork.extend_from_slice(&(root_ino as u32).to_be_bytes()); // parent == self
    write_shortform_entry(&mut root_fork, b"subdir", subdir_agino, 2, true);
    write_shortform_entry(&mut root_fork, b"hello.txt", hello_agino, 1, true);
    write_shortform_entry(&mut root_fork, b"empty_file", empty_agino, 1, true);

    {
        let slot = inode_slot(&mut image, inode_block_byte, INODE_SIZE, 0);
        write_inode_core(
            slot,
            &CoreFields {
                mode: 0o040_755,
                format: 1, // FMT_LOCAL
                size: root_fork.len() as u64,
                nextents: 0,
                nblocks: 0,
            },
        );
        slot[data_fork_offset..data_fork_offset + root_fork.len()].copy_from_slice(&root_fork);
    }

    // Subdirectory: empty shortform dir, parent == root.
    let mut subdir_fork = Vec::new();
    subdir_fork.push(0u8); // count
    subdir_fork.push(0u8); // i8count
    subdir_fork.extend_from_slice(&(root_ino as u32).to_be_bytes());

    {
        let slot = inode_slot(&mut image, inode_block_byte, INODE_SIZE, 1);
        write_inode_core(
            slot,
            &CoreFields {
                mode: 0o040_755,
                format: 1,
                size: subdir_fork.len() as u64,
                nextents: 0,
                nblocks: 0,
            },
        );
        slot[data_fork_offset..data_fork_offset + subdir_fork.len()].copy_from_slice(&subdir_fork);
    }

    // hello.txt: one extent at ag_block 4, 12 bytes of content.
    let hello_contents: &'static [u8] = b"hello world\n";
    let fsblock: u64 = 4; // agno 0, ag_block 4
    let l0: u64 = 0;
    let l1: u64 = (fsblock << 21) | 1; // block_count == 1
    {
        let slot = inode_slot(&mut image, inode_block_byte, INODE_SIZE, 2);
        write_inode_core(
            slot,
            &CoreFields {
                mode: 0o100_644,
                format: 2, // FMT_EXTENTS
                size: hello_contents.len() as u64,
                nextents: 1,
                nblocks: 1,
            },
        );
        slot[data_fork_offset..data_fork_offset + 8].copy_from_slice(&l0.to_be_bytes());
        slot[data_fork_offset + 8..data_fork_offset + 16].copy_from_slice(&l1.to_be_bytes());
    }

    let content_byte = 4u64 * BLOCK_SIZE as u64;
    image[content_byte as usize..content_byte as usize + hello_contents.len()]
        .copy_from_slice(hello_contents);

    // empty_file: zero-length regular file, no extents.
    {
        let slot = inode_slot(&mut image, inode_block_byte, INODE_SIZE, 3);
        write_inode_core(
            slot,
            &CoreFields {
                mode: 0o100_644,
                format: 2,
                size: 0,
                nextents: 0,
                nblocks: 0,
            },
        );
    }

    MinimalFixture {
        image,
        root_ino,
        subdir_ino,
        hello_ino,
        empty_ino,
        hello_contents,
    }
}

/// Build an `FsContext` directly, for decoder unit tests that only need
/// consistent geometry and don't want to round-trip through a byte buffer.
pub fn test_ctx(block_size: u32, ag_blocks: u32) -> FsContext {
    let inode_size: u16 = 512;
    let inopblock = (block_size / inode_size as u32) as u16;
    FsContext {
        version: FormatVersion::V5,
        block_size,
        block_log: log2(block_size),
        ag_count: 4,
        ag_blocks,
        ag_blk_log: log2(ag_blocks),
        inode_size,
        inodes_per_block: inopblock,
        inop_blog: log2(inopblock as u32),
        dir_blk_log: 0,
        root_ino: 128,
        sect_size: 512,
        has_ftype: false,
        has_nrext64: false,
    }
}
