//! On-disk XFS format decoders: superblock, allocation groups, inodes,
//! extents and directory content. Everything here is a pure decode from a
//! byte slice to a Rust value — no I/O, no path logic.

pub mod ag;
pub mod dir;
pub mod extent;
pub mod inode;
pub mod superblock;
