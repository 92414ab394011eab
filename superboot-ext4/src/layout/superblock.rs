use super::{read_u16_le, read_u32_le};
use crate::error::{Ext4Error, Result};

// ─── Constants ──────────────────────────────────────────────────────────────

/// ext4 superblock magic number (at offset 0x38).
pub const EXT4_SUPER_MAGIC: u16 = 0xEF53;

/// Superblock is always at byte offset 1024 from start of the volume.
pub const SUPER_BLOCK_OFFSET: u64 = 1024;

/// Superblock raw size is always 1024 bytes.
pub const SUPER_BLOCK_SIZE: usize = 1024;

/// Byte offset of `s_magic` within the superblock.
pub const MAGIC_OFFSET: usize = 0x38;

/// Group descriptor size without the 64-bit feature.
pub const GROUP_DESC_SIZE: u64 = 32;

// Incompatible feature flags

pub const INCOMPAT_EXTENTS: u32 = 0x0040;
pub const INCOMPAT_64BIT: u32 = 0x0080;

/// Parsed ext4 superblock, trimmed to the fields a read-only mount needs.
///
/// Parsed from the raw 1024-byte on-disk superblock via [`SuperBlock::parse()`].
#[derive(Debug, Clone)]
pub struct SuperBlock {
    pub s_inodes_count: u32,
    pub s_first_data_block: u32,
    pub s_log_block_size: u32,
    pub s_inodes_per_group: u32,
    pub s_magic: u16,
    pub s_rev_level: u32,
    pub s_inode_size: u16,
    pub s_feature_incompat: u32,
}

impl SuperBlock {
    /// Parse a superblock from raw 1024-byte on-disk data.
    ///
    /// 1. Check magic (0xEF53) at offset 0x38.
    /// 2. Read the needed fields in little-endian.
    pub fn parse(raw: &[u8; SUPER_BLOCK_SIZE]) -> Result<SuperBlock> {
        let magic = read_u16_le(raw, MAGIC_OFFSET);
        if magic != EXT4_SUPER_MAGIC {
            return Err(Ext4Error::InvalidMagic);
        }

        Ok(SuperBlock {
            s_inodes_count: read_u32_le(raw, 0x00),
            s_first_data_block: read_u32_le(raw, 0x14),
            s_log_block_size: read_u32_le(raw, 0x18),
            s_inodes_per_group: read_u32_le(raw, 0x28),
            s_magic: magic,
            s_rev_level: read_u32_le(raw, 0x4C),
            s_inode_size: read_u16_le(raw, 0x58),
            s_feature_incompat: read_u32_le(raw, 0x60),
        })
    }

    /// Validate basic superblock sanity and refuse unsupported layouts.
    ///
    /// Volumes with `INCOMPAT_64BIT` use 64-byte group descriptors; reading
    /// them with the classic 32-byte stride would mis-locate every group
    /// past group 0, so they are refused outright.
    pub fn validate(&self) -> Result<()> {
        // log_block_size: 0 → 1 KiB, 6 → 64 KiB
        if self.s_log_block_size > 6 {
            return Err(Ext4Error::CorruptedFs("invalid log_block_size (> 6)"));
        }

        if self.s_inodes_per_group == 0 {
            return Err(Ext4Error::CorruptedFs("inodes_per_group is zero"));
        }

        if self.s_rev_level >= 1 {
            if self.s_inode_size < 128 {
                return Err(Ext4Error::CorruptedFs("inode_size < 128"));
            }
            if !self.s_inode_size.is_power_of_two() {
                return Err(Ext4Error::CorruptedFs("inode_size not power of two"));
            }
        }

        if self.s_feature_incompat & INCOMPAT_64BIT != 0 {
            return Err(Ext4Error::Unsupported("64bit group descriptors"));
        }

        Ok(())
    }

    /// Block size in bytes: `1024 << s_log_block_size`.
    pub fn block_size(&self) -> usize {
        1024usize << self.s_log_block_size
    }

    /// Inode record size: fixed 128 bytes on rev0 volumes.
    pub fn inode_size(&self) -> usize {
        if self.s_rev_level >= 1 {
            self.s_inode_size as usize
        } else {
            128
        }
    }
}
