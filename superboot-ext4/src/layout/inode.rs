use super::{read_u16_le, read_u32_le};
use crate::error::{Ext4Error, Result};

// Mode constants (i_mode & S_IFMT)
pub const S_IFMT: u16 = 0xF000;
pub const S_IFREG: u16 = 0x8000;
pub const S_IFDIR: u16 = 0x4000;

/// The inode's data is mapped by an extent tree, not indirect blocks.
pub const EXTENTS_FL: u32 = 0x0008_0000;

/// Parsed ext4 inode, trimmed to the read path.
///
/// The size field is already combined from its lo/hi halves.
#[derive(Debug, Clone)]
pub struct Inode {
    pub i_mode: u16,
    /// Combined: `(size_hi << 32) | size_lo`
    pub i_size: u64,
    pub i_flags: u32,
    /// Raw 60-byte block map / extent tree root.
    pub i_block: [u8; 60],
}

impl Inode {
    /// Parse an inode from raw bytes; `raw.len()` must be >= 128.
    pub fn parse(raw: &[u8]) -> Result<Inode> {
        if raw.len() < 128 {
            return Err(Ext4Error::CorruptedFs("inode buffer < 128 bytes"));
        }

        let i_mode = read_u16_le(raw, 0x00);
        let i_size_lo = read_u32_le(raw, 0x04);
        let i_flags = read_u32_le(raw, 0x20);

        let mut i_block = [0u8; 60];
        i_block.copy_from_slice(&raw[0x28..0x64]);

        let i_size_hi = read_u32_le(raw, 0x6C);
        let i_size = ((i_size_hi as u64) << 32) | (i_size_lo as u64);

        Ok(Inode {
            i_mode,
            i_size,
            i_flags,
            i_block,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.i_mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.i_mode & S_IFMT == S_IFREG
    }

    /// Whether the inode uses an extent tree (vs. indirect block map).
    pub fn uses_extents(&self) -> bool {
        self.i_flags & EXTENTS_FL != 0
    }
}
