use super::{read_u16_le, read_u32_le};
use crate::error::{Ext4Error, Result};

/// Borrowed view of an ext4 directory entry.
///
/// The name is kept as raw bytes: directory lookups match bytewise, and
/// on-disk names carry no encoding guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry<'a> {
    pub inode: u32,
    pub rec_len: u16,
    pub name: &'a [u8],
}

impl<'a> DirEntry<'a> {
    /// Parse a directory entry from the start of `raw`.
    ///
    /// The returned `rec_len` tells the caller how far to advance.
    pub fn parse(raw: &'a [u8]) -> Result<Self> {
        if raw.len() < 8 {
            return Err(Ext4Error::CorruptedFs("dir entry too small"));
        }

        let inode = read_u32_le(raw, 0x00);
        let rec_len = read_u16_le(raw, 0x04);
        let name_len = raw[6] as usize;

        if rec_len < 8 {
            return Err(Ext4Error::CorruptedFs("dir entry rec_len < 8"));
        }
        if rec_len as usize > raw.len() {
            return Err(Ext4Error::CorruptedFs("dir entry rec_len out of bounds"));
        }
        if 8 + name_len > rec_len as usize {
            return Err(Ext4Error::CorruptedFs("dir entry name exceeds rec_len"));
        }

        Ok(DirEntry {
            inode,
            rec_len,
            name: &raw[8..8 + name_len],
        })
    }

    pub fn is_unused(&self) -> bool {
        self.inode == 0
    }
}
