use super::read_u32_le;
use crate::error::{Ext4Error, Result};

/// Parsed block group descriptor (classic 32-byte layout).
///
/// Only the inode table location is needed for read-only lookups.
#[derive(Debug, Clone, Copy)]
pub struct GroupDesc {
    pub bg_inode_table_lo: u32,
}

impl GroupDesc {
    /// Parse a group descriptor from its 32-byte on-disk record.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < 32 {
            return Err(Ext4Error::CorruptedFs("group descriptor too small"));
        }
        Ok(GroupDesc {
            bg_inode_table_lo: read_u32_le(raw, 0x08),
        })
    }
}
