use crate::error::{Ext4Error, Result};
use crate::traits::block_device::BlockDevice;

/// Block reader wrapping a [`BlockDevice`] with byte-granular reads.
///
/// Translates arbitrary byte offsets into sector-aligned
/// `BlockDevice::read_block` calls, so callers can read the superblock,
/// group descriptors, and inodes at their natural on-disk offsets.
pub struct BlockReader<D: BlockDevice> {
    device: D,
}

impl<D: BlockDevice> BlockReader<D> {
    /// Create a new reader wrapping the given block device.
    pub fn new(device: D) -> Self {
        Self { device }
    }

    /// Read `buf.len()` bytes starting at the given **byte** offset.
    ///
    /// Handles unaligned starts and cross-sector boundaries transparently.
    /// Uses a 4096-byte stack scratch buffer; sector sizes > 4096 are not
    /// supported and return `Err(IoError)`.
    pub fn read_bytes(&self, byte_offset: u64, buf: &mut [u8]) -> Result<()> {
        let bs = self.device.block_size();
        if bs > 4096 {
            return Err(Ext4Error::IoError);
        }

        let mut current_block = byte_offset / bs as u64;
        let mut offset_in_block = (byte_offset % bs as u64) as usize;
        let mut written = 0usize;

        let mut sector = [0u8; 4096];

        while written < buf.len() {
            self.device.read_block(current_block, &mut sector[..bs])?;

            let available = bs - offset_in_block;
            let to_copy = available.min(buf.len() - written);

            buf[written..written + to_copy]
                .copy_from_slice(&sector[offset_in_block..offset_in_block + to_copy]);

            written += to_copy;
            current_block += 1;
            offset_in_block = 0;
        }

        Ok(())
    }

    /// Sector size reported by the underlying device.
    pub fn block_size(&self) -> usize {
        self.device.block_size()
    }

    /// Borrow the underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }
}
