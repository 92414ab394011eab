use crate::error::Ext4Error;

/// Block device abstraction — the I/O foundation for the reader.
///
/// `block_no` counts device sectors, not filesystem blocks; the
/// [`BlockReader`](crate::io::block_reader::BlockReader) layers byte-offset
/// reads on top. Implementations may back onto UEFI disk I/O, block I/O,
/// or an in-memory image.
pub trait BlockDevice {
    /// Read a single device sector into `buf`.
    ///
    /// `buf.len()` must equal `self.block_size()`.
    fn read_block(&self, block_no: u64, buf: &mut [u8]) -> ::core::result::Result<(), Ext4Error>;

    /// Sector size in bytes (typically 512 or 4096).
    fn block_size(&self) -> usize;

    /// Total number of sectors on the device.
    fn total_blocks(&self) -> u64;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &T {
    fn read_block(&self, block_no: u64, buf: &mut [u8]) -> ::core::result::Result<(), Ext4Error> {
        (**self).read_block(block_no, buf)
    }

    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn total_blocks(&self) -> u64 {
        (**self).total_blocks()
    }
}
