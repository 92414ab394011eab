use superboot_ext4::Ext4Error;
use superboot_ext4::traits::block_device::BlockDevice;
use uefi::Handle;
use uefi::boot::{self, OpenProtocolAttributes, OpenProtocolParams, ScopedProtocol};
use uefi::proto::ProtocolPointer;
use uefi::proto::media::block::BlockIO;
use uefi::proto::media::disk::DiskIo;

/// Open a protocol on a handle without claiming exclusivity.
///
/// Scanning must not disturb the firmware drivers already bound to the
/// partition handles, so `GetProtocol` semantics are used throughout.
pub(crate) fn open_protocol<P: ProtocolPointer + ?Sized>(
    handle: Handle,
) -> uefi::Result<ScopedProtocol<P>> {
    unsafe {
        boot::open_protocol::<P>(
            OpenProtocolParams {
                handle,
                agent: boot::image_handle(),
                controller: None,
            },
            OpenProtocolAttributes::GetProtocol,
        )
    }
}

/// Byte-level access to one partition for the built-in filesystem
/// drivers.
///
/// Prefers disk I/O (arbitrary offsets); some firmware only provides
/// block I/O, where reads must be sector-aligned — the ext4 crate's
/// `BlockReader` handles the alignment on top of [`BlockDevice`].
pub struct PartitionDevice {
    block_io: ScopedProtocol<BlockIO>,
    disk_io: Option<ScopedProtocol<DiskIo>>,
    media_id: u32,
    sector_size: usize,
    last_block: u64,
}

impl PartitionDevice {
    pub fn open(handle: Handle) -> uefi::Result<Self> {
        let block_io = open_protocol::<BlockIO>(handle)?;
        let disk_io = open_protocol::<DiskIo>(handle).ok();

        let media = block_io.media();
        let media_id = media.media_id();
        let sector_size = media.block_size() as usize;
        let last_block = media.last_block();

        Ok(PartitionDevice {
            block_io,
            disk_io,
            media_id,
            sector_size,
            last_block,
        })
    }
}

impl BlockDevice for PartitionDevice {
    fn read_block(&self, block_no: u64, buf: &mut [u8]) -> Result<(), Ext4Error> {
        match &self.disk_io {
            Some(disk_io) => disk_io
                .read_disk(self.media_id, block_no * self.sector_size as u64, buf)
                .map_err(|_| Ext4Error::IoError),
            None => self
                .block_io
                .read_blocks(self.media_id, block_no, buf)
                .map_err(|_| Ext4Error::IoError),
        }
    }

    fn block_size(&self) -> usize {
        self.sector_size
    }

    fn total_blocks(&self) -> u64 {
        self.last_block + 1
    }
}
