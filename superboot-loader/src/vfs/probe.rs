//! Filesystem identification by superblock magic.
//!
//! Each probe reads only the documented superblock location and never
//! mutates device state. Short reads at image boundaries (a partition
//! smaller than the probed offset) simply mean "not this filesystem".

use log::debug;
use superboot_ext4::Ext4Volume;
use superboot_ext4::io::block_reader::BlockReader;

use super::device::PartitionDevice;

/// btrfs superblock at 64 KiB; magic "_BHRfS_M" at +0x40.
const BTRFS_SUPERBLOCK_OFFSET: u64 = 0x10000;
const BTRFS_MAGIC_OFFSET: u64 = 0x40;
const BTRFS_MAGIC: u64 = 0x4D5F_5366_5248_425F;

/// XFS superblock at offset 0; magic "XFSB", stored big-endian.
const XFS_MAGIC: u32 = 0x5846_5342;

/// NTFS OEM id "NTFS    " at offset 3 of the boot sector.
const NTFS_OEM_OFFSET: u64 = 3;
const NTFS_OEM: &[u8; 8] = b"NTFS    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Ext4,
    Btrfs,
    Xfs,
    Ntfs,
}

impl FsKind {
    pub fn name(self) -> &'static str {
        match self {
            FsKind::Ext4 => "ext4",
            FsKind::Btrfs => "btrfs",
            FsKind::Xfs => "xfs",
            FsKind::Ntfs => "ntfs",
        }
    }
}

/// Decide which driver owns a partition. Probe order matters only in
/// that ext4 is the single driver that can actually mount.
pub fn identify(device: &PartitionDevice) -> Option<FsKind> {
    if Ext4Volume::probe(device).is_ok() {
        return Some(FsKind::Ext4);
    }

    let reader = BlockReader::new(device);

    let mut magic8 = [0u8; 8];
    if reader
        .read_bytes(BTRFS_SUPERBLOCK_OFFSET + BTRFS_MAGIC_OFFSET, &mut magic8)
        .is_ok()
        && u64::from_le_bytes(magic8) == BTRFS_MAGIC
    {
        return Some(FsKind::Btrfs);
    }

    let mut magic4 = [0u8; 4];
    if reader.read_bytes(0, &mut magic4).is_ok() && u32::from_be_bytes(magic4) == XFS_MAGIC {
        return Some(FsKind::Xfs);
    }

    let mut oem = [0u8; 8];
    if reader.read_bytes(NTFS_OEM_OFFSET, &mut oem).is_ok() && &oem == NTFS_OEM {
        return Some(FsKind::Ntfs);
    }

    debug!("no filesystem driver claimed the partition");
    None
}
