//! Virtual filesystem dispatcher.
//!
//! Manages a table of mounted partitions. Partitions the firmware
//! already understands (FAT, or anything with a loaded EFI filesystem
//! driver) are read through SimpleFileSystem; everything else falls back
//! to the built-in read-only drivers over block I/O. Mounts are created
//! lazily on first access and retained for the run.

mod device;
mod probe;

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use log::debug;
use superboot_ext4::{Ext4Error, Ext4Volume};
use uefi::proto::media::fs::SimpleFileSystem;
use uefi::proto::media::file::{Directory, File, FileAttribute, FileInfo, FileMode, FileType};
use uefi::{CStr16, Handle, Status};

use crate::FILE_BUFFER_SIZE;

pub(crate) use device::open_protocol;
pub use probe::FsKind;

use device::PartitionDevice;

/// Mount table bound; exceeding it fails further mounts, not existing
/// ones.
pub const MAX_MOUNTS: usize = 64;

/// How a mounted partition is read.
enum Backend {
    /// The firmware's SimpleFileSystem owns the partition; protocols are
    /// opened per call so nothing stays claimed between reads.
    Firmware,
    /// Built-in ext4 reader over raw block access.
    Ext4(Ext4Volume<PartitionDevice>),
}

struct Mount {
    device: Handle,
    backend: Backend,
}

/// A directory listing entry (firmware-backed partitions only).
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Default)]
pub struct Vfs {
    mounts: Vec<Mount>,
}

impl Vfs {
    pub fn new() -> Self {
        Vfs::default()
    }

    /// Idempotent mount: the first call probes and mounts, later calls
    /// are no-ops.
    pub fn open_device(&mut self, handle: Handle) -> uefi::Result<()> {
        if self.find(handle).is_some() {
            return Ok(());
        }
        if self.mounts.len() >= MAX_MOUNTS {
            return Err(Status::OUT_OF_RESOURCES.into());
        }

        // Firmware filesystem first.
        if uefi::boot::open_protocol_exclusive::<SimpleFileSystem>(handle).is_ok() {
            self.mounts.push(Mount {
                device: handle,
                backend: Backend::Firmware,
            });
            return Ok(());
        }

        // Built-in drivers over raw block access.
        let device = PartitionDevice::open(handle)?;
        match probe::identify(&device) {
            Some(FsKind::Ext4) => {
                let volume = Ext4Volume::mount(device).map_err(ext4_error)?;
                self.mounts.push(Mount {
                    device: handle,
                    backend: Backend::Ext4(volume),
                });
                Ok(())
            }
            Some(kind) => {
                debug!("{} volume recognized, read support unavailable", kind.name());
                Err(Status::UNSUPPORTED.into())
            }
            None => Err(Status::UNSUPPORTED.into()),
        }
    }

    /// Read an entire file into a fresh buffer.
    ///
    /// Paths use backslash separators; built-in drivers accept either
    /// separator and resolve from the filesystem root.
    pub fn read_file(&mut self, handle: Handle, path: &str) -> uefi::Result<Vec<u8>> {
        self.open_device(handle)?;
        let mount = self.find(handle).ok_or(uefi::Error::from(Status::NOT_FOUND))?;

        match &mount.backend {
            Backend::Firmware => firmware_read_file(handle, path),
            Backend::Ext4(volume) => volume.read_file(path).map_err(ext4_error),
        }
    }

    /// Cheap existence probe: open+close on firmware filesystems, path
    /// resolution (no data read) on built-in drivers.
    pub fn file_exists(&mut self, handle: Handle, path: &str) -> bool {
        if self.open_device(handle).is_err() {
            return false;
        }
        let Some(mount) = self.find(handle) else {
            return false;
        };

        match &mount.backend {
            Backend::Firmware => firmware_file_exists(handle, path),
            Backend::Ext4(volume) => volume.exists(path),
        }
    }

    /// List a directory. Only firmware-backed partitions support this;
    /// built-in mounts return `UNSUPPORTED`.
    pub fn list_directory(&mut self, handle: Handle, path: &str) -> uefi::Result<Vec<FileEntry>> {
        self.open_device(handle)?;
        let mount = self.find(handle).ok_or(uefi::Error::from(Status::NOT_FOUND))?;
        if !matches!(mount.backend, Backend::Firmware) {
            return Err(Status::UNSUPPORTED.into());
        }
        firmware_list_directory(handle, path)
    }

    /// Drop all built-in mounts (releasing their protocol handles);
    /// firmware-backed partitions hold no state to release.
    pub fn shutdown(&mut self) {
        self.mounts.clear();
    }

    fn find(&self, handle: Handle) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.device == handle)
    }
}

/// Map an ext4 reader error onto the firmware status space.
fn ext4_error(err: Ext4Error) -> uefi::Error {
    let status = match err {
        Ext4Error::NotFound | Ext4Error::NotDirectory => Status::NOT_FOUND,
        Ext4Error::Unsupported(_) => Status::UNSUPPORTED,
        Ext4Error::CorruptedFs(_) | Ext4Error::InvalidMagic => Status::VOLUME_CORRUPTED,
        Ext4Error::IoError => Status::DEVICE_ERROR,
    };
    status.into()
}

fn firmware_read_file(handle: Handle, path: &str) -> uefi::Result<Vec<u8>> {
    let mut fs = uefi::boot::open_protocol_exclusive::<SimpleFileSystem>(handle)?;
    let mut root = fs.open_volume()?;

    let mut path_buf = [0u16; FILE_BUFFER_SIZE];
    let path = CStr16::from_str_with_buf(path, &mut path_buf)
        .map_err(|_| uefi::Error::from(Status::INVALID_PARAMETER))?;

    let file = root.open(path, FileMode::Read, FileAttribute::empty())?;
    let mut file = match file.into_type()? {
        FileType::Regular(file) => file,
        FileType::Dir(_) => return Err(Status::INVALID_PARAMETER.into()),
    };

    let mut info_buf = [0u8; FILE_BUFFER_SIZE];
    let info: &FileInfo = file
        .get_info(&mut info_buf)
        .map_err(|err| uefi::Error::from(err.status()))?;
    let size = info.file_size() as usize;

    let mut data = vec![0u8; size];
    let read = file
        .read(&mut data)
        .map_err(|err| uefi::Error::from(err.status()))?;
    data.truncate(read);
    Ok(data)
}

fn firmware_file_exists(handle: Handle, path: &str) -> bool {
    let Ok(mut fs) = uefi::boot::open_protocol_exclusive::<SimpleFileSystem>(handle) else {
        return false;
    };
    let Ok(mut root) = fs.open_volume() else {
        return false;
    };

    let mut path_buf = [0u16; FILE_BUFFER_SIZE];
    let Ok(path) = CStr16::from_str_with_buf(path, &mut path_buf) else {
        return false;
    };

    root.open(path, FileMode::Read, FileAttribute::empty()).is_ok()
}

fn firmware_list_directory(handle: Handle, path: &str) -> uefi::Result<Vec<FileEntry>> {
    let mut fs = uefi::boot::open_protocol_exclusive::<SimpleFileSystem>(handle)?;
    let root = fs.open_volume()?;
    let mut dir = open_subdirectory(root, path)?;

    let mut entries = Vec::new();
    let mut info_buf = [0u8; FILE_BUFFER_SIZE];
    loop {
        match dir.read_entry(&mut info_buf) {
            Ok(Some(info)) => {
                let name = info.file_name().to_string();
                if name == "." || name == ".." {
                    continue;
                }
                entries.push(FileEntry {
                    name,
                    is_dir: info.attribute().contains(FileAttribute::DIRECTORY),
                    size: info.file_size(),
                });
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }
    Ok(entries)
}

fn open_subdirectory(mut root: Directory, path: &str) -> uefi::Result<Directory> {
    if path.is_empty() || path == "\\" {
        return Ok(root);
    }

    let mut path_buf = [0u16; FILE_BUFFER_SIZE];
    let path = CStr16::from_str_with_buf(path, &mut path_buf)
        .map_err(|_| uefi::Error::from(Status::INVALID_PARAMETER))?;

    let dir = root.open(path, FileMode::Read, FileAttribute::empty())?;
    match dir.into_type()? {
        FileType::Dir(dir) => Ok(dir),
        FileType::Regular(_) => Err(Status::INVALID_PARAMETER.into()),
    }
}
