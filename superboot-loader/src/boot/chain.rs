//! EFI chain-loader for non-Linux targets.
//!
//! Loads an arbitrary .efi binary from a partition and transfers control
//! via LoadImage/StartImage. Used for the Windows Boot Manager, UEFI
//! shells, and anything else that speaks PE. A return from the payload
//! is normal; control goes back to the menu.

use alloc::vec::Vec;

use log::{info, warn};
use superboot_config::target::MAX_PATH;
use uefi::boot::{self, LoadImageSource};
use uefi::proto::BootPolicy;
use uefi::proto::device_path::DevicePath;
use uefi::proto::device_path::build::{self, DevicePathBuilder};
use uefi::{CStr16, Handle, Status};

use crate::scan::Target;
use crate::vfs::{Vfs, open_protocol};

pub fn chainload(target: &Target, vfs: &mut Vfs) -> Status {
    info!("chain-loading: {}", target.efi_path);
    chainload_file(target.device, &target.efi_path, vfs)
}

/// Load and start a .efi payload read through the VFS.
pub fn chainload_file(device: Handle, path: &str, vfs: &mut Vfs) -> Status {
    let image = match vfs.read_file(device, path) {
        Ok(image) => image,
        Err(err) => {
            warn!("failed to read EFI binary: {:?}", err.status());
            return err.status();
        }
    };

    // Built-in mounts hold protocol handles on their partitions; release
    // them so the payload gets an undisturbed view of the devices.
    vfs.shutdown();

    let mut storage = Vec::new();
    let file_path = build_file_device_path(device, path, &mut storage);

    let source = LoadImageSource::FromBuffer {
        buffer: &image,
        file_path,
    };
    let handle = match boot::load_image(boot::image_handle(), source) {
        Ok(handle) => handle,
        Err(err) => match file_path {
            // Some firmware refuses buffer loads (load policy); let it
            // read the file itself by device path.
            Some(device_path) => {
                warn!("buffer load refused ({:?}), retrying by device path", err.status());
                let source = LoadImageSource::FromDevicePath {
                    device_path,
                    boot_policy: BootPolicy::ExactMatch,
                };
                match boot::load_image(boot::image_handle(), source) {
                    Ok(handle) => handle,
                    Err(err) => {
                        warn!("LoadImage failed: {:?}", err.status());
                        return err.status();
                    }
                }
            }
            None => {
                warn!("LoadImage failed: {:?}", err.status());
                return err.status();
            }
        },
    };

    info!("starting image");
    match boot::start_image(handle) {
        Ok(()) => Status::SUCCESS,
        Err(err) => {
            warn!("StartImage returned: {:?}", err.status());
            err.status()
        }
    }
}

/// Device path for a file on a partition: the partition's own path with
/// a file node appended. Also used by the deployer for its Boot####
/// variable.
pub(crate) fn build_file_device_path<'a>(
    device: Handle,
    path: &str,
    storage: &'a mut Vec<u8>,
) -> Option<&'a DevicePath> {
    let base = open_protocol::<DevicePath>(device).ok()?;

    let mut path_buf = [0u16; MAX_PATH + 1];
    let file_path = CStr16::from_str_with_buf(path, &mut path_buf).ok()?;

    let mut builder = DevicePathBuilder::with_vec(storage);
    for node in base.node_iter() {
        builder = builder.push(&node).ok()?;
    }
    builder = builder
        .push(&build::media::FilePath {
            path_name: file_path,
        })
        .ok()?;
    builder.finalize().ok()
}
