//! Non-destructive deployment to the internal EFI System Partition.
//!
//! Copies the running SuperBoot binary from its boot medium (typically a
//! USB stick) to the machine's internal ESP, registers a Boot####
//! load-option variable, and prepends it to BootOrder. Existing boot
//! entries and files are never modified.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, info};
use uefi::boot::{self, SearchType};
use uefi::proto::device_path::DevicePathNodeEnum;
use uefi::proto::loaded_image::LoadedImage;
use uefi::proto::media::block::BlockIO;
use uefi::proto::media::file::{File, FileAttribute, FileMode, FileType};
use uefi::proto::media::fs::SimpleFileSystem;
use uefi::proto::media::partition::{GptPartitionType, PartitionInfo};
use uefi::runtime::{self, VariableAttributes, VariableVendor};
use uefi::{CStr16, Handle, Status, cstr16};

use crate::boot::chain::build_file_device_path;
use crate::vfs::{Vfs, open_protocol};

const DEPLOY_DIR: &CStr16 = cstr16!("\\EFI\\superboot");
const DEPLOY_PATH: &CStr16 = cstr16!("\\EFI\\superboot\\superbootx64.efi");
const DEPLOY_PATH_STR: &str = "\\EFI\\superboot\\superbootx64.efi";

const LOAD_OPTION_ACTIVE: u32 = 0x0000_0001;

pub fn deploy_to_esp(vfs: &mut Vfs) -> uefi::Result<()> {
    // Our own binary, read back from the medium we booted from.
    let loaded = boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle())?;
    let source_device = loaded
        .device()
        .ok_or(uefi::Error::from(Status::NOT_FOUND))?;
    let self_path = image_file_path(&loaded).ok_or(uefi::Error::from(Status::NOT_FOUND))?;
    drop(loaded);

    info!("deploying {}", self_path);
    let image = vfs.read_file(source_device, &self_path)?;

    let esp = find_internal_esp(source_device).ok_or(uefi::Error::from(Status::NOT_FOUND))?;
    write_image(esp, &image)?;

    let slot = register_boot_option(esp)?;
    info!("registered Boot{slot:04X} and prepended it to BootOrder");
    Ok(())
}

/// Extract the textual file path of the running image from its loaded
/// image device path.
fn image_file_path(loaded: &LoadedImage) -> Option<String> {
    let device_path = loaded.file_path()?;

    let mut path = String::new();
    for node in device_path.node_iter() {
        if let Ok(DevicePathNodeEnum::MediaFilePath(file)) = node.as_enum() {
            let mut segment = String::new();
            for unit in file.path_name().iter() {
                if unit == 0 {
                    break;
                }
                segment.push(char::from_u32(u32::from(unit)).unwrap_or('?'));
            }
            if !segment.starts_with('\\') {
                path.push('\\');
            }
            path.push_str(&segment);
        }
    }

    if path.is_empty() { None } else { Some(path) }
}

/// First non-removable partition carrying the ESP GPT type GUID, other
/// than the one we booted from.
fn find_internal_esp(exclude: Handle) -> Option<Handle> {
    let handles =
        boot::locate_handle_buffer(SearchType::from_proto::<SimpleFileSystem>()).ok()?;

    for &handle in handles.iter() {
        if handle == exclude {
            continue;
        }

        let Ok(info) = open_protocol::<PartitionInfo>(handle) else {
            continue;
        };
        let Some(entry) = info.gpt_partition_entry() else {
            continue;
        };
        if { entry.partition_type_guid } != GptPartitionType::EFI_SYSTEM_PARTITION {
            continue;
        }

        // A removable ESP is most likely our own boot stick.
        if let Ok(block_io) = open_protocol::<BlockIO>(handle) {
            if block_io.media().is_removable_media() {
                debug!("skipping removable ESP");
                continue;
            }
        }

        return Some(handle);
    }
    None
}

fn write_image(esp: Handle, image: &[u8]) -> uefi::Result<()> {
    let mut fs = boot::open_protocol_exclusive::<SimpleFileSystem>(esp)?;
    let mut root = fs.open_volume()?;

    // Create the directory chain; already-existing components are fine.
    for dir in [cstr16!("\\EFI"), DEPLOY_DIR] {
        let _ = root.open(dir, FileMode::CreateReadWrite, FileAttribute::DIRECTORY);
    }

    let file = root.open(DEPLOY_PATH, FileMode::CreateReadWrite, FileAttribute::empty())?;
    let mut file = match file.into_type()? {
        FileType::Regular(file) => file,
        FileType::Dir(_) => return Err(Status::INVALID_PARAMETER.into()),
    };

    file.write(image)
        .map_err(|err| uefi::Error::from(err.status()))?;
    file.flush()?;
    Ok(())
}

/// Write a Boot#### load option for the deployed binary into the first
/// free slot and put it at the front of BootOrder.
fn register_boot_option(esp: Handle) -> uefi::Result<u16> {
    let mut name_buf = [0u16; 16];
    let mut probe_buf = [0u8; 8];

    let mut slot = None;
    for candidate in 0u16..=0x00FF {
        let name_str = format!("Boot{candidate:04X}");
        let name = CStr16::from_str_with_buf(&name_str, &mut name_buf)
            .map_err(|_| uefi::Error::from(Status::INVALID_PARAMETER))?;
        if let Err(err) =
            runtime::get_variable(name, &VariableVendor::GLOBAL_VARIABLE, &mut probe_buf)
        {
            if err.status() == Status::NOT_FOUND {
                slot = Some(candidate);
                break;
            }
        }
    }
    let slot = slot.ok_or(uefi::Error::from(Status::OUT_OF_RESOURCES))?;

    // EFI_LOAD_OPTION: attributes, path-list length, description,
    // then the device path of the deployed binary.
    let mut storage = Vec::new();
    let device_path = build_file_device_path(esp, DEPLOY_PATH_STR, &mut storage)
        .ok_or(uefi::Error::from(Status::NOT_FOUND))?;
    let path_bytes = device_path.as_bytes();

    let description = cstr16!("SuperBoot");
    let mut data = Vec::new();
    data.extend_from_slice(&LOAD_OPTION_ACTIVE.to_le_bytes());
    data.extend_from_slice(&(path_bytes.len() as u16).to_le_bytes());
    for unit in description.to_u16_slice_with_nul() {
        data.extend_from_slice(&unit.to_le_bytes());
    }
    data.extend_from_slice(path_bytes);

    let name_str = format!("Boot{slot:04X}");
    let name = CStr16::from_str_with_buf(&name_str, &mut name_buf)
        .map_err(|_| uefi::Error::from(Status::INVALID_PARAMETER))?;
    runtime::set_variable(
        name,
        &VariableVendor::GLOBAL_VARIABLE,
        VariableAttributes::NON_VOLATILE
            | VariableAttributes::BOOTSERVICE_ACCESS
            | VariableAttributes::RUNTIME_ACCESS,
        &data,
    )?;

    prepend_boot_order(slot)?;
    Ok(slot)
}

fn prepend_boot_order(slot: u16) -> uefi::Result<()> {
    let name = cstr16!("BootOrder");
    let mut buf = [0u8; 512];

    let order: Vec<u8> = match runtime::get_variable(name, &VariableVendor::GLOBAL_VARIABLE, &mut buf)
    {
        Ok((data, _)) => data.to_vec(),
        Err(err) if err.status() == Status::NOT_FOUND => Vec::new(),
        Err(err) => return Err(uefi::Error::from(err.status())),
    };

    let mut new_order = Vec::with_capacity(order.len() + 2);
    new_order.extend_from_slice(&slot.to_le_bytes());
    for pair in order.chunks_exact(2) {
        let id = u16::from_le_bytes([pair[0], pair[1]]);
        if id != slot {
            new_order.extend_from_slice(pair);
        }
    }

    runtime::set_variable(
        name,
        &VariableVendor::GLOBAL_VARIABLE,
        VariableAttributes::NON_VOLATILE
            | VariableAttributes::BOOTSERVICE_ACCESS
            | VariableAttributes::RUNTIME_ACCESS,
        &new_order,
    )
}
