//! SuperBoot — universal meta-bootloader.
//!
//! Orchestrates the full boot flow:
//!   1. Initialise the UEFI helpers (allocator, logger, panic handler)
//!   2. Scan every block device for known bootloader configs
//!   3. Present the menu (or auto-boot on timeout)
//!   4. Boot the selected kernel / chain-load the selected .efi
//!
//! On a failed boot the file browser opens so another entry or payload
//! can be tried by hand.

#![no_main]
#![no_std]

extern crate alloc;

mod boot;
mod deploy;
mod scan;
mod tui;
mod vfs;

use alloc::string::ToString;

use log::{error, info, warn};
use uefi::prelude::*;
use uefi::proto::loaded_image::LoadedImage;

use crate::vfs::Vfs;

/// Fixed buffer size for CStr16 path conversions and FileInfo reads.
pub(crate) const FILE_BUFFER_SIZE: usize = 0x400;

/// Menu countdown when no config supplies a timeout hint.
pub(crate) const DEFAULT_TIMEOUT_SECS: u32 = 5;

#[entry]
fn main() -> Status {
    uefi::helpers::init().unwrap();
    log::set_max_level(if load_options_verbose() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    info!(
        "SuperBoot v{} — universal meta-bootloader",
        env!("CARGO_PKG_VERSION")
    );

    let mut vfs = Vfs::new();
    let mut targets = match scan::scan_all(&mut vfs) {
        Ok(targets) => targets,
        Err(err) => {
            warn!("no bootable entries found ({:?})", err.status());
            tui::explorer::run(&mut vfs);
            return Status::NOT_FOUND;
        }
    };
    info!("found {} bootable entries", targets.entries.len());

    let mut auto_boot = true;
    loop {
        let selected = tui::menu::run(&mut targets, &mut vfs, auto_boot);
        let target = targets.entries[selected].clone();

        let status = if target.is_chainload {
            boot::chain::chainload(&target, &mut vfs)
        } else {
            boot::linux::boot(&target, &mut vfs)
        };

        if target.is_chainload && status == Status::SUCCESS {
            // The payload voluntarily exited back to us.
            info!("chain-loaded image returned");
        } else {
            error!("boot failed: {:?}", status);
            tui::explorer::run(&mut vfs);
        }

        // No auto-boot once a boot has already failed.
        auto_boot = false;
    }
}

/// The image load options enable debug logging when they contain the
/// word `verbose`.
fn load_options_verbose() -> bool {
    let Ok(loaded) = uefi::boot::open_protocol_exclusive::<LoadedImage>(uefi::boot::image_handle())
    else {
        return false;
    };
    match loaded.load_options_as_cstr16() {
        Ok(options) => options.to_string().to_lowercase().contains("verbose"),
        Err(_) => false,
    }
}
