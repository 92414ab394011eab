//! Linux kernel boot engine (x86_64 EFI boot protocol).
//!
//! Two paths:
//!
//!   1. EFI handover (preferred, protocol 2.11+ with a handover entry):
//!      boot_params is filled in, boot services stay alive, and the
//!      kernel's own EFI stub calls ExitBootServices later.
//!
//!   2. Legacy bzImage: the protected-mode image is copied to its
//!      preferred address, the firmware memory map is converted to E820,
//!      ExitBootServices is called here, and control jumps to the 64-bit
//!      entry.
//!
//! Both paths concatenate multiple initrds into one physical region.

use core::ffi::c_void;

use alloc::vec::Vec;
use log::{info, warn};
use superboot_linux::e820::E820Map;
use superboot_linux::params::BootParams;
use superboot_linux::setup::{ENTRY_BIAS_64, SetupError, SetupHeader};
use uefi::Status;
use uefi::boot::{self, AllocateType, MemoryType};
use uefi::mem::memory_map::MemoryMap;

use crate::scan::Target;
use crate::vfs::Vfs;

const PAGE_SIZE: usize = 0x1000;

/// Everything the initrd fields can address is 32-bit.
const BELOW_4G: u64 = 0xFFFF_FFFF;

type HandoverEntry =
    unsafe extern "efiapi" fn(*mut c_void, *mut c_void, *mut BootParams) -> Status;

/// Boot the target's kernel. Returns only on failure.
pub fn boot(target: &Target, vfs: &mut Vfs) -> Status {
    info!("loading kernel: {}", target.kernel_path);
    let kernel = match vfs.read_file(target.device, &target.kernel_path) {
        Ok(kernel) => kernel,
        Err(err) => {
            warn!("failed to load kernel: {:?}", err.status());
            return err.status();
        }
    };

    let mut header = match SetupHeader::parse(&kernel) {
        Ok(header) => header,
        Err(SetupError::ImageTooSmall) => {
            warn!("kernel image too small ({} bytes)", kernel.len());
            return Status::INVALID_PARAMETER;
        }
        Err(SetupError::BadMagic) => {
            warn!("invalid kernel magic (expected HdrS)");
            return Status::INVALID_PARAMETER;
        }
    };
    info!(
        "kernel boot protocol version: {}.{:02}",
        header.version() >> 8,
        header.version() & 0xFF
    );

    let (initrd_addr, initrd_size) = load_initrds(target, vfs);
    if initrd_size > 0 {
        info!("initrd: {} bytes at {:#x}", initrd_size, initrd_addr);
    }
    info!("cmdline: {}", target.cmdline);

    header.set_loader_identity();
    header.set_ramdisk(initrd_addr as u32, initrd_size as u32);

    let cmdline_ptr = match copy_cmdline(&target.cmdline) {
        Ok(ptr) => ptr,
        Err(err) => return err.status(),
    };
    header.set_cmd_line_ptr(cmdline_ptr as u32);

    // Prefer the handover entry: boot services stay alive for the
    // kernel's EFI stub. An unsupported handover falls through to the
    // legacy path; any other failure is reported.
    if header.has_efi_handover() {
        info!("using EFI handover protocol");
        let status = handover_boot(&kernel, &header);
        if status != Status::UNSUPPORTED {
            return status;
        }
        warn!("EFI handover unsupported, falling back");
    }

    info!("using legacy bzImage protocol");
    legacy_boot(&kernel, header)
}

/// Read every initrd and consolidate them into one physical region,
/// preferably below 4 GiB. A failed file is skipped with a warning; the
/// kernel may still boot with a partial initrd.
fn load_initrds(target: &Target, vfs: &mut Vfs) -> (u64, usize) {
    if target.initrd_paths.is_empty() {
        return (0, 0);
    }

    let mut buffers: Vec<Vec<u8>> = Vec::new();
    for path in &target.initrd_paths {
        match vfs.read_file(target.device, path) {
            Ok(data) => buffers.push(data),
            Err(err) => warn!("failed to load initrd {}: {:?}", path, err.status()),
        }
    }

    let total: usize = buffers.iter().map(|b| b.len()).sum();
    if total == 0 {
        return (0, 0);
    }

    let pages = total.div_ceil(PAGE_SIZE);
    let region = boot::allocate_pages(
        AllocateType::MaxAddress(BELOW_4G),
        MemoryType::LOADER_DATA,
        pages,
    )
    .or_else(|_| boot::allocate_pages(AllocateType::AnyPages, MemoryType::LOADER_DATA, pages));
    let region = match region {
        Ok(region) => region,
        Err(err) => {
            warn!("initrd region allocation failed: {:?}", err.status());
            return (0, 0);
        }
    };

    let mut dst = region.as_ptr();
    for buffer in &buffers {
        unsafe {
            core::ptr::copy_nonoverlapping(buffer.as_ptr(), dst, buffer.len());
            dst = dst.add(buffer.len());
        }
    }

    (region.as_ptr() as u64, total)
}

/// Duplicate the command line into a fresh region below 4 GiB (the
/// header field is 32-bit). A zero-length cmdline still gets its
/// terminating NUL.
fn copy_cmdline(cmdline: &str) -> uefi::Result<u64> {
    let region = boot::allocate_pages(
        AllocateType::MaxAddress(BELOW_4G),
        MemoryType::LOADER_DATA,
        1,
    )?;
    unsafe {
        let dst = region.as_ptr();
        core::ptr::copy_nonoverlapping(cmdline.as_ptr(), dst, cmdline.len());
        *dst.add(cmdline.len()) = 0;
    }
    Ok(region.as_ptr() as u64)
}

/// Allocate the zero page below 4 GiB and zero-fill it.
fn alloc_boot_params() -> uefi::Result<&'static mut BootParams> {
    let page = boot::allocate_pages(
        AllocateType::MaxAddress(BELOW_4G),
        MemoryType::LOADER_DATA,
        1,
    )?;
    unsafe {
        core::ptr::write_bytes(page.as_ptr(), 0, PAGE_SIZE);
        Ok(&mut *page.as_ptr().cast::<BootParams>())
    }
}

/// Enter the kernel through the EFI handover entry at
/// `image_base + setup_size + handover_offset + 512`. Does not return on
/// success; the kernel's EFI stub exits boot services itself. A returned
/// status is handed back to the caller, `UNSUPPORTED` meaning the kernel
/// declined the handover.
fn handover_boot(kernel: &[u8], header: &SetupHeader) -> Status {
    // The handover ABI requires the raw system table; without it there
    // is nothing valid to pass.
    let Some(system_table) = uefi::table::system_table_raw() else {
        warn!("raw system table unavailable");
        return Status::DEVICE_ERROR;
    };

    let params = match alloc_boot_params() {
        Ok(params) => params,
        Err(err) => return err.status(),
    };
    params.install_header(header);

    let entry = kernel.as_ptr() as u64
        + header.setup_size() as u64
        + header.handover_offset() as u64
        + ENTRY_BIAS_64;

    let image_handle = boot::image_handle().as_ptr();

    info!("entering kernel via EFI handover at {:#x}", entry);
    let status = unsafe {
        let handover: HandoverEntry = core::mem::transmute(entry as usize);
        handover(image_handle, system_table.as_ptr().cast::<c_void>(), params)
    };

    // The handover entry must not return; a status tells us why it did.
    warn!("handover entry returned: {:?}", status);
    if status == Status::SUCCESS {
        Status::LOAD_ERROR
    } else {
        status
    }
}

/// Legacy path: copy the protected-mode image, exit boot services, jump.
fn legacy_boot(kernel: &[u8], mut header: SetupHeader) -> Status {
    let setup_size = header.setup_size();
    if kernel.len() <= setup_size {
        warn!("kernel image ends inside the setup area");
        return Status::INVALID_PARAMETER;
    }
    let payload = &kernel[setup_size..];
    let pages = payload.len().div_ceil(PAGE_SIZE);

    // Preferred address first; a relocatable kernel may go anywhere.
    let preferred = header.pref_address();
    let region = match boot::allocate_pages(
        AllocateType::Address(preferred),
        MemoryType::LOADER_DATA,
        pages,
    ) {
        Ok(region) => region,
        Err(_) if header.relocatable() => {
            match boot::allocate_pages(AllocateType::AnyPages, MemoryType::LOADER_DATA, pages) {
                Ok(region) => region,
                Err(err) => {
                    warn!("kernel region allocation failed: {:?}", err.status());
                    return err.status();
                }
            }
        }
        Err(err) => {
            warn!(
                "preferred load address {:#x} unavailable: {:?}",
                preferred,
                err.status()
            );
            return err.status();
        }
    };

    let destination = region.as_ptr() as u64;
    unsafe {
        core::ptr::copy_nonoverlapping(payload.as_ptr(), region.as_ptr(), payload.len());
    }
    header.set_code32_start(destination as u32);

    let params = match alloc_boot_params() {
        Ok(params) => params,
        Err(err) => return err.status(),
    };
    params.install_header(&header);

    info!(
        "exiting boot services, kernel entry at {:#x}",
        destination + ENTRY_BIAS_64
    );

    // The exit primitive fetches the map into a preallocated buffer with
    // slack and retries once on a stale map key; no allocations happen
    // between the final fetch and the exit.
    let memory_map = unsafe { boot::exit_boot_services(Some(MemoryType::LOADER_DATA)) };

    // Point of no return: no allocation, no firmware calls, no logging.
    let mut e820 = E820Map::new();
    for descriptor in memory_map.entries() {
        e820.push_descriptor(descriptor.phys_start, descriptor.page_count, descriptor.ty.0);
    }
    params.set_e820(&e820);

    // The map buffer lives in memory the kernel now owns.
    core::mem::forget(memory_map);

    unsafe { jump_to_kernel(destination + ENTRY_BIAS_64, params as *mut BootParams as u64) }
}

/// The 64-bit entry contract: boot_params in `rsi`, interrupts off,
/// every other general-purpose register zeroed.
unsafe fn jump_to_kernel(entry: u64, boot_params: u64) -> ! {
    unsafe {
        core::arch::asm!(
            "cli",
            "cld",
            "xor rbx, rbx",
            "xor rcx, rcx",
            "xor rdx, rdx",
            "xor rdi, rdi",
            "xor rbp, rbp",
            "xor r8, r8",
            "xor r9, r9",
            "xor r10, r10",
            "xor r11, r11",
            "xor r12, r12",
            "xor r13, r13",
            "xor r14, r14",
            "xor r15, r15",
            "jmp rax",
            in("rax") entry,
            in("rsi") boot_params,
            options(noreturn),
        )
    }
}
