//! Block device scanner.
//!
//! Enumerates all block I/O handles, opens each logical partition via the
//! VFS, probes for known config files, and feeds them to the registered
//! parsers. Partition- and parser-level failures are local; the scan only
//! fails if zero targets were produced.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::{debug, info};
use superboot_config::target::MAX_TARGETS;
use superboot_config::{BootTarget, ParserKind, grub, limine, systemd_boot};
use uefi::boot::{self, SearchType};
use uefi::proto::media::block::BlockIO;
use uefi::{Handle, Status};

use crate::vfs::{Vfs, open_protocol};

/// A boot target bound to the partition it was found on.
pub type Target = BootTarget<Handle>;

/// The scan result: insertion-ordered by (device discovery order, parser
/// order, in-config order).
pub struct TargetList {
    pub entries: Vec<Target>,
    /// Smallest timeout any config suggested.
    pub timeout_hint: Option<u32>,
}

impl TargetList {
    fn new() -> Self {
        TargetList {
            entries: Vec::new(),
            timeout_hint: None,
        }
    }

    /// Append with a global index; keeps at most one default entry.
    fn push(&mut self, mut target: Target) -> bool {
        if self.entries.len() >= MAX_TARGETS {
            return false;
        }
        target.index = self.entries.len() as u32;
        if target.is_default && self.entries.iter().any(|t| t.is_default) {
            target.is_default = false;
        }
        self.entries.push(target);
        true
    }

    fn merge_timeout(&mut self, hint: Option<u32>) {
        if let Some(hint) = hint {
            self.timeout_hint = Some(match self.timeout_hint {
                Some(current) => current.min(hint),
                None => hint,
            });
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= MAX_TARGETS
    }
}

/// Scan every present logical partition for boot configs.
pub fn scan_all(vfs: &mut Vfs) -> uefi::Result<TargetList> {
    info!("scanning for bootable configurations...");

    let handles = boot::locate_handle_buffer(SearchType::from_proto::<BlockIO>())?;
    debug!("{} block I/O handles", handles.len());

    let mut list = TargetList::new();

    for &handle in handles.iter() {
        // Only partitions with media: the whole-disk handle carries the
        // same protocol but no filesystem.
        let Ok(block_io) = open_protocol::<BlockIO>(handle) else {
            continue;
        };
        let media = block_io.media();
        if !media.is_logical_partition() || !media.is_media_present() {
            continue;
        }
        drop(block_io);

        if let Err(err) = vfs.open_device(handle) {
            debug!("partition skipped: {:?}", err.status());
            continue;
        }

        scan_partition(vfs, handle, &mut list);
        if list.is_full() {
            break;
        }
    }

    if list.entries.is_empty() {
        Err(Status::NOT_FOUND.into())
    } else {
        Ok(list)
    }
}

/// Probe one partition with every parser; the first existing config path
/// wins per parser (a partition contributes at most one config per
/// format).
fn scan_partition(vfs: &mut Vfs, handle: Handle, list: &mut TargetList) {
    for parser in ParserKind::ALL {
        for path in parser.probe_paths() {
            if !vfs.file_exists(handle, path) {
                continue;
            }
            debug!("found {} config: {}", parser.name(), path);

            let data = match vfs.read_file(handle, path) {
                Ok(data) => data,
                Err(err) => {
                    debug!("config read failed: {:?}", err.status());
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&data);

            let produced = match parser {
                ParserKind::Grub => {
                    let config = grub::parse(&text);
                    list.merge_timeout(config.timeout);
                    commit(config.targets, handle, path, list)
                }
                ParserKind::Limine => {
                    let config = limine::parse(&text);
                    list.merge_timeout(config.timeout);
                    commit(config.targets, handle, path, list)
                }
                ParserKind::SystemdBoot => scan_systemd_boot(vfs, handle, &text, list),
            };

            if produced > 0 {
                info!("  {}: {} entries from {}", parser.name(), produced, path);
            }
            break;
        }
    }
}

/// Stamp parsed targets with their provenance and append them.
fn commit(
    targets: Vec<BootTarget<()>>,
    handle: Handle,
    config_path: &str,
    list: &mut TargetList,
) -> usize {
    let mut produced = 0;
    for mut target in targets {
        target.config_path = config_path.to_string();
        if !list.push(target.with_device(handle)) {
            break;
        }
        produced += 1;
    }
    produced
}

/// systemd-boot needs a second step: `loader.conf` only carries global
/// settings, the entries are one file each under `\loader\entries`.
fn scan_systemd_boot(vfs: &mut Vfs, handle: Handle, loader_conf: &str, list: &mut TargetList) -> usize {
    let conf = systemd_boot::parse_loader_conf(loader_conf);
    list.merge_timeout(conf.timeout);

    // Entry enumeration requires directory listing, which only exists on
    // firmware-backed mounts; `loader/entries` lives on the ESP anyway.
    let entries = match vfs.list_directory(handle, "\\loader\\entries") {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot enumerate loader entries: {:?}", err.status());
            return 0;
        }
    };

    let mut produced = 0;
    for entry in entries {
        if entry.is_dir || !entry.name.to_ascii_lowercase().ends_with(".conf") {
            continue;
        }

        let path = format!("\\loader\\entries\\{}", entry.name);
        let Ok(data) = vfs.read_file(handle, &path) else {
            continue;
        };

        let mut target = systemd_boot::parse_entry(&String::from_utf8_lossy(&data));
        if !target.is_bootable() {
            continue;
        }

        let stem = &entry.name[..entry.name.len() - ".conf".len()];
        if let Some(pattern) = &conf.default_pattern {
            target.is_default = systemd_boot::matches_default(pattern, stem);
        }
        target.config_path = path;

        if !list.push(target.with_device(handle)) {
            break;
        }
        produced += 1;
    }
    produced
}
