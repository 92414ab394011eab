//! Limine configuration parser.
//!
//! Sections start with `/Title` at column zero; indented `key: value`
//! lines fill the section. `boot():` / `guid(...):` device specifiers are
//! stripped — the scanned partition is authoritative. Sections commit on
//! the next header or end-of-file; sections naming neither a kernel nor
//! an EFI payload are dropped.

use alloc::string::String;
use alloc::vec::Vec;

use crate::path::{strip_device_spec, to_uefi_path};
use crate::target::{BootTarget, ConfigType, MAX_TARGETS};

/// Parse result: extracted targets plus an optional menu timeout hint.
#[derive(Debug, Default)]
pub struct LimineConfig {
    pub targets: Vec<BootTarget<()>>,
    pub timeout: Option<u32>,
}

pub fn parse(text: &str) -> LimineConfig {
    let mut out = LimineConfig::default();
    let mut current: Option<BootTarget<()>> = None;

    for line in text.lines() {
        // Section header: '/' at column zero.
        if line.starts_with('/') {
            commit(&mut out.targets, current.take());
            let mut target = BootTarget::new(ConfigType::Limine);
            target.set_title(line.trim_start_matches('/').trim());
            current = Some(target);
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        let Some(target) = current.as_mut() else {
            // Top-level key before the first section.
            if key == "timeout" {
                out.timeout = value.parse().ok();
            }
            continue;
        };

        match key {
            "kernel_path" => target.kernel_path = limine_path(value),
            "kernel_cmdline" | "cmdline" => target.set_cmdline(value),
            "module_path" => {
                let path = limine_path(value);
                target.push_initrd(path);
            }
            "protocol" => {
                if value == "chainload" {
                    target.is_chainload = true;
                }
            }
            "path" | "image_path" => {
                target.efi_path = limine_path(value);
                target.is_chainload = true;
            }
            _ => {}
        }
    }

    commit(&mut out.targets, current);
    out
}

fn commit(targets: &mut Vec<BootTarget<()>>, target: Option<BootTarget<()>>) {
    if let Some(mut target) = target {
        if target.is_bootable() && targets.len() < MAX_TARGETS {
            target.index = targets.len() as u32;
            targets.push(target);
        }
    }
}

fn limine_path(value: &str) -> String {
    to_uefi_path(strip_device_spec(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chainload_section() {
        let cfg = parse(concat!(
            "/Windows\n",
            "    protocol: chainload\n",
            "    image_path: boot():/EFI/Microsoft/Boot/bootmgfw.efi\n",
        ));

        assert_eq!(cfg.targets.len(), 1);
        let t = &cfg.targets[0];
        assert_eq!(t.title, "Windows");
        assert!(t.is_chainload);
        assert_eq!(t.efi_path, "\\EFI\\Microsoft\\Boot\\bootmgfw.efi");
    }

    #[test]
    fn linux_section_with_modules() {
        let cfg = parse(concat!(
            "timeout: 5\n",
            "\n",
            "/Arch Linux\n",
            "    protocol: linux\n",
            "    kernel_path: boot():/boot/vmlinuz-linux\n",
            "    kernel_cmdline: root=UUID=x rw\n",
            "    module_path: boot():/boot/amd-ucode.img\n",
            "    module_path: boot():/boot/initramfs-linux.img\n",
        ));

        assert_eq!(cfg.timeout, Some(5));
        let t = &cfg.targets[0];
        assert_eq!(t.kernel_path, "\\boot\\vmlinuz-linux");
        assert_eq!(t.cmdline, "root=UUID=x rw");
        assert_eq!(
            t.initrd_paths,
            ["\\boot\\amd-ucode.img", "\\boot\\initramfs-linux.img"]
        );
    }

    #[test]
    fn guid_specifier_is_stripped() {
        let cfg = parse("/K\n    kernel_path: guid(deadbeef-1):/vmlinuz\n");
        assert_eq!(cfg.targets[0].kernel_path, "\\vmlinuz");
    }

    #[test]
    fn empty_sections_are_dropped() {
        let cfg = parse("/Empty\n    comment: nothing here\n/Real\n    kernel_path: /k\n");
        assert_eq!(cfg.targets.len(), 1);
        assert_eq!(cfg.targets[0].title, "Real");
        assert_eq!(cfg.targets[0].index, 0);
    }

    #[test]
    fn chainload_protocol_without_path_is_dropped() {
        let cfg = parse("/Broken\n    protocol: chainload\n");
        assert!(cfg.targets.is_empty());
    }

    #[test]
    fn nested_header_slashes_are_tolerated() {
        let cfg = parse("//Sub entry\n    kernel_path: /k\n");
        assert_eq!(cfg.targets[0].title, "Sub entry");
    }
}
