//! systemd-boot configuration parser.
//!
//! `loader/loader.conf` is only inspected for `default` and `timeout`;
//! the boot entries live in one key/value file each under
//! `loader/entries/*.conf`, which the scanner enumerates and feeds to
//! [`parse_entry`].

use alloc::string::String;

use crate::path::to_uefi_path;
use crate::target::{BootTarget, ConfigType};

/// Global settings extracted from `loader.conf`.
#[derive(Debug, Default)]
pub struct LoaderConf {
    pub default_pattern: Option<String>,
    pub timeout: Option<u32>,
}

pub fn parse_loader_conf(text: &str) -> LoaderConf {
    let mut conf = LoaderConf::default();

    for line in text.lines() {
        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        match key {
            "default" => conf.default_pattern = Some(String::from(value)),
            "timeout" => conf.timeout = value.parse().ok(),
            _ => {}
        }
    }

    conf
}

/// Parse a single `loader/entries/*.conf` file.
///
/// The caller decides whether the result is committable
/// ([`BootTarget::is_bootable`]) and whether it is the default entry.
pub fn parse_entry(text: &str) -> BootTarget<()> {
    let mut target = BootTarget::new(ConfigType::SystemdBoot);

    for line in text.lines() {
        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        match key {
            "title" => target.set_title(value),
            "linux" => target.kernel_path = to_uefi_path(value),
            "initrd" => {
                let path = to_uefi_path(value);
                target.push_initrd(path);
            }
            "options" => target.set_cmdline(value),
            "efi" => {
                target.efi_path = to_uefi_path(value);
                target.is_chainload = true;
            }
            _ => {}
        }
    }

    target
}

/// Whether an entry file stem matches the `default` pattern.
///
/// Glob metacharacters are stripped and the remainder is matched as a
/// substring of the stem, so `arch`, `arch.conf`, and `arch-*` all select
/// `arch.conf`.
pub fn matches_default(pattern: &str, stem: &str) -> bool {
    let needle: String = pattern
        .trim()
        .trim_end_matches(".conf")
        .chars()
        .filter(|c| *c != '*' && *c != '?')
        .collect();
    !needle.is_empty() && stem.contains(needle.as_str())
}

/// First whitespace-delimited token is the key; the trimmed remainder is
/// the value. Comments and blank lines yield `None`.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, rest) = line.split_once(char::is_whitespace)?;
    let value = rest.trim();
    if value.is_empty() {
        return None;
    }
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_entry_parses() {
        let target = parse_entry(concat!(
            "title Arch\n",
            "linux /vmlinuz-linux\n",
            "initrd /initramfs.img\n",
            "options root=UUID=X rw\n",
        ));

        assert_eq!(target.title, "Arch");
        assert_eq!(target.kernel_path, "\\vmlinuz-linux");
        assert_eq!(target.initrd_paths, ["\\initramfs.img"]);
        assert_eq!(target.cmdline, "root=UUID=X rw");
        assert!(target.is_bootable());
        assert!(!target.is_chainload);
    }

    #[test]
    fn repeated_initrd_lines_accumulate() {
        let target = parse_entry("linux /k\ninitrd /amd-ucode.img\ninitrd /initramfs.img\n");
        assert_eq!(target.initrd_paths, ["\\amd-ucode.img", "\\initramfs.img"]);
    }

    #[test]
    fn efi_key_sets_chainload() {
        let target = parse_entry("title Shell\nefi /shellx64.efi\n");
        assert!(target.is_chainload);
        assert_eq!(target.efi_path, "\\shellx64.efi");
        assert!(target.is_bootable());
    }

    #[test]
    fn entry_without_kernel_or_efi_is_not_bootable() {
        let target = parse_entry("title Just a label\n");
        assert!(!target.is_bootable());
    }

    #[test]
    fn loader_conf_default_and_timeout() {
        let conf = parse_loader_conf("default arch\ntimeout 3\n");
        assert_eq!(conf.default_pattern.as_deref(), Some("arch"));
        assert_eq!(conf.timeout, Some(3));
    }

    #[test]
    fn default_pattern_matching() {
        assert!(matches_default("arch", "arch"));
        assert!(matches_default("arch.conf", "arch"));
        assert!(matches_default("arch-*", "arch-lts"));
        assert!(matches_default("arch", "arch-fallback"));
        assert!(!matches_default("debian", "arch"));
        assert!(!matches_default("*", "arch"));
    }

    #[test]
    fn comments_and_unknown_keys_are_ignored() {
        let target = parse_entry("# comment\nlinux /k\nsort-key zzz\narchitecture x64\n");
        assert_eq!(target.kernel_path, "\\k");
    }
}
