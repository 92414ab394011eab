use alloc::string::String;
use alloc::vec::Vec;

// Build-time limits, shared by all parsers and the scanner.

/// Max boot entries across all configs.
pub const MAX_TARGETS: usize = 64;
/// Max initrd images per entry.
pub const MAX_INITRDS: usize = 8;
/// Max path length in code units.
pub const MAX_PATH: usize = 512;
/// Max title length in code units.
pub const MAX_TITLE: usize = 256;
/// Max command line length in bytes, including the terminator the boot
/// engine appends.
pub const MAX_CMDLINE: usize = 4096;

/// Which bootloader format a target was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigType {
    Unknown,
    Grub,
    SystemdBoot,
    Limine,
}

/// The universal boot intent: one instance per menu entry.
///
/// Created by a parser, consumed by the boot engine. The device slot is
/// generic so parsers stay device-free (`BootTarget<()>`); the scanner
/// stamps the partition handle via [`with_device`](Self::with_device).
/// Paths are stored backslash-separated, UEFI style.
#[derive(Debug, Clone)]
pub struct BootTarget<D = ()> {
    pub title: String,
    pub kernel_path: String,
    pub initrd_paths: Vec<String>,
    pub cmdline: String,
    pub config_path: String,
    pub config_type: ConfigType,
    /// Partition the kernel and initrds must be read from.
    pub device: D,
    /// When set, `efi_path` replaces kernel/initrd/cmdline semantics.
    pub is_chainload: bool,
    pub efi_path: String,
    /// Menu ordering hint.
    pub index: u32,
    pub is_default: bool,
}

impl BootTarget<()> {
    pub fn new(config_type: ConfigType) -> Self {
        BootTarget {
            title: String::new(),
            kernel_path: String::new(),
            initrd_paths: Vec::new(),
            cmdline: String::new(),
            config_path: String::new(),
            config_type,
            device: (),
            is_chainload: false,
            efi_path: String::new(),
            index: 0,
            is_default: false,
        }
    }
}

impl<D> BootTarget<D> {
    /// Move the target onto a concrete device slot.
    pub fn with_device<E>(self, device: E) -> BootTarget<E> {
        BootTarget {
            title: self.title,
            kernel_path: self.kernel_path,
            initrd_paths: self.initrd_paths,
            cmdline: self.cmdline,
            config_path: self.config_path,
            config_type: self.config_type,
            device,
            is_chainload: self.is_chainload,
            efi_path: self.efi_path,
            index: self.index,
            is_default: self.is_default,
        }
    }

    /// A committable target names either a kernel or a chain-load payload.
    pub fn is_bootable(&self) -> bool {
        if self.is_chainload {
            !self.efi_path.is_empty()
        } else {
            !self.kernel_path.is_empty()
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.chars().take(MAX_TITLE).collect();
    }

    /// Store the command line, reserving one byte for the terminator.
    pub fn set_cmdline(&mut self, cmdline: &str) {
        self.cmdline = cmdline.chars().take(MAX_CMDLINE - 1).collect();
    }

    /// Append an initrd path; silently drops beyond [`MAX_INITRDS`] and
    /// empty paths.
    pub fn push_initrd(&mut self, path: String) {
        if !path.is_empty() && self.initrd_paths.len() < MAX_INITRDS {
            self.initrd_paths.push(path);
        }
    }
}

/// Capability record for a config parser: identity plus the partition
/// paths it probes. The scanner tries each path in order; the first hit
/// wins per parser per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    Grub,
    SystemdBoot,
    Limine,
}

impl ParserKind {
    /// Declaration order; also the scan order within a partition.
    pub const ALL: [ParserKind; 3] = [ParserKind::Grub, ParserKind::SystemdBoot, ParserKind::Limine];

    pub fn name(self) -> &'static str {
        match self {
            ParserKind::Grub => "GRUB",
            ParserKind::SystemdBoot => "systemd-boot",
            ParserKind::Limine => "Limine",
        }
    }

    pub fn config_type(self) -> ConfigType {
        match self {
            ParserKind::Grub => ConfigType::Grub,
            ParserKind::SystemdBoot => ConfigType::SystemdBoot,
            ParserKind::Limine => ConfigType::Limine,
        }
    }

    pub fn probe_paths(self) -> &'static [&'static str] {
        match self {
            ParserKind::Grub => &[
                "\\boot\\grub\\grub.cfg",
                "\\grub\\grub.cfg",
                "\\grub2\\grub.cfg",
                "\\boot\\grub2\\grub.cfg",
                "\\EFI\\grub\\grub.cfg",
            ],
            ParserKind::SystemdBoot => &["\\loader\\loader.conf"],
            ParserKind::Limine => &[
                "\\limine.cfg",
                "\\boot\\limine\\limine.cfg",
                "\\EFI\\BOOT\\limine.cfg",
            ],
        }
    }
}
