//! Boot intent extraction from foreign bootloader configuration.
//!
//! Each supported format (GRUB, systemd-boot, Limine) lowers to the same
//! [`BootTarget`] shape. Parsers are pure text transformers: they never
//! touch a device, and the scanner stamps the source partition handle onto
//! the produced targets afterwards.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod grub;
pub mod limine;
pub mod path;
pub mod systemd_boot;
pub mod target;
pub mod vars;

pub use target::{BootTarget, ConfigType, ParserKind};
