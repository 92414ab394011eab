//! Read-only ext2/3/4 reader.
//!
//! Supports rev0/1 volumes with extent-based files (the ext4 default since
//! Linux 2.6.23). Writes, journal replay, encryption, inline data, and
//! extent index nodes (depth > 0) are out of scope and surface
//! [`Ext4Error::Unsupported`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
pub mod io;
pub mod layout;
pub mod traits;

mod volume;

#[cfg(test)]
mod tests;

pub use error::{Ext4Error, Result};
pub use volume::{Ext4Volume, ROOT_INODE};
