/// Unified error type for superboot-ext4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ext4Error {
    /// I/O error from the block device
    IoError,
    /// Corrupted filesystem metadata
    CorruptedFs(&'static str),
    /// Invalid superblock magic number
    InvalidMagic,
    /// Valid filesystem using a feature this reader does not implement
    Unsupported(&'static str),
    /// File or directory not found
    NotFound,
    /// Expected directory inode but got other type
    NotDirectory,
}

/// Convenience Result type alias.
pub type Result<T> = ::core::result::Result<T, Ext4Error>;
