use alloc::vec;
use alloc::vec::Vec;

use crate::error::{Ext4Error, Result};
use crate::io::block_reader::BlockReader;
use crate::layout::dir_entry::DirEntry;
use crate::layout::extent::{Extent, ExtentHeader};
use crate::layout::group_desc::GroupDesc;
use crate::layout::inode::Inode;
use crate::layout::superblock::{
    GROUP_DESC_SIZE, MAGIC_OFFSET, EXT4_SUPER_MAGIC, SUPER_BLOCK_OFFSET, SUPER_BLOCK_SIZE,
    SuperBlock,
};
use crate::traits::block_device::BlockDevice;

/// Root directory inode number, fixed by the ext4 layout.
pub const ROOT_INODE: u32 = 2;

/// Largest inode record size the stack read buffer covers.
const MAX_INODE_SIZE: usize = 1024;

/// A mounted read-only ext4 volume.
///
/// Wraps a [`BlockDevice`] and resolves absolute paths to file contents.
/// Path separators may be `/` or `\` interchangeably; resolution always
/// starts at the root inode.
pub struct Ext4Volume<D: BlockDevice> {
    reader: BlockReader<D>,
    sb: SuperBlock,
    block_size: usize,
    inode_size: usize,
}

impl<D: BlockDevice> Ext4Volume<D> {
    /// Check whether the device carries an ext2/3/4 superblock.
    ///
    /// Reads only the two magic bytes at offset 0x438; never mutates
    /// device state.
    pub fn probe(device: &D) -> Result<()> {
        let reader = BlockReader::new(device);
        let mut magic = [0u8; 2];
        reader.read_bytes(SUPER_BLOCK_OFFSET + MAGIC_OFFSET as u64, &mut magic)?;
        if u16::from_le_bytes(magic) != EXT4_SUPER_MAGIC {
            return Err(Ext4Error::InvalidMagic);
        }
        Ok(())
    }

    /// Mount the volume: read and validate the superblock, cache derived
    /// geometry.
    pub fn mount(device: D) -> Result<Self> {
        let reader = BlockReader::new(device);

        let mut raw = [0u8; SUPER_BLOCK_SIZE];
        reader.read_bytes(SUPER_BLOCK_OFFSET, &mut raw)?;
        let sb = SuperBlock::parse(&raw)?;
        sb.validate()?;

        let block_size = sb.block_size();
        let inode_size = sb.inode_size();
        if inode_size > MAX_INODE_SIZE {
            return Err(Ext4Error::CorruptedFs("inode_size exceeds supported limit"));
        }

        Ok(Ext4Volume {
            reader,
            sb,
            block_size,
            inode_size,
        })
    }

    /// Filesystem block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Read and parse the inode with the given inode number.
    ///
    /// 1. `group = (ino - 1) / s_inodes_per_group`
    /// 2. `index = (ino - 1) % s_inodes_per_group`
    /// 3. Group descriptor at `(s_first_data_block + 1) * block_size + group * 32`
    /// 4. Inode at `bg_inode_table_lo * block_size + index * inode_size`
    pub fn read_inode(&self, ino: u32) -> Result<Inode> {
        if ino == 0 || ino > self.sb.s_inodes_count {
            return Err(Ext4Error::CorruptedFs("inode number out of range"));
        }

        let group = (ino - 1) / self.sb.s_inodes_per_group;
        let index = (ino - 1) % self.sb.s_inodes_per_group;

        let gd_offset = (self.sb.s_first_data_block as u64 + 1) * self.block_size as u64
            + group as u64 * GROUP_DESC_SIZE;
        let mut gd_raw = [0u8; GROUP_DESC_SIZE as usize];
        self.reader.read_bytes(gd_offset, &mut gd_raw)?;
        let gd = GroupDesc::parse(&gd_raw)?;

        let inode_offset = gd.bg_inode_table_lo as u64 * self.block_size as u64
            + index as u64 * self.inode_size as u64;
        let mut inode_raw = [0u8; MAX_INODE_SIZE];
        self.reader
            .read_bytes(inode_offset, &mut inode_raw[..self.inode_size])?;

        Inode::parse(&inode_raw[..self.inode_size])
    }

    /// Resolve an absolute path to an inode number.
    ///
    /// Empty components are skipped, so `resolve("/")` is the root inode
    /// and `/` / `\` may be mixed freely.
    pub fn resolve(&self, path: &str) -> Result<u32> {
        let mut ino = ROOT_INODE;

        for component in path.split(['/', '\\']).filter(|c| !c.is_empty()) {
            let dir = self.read_inode(ino)?;
            if !dir.is_dir() {
                return Err(Ext4Error::NotDirectory);
            }
            ino = self.dir_lookup(&dir, component.as_bytes())?;
        }

        Ok(ino)
    }

    /// Whether a path resolves on this volume.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Read an entire file into a fresh buffer.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let ino = self.resolve(path)?;
        let inode = self.read_inode(ino)?;
        self.read_inode_data(&inode)
    }

    /// Linearly scan a directory inode's data for `name`.
    fn dir_lookup(&self, dir: &Inode, name: &[u8]) -> Result<u32> {
        let data = self.read_inode_data(dir)?;

        let mut off = 0usize;
        while off + 8 <= data.len() {
            let entry = DirEntry::parse(&data[off..])?;
            if !entry.is_unused() && entry.name == name {
                return Ok(entry.inode);
            }
            off += entry.rec_len as usize;
        }

        Err(Ext4Error::NotFound)
    }

    /// Read the full data of an inode by walking its extent tree.
    ///
    /// Only depth-0 (leaf-in-inode) trees are supported; non-extent files
    /// and index nodes surface `Unsupported`. The last read of each file
    /// is truncated to the remaining size.
    fn read_inode_data(&self, inode: &Inode) -> Result<Vec<u8>> {
        if !inode.uses_extents() {
            return Err(Ext4Error::Unsupported("non-extent block map"));
        }

        let header = ExtentHeader::parse(&inode.i_block[..12])?;
        if header.eh_depth != 0 {
            return Err(Ext4Error::Unsupported("extent index nodes"));
        }

        let entries = header.eh_entries as usize;
        if 12 + entries * 12 > inode.i_block.len() {
            return Err(Ext4Error::CorruptedFs("extent table exceeds inode"));
        }

        let file_size = inode.i_size as usize;
        let mut out = vec![0u8; file_size];
        let mut written = 0usize;

        'extents: for i in 0..entries {
            let ext = Extent::parse(&inode.i_block[12 + i * 12..12 + (i + 1) * 12])?;
            let phys = ext.physical_start();

            for b in 0..ext.block_count() as u64 {
                if written >= file_size {
                    break 'extents;
                }
                let to_read = self.block_size.min(file_size - written);
                self.reader.read_bytes(
                    (phys + b) * self.block_size as u64,
                    &mut out[written..written + to_read],
                )?;
                written += to_read;
            }
        }

        Ok(out)
    }
}
