//! Index entry representation
//!
//! Each entry in the index represents a staged file with:
//! - File path
//! - Blob digest
//! - Stat metadata (mode, size, modification time)
//!
//! The stat metadata only serves as a fast path for change detection: when it
//! still matches the file on disk, the file does not need to be re-hashed.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::Packable;
use crate::artifacts::objects::object_id::ObjectId;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::fs::Metadata;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Maximum path length supported in index entries
const MAX_PATH_SIZE: usize = u16::MAX as usize;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Size of the fixed part of an entry, up to and including the path length
pub const ENTRY_FIXED_SIZE: usize = 38;

#[derive(Debug, Clone, Default, new)]
pub struct IndexEntry {
    /// Path relative to the repository root
    pub name: PathBuf,
    /// Digest of the staged blob
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
}

/// Stat data captured when a file is staged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Modification time (seconds since Unix epoch)
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub mode: EntryMode,
    pub size: u64,
}

impl IndexEntry {
    /// Every proper ancestor directory, outermost first
    ///
    /// `a/b/c` yields `a` and `a/b`.
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs = self
            .name
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect::<Vec<_>>();
        dirs.reverse();
        dirs
    }

    /// Sizes are compared modulo 2^32, the width the index stores them in
    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.size as u32 == other.size as u32 && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.mtime == other.mtime && self.metadata.mtime_nsec == other.mtime_nsec
    }

    /// Parse one entry; `bytes` must hold exactly the padded entry
    pub fn parse(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < ENTRY_FIXED_SIZE {
            return Err(anyhow::anyhow!("Invalid index entry size"));
        }

        let mtime = byteorder::NetworkEndian::read_u32(&bytes[0..4]) as i64;
        let mtime_nsec = byteorder::NetworkEndian::read_u32(&bytes[4..8]) as i64;
        let mode = EntryMode::try_from(byteorder::NetworkEndian::read_u32(&bytes[8..12]))?;
        let size = byteorder::NetworkEndian::read_u32(&bytes[12..16]) as u64;
        let oid = ObjectId::read_h40_from(&mut std::io::Cursor::new(&bytes[16..36]))?;
        let name_len = byteorder::NetworkEndian::read_u16(&bytes[36..38]) as usize;

        let name_bytes = bytes
            .get(ENTRY_FIXED_SIZE..ENTRY_FIXED_SIZE + name_len)
            .ok_or_else(|| anyhow::anyhow!("Truncated index entry name"))?;
        let name = PathBuf::from(
            std::str::from_utf8(name_bytes)
                .map_err(|_| anyhow::anyhow!("Invalid UTF-8 in entry name"))?,
        );

        Ok(IndexEntry {
            name,
            oid,
            metadata: EntryMetadata {
                mtime,
                mtime_nsec,
                mode,
                size,
            },
        })
    }

    /// Total on-disk size of an entry whose path is `name_len` bytes long
    pub fn padded_size(name_len: usize) -> usize {
        // at least one NUL terminates the path
        let unpadded = ENTRY_FIXED_SIZE + name_len + 1;
        unpadded.div_ceil(ENTRY_BLOCK) * ENTRY_BLOCK
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.oid == other.oid
    }
}

impl Eq for IndexEntry {}

impl Packable for IndexEntry {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let name = self
            .name
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid entry name {:?}", self.name))?;
        if name.len() > MAX_PATH_SIZE {
            anyhow::bail!("Path too long for the index: {}", name);
        }

        let mut bytes = Vec::with_capacity(Self::padded_size(name.len()));
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime as u32)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mode.as_u32())?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_h40_to(&mut bytes)?;
        bytes.write_u16::<byteorder::NetworkEndian>(name.len() as u16)?;
        bytes.write_all(name.as_bytes())?;

        bytes.resize(Self::padded_size(name.len()), 0);

        Ok(Bytes::from(bytes))
    }
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = anyhow::Error;

    fn try_from((file_path, metadata): (&Path, Metadata)) -> Result<Self, Self::Error> {
        let mode = if metadata.is_dir() {
            EntryMode::Directory
        } else if file_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        let modified = metadata.modified()?.duration_since(UNIX_EPOCH)?;

        Ok(Self {
            mtime: modified.as_secs() as i64,
            mtime_nsec: modified.subsec_nanos() as i64,
            mode,
            size: metadata.len(),
        })
    }
}
