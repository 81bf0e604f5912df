//! Validation side of the inter-qube file-copy protocol.
//!
//! The sender streams a [`FileHeader`] followed by `namelen` bytes of path
//! and `filelen` bytes of content for every entry, then a header with
//! `namelen == 0` to mark the end of the transfer.  The receiver answers with
//! a [`ResultHeader`], optionally followed by the name of the last entry it
//! processed.  Moving the bytes is the transport's job; this module decides
//! whether each entry may be created.

use bitflags::bitflags;
use nix::errno::Errno;
use nix::sys::stat::SFlag;

use super::path::{validate_file_name, validate_symbolic_link, PathError, PathFlags};

/// Longest accepted path, including the terminating NUL.
pub const MAX_PATH_LENGTH: usize = 16384;
pub const FILE_HEADER_SIZE: usize = 32;
pub const RESULT_HEADER_SIZE: usize = 16;

const MAX_NSEC: u32 = 999_999_999;

/// Per-entry header as sent on the wire.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub namelen: u32,
    pub mode: u32,
    pub filelen: u64,
    pub atime: u32,
    pub atime_nsec: u32,
    pub mtime: u32,
    pub mtime_nsec: u32,
}

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn le_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(word)
}

impl FileHeader {
    pub fn from_bytes(bytes: &[u8; FILE_HEADER_SIZE]) -> Self {
        FileHeader {
            namelen: le_u32(bytes, 0),
            mode: le_u32(bytes, 4),
            filelen: le_u64(bytes, 8),
            atime: le_u32(bytes, 16),
            atime_nsec: le_u32(bytes, 20),
            mtime: le_u32(bytes, 24),
            mtime_nsec: le_u32(bytes, 28),
        }
    }

    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut bytes = [0u8; FILE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.namelen.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.mode.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.filelen.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.atime.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.atime_nsec.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.mtime.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.mtime_nsec.to_le_bytes());
        bytes
    }

    pub fn is_end_of_transfer(&self) -> bool {
        self.namelen == 0
    }
}

/// Final status sent back to the sender.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultHeader {
    pub error_code: u32,
    pub crc32: u64,
}

impl ResultHeader {
    pub fn from_bytes(bytes: &[u8; RESULT_HEADER_SIZE]) -> Self {
        ResultHeader {
            error_code: le_u32(bytes, 0),
            crc32: le_u64(bytes, 8),
        }
    }

    pub fn to_bytes(&self) -> [u8; RESULT_HEADER_SIZE] {
        let mut bytes = [0u8; RESULT_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.error_code.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.crc32.to_le_bytes());
        bytes
    }
}

/// Encodes the result header and, if given, the extension naming the last
/// processed entry.
pub fn encode_result(error_code: u32, crc32: u64, last_name: Option<&[u8]>) -> Vec<u8> {
    let header = ResultHeader { error_code, crc32 };
    let mut out = header.to_bytes().to_vec();
    if let Some(name) = last_name {
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name);
    }
    out
}

bitflags! {
    /// Entry types the receiver accepts in addition to regular files.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CopyFlags: u32 {
        const ALLOW_DIRECTORIES = 1 << 0;
        const ALLOW_SYMLINKS = 1 << 1;
    }
}

impl Default for CopyFlags {
    fn default() -> Self {
        CopyFlags::ALLOW_DIRECTORIES | CopyFlags::ALLOW_SYMLINKS
    }
}

/// Quotas for one transfer.  `None` means unlimited.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferLimits {
    pub max_bytes: Option<u64>,
    pub max_files: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
}

/// Why an entry of a transfer was refused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum FileCopyError {
    /// name of {0} bytes is too long
    NameTooLong(u64),
    /// symbolic link target of {0} bytes is too long
    TargetTooLong(u64),
    /// invalid file name: {0}
    InvalidName(#[source] PathError),
    /// unsafe symbolic link: {0}
    InvalidSymlink(#[source] PathError),
    /// entry with mode {0:#o} is not accepted
    UnsupportedType(u32),
    /// invalid nanoseconds value {0}
    InvalidTimestamp(u32),
    /// transfer exceeds its quota
    QuotaExceeded,
}

impl FileCopyError {
    /// The errno value reported in the result header.
    pub fn errno(&self) -> Errno {
        match self {
            FileCopyError::NameTooLong(_) | FileCopyError::TargetTooLong(_) => Errno::ENAMETOOLONG,
            FileCopyError::InvalidName(_) | FileCopyError::InvalidSymlink(_) => Errno::EILSEQ,
            FileCopyError::UnsupportedType(_) | FileCopyError::InvalidTimestamp(_) => Errno::EINVAL,
            FileCopyError::QuotaExceeded => Errno::EDQUOT,
        }
    }
}

/// Bookkeeping for one incoming transfer.
pub struct TransferSession {
    flags: CopyFlags,
    limits: TransferLimits,
    total_bytes: u64,
    total_files: u64,
    crc: crc_any::CRC,
}

impl TransferSession {
    pub fn new(flags: CopyFlags, limits: TransferLimits) -> Self {
        TransferSession {
            flags,
            limits,
            total_bytes: 0,
            total_files: 0,
            crc: crc_any::CRC::crc32(),
        }
    }

    /// Feeds bytes received from the sender into the running checksum.
    pub fn digest(&mut self, data: &[u8]) {
        self.crc.digest(data);
    }

    pub fn crc32(&mut self) -> u64 {
        self.crc.get_crc()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_files(&self) -> u64 {
        self.total_files
    }

    /// Accounts for a new entry header, before its name is read.
    ///
    /// Returns `Ok(false)` for the end-of-transfer marker.
    pub fn begin_entry(&mut self, untrusted_hdr: &FileHeader) -> Result<bool, FileCopyError> {
        if untrusted_hdr.is_end_of_transfer() {
            return Ok(false);
        }
        self.total_files += 1;
        if self.limits.max_files.map_or(false, |max| self.total_files > max) {
            return Err(FileCopyError::QuotaExceeded);
        }
        if untrusted_hdr.namelen as usize > MAX_PATH_LENGTH - 1 {
            return Err(FileCopyError::NameTooLong(u64::from(untrusted_hdr.namelen)));
        }
        Ok(true)
    }

    /// Decides whether the entry may be created.
    ///
    /// `untrusted_target` is the symbolic link target (the entry's content)
    /// and is only consulted for symbolic links.
    pub fn check_entry(
        &mut self,
        untrusted_hdr: &FileHeader,
        untrusted_name: &[u8],
        untrusted_target: Option<&[u8]>,
    ) -> Result<EntryKind, FileCopyError> {
        let kind = self.entry_kind(untrusted_hdr.mode)?;
        for nsec in [untrusted_hdr.atime_nsec, untrusted_hdr.mtime_nsec] {
            if nsec > MAX_NSEC {
                return Err(FileCopyError::InvalidTimestamp(nsec));
            }
        }
        validate_file_name(untrusted_name, PathFlags::empty()).map_err(FileCopyError::InvalidName)?;

        match kind {
            EntryKind::Regular => {
                let filelen = untrusted_hdr.filelen;
                if filelen > i64::MAX as u64 {
                    return Err(FileCopyError::QuotaExceeded);
                }
                if let Some(max) = self.limits.max_bytes {
                    if filelen > max || self.total_bytes > max - filelen {
                        return Err(FileCopyError::QuotaExceeded);
                    }
                }
                self.total_bytes += filelen;
            }
            EntryKind::Symlink => {
                if untrusted_hdr.filelen > (MAX_PATH_LENGTH - 1) as u64 {
                    return Err(FileCopyError::TargetTooLong(untrusted_hdr.filelen));
                }
                self.total_bytes += untrusted_hdr.filelen;
                if self.limits.max_bytes.map_or(false, |max| self.total_bytes > max) {
                    return Err(FileCopyError::QuotaExceeded);
                }
                let target = untrusted_target.unwrap_or_default();
                validate_symbolic_link(untrusted_name, target, PathFlags::empty())
                    .map_err(FileCopyError::InvalidSymlink)?;
            }
            // Directory sizes are only known after creation.
            EntryKind::Directory => {}
        }

        Ok(kind)
    }

    fn entry_kind(&self, mode: u32) -> Result<EntryKind, FileCopyError> {
        let file_type = SFlag::from_bits_truncate(mode) & SFlag::S_IFMT;
        if file_type == SFlag::S_IFREG {
            Ok(EntryKind::Regular)
        } else if file_type == SFlag::S_IFLNK && self.flags.contains(CopyFlags::ALLOW_SYMLINKS) {
            Ok(EntryKind::Symlink)
        } else if file_type == SFlag::S_IFDIR && self.flags.contains(CopyFlags::ALLOW_DIRECTORIES) {
            Ok(EntryKind::Directory)
        } else {
            Err(FileCopyError::UnsupportedType(mode))
        }
    }
}

/// Splits a validated path into its parent directories and final segment.
///
/// The caller walks the parents one `openat` at a time.  A "." or ".."
/// parent here means validation was skipped, which is a bug, not bad input.
pub fn split_validated_path(name: &[u8]) -> (Vec<&[u8]>, &[u8]) {
    let name = match name.iter().position(|&b| b == 0) {
        Some(nul) => &name[..nul],
        None => name,
    };
    let mut segments: Vec<&[u8]> = name.split(|&b| b == b'/').collect();
    let last = segments.pop().unwrap_or_default();
    for segment in &segments {
        assert!(
            !matches!(*segment, b"" | b"." | b".."),
            "path component {:?} not rejected earlier",
            String::from_utf8_lossy(segment)
        );
    }
    (segments, last)
}
