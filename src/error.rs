use std::io;

use nix::errno::Errno;
use num_derive::ToPrimitive;

use crate::image::ImageError;

/// Process exit status of the `gptfix` binary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ToPrimitive)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
    Io = 2,
    /// The GPT might be valid but uses a feature that is not supported.
    Unsupported = 3,
    NotPartitioned = 4,
    InvalidGpt = 5,
    /// A new GPT cannot be created without violating some constraint.
    Constraint = 6,
    /// `check` found a GPT that needs `fix`.
    NeedsFix = 7,
    Truncated = 8,
}

/// Why one candidate GPT copy was not accepted.  The other copy may still be
/// usable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum Rejection {
    /// GPT header requested at sector {offset}, past the end of the disk ({sectors} sectors)
    OffsetPastEnd { offset: u64, sectors: u64 },
    /// GPT header requested at invalid sector {0}: offset must be 1 or at least 5
    InvalidOffset(u64),
    /// wrong GPT signature
    BadSignature,
    /// partition table revision {0:#010x} is not 0x00010000
    BadRevision(u32),
    /// GPT header at sector {0:#x} has bad CRC
    BadHeaderCrc(u64),
    /// header size {0} is less than 92
    HeaderTooSmall(u32),
    /// header size {header_size} exceeds sector size {sector_size}
    HeaderTooLarge { header_size: u32, sector_size: u64 },
    /// partition entry size {0} is less than 128
    EntryTooSmall(u32),
    /// partition entry size {entry_size} exceeds sector size {sector_size}
    EntryTooLarge { entry_size: u32, sector_size: u64 },
    /// first usable LBA {0} is less than 3
    FirstUsableTooLow(u64),
    /// no usable space: last usable LBA {last} is before first usable LBA {first}
    NoUsableSpace { first: u64, last: u64 },
    /// alternate LBA of backup GPT is {0:#x}, not 1
    BackupAlternateNotPrimary(u64),
    /// last usable LBA {last_usable:#x} is not before backup partition table at {entry_lba:#x}
    UsableOverlapsBackupTable { last_usable: u64, entry_lba: u64 },
    /// backup partition table LBA {entry_lba:#x} is not before backup header at {my_lba:#x}
    BackupTableAfterHeader { entry_lba: u64, my_lba: u64 },
    /// primary partition table at LBA {0}, not 2
    PrimaryTableMisplaced(u64),
    /// alternate header {alternate} overlaps usable space ending at {last_usable}
    AlternateOverlapsUsable { alternate: u64, last_usable: u64 },
    /// header has no partition entries
    NoPartitionEntries,
    /// partition table of {table_bytes} bytes does not fit in {available_bytes} bytes
    TableDoesNotFit { table_bytes: u64, available_bytes: u64 },
    /// partition entry array at sector {0:#x} has bad CRC
    BadEntryCrc(u64),
    /// partition {index}: ending LBA {ending_lba} is before starting LBA {starting_lba}
    EntryEndsBeforeStart { index: u32, starting_lba: u64, ending_lba: u64 },
    /// partition {index}: LBA range does not fit in 64-bit byte offsets
    EntryOutOfRange { index: u32 },
    /// partition {index}: starting LBA {starting_lba} is less than first usable LBA {first_usable}
    EntryBeforeFirstUsable { index: u32, starting_lba: u64, first_usable: u64 },
    /// partition {index}: ending LBA {ending_lba} is greater than last usable LBA {last_usable}
    EntryAfterLastUsable { index: u32, ending_lba: u64, last_usable: u64 },
}

/// Error while checking or fixing a disk.
#[derive(Debug, displaydoc::Display, thiserror::Error)]
pub enum FixError {
    /// Cannot open {path}: {source}
    Open { path: String, source: io::Error },
    /// {0}
    Image(#[from] ImageError),
    /// {0} is not a block device
    NotBlockDevice(String),
    /// Refusing to operate on partition {0}: pass the whole block device instead
    IsPartition(String),
    /// Bad sysfs entry {0}: "partition" attribute is not a regular file
    BadSysfsEntry(String),
    /// Cannot check if {path} is a partition: {source}
    PartitionCheck { path: String, source: io::Error },
    /// Device cannot be locked: {0}
    Lock(Errno),
    /// Cannot reopen block device for writing: {0}
    Reopen(io::Error),
    /// I/O error {context}: {source}
    Io { context: &'static str, source: io::Error },
    /// Short read at byte {offset:#x}: expected {expected} bytes, got {actual}
    ShortRead { offset: u64, expected: usize, actual: usize },
    /// Short write at byte {offset:#x}: expected {expected} bytes, wrote {actual}
    ShortWrite { offset: u64, expected: usize, actual: usize },
    /// Device was not opened for writing
    ReadOnly,
    /// Sector size {0:#x} is neither 512 nor 4096
    UnsupportedSectorSize(u64),
    /// Size {0:#x} does not fit in off_t
    SizeOverflow(u64),
    /// Size {size:#x} is not a multiple of sector size {sector_size:#x}
    SizeNotSectorMultiple { size: u64, sector_size: u64 },
    /// Disk size {0:#x} is not a multiple of 4096
    SizeNotMultipleOf4096(u64),
    /// Device has too few sectors for GPT: need 6, found {0}
    TooFewSectors(u64),
    /// Invalid MBR signature: expected 0x55 0xAA, got {0:#04X} {1:#04X}
    BadMbrSignature(u8, u8),
    /// Bad protective MBR: OS type {0:#04x} is not GPT Protective
    MbrNotProtective(u8),
    /// Partition record {0} is not zeroed - this device does not have a protective MBR
    MbrRecordNotZero(usize),
    /// Bad protective MBR: starting LBA is {0}, not the first block
    MbrBadStartingLba(u32),
    /// Refusing to change partition table that might overlap a FAT or NTFS volume
    BpbPresent,
    /// Partition entry size {0} is greater than 128, which is not supported
    EntrySizeUnsupported(u32),
    /// Partition table size {0} exceeds 1MiB limit
    TableTooLarge(u64),
    /// Alternate partition header {alternate_lba} after end of device at {sectors}
    Truncated { alternate_lba: u64, sectors: u64 },
    /// No used partitions
    NoUsedPartitions,
    /// Cannot find valid GPT
    NoValidGpt,
    /// {0}
    Rejected(#[from] Rejection),
    /// Cannot preserve starting LBA for partition {partition}: starting byte offset {offset:#x} is not a multiple of {sector_size}
    StartMisaligned { partition: u32, offset: u64, sector_size: u64 },
    /// Cannot preserve ending LBA for partition {partition}: ending byte offset {offset:#x} is not a multiple of {sector_size}
    EndMisaligned { partition: u32, offset: u64, sector_size: u64 },
    /// Partition {partition} ends at byte {end:#x}, leaving {remaining:#x} bytes, but the backup GPT needs {required:#x}
    NoRoomForBackup { partition: u32, end: u64, remaining: u64, required: u64 },
    /// The protective MBR and primary GPT need the first {required} bytes, but partition {partition} starts at offset {start}
    NoRoomForPrimary { partition: u32, start: u64, required: u64 },
    /// Header size {header_size} does not fit in a {sector_size}-byte sector
    HeaderSizeTooLarge { header_size: u32, sector_size: u64 },
    /// GPT needs to be updated for new sector size
    NeedsFix,
    /// Cannot reload kernel partition table: {0}
    ReloadPartitionTable(Errno),
}

impl FixError {
    pub(crate) fn io(context: &'static str, source: impl Into<io::Error>) -> Self {
        FixError::Io {
            context,
            source: source.into(),
        }
    }

    /// True if the failure only concerns one GPT copy, so the caller may try
    /// the other one.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FixError::Rejected(_))
    }

    pub fn exit_status(&self) -> ExitStatus {
        match self {
            FixError::Open { .. }
            | FixError::Image(_)
            | FixError::NotBlockDevice(_)
            | FixError::IsPartition(_)
            | FixError::BadSysfsEntry(_)
            | FixError::PartitionCheck { .. }
            | FixError::Lock(_)
            | FixError::Reopen(_) => ExitStatus::Failure,
            FixError::Io { .. }
            | FixError::ShortRead { .. }
            | FixError::ShortWrite { .. }
            | FixError::ReadOnly
            | FixError::ReloadPartitionTable(_) => ExitStatus::Io,
            FixError::UnsupportedSectorSize(_)
            | FixError::SizeOverflow(_)
            | FixError::SizeNotSectorMultiple { .. }
            | FixError::SizeNotMultipleOf4096(_)
            | FixError::TooFewSectors(_)
            | FixError::MbrNotProtective(_)
            | FixError::MbrRecordNotZero(_)
            | FixError::BpbPresent
            | FixError::EntrySizeUnsupported(_)
            | FixError::TableTooLarge(_)
            | FixError::NoUsedPartitions => ExitStatus::Unsupported,
            FixError::BadMbrSignature(..) => ExitStatus::NotPartitioned,
            FixError::MbrBadStartingLba(_) | FixError::NoValidGpt | FixError::Rejected(_) => {
                ExitStatus::InvalidGpt
            }
            FixError::StartMisaligned { .. }
            | FixError::EndMisaligned { .. }
            | FixError::NoRoomForBackup { .. }
            | FixError::NoRoomForPrimary { .. }
            | FixError::HeaderSizeTooLarge { .. } => ExitStatus::Constraint,
            FixError::NeedsFix => ExitStatus::NeedsFix,
            FixError::Truncated { .. } => ExitStatus::Truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    #[test]
    fn test_exit_codes() {
        let cases = [
            (FixError::NotBlockDevice("x".into()), 1),
            (FixError::io("reading", Errno::EIO), 2),
            (FixError::UnsupportedSectorSize(1024), 3),
            (FixError::BadMbrSignature(0, 0), 4),
            (FixError::NoValidGpt, 5),
            (FixError::NoRoomForPrimary { partition: 1, start: 0, required: 1 }, 6),
            (FixError::NeedsFix, 7),
            (FixError::Truncated { alternate_lba: 9, sectors: 8 }, 8),
        ];
        for (err, code) in cases {
            assert_eq!(err.exit_status().to_i32(), Some(code), "{}", err);
        }
    }

    #[test]
    fn test_only_rejections_are_recoverable() {
        assert!(FixError::from(Rejection::BadSignature).is_recoverable());
        assert!(!FixError::EntrySizeUnsupported(256).is_recoverable());
        assert!(!FixError::Truncated { alternate_lba: 9, sectors: 8 }.is_recoverable());
    }

    #[test]
    fn test_messages_name_the_violation() {
        assert_eq!(
            FixError::BadMbrSignature(0x12, 0x34).to_string(),
            "Invalid MBR signature: expected 0x55 0xAA, got 0x12 0x34"
        );
        assert_eq!(
            FixError::from(Rejection::BadRevision(0x0002_0000)).to_string(),
            "partition table revision 0x00020000 is not 0x00010000"
        );
    }
}
