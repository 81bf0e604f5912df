//! Rewriting a GPT for a new logical sector size.

use tracing::{debug, info};

use super::gpt::{check_gpt_header, CopyLocation, Gpt};
use super::mbr::ProtectiveMbr;
use super::raw::{RawGptHeader, GPT_SIGNATURE};
use super::SectorSize;
use crate::disk::{Disk, MIN_SECTORS};
use crate::error::{FixError, Rejection};

/// Bytes blanked where a header of the other sector size may still live.
const STALE_HEADER_BYTES: usize = 4096;

/// Builds the `location` copy of `gpt` for a disk of `sectors` sectors of
/// `sector_size` bytes, keeping every partition at the same byte offsets.
pub fn rebuild_for_geometry(
    gpt: &Gpt,
    location: CopyLocation,
    sector_size: SectorSize,
    sectors: u64,
) -> Result<Gpt, FixError> {
    assert!(sectors >= MIN_SECTORS);
    let old = gpt.header();
    let old_ss = gpt.sector_size().bytes();
    let ss = sector_size.bytes();
    let size = ss * sectors;
    let entry_size = u64::from(old.size_of_partition_entry);

    if u64::from(old.header_size) > ss {
        return Err(FixError::HeaderSizeTooLarge {
            header_size: old.header_size,
            sector_size: ss,
        });
    }

    let mut first_start = u64::MAX;
    let mut last_end = 0;
    let mut starts_first = u32::MAX;
    let mut ends_last = u32::MAX;
    for (index, entry) in gpt.used() {
        let out_of_range = || FixError::from(Rejection::EntryOutOfRange { index });
        let start = entry.starting_lba.checked_mul(old_ss).ok_or_else(out_of_range)?;
        let end = entry
            .ending_lba
            .checked_add(1)
            .and_then(|lba| lba.checked_mul(old_ss))
            .ok_or_else(out_of_range)?;
        debug!("partition {} consumes bytes [{:#x}, {:#x})", index + 1, start, end);
        if start % ss != 0 {
            return Err(FixError::StartMisaligned {
                partition: index + 1,
                offset: start,
                sector_size: ss,
            });
        }
        if end % ss != 0 {
            return Err(FixError::EndMisaligned {
                partition: index + 1,
                offset: end,
                sector_size: ss,
            });
        }
        // On a tie the first partition wins for the start and the last one
        // for the end.
        if start < first_start {
            first_start = start;
            starts_first = index;
        }
        if last_end <= end {
            last_end = end;
            ends_last = index;
        }
    }
    assert!(first_start < last_end, "no used partitions in a validated GPT");
    assert!(size >= last_end, "partition ends past the end of the disk");

    let table_bytes = sector_size.round_up(entry_size * u64::from(gpt.used_entries()));
    // backup header, or pMBR and primary header
    let backup_required = table_bytes + ss;
    let primary_required = table_bytes + 2 * ss;

    if size - last_end < backup_required {
        return Err(FixError::NoRoomForBackup {
            partition: ends_last + 1,
            end: last_end,
            remaining: size - last_end,
            required: backup_required,
        });
    }
    if primary_required > first_start {
        return Err(FixError::NoRoomForPrimary {
            partition: starts_first + 1,
            start: first_start,
            required: primary_required,
        });
    }

    // Room between the primary header and the first partition, or between
    // the last partition and the backup header, whichever is smaller.
    let available = ((size - ss) - last_end).min(first_start - 2 * ss);
    let max_entries = available / entry_size;
    assert!(max_entries >= u64::from(gpt.used_entries()));
    // Unused slots past what fits are dropped.
    let new_entries = max_entries.min(u64::from(old.number_of_partition_entries)) as u32;

    let table_bytes = sector_size.round_up(entry_size * u64::from(new_entries));
    let backup_required = table_bytes + ss;
    let primary_required = table_bytes + 2 * ss;
    let table_sectors = table_bytes / ss;

    // Keep the old usable range where possible, shrinking it if the new
    // tables need the room.
    let first_usable_byte = (old.first_usable_lba * old_ss).max(primary_required);
    let first_unusable_byte = ((old.last_usable_lba + 1) * old_ss).min(size - backup_required);

    let my_lba = location.lba(sectors);
    let header = RawGptHeader {
        signature: GPT_SIGNATURE,
        revision: old.revision,
        header_size: old.header_size,
        header_crc32: 0,
        reserved: 0,
        my_lba,
        alternate_lba: location.other().lba(sectors),
        first_usable_lba: sector_size.round_up(first_usable_byte) / ss,
        last_usable_lba: first_unusable_byte / ss - 1,
        disk_guid: old.disk_guid,
        partition_entry_lba: match location {
            CopyLocation::Primary => 2,
            CopyLocation::Backup => sectors - 1 - table_sectors,
        },
        number_of_partition_entries: new_entries,
        size_of_partition_entry: old.size_of_partition_entry,
        partition_entry_array_crc32: 0,
    };
    debug!(
        "LBA is {:#x}, alternate LBA is {:#x}, allocating {:#x} bytes",
        header.my_lba, header.alternate_lba, table_bytes
    );

    let mut new_gpt = Gpt::from_parts(header, vec![0; table_bytes as usize], sector_size, gpt.used_entries());
    let slot = entry_size as usize;
    for index in 0..new_entries {
        let mut entry = gpt.entry(index);
        let bytes = &mut new_gpt.entries_mut()[index as usize * slot..(index as usize + 1) * slot];
        if entry.is_unused() {
            bytes.copy_from_slice(&gpt.entries_bytes()[index as usize * slot..(index as usize + 1) * slot]);
            continue;
        }
        entry.starting_lba = entry.starting_lba * old_ss / ss;
        entry.ending_lba = (entry.ending_lba + 1) * old_ss / ss - 1;
        entry.write_to(bytes);
    }
    new_gpt.update_crcs();

    Ok(new_gpt)
}

/// Writes one rebuilt GPT copy, blanking any header of the old sector size
/// that would otherwise still be found.
///
/// Every write is a single positional write of whole sectors.  The header
/// sector goes last, so a crash leaves either the old copy or a complete new
/// one in place.
pub fn write_gpt_copy(
    disk: &mut dyn Disk,
    new_gpt: &Gpt,
    old_sector_size: SectorSize,
    mbr: &ProtectiveMbr,
) -> Result<(), FixError> {
    let sector_size = disk.sector_size();
    let ss = sector_size.bytes();
    let sectors = disk.size() / ss;
    let header = new_gpt.header();
    assert_eq!(new_gpt.sector_size(), sector_size);

    if let Err(e) = check_gpt_header(&new_gpt.header_sector(), header.my_lba, sector_size, sectors) {
        panic!("rebuilt GPT header at LBA {} fails validation: {}", header.my_lba, e);
    }
    new_gpt.dump();

    let zeroes = [0u8; STALE_HEADER_BYTES];
    if header.my_lba == sectors - 1 {
        // The new partitions were checked not to reach into this area.
        disk.write_at(&zeroes, disk.size() - STALE_HEADER_BYTES as u64)?;
    } else if header.my_lba == 1 {
        match sector_size {
            SectorSize::Large => {
                assert_eq!(old_sector_size, SectorSize::Small);
                // One write of the pMBR sector also wipes the 512-byte
                // sector header behind it.
                disk.write_at(mbr.as_bytes(), 0)?;
            }
            SectorSize::Small => {
                assert_eq!(old_sector_size, SectorSize::Large);
                disk.write_at(&mbr.as_bytes()[..512], 0)?;
                disk.write_at(&zeroes[..512], 512)?;
                // Not atomic as a whole, but wiping the first sector of the
                // old header is.
                disk.write_at(&zeroes, STALE_HEADER_BYTES as u64)?;
            }
        }
    } else {
        panic!("GPT header at LBA {} is neither primary nor backup", header.my_lba);
    }

    disk.write_at(new_gpt.entries_bytes(), header.partition_entry_lba * ss)?;
    disk.write_at(&new_gpt.header_sector(), header.my_lba * ss)?;
    Ok(())
}

/// Progress of a [`Migration`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MigrationStage {
    ComputeNewGeometry,
    WriteNonActiveCopy,
    WriteActiveCopy,
    Done,
}

/// Moves a GPT found at the old sector size to the disk's current one.
///
/// The copy that was not used to read the GPT is overwritten first, and the
/// one that was is only touched once that succeeded, so at every point at
/// least one valid GPT is on disk.
pub struct Migration {
    old: Gpt,
    active: CopyLocation,
    mbr: ProtectiveMbr,
    stage: MigrationStage,
    new_copies: Option<(Gpt, Gpt)>,
}

impl Migration {
    /// `old` was read from the `active` copy; `mbr` is sector 0 at the new
    /// sector size, already checked.
    pub fn new(old: Gpt, active: CopyLocation, mbr: ProtectiveMbr) -> Self {
        Migration {
            old,
            active,
            mbr,
            stage: MigrationStage::ComputeNewGeometry,
            new_copies: None,
        }
    }

    pub fn stage(&self) -> MigrationStage {
        self.stage
    }

    /// Performs the current stage and returns the next one.
    pub fn step(&mut self, disk: &mut dyn Disk) -> Result<MigrationStage, FixError> {
        let old_ss = self.old.sector_size();
        self.stage = match self.stage {
            MigrationStage::ComputeNewGeometry => {
                let sector_size = disk.sector_size();
                let sectors = disk.size() / sector_size.bytes();
                let non_active = rebuild_for_geometry(&self.old, self.active.other(), sector_size, sectors)?;
                let active = rebuild_for_geometry(&self.old, self.active, sector_size, sectors)?;
                self.new_copies = Some((non_active, active));
                MigrationStage::WriteNonActiveCopy
            }
            MigrationStage::WriteNonActiveCopy => {
                let (non_active, _) = self.new_copies.as_ref().expect("geometry computed");
                info!("writing {:?} GPT for {}-byte sectors", self.active.other(), non_active.sector_size());
                write_gpt_copy(disk, non_active, old_ss, &self.mbr)?;
                MigrationStage::WriteActiveCopy
            }
            MigrationStage::WriteActiveCopy => {
                let (_, active) = self.new_copies.as_ref().expect("geometry computed");
                info!("writing {:?} GPT for {}-byte sectors", self.active, active.sector_size());
                write_gpt_copy(disk, active, old_ss, &self.mbr)?;
                MigrationStage::Done
            }
            MigrationStage::Done => MigrationStage::Done,
        };
        Ok(self.stage)
    }

    pub fn run(mut self, disk: &mut dyn Disk) -> Result<(), FixError> {
        while self.step(disk)? != MigrationStage::Done {}
        Ok(())
    }
}
