use tracing::{debug, warn};

use super::raw::{
    compute_crc32, entry_is_unused, format_guid, header_crc32, RawGptHeader, RawGptPartitionEntry,
    GPT_ENTRY_SIZE, GPT_HEADER_SIZE, GPT_REVISION, GPT_SIGNATURE,
};
use super::SectorSize;
use crate::disk::{read_vec, Disk, MIN_SECTORS};
use crate::error::{FixError, Rejection};

/// Sanity limit on the size of a partition entry array.
pub const MAX_PARTITION_TABLE_BYTES: u64 = 1 << 20;

/// Which of the two GPT copies a header is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CopyLocation {
    Primary,
    Backup,
}

impl CopyLocation {
    /// LBA of the header of this copy on a disk of `sectors` sectors.
    pub fn lba(self, sectors: u64) -> u64 {
        match self {
            CopyLocation::Primary => 1,
            CopyLocation::Backup => sectors - 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            CopyLocation::Primary => CopyLocation::Backup,
            CopyLocation::Backup => CopyLocation::Primary,
        }
    }
}

/// A validated GPT: one header and its entry array, at a given sector size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gpt {
    header: RawGptHeader,
    /// The entry array, padded with zeroes to whole sectors.
    entries: Vec<u8>,
    sector_size: SectorSize,
    used_entries: u32,
}

impl Gpt {
    pub(super) fn from_parts(
        header: RawGptHeader,
        entries: Vec<u8>,
        sector_size: SectorSize,
        used_entries: u32,
    ) -> Self {
        assert!(header.size_of_partition_entry as usize >= GPT_ENTRY_SIZE);
        assert!(entries.len() as u64 >= header.partition_table_bytes());
        Gpt {
            header,
            entries,
            sector_size,
            used_entries,
        }
    }

    pub fn header(&self) -> &RawGptHeader {
        &self.header
    }

    pub fn sector_size(&self) -> SectorSize {
        self.sector_size
    }

    /// Index of the last used entry plus one.
    pub fn used_entries(&self) -> u32 {
        self.used_entries
    }

    /// The padded entry array, exactly as written to disk.
    pub fn entries_bytes(&self) -> &[u8] {
        &self.entries
    }

    fn entry_bytes(&self, index: u32) -> &[u8] {
        assert!(
            index < self.header.number_of_partition_entries,
            "entry {} out of {}",
            index,
            self.header.number_of_partition_entries
        );
        let size = self.header.size_of_partition_entry as usize;
        let offset = index as usize * size;
        &self.entries[offset..offset + size]
    }

    pub fn entry(&self, index: u32) -> RawGptPartitionEntry {
        RawGptPartitionEntry::from_bytes(self.entry_bytes(index))
    }

    pub(super) fn entries_mut(&mut self) -> &mut [u8] {
        &mut self.entries
    }

    #[cfg(test)]
    pub(super) fn header_mut(&mut self) -> &mut RawGptHeader {
        &mut self.header
    }

    /// Iterates over the used entries, skipping unused slots.
    pub fn used(&self) -> UsedEntries<'_> {
        UsedEntries { gpt: self, next: 0 }
    }

    /// The header padded with zeroes to one sector.
    pub fn header_sector(&self) -> Vec<u8> {
        let mut sector = vec![0u8; self.sector_size.bytes() as usize];
        sector[..GPT_HEADER_SIZE].copy_from_slice(&self.header.to_bytes());
        sector
    }

    pub fn compute_entry_crc32(&self) -> u32 {
        compute_crc32(&self.entries[..self.header.partition_table_bytes() as usize])
    }

    pub fn compute_header_crc32(&self) -> u32 {
        header_crc32(&self.header_sector(), self.header.header_size as usize)
    }

    /// Recomputes both checksums: the entry array first, then the header
    /// that covers it.
    pub(super) fn update_crcs(&mut self) {
        self.header.partition_entry_array_crc32 = self.compute_entry_crc32();
        self.header.header_crc32 = self.compute_header_crc32();
    }

    /// Logs the header and every used entry at debug level.
    pub fn dump(&self) {
        let h = &self.header;
        debug!("GPT Partition Table Header:");
        debug!("  Revision:                 {:#010x}", h.revision);
        debug!("  HeaderSize:               {}", h.header_size);
        debug!("  HeaderCRC32:              {:#010x}", h.header_crc32);
        debug!("  Reserved:                 {}", h.reserved);
        debug!("  MyLBA:                    {}", h.my_lba);
        debug!("  AlternateLBA:             {}", h.alternate_lba);
        debug!("  FirstUsableLBA:           {}", h.first_usable_lba);
        debug!("  LastUsableLBA:            {}", h.last_usable_lba);
        debug!("  DiskGUID:                 {}", format_guid(&h.disk_guid));
        debug!("  PartitionEntryLBA:        {}", h.partition_entry_lba);
        debug!("  NumberOfPartitionEntries: {}", h.number_of_partition_entries);
        debug!("  SizeOfPartitionEntry:     {}", h.size_of_partition_entry);
        debug!("  PartitionEntryArrayCRC32: {:#010x}", h.partition_entry_array_crc32);
        for (index, entry) in self.used() {
            debug!("GPT Partition Table Entry {}:", index + 1);
            debug!("  PartitionTypeGUID:        {}", format_guid(&entry.partition_type_guid));
            debug!("  UniquePartitionGUID:      {}", format_guid(&entry.unique_partition_guid));
            debug!("  StartingLBA:              {:#x}", entry.starting_lba);
            debug!("  EndingLBA:                {:#x}", entry.ending_lba);
            debug!("  Attributes:               {:#018x}", entry.attributes);
        }
    }
}

/// Used entries of a [`Gpt`] with their 0-based indices.
pub struct UsedEntries<'a> {
    gpt: &'a Gpt,
    next: u32,
}

impl<'a> Iterator for UsedEntries<'a> {
    type Item = (u32, RawGptPartitionEntry);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.gpt.used_entries {
            let index = self.next;
            self.next += 1;
            let bytes = self.gpt.entry_bytes(index);
            if !entry_is_unused(bytes) {
                return Some((index, RawGptPartitionEntry::from_bytes(bytes)));
            }
        }
        None
    }
}

/// Validates the header found at sector `offset` of a disk of `sectors`
/// sectors of `sector_size` bytes.
///
/// Returns the size in bytes of the entry array the header describes.
pub fn check_gpt_header(
    header_sector: &[u8],
    offset: u64,
    sector_size: SectorSize,
    sectors: u64,
) -> Result<u64, FixError> {
    assert!(sectors >= MIN_SECTORS);
    assert!(offset < sectors);
    let ss = sector_size.bytes();
    let header = RawGptHeader::from_sector(header_sector);

    if header.signature != GPT_SIGNATURE {
        return Err(Rejection::BadSignature.into());
    }
    if header.revision != GPT_REVISION {
        return Err(Rejection::BadRevision(header.revision).into());
    }
    if (header.header_size as usize) < GPT_HEADER_SIZE {
        return Err(Rejection::HeaderTooSmall(header.header_size).into());
    }
    if u64::from(header.header_size) > ss || header.header_size as usize > header_sector.len() {
        return Err(Rejection::HeaderTooLarge {
            header_size: header.header_size,
            sector_size: ss,
        }
        .into());
    }
    if header.header_crc32 != header_crc32(header_sector, header.header_size as usize) {
        return Err(Rejection::BadHeaderCrc(header.my_lba).into());
    }
    if header.my_lba != offset {
        warn!("header at wrong offset: {} != {}", header.my_lba, offset);
    }

    let entry_size = header.size_of_partition_entry;
    if (entry_size as usize) < GPT_ENTRY_SIZE {
        return Err(Rejection::EntryTooSmall(entry_size).into());
    }
    if u64::from(entry_size) > ss {
        return Err(Rejection::EntryTooLarge {
            entry_size,
            sector_size: ss,
        }
        .into());
    }
    if entry_size as usize > GPT_ENTRY_SIZE {
        return Err(FixError::EntrySizeUnsupported(entry_size));
    }

    if header.first_usable_lba < 3 {
        return Err(Rejection::FirstUsableTooLow(header.first_usable_lba).into());
    }
    if header.last_usable_lba < header.first_usable_lba {
        return Err(Rejection::NoUsableSpace {
            first: header.first_usable_lba,
            last: header.last_usable_lba,
        }
        .into());
    }

    let usable_sectors = if offset != 1 {
        if header.alternate_lba != 1 {
            return Err(Rejection::BackupAlternateNotPrimary(header.alternate_lba).into());
        }
        if header.last_usable_lba >= header.partition_entry_lba {
            return Err(Rejection::UsableOverlapsBackupTable {
                last_usable: header.last_usable_lba,
                entry_lba: header.partition_entry_lba,
            }
            .into());
        }
        if header.partition_entry_lba >= header.my_lba {
            return Err(Rejection::BackupTableAfterHeader {
                entry_lba: header.partition_entry_lba,
                my_lba: header.my_lba,
            }
            .into());
        }
        header.my_lba - header.partition_entry_lba
    } else {
        if header.partition_entry_lba != 2 {
            return Err(Rejection::PrimaryTableMisplaced(header.partition_entry_lba).into());
        }
        if header.last_usable_lba >= header.alternate_lba {
            return Err(Rejection::AlternateOverlapsUsable {
                alternate: header.alternate_lba,
                last_usable: header.last_usable_lba,
            }
            .into());
        }
        if header.alternate_lba >= sectors {
            return Err(FixError::Truncated {
                alternate_lba: header.alternate_lba,
                sectors,
            });
        }
        header.first_usable_lba - header.partition_entry_lba
    };

    if header.number_of_partition_entries < 1 {
        return Err(Rejection::NoPartitionEntries.into());
    }

    let table_bytes = header.partition_table_bytes();
    let available_bytes = usable_sectors.saturating_mul(ss);
    if available_bytes < table_bytes {
        return Err(Rejection::TableDoesNotFit {
            table_bytes,
            available_bytes,
        }
        .into());
    }
    if header.my_lba != 1 && available_bytes - table_bytes >= ss {
        // Odd, but it does not stop the table from being read.
        warn!(
            "backup partition table has too much padding: {:#x} bytes padding, sector size {:#x}",
            available_bytes - table_bytes,
            ss
        );
    }

    if table_bytes > MAX_PARTITION_TABLE_BYTES {
        return Err(FixError::TableTooLarge(table_bytes));
    }

    debug!("partition table is {} bytes long", table_bytes);
    Ok(table_bytes)
}

/// Reads and validates the GPT copy whose header is at sector `offset`,
/// interpreting the disk as having `sectors` sectors of `sector_size` bytes.
pub fn read_and_check_gpt(
    disk: &dyn Disk,
    offset: u64,
    sector_size: SectorSize,
    sectors: u64,
) -> Result<Gpt, FixError> {
    if offset >= sectors {
        return Err(Rejection::OffsetPastEnd { offset, sectors }.into());
    }
    // pMBR, primary header, primary table, usable space, backup table
    if offset != 1 && offset < 5 {
        return Err(Rejection::InvalidOffset(offset).into());
    }

    let ss = sector_size.bytes();
    let header_sector = read_vec(disk, offset * ss, ss as usize)?;
    let table_bytes = check_gpt_header(&header_sector, offset, sector_size, sectors)?;
    let header = RawGptHeader::from_sector(&header_sector);

    let needed = sector_size.round_up(table_bytes);
    let entries = read_vec(disk, header.partition_entry_lba * ss, needed as usize)?;
    if header.partition_entry_array_crc32 != compute_crc32(&entries[..table_bytes as usize]) {
        return Err(Rejection::BadEntryCrc(header.partition_entry_lba).into());
    }

    let mut gpt = Gpt::from_parts(header, entries, sector_size, header.number_of_partition_entries);
    let mut used_entries = 0;
    for (index, entry) in gpt.used() {
        // Together with the last usable check this also bounds the start.
        if entry.starting_lba > entry.ending_lba {
            return Err(Rejection::EntryEndsBeforeStart {
                index,
                starting_lba: entry.starting_lba,
                ending_lba: entry.ending_lba,
            }
            .into());
        }
        if entry.starting_lba < header.first_usable_lba {
            return Err(Rejection::EntryBeforeFirstUsable {
                index,
                starting_lba: entry.starting_lba,
                first_usable: header.first_usable_lba,
            }
            .into());
        }
        if entry.ending_lba > header.last_usable_lba {
            return Err(Rejection::EntryAfterLastUsable {
                index,
                ending_lba: entry.ending_lba,
                last_usable: header.last_usable_lba,
            }
            .into());
        }
        used_entries = index + 1;
    }
    if used_entries == 0 {
        return Err(FixError::NoUsedPartitions);
    }
    gpt.used_entries = used_entries;

    Ok(gpt)
}

/// Builds the header of a well-formed GPT copy.  Checksums are left zero.
pub fn new_header(
    location: CopyLocation,
    sector_size: SectorSize,
    sectors: u64,
    number_of_partition_entries: u32,
    disk_guid: [u8; 16],
) -> RawGptHeader {
    let table_bytes = u64::from(number_of_partition_entries) * GPT_ENTRY_SIZE as u64;
    let table_sectors = sector_size.round_up(table_bytes) / sector_size.bytes();
    let my_lba = location.lba(sectors);
    RawGptHeader {
        signature: GPT_SIGNATURE,
        revision: GPT_REVISION,
        header_size: GPT_HEADER_SIZE as u32,
        header_crc32: 0,
        reserved: 0,
        my_lba,
        alternate_lba: location.other().lba(sectors),
        first_usable_lba: 2 + table_sectors,
        last_usable_lba: sectors - 2 - table_sectors,
        disk_guid,
        partition_entry_lba: match location {
            CopyLocation::Primary => 2,
            CopyLocation::Backup => my_lba - table_sectors,
        },
        number_of_partition_entries,
        size_of_partition_entry: GPT_ENTRY_SIZE as u32,
        partition_entry_array_crc32: 0,
    }
}

impl Gpt {
    /// Creates a GPT copy holding `partitions`, with checksums filled in.
    pub fn new(
        location: CopyLocation,
        sector_size: SectorSize,
        sectors: u64,
        number_of_partition_entries: u32,
        disk_guid: [u8; 16],
        partitions: &[RawGptPartitionEntry],
    ) -> Self {
        assert!(partitions.len() <= number_of_partition_entries as usize);
        let header = new_header(location, sector_size, sectors, number_of_partition_entries, disk_guid);
        let mut entries = vec![0u8; sector_size.round_up(header.partition_table_bytes()) as usize];
        for (slot, partition) in entries.chunks_mut(GPT_ENTRY_SIZE).zip(partitions) {
            partition.write_to(slot);
        }
        let used_entries = partitions
            .iter()
            .rposition(|p| !p.is_unused())
            .map_or(0, |last| last as u32 + 1);
        let mut gpt = Gpt::from_parts(header, entries, sector_size, used_entries);
        gpt.update_crcs();
        gpt
    }
}
