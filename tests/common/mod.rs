#![allow(dead_code)]

use qubes_pure::disk::Disk;
use qubes_pure::image::Image;
use qubes_pure::pt::gpt::{CopyLocation, Gpt};
use qubes_pure::pt::mbr::ProtectiveMbr;
use qubes_pure::pt::raw::RawGptPartitionEntry;
use qubes_pure::pt::SectorSize;
use tempfile::NamedTempFile;

/// 8 MiB, in 512-byte sectors.
pub const SMALL_SECTORS: u64 = 16384;
/// 8 MiB, in 4096-byte sectors.
pub const LARGE_SECTORS: u64 = 2048;
pub const DISK_BYTES: u64 = SMALL_SECTORS * 512;

pub const DISK_GUID: [u8; 16] = [0x5a; 16];

pub fn partition(type_byte: u8, start: u64, end: u64) -> RawGptPartitionEntry {
    RawGptPartitionEntry {
        partition_type_guid: [type_byte; 16],
        unique_partition_guid: [type_byte ^ 0xff; 16],
        starting_lba: start,
        ending_lba: end,
        attributes: 0,
        partition_name: [0; 72],
    }
}

/// Two partitions on 4096-byte boundaries, in 512-byte sectors.
pub fn aligned_partitions() -> Vec<RawGptPartitionEntry> {
    vec![partition(0x11, 2048, 4095), partition(0x22, 4096, 16343)]
}

pub fn write_gpt(disk: &mut dyn Disk, gpt: &Gpt) {
    let ss = gpt.sector_size().bytes();
    let header = gpt.header();
    disk.write_at(gpt.entries_bytes(), header.partition_entry_lba * ss)
        .unwrap();
    disk.write_at(&gpt.header_sector(), header.my_lba * ss).unwrap();
}

/// An image file holding a protective MBR and both GPT copies laid out for
/// `sector_size`.
pub fn partitioned_image(
    sector_size: SectorSize,
    partitions: &[RawGptPartitionEntry],
) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    file.as_file().set_len(DISK_BYTES).unwrap();
    let sectors = DISK_BYTES / sector_size.bytes();

    let mut image = Image::open(file.path(), sector_size).unwrap();
    let mbr = ProtectiveMbr::new_protective(sector_size, sectors);
    image.write_at(mbr.as_bytes(), 0).unwrap();
    for location in [CopyLocation::Primary, CopyLocation::Backup] {
        let gpt = Gpt::new(location, sector_size, sectors, 128, DISK_GUID, partitions);
        write_gpt(&mut image, &gpt);
    }
    file
}

/// An image file of `bytes` bytes holding only a protective MBR.
pub fn protective_only_image(sector_size: SectorSize, bytes: u64) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    file.as_file().set_len(bytes).unwrap();
    let mut image = Image::open(file.path(), sector_size).unwrap();
    let mbr = ProtectiveMbr::new_protective(sector_size, bytes / sector_size.bytes());
    image.write_at(mbr.as_bytes(), 0).unwrap();
    file
}

pub fn open(file: &NamedTempFile, sector_size: SectorSize) -> Image {
    Image::open(file.path(), sector_size).unwrap()
}

pub fn read_bytes(disk: &dyn Disk, offset: u64, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    disk.read_at(&mut buf, offset).unwrap();
    buf
}
