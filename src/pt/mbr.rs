use tracing::{debug, warn};

use super::raw::{
    RawMbrPartitionRecord, MBR_BPB_RANGE, MBR_PROTECTIVE_OS_TYPE, MBR_RECORDS_OFFSET, MBR_RECORD_SIZE,
    MBR_SIGNATURE, MBR_SIGNATURE_OFFSET, MBR_SIZE,
};
use super::SectorSize;
use crate::disk::Disk;
use crate::error::FixError;

/// Sector 0 of a GPT disk.
///
/// The buffer is one logical sector long.  Only the first 512 bytes are the
/// MBR; the rest is kept zeroed so that writing the whole sector blanks
/// anything that used to live there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectiveMbr {
    sector: Vec<u8>,
}

/// Value of `size_in_lba` covering the whole disk, saturated to 32 bits.
pub fn expected_size_in_lba(sectors: u64) -> u32 {
    u32::try_from(sectors - 1).unwrap_or(u32::MAX)
}

impl ProtectiveMbr {
    /// A fresh protective MBR for a disk of `sectors` sectors.
    pub fn new_protective(sector_size: SectorSize, sectors: u64) -> Self {
        let mut mbr = ProtectiveMbr {
            sector: vec![0; sector_size.bytes() as usize],
        };
        mbr.set_record(
            0,
            RawMbrPartitionRecord {
                boot_indicator: 0,
                starting_chs: [0x00, 0x02, 0x00],
                os_type: MBR_PROTECTIVE_OS_TYPE,
                ending_chs: [0xff, 0xff, 0xff],
                starting_lba: 1,
                size_in_lba: expected_size_in_lba(sectors),
            },
        );
        mbr.sector[MBR_SIGNATURE_OFFSET..MBR_SIZE].copy_from_slice(&MBR_SIGNATURE);
        mbr
    }

    pub fn from_sector(mut sector: Vec<u8>) -> Self {
        assert!(sector.len() >= MBR_SIZE, "MBR sector of {} bytes", sector.len());
        sector[MBR_SIZE..].fill(0);
        ProtectiveMbr { sector }
    }

    pub fn read(disk: &dyn Disk) -> Result<Self, FixError> {
        let sector = crate::disk::read_vec(disk, 0, disk.sector_size().bytes() as usize)?;
        Ok(Self::from_sector(sector))
    }

    pub fn signature(&self) -> [u8; 2] {
        [self.sector[MBR_SIGNATURE_OFFSET], self.sector[MBR_SIGNATURE_OFFSET + 1]]
    }

    pub fn record(&self, index: usize) -> RawMbrPartitionRecord {
        let offset = MBR_RECORDS_OFFSET + index * MBR_RECORD_SIZE;
        let mut bytes = [0u8; MBR_RECORD_SIZE];
        bytes.copy_from_slice(&self.sector[offset..offset + MBR_RECORD_SIZE]);
        RawMbrPartitionRecord::from_bytes(&bytes)
    }

    pub fn set_record(&mut self, index: usize, record: RawMbrPartitionRecord) {
        let offset = MBR_RECORDS_OFFSET + index * MBR_RECORD_SIZE;
        self.sector[offset..offset + MBR_RECORD_SIZE].copy_from_slice(&record.to_bytes());
    }

    /// The whole sector, as it is written back to disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.sector
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.sector
    }
}

/// Checks that `mbr` is a genuine protective MBR for a disk of `sectors`
/// sectors, and corrects a stale size field.
pub fn check_mbr(mbr: &mut ProtectiveMbr, sectors: u64, skip_bpb_check: bool) -> Result<(), FixError> {
    let signature = mbr.signature();
    if signature != MBR_SIGNATURE {
        return Err(FixError::BadMbrSignature(signature[0], signature[1]));
    }

    let mut first = mbr.record(0);
    if first.os_type != MBR_PROTECTIVE_OS_TYPE {
        return Err(FixError::MbrNotProtective(first.os_type));
    }
    for index in 1..4 {
        if !mbr.record(index).is_zero() {
            return Err(FixError::MbrRecordNotZero(index + 1));
        }
    }
    if first.starting_lba != 1 {
        return Err(FixError::MbrBadStartingLba(first.starting_lba));
    }

    if skip_bpb_check {
        warn!("not checking for a BIOS Parameter Block");
    } else if mbr.sector[MBR_BPB_RANGE].iter().any(|&b| b != 0) {
        return Err(FixError::BpbPresent);
    }

    let expected = expected_size_in_lba(sectors);
    if first.size_in_lba != expected {
        debug!(
            "protective MBR does not cover whole disk: size in LBA is {}, expected {}",
            first.size_in_lba, expected
        );
        first.size_in_lba = expected;
        mbr.set_record(0, first);
    }

    Ok(())
}
