use tracing::{debug, warn};

use crate::disk::{checked_sectors, Disk, MIN_SECTORS};
use crate::error::{FixError, Rejection};
use crate::pt::gpt::{read_and_check_gpt, CopyLocation, Gpt};
use crate::pt::mbr::{check_mbr, ProtectiveMbr};

pub mod check;
pub mod fix;

pub trait Action<T, E> {
    fn invoke(disk: &mut dyn Disk, args: T) -> Result<(), E>;
}

/// What was found on a disk.
pub struct Inspection {
    /// Sector 0 at the disk's sector size, with its size field corrected.
    pub mbr: ProtectiveMbr,
    pub sectors: u64,
    pub gpt: Gpt,
    /// The copy `gpt` was read from.
    pub location: CopyLocation,
    /// True if `gpt` is only valid at the other sector size.
    pub needs_migration: bool,
}

fn try_copy(
    disk: &dyn Disk,
    location: CopyLocation,
    sector_size: crate::pt::SectorSize,
    sectors: u64,
) -> Result<Option<Gpt>, FixError> {
    match read_and_check_gpt(disk, location.lba(sectors), sector_size, sectors) {
        Ok(gpt) => {
            debug!("found valid {:?} GPT for {}-byte sectors", location, sector_size);
            Ok(Some(gpt))
        }
        Err(FixError::Rejected(Rejection::BadSignature)) => {
            debug!("no {:?} GPT for {}-byte sectors", location, sector_size);
            Ok(None)
        }
        Err(e) if e.is_recoverable() => {
            warn!("{:?} GPT for {}-byte sectors: {}", location, sector_size, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Checks the protective MBR and finds a valid GPT, first at the disk's own
/// sector size and then at the other supported one.
pub fn inspect(disk: &dyn Disk, skip_bpb_check: bool) -> Result<Inspection, FixError> {
    let sectors = checked_sectors(disk)?;
    let sector_size = disk.sector_size();

    let mut mbr = ProtectiveMbr::read(disk)?;
    check_mbr(&mut mbr, sectors, skip_bpb_check)?;
    debug!(
        "sector size is {}, device size is {:#x}, {:#x} sectors",
        sector_size,
        disk.size(),
        sectors
    );

    for location in [CopyLocation::Primary, CopyLocation::Backup] {
        if let Some(gpt) = try_copy(disk, location, sector_size, sectors)? {
            return Ok(Inspection {
                mbr,
                sectors,
                gpt,
                location,
                needs_migration: false,
            });
        }
    }

    if disk.size() % 4096 != 0 {
        return Err(FixError::SizeNotMultipleOf4096(disk.size()));
    }
    let old_sector_size = sector_size.other();
    let old_sectors = disk.size() / old_sector_size.bytes();
    if old_sectors < MIN_SECTORS {
        debug!("too small for a GPT with {}-byte sectors", old_sector_size);
        return Err(FixError::NoValidGpt);
    }
    for location in [CopyLocation::Primary, CopyLocation::Backup] {
        if let Some(gpt) = try_copy(disk, location, old_sector_size, old_sectors)? {
            return Ok(Inspection {
                mbr,
                sectors,
                gpt,
                location,
                needs_migration: true,
            });
        }
    }

    Err(FixError::NoValidGpt)
}
