use crate::error::FixError;
use crate::pt::SectorSize;

/// Smallest disk that can hold a pMBR, two headers, two tables and one
/// usable sector.
pub const MIN_SECTORS: u64 = 6;

/// A disk as seen by the GPT code: a logical sector size and a flat byte
/// range.  Reads and writes are positional and either complete or fail.
pub trait Disk {
    fn sector_size(&self) -> SectorSize;

    /// Size in bytes.
    fn size(&self) -> u64;

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), FixError>;

    /// Writes `data` at `offset`.  The data must be durable when this
    /// returns.
    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<(), FixError>;

    /// Called once before the first write.
    fn prepare_for_writing(&mut self) -> Result<(), FixError>;

    /// Asks the kernel to pick up the rewritten partition table.
    fn reload_partition_table(&mut self) -> Result<(), FixError>;
}

/// Checks that the disk can hold a GPT at all and returns its sector count.
pub fn checked_sectors(disk: &dyn Disk) -> Result<u64, FixError> {
    let size = disk.size();
    let sector_size = disk.sector_size().bytes();
    if i64::try_from(size).is_err() {
        return Err(FixError::SizeOverflow(size));
    }
    if size % sector_size != 0 {
        return Err(FixError::SizeNotSectorMultiple { size, sector_size });
    }
    let sectors = size / sector_size;
    if sectors < MIN_SECTORS {
        return Err(FixError::TooFewSectors(sectors));
    }
    Ok(sectors)
}

/// Reads `len` bytes at `offset` into a new buffer.
pub fn read_vec(disk: &dyn Disk, offset: u64, len: usize) -> Result<Vec<u8>, FixError> {
    let mut buf = vec![0u8; len];
    disk.read_at(&mut buf, offset)?;
    Ok(buf)
}
