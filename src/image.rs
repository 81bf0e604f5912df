use std::{
    fs::{File, OpenOptions},
    path::Path,
};

use memmap::{Mmap, MmapMut};
use tracing::debug;

use crate::disk::Disk;
use crate::error::FixError;
use crate::pt::SectorSize;

/// Error while opening a disk image.
#[derive(Debug, displaydoc::Display, thiserror::Error)]
pub enum ImageError {
    /// Unable to open image file: {0}
    OpenError(#[source] std::io::Error),
    /// Unable to map image file: {0}
    MapError(#[source] std::io::Error),
}

/// A disk image file presented as a disk with a chosen logical sector size.
///
/// This is how a disk looks after being attached through a loop device or
/// virtual disk with a different sector size than the one it was
/// partitioned with.
pub struct Image {
    mem: MmapMut,
    sector_size: SectorSize,
}

impl Image {
    pub fn from_file(file: File, sector_size: SectorSize) -> Result<Self, ImageError> {
        let mem = unsafe { Mmap::map(&file).map_err(ImageError::MapError)? }
            .make_mut()
            .map_err(ImageError::MapError)?;

        Ok(Image { mem, sector_size })
    }

    pub fn open<P>(path: P, sector_size: SectorSize) -> Result<Self, ImageError>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(false)
            .truncate(false)
            .append(false)
            .open(path)
            .map_err(ImageError::OpenError)?;

        Self::from_file(file, sector_size)
    }

    fn range(&self, offset: u64, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.mem.len()).then(|| start..end)
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }
}

impl Disk for Image {
    fn sector_size(&self) -> SectorSize {
        self.sector_size
    }

    fn size(&self) -> u64 {
        self.mem.len() as u64
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), FixError> {
        let range = self.range(offset, buf.len()).ok_or(FixError::ShortRead {
            offset,
            expected: buf.len(),
            actual: self.mem.len().saturating_sub(offset as usize).min(buf.len()),
        })?;
        buf.copy_from_slice(&self.mem[range]);
        Ok(())
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<(), FixError> {
        let range = self.range(offset, data.len()).ok_or(FixError::ShortWrite {
            offset,
            expected: data.len(),
            actual: 0,
        })?;
        let start = range.start;
        self.mem[range].copy_from_slice(data);
        self.mem
            .flush_range(start, data.len())
            .map_err(|e| FixError::io("flushing image", e))
    }

    fn prepare_for_writing(&mut self) -> Result<(), FixError> {
        Ok(())
    }

    fn reload_partition_table(&mut self) -> Result<(), FixError> {
        debug!("disk image has no kernel partition table to reload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn image_with(contents: &[u8]) -> (tempfile::NamedTempFile, Image) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        let image = Image::open(file.path(), SectorSize::Small).unwrap();
        (file, image)
    }

    #[test]
    fn test_read_and_write() {
        let (file, mut image) = image_with(&[0u8; 4096]);
        assert_eq!(image.size(), 4096);
        assert_eq!(image.sector_size(), SectorSize::Small);

        image.write_at(b"abc", 510).unwrap();
        let mut buf = [0u8; 4];
        image.read_at(&mut buf, 509).unwrap();
        assert_eq!(&buf, b"\0abc");

        let on_disk = std::fs::read(file.path()).unwrap();
        assert_eq!(&on_disk[510..513], b"abc");
    }

    #[test]
    fn test_out_of_bounds() {
        let (_file, mut image) = image_with(&[0u8; 1024]);
        let mut buf = [0u8; 16];
        assert!(matches!(
            image.read_at(&mut buf, 1020),
            Err(FixError::ShortRead { expected: 16, actual: 4, .. })
        ));
        assert!(matches!(image.write_at(&buf, u64::MAX), Err(FixError::ShortWrite { .. })));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Image::open("/nonexistent/disk.img", SectorSize::Large),
            Err(ImageError::OpenError(_))
        ));
    }
}
