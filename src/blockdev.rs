use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;

use humansize::{format_size, BINARY};
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg, OFlag};
use nix::libc::c_int;
use nix::sys::stat::{major, minor};
use nix::sys::uio::{pread, pwrite};
use nix::unistd::fsync;
use tracing::{debug, info};

use crate::disk::Disk;
use crate::error::FixError;
use crate::pt::SectorSize;

/// A whole-disk Linux block device, locked for the lifetime of the value.
///
/// The device is opened read-only.  A second, synchronous read-write handle
/// is only opened by [`Disk::prepare_for_writing`].
pub struct BlockDevice {
    path: String,
    file: File,
    writer: Option<File>,
    sector_size: SectorSize,
    size: u64,
}

impl BlockDevice {
    pub fn open(path: &str) -> Result<Self, FixError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NOCTTY.bits())
            .open(path)
            .map_err(|source| FixError::Open {
                path: path.to_owned(),
                source,
            })?;

        let metadata = file.metadata().map_err(|e| FixError::io("reading device metadata", e))?;
        if !metadata.file_type().is_block_device() {
            return Err(FixError::NotBlockDevice(path.to_owned()));
        }
        check_whole_disk(path, metadata.rdev())?;

        // Keeps udev and concurrent runs away until we exit.
        flock(file.as_raw_fd(), FlockArg::LockExclusive).map_err(FixError::Lock)?;

        let raw_sector_size = get_sector_size(&file)?;
        let sector_size =
            SectorSize::new(raw_sector_size).ok_or(FixError::UnsupportedSectorSize(raw_sector_size))?;
        let size = get_size(&file)?;

        // Make sure the page cache agrees with the device before reading.
        fsync(file.as_raw_fd()).map_err(|e| FixError::io("syncing device", e))?;

        info!(
            "{}: sector size {}, size {} ({:#x} bytes)",
            path,
            sector_size,
            format_size(size, BINARY),
            size
        );

        Ok(BlockDevice {
            path: path.to_owned(),
            file,
            writer: None,
            sector_size,
            size,
        })
    }
}

/// There is no ioctl telling whether a device is a partition, so ask sysfs.
fn check_whole_disk(path: &str, rdev: u64) -> Result<(), FixError> {
    let attribute = format!("/sys/dev/block/{}:{}/partition", major(rdev), minor(rdev));
    match std::fs::symlink_metadata(&attribute) {
        Ok(m) if m.file_type().is_file() => Err(FixError::IsPartition(path.to_owned())),
        Ok(_) => Err(FixError::BadSysfsEntry(attribute)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FixError::PartitionCheck {
            path: attribute,
            source,
        }),
    }
}

fn get_sector_size(file: &File) -> Result<u64, FixError> {
    let mut size: c_int = 0;
    unsafe { ioctl::blksszget(file.as_raw_fd(), &mut size) }
        .map_err(|e| FixError::io("getting sector size", e))?;
    u64::try_from(size).map_err(|_| FixError::UnsupportedSectorSize(0))
}

fn get_size(file: &File) -> Result<u64, FixError> {
    let mut size: u64 = 0;
    unsafe { ioctl::blkgetsize64(file.as_raw_fd(), &mut size) }
        .map_err(|e| FixError::io("getting device size", e))?;
    Ok(size)
}

impl Disk for BlockDevice {
    fn sector_size(&self) -> SectorSize {
        self.sector_size
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), FixError> {
        let off = i64::try_from(offset).map_err(|_| FixError::SizeOverflow(offset))?;
        let actual = pread(self.file.as_raw_fd(), buf, off).map_err(|e| FixError::io("reading device", e))?;
        if actual != buf.len() {
            return Err(FixError::ShortRead {
                offset,
                expected: buf.len(),
                actual,
            });
        }
        Ok(())
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<(), FixError> {
        let writer = self.writer.as_ref().ok_or(FixError::ReadOnly)?;
        let off = i64::try_from(offset).map_err(|_| FixError::SizeOverflow(offset))?;
        let actual = pwrite(writer.as_raw_fd(), data, off).map_err(|e| FixError::io("writing device", e))?;
        if actual != data.len() {
            return Err(FixError::ShortWrite {
                offset,
                expected: data.len(),
                actual,
            });
        }
        Ok(())
    }

    fn prepare_for_writing(&mut self) -> Result<(), FixError> {
        if self.writer.is_some() {
            return Ok(());
        }
        // Reopening through /proc keeps us on the very device we locked,
        // even if the path was replaced in the meantime.
        let reopen = format!("/proc/self/fd/{}", self.file.as_raw_fd());
        let writer = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags((OFlag::O_SYNC | OFlag::O_EXCL | OFlag::O_NOCTTY).bits())
            .open(&reopen)
            .map_err(FixError::Reopen)?;
        debug!("reopened {} for synchronous writing", self.path);
        self.writer = Some(writer);
        Ok(())
    }

    fn reload_partition_table(&mut self) -> Result<(), FixError> {
        let fd = self.writer.as_ref().unwrap_or(&self.file).as_raw_fd();
        match unsafe { ioctl::blkrrpart(fd) } {
            Ok(_) => Ok(()),
            Err(Errno::EINVAL) => {
                debug!("{} does not support partitions, not reloading", self.path);
                Ok(())
            }
            Err(e) => Err(FixError::ReloadPartitionTable(e)),
        }
    }
}

// create unsafe ioctl wrappers
#[allow(clippy::missing_safety_doc)]
mod ioctl {
    use nix::libc::c_int;
    use nix::{ioctl_none, ioctl_read, ioctl_read_bad, request_code_none};
    ioctl_none!(blkrrpart, 0x12, 95);
    ioctl_read_bad!(blksszget, request_code_none!(0x12, 104), c_int);
    ioctl_read!(blkgetsize64, 0x12, 114, u64);
}
