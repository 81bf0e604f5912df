use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

pub mod gpt;
pub mod mbr;
pub mod migrate;
pub mod raw;

/// Logical sector sizes the tool knows how to handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
pub enum SectorSize {
    Small = 512,
    Large = 4096,
}

impl SectorSize {
    pub fn new(bytes: u64) -> Option<Self> {
        Self::from_u64(bytes)
    }

    pub fn bytes(self) -> u64 {
        self as u64
    }

    /// The sector size a disk had before a 512 <-> 4096 switch.
    pub fn other(self) -> Self {
        match self {
            SectorSize::Small => SectorSize::Large,
            SectorSize::Large => SectorSize::Small,
        }
    }

    /// Rounds `value` up to a whole number of sectors, in bytes.
    pub fn round_up(self, value: u64) -> u64 {
        let mask = self.bytes() - 1;
        match value.checked_add(mask) {
            Some(sum) => sum & !mask,
            None => panic!("arithmetic overflow rounding {:#x} to {} bytes", value, self.bytes()),
        }
    }
}

impl std::fmt::Display for SectorSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bytes())
    }
}
