//! Bit-exact on-disk layouts.  All multi-byte fields are little endian.

pub const GPT_SIGNATURE: [u8; 8] = *b"EFI PART";
pub const GPT_REVISION: u32 = 0x0001_0000;
pub const GPT_HEADER_SIZE: usize = 92;
pub const GPT_ENTRY_SIZE: usize = 128;
/// Offset of `HeaderCRC32` inside the header.
pub const GPT_HEADER_CRC_OFFSET: usize = 16;

pub const MBR_SIZE: usize = 512;
pub const MBR_RECORD_SIZE: usize = 16;
pub const MBR_RECORDS_OFFSET: usize = 446;
pub const MBR_SIGNATURE_OFFSET: usize = 510;
pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xaa];
pub const MBR_PROTECTIVE_OS_TYPE: u8 = 0xee;
/// Bytes that hold a BIOS Parameter Block on FAT and NTFS volumes.
pub const MBR_BPB_RANGE: std::ops::Range<usize> = 3..14;

pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = crc_any::CRC::crc32();
    crc.digest(data);

    crc.get_crc() as u32
}

fn get<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

fn get_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(get(bytes, offset))
}

fn get_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(get(bytes, offset))
}

fn put(bytes: &mut [u8], offset: usize, value: &[u8]) {
    bytes[offset..offset + value.len()].copy_from_slice(value);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawGptHeader {
    pub signature: [u8; 8],
    pub revision: u32,
    pub header_size: u32,
    pub header_crc32: u32,
    pub reserved: u32,
    pub my_lba: u64,
    pub alternate_lba: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: [u8; 16],
    pub partition_entry_lba: u64,
    pub number_of_partition_entries: u32,
    pub size_of_partition_entry: u32,
    pub partition_entry_array_crc32: u32,
}

impl RawGptHeader {
    pub fn from_bytes(bytes: &[u8; GPT_HEADER_SIZE]) -> Self {
        RawGptHeader {
            signature: get(bytes, 0),
            revision: get_u32(bytes, 8),
            header_size: get_u32(bytes, 12),
            header_crc32: get_u32(bytes, 16),
            reserved: get_u32(bytes, 20),
            my_lba: get_u64(bytes, 24),
            alternate_lba: get_u64(bytes, 32),
            first_usable_lba: get_u64(bytes, 40),
            last_usable_lba: get_u64(bytes, 48),
            disk_guid: get(bytes, 56),
            partition_entry_lba: get_u64(bytes, 72),
            number_of_partition_entries: get_u32(bytes, 80),
            size_of_partition_entry: get_u32(bytes, 84),
            partition_entry_array_crc32: get_u32(bytes, 88),
        }
    }

    /// Decodes the header at the start of a sector.
    pub fn from_sector(sector: &[u8]) -> Self {
        Self::from_bytes(&get(sector, 0))
    }

    pub fn to_bytes(&self) -> [u8; GPT_HEADER_SIZE] {
        let mut bytes = [0u8; GPT_HEADER_SIZE];
        put(&mut bytes, 0, &self.signature);
        put(&mut bytes, 8, &self.revision.to_le_bytes());
        put(&mut bytes, 12, &self.header_size.to_le_bytes());
        put(&mut bytes, 16, &self.header_crc32.to_le_bytes());
        put(&mut bytes, 20, &self.reserved.to_le_bytes());
        put(&mut bytes, 24, &self.my_lba.to_le_bytes());
        put(&mut bytes, 32, &self.alternate_lba.to_le_bytes());
        put(&mut bytes, 40, &self.first_usable_lba.to_le_bytes());
        put(&mut bytes, 48, &self.last_usable_lba.to_le_bytes());
        put(&mut bytes, 56, &self.disk_guid);
        put(&mut bytes, 72, &self.partition_entry_lba.to_le_bytes());
        put(&mut bytes, 80, &self.number_of_partition_entries.to_le_bytes());
        put(&mut bytes, 84, &self.size_of_partition_entry.to_le_bytes());
        put(&mut bytes, 88, &self.partition_entry_array_crc32.to_le_bytes());
        bytes
    }

    /// Size of the entry array as recorded in the header.  Both factors are
    /// 32-bit, so the product cannot wrap.
    pub fn partition_table_bytes(&self) -> u64 {
        u64::from(self.number_of_partition_entries) * u64::from(self.size_of_partition_entry)
    }
}

/// CRC-32 of the first `header_size` bytes of a header sector, computed with
/// the `HeaderCRC32` field treated as zero.
pub fn header_crc32(header_sector: &[u8], header_size: usize) -> u32 {
    let mut covered = header_sector[..header_size].to_vec();
    covered[GPT_HEADER_CRC_OFFSET..GPT_HEADER_CRC_OFFSET + 4].fill(0);
    compute_crc32(&covered)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawGptPartitionEntry {
    pub partition_type_guid: [u8; 16],
    pub unique_partition_guid: [u8; 16],
    pub starting_lba: u64,
    pub ending_lba: u64,
    pub attributes: u64,
    pub partition_name: [u8; 72],
}

impl RawGptPartitionEntry {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        RawGptPartitionEntry {
            partition_type_guid: get(bytes, 0),
            unique_partition_guid: get(bytes, 16),
            starting_lba: get_u64(bytes, 32),
            ending_lba: get_u64(bytes, 40),
            attributes: get_u64(bytes, 48),
            partition_name: get(bytes, 56),
        }
    }

    /// Encodes into the first 128 bytes of `bytes`, leaving any tail alone.
    pub fn write_to(&self, bytes: &mut [u8]) {
        put(bytes, 0, &self.partition_type_guid);
        put(bytes, 16, &self.unique_partition_guid);
        put(bytes, 32, &self.starting_lba.to_le_bytes());
        put(bytes, 40, &self.ending_lba.to_le_bytes());
        put(bytes, 48, &self.attributes.to_le_bytes());
        put(bytes, 56, &self.partition_name);
    }

    pub fn is_unused(&self) -> bool {
        self.partition_type_guid == [0; 16]
    }
}

/// Returns true if the entry encoded at the start of `bytes` is unused,
/// without decoding the rest of it.
pub fn entry_is_unused(bytes: &[u8]) -> bool {
    bytes[..16].iter().all(|&b| b == 0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawMbrPartitionRecord {
    pub boot_indicator: u8,
    pub starting_chs: [u8; 3],
    pub os_type: u8,
    pub ending_chs: [u8; 3],
    pub starting_lba: u32,
    pub size_in_lba: u32,
}

impl RawMbrPartitionRecord {
    pub fn from_bytes(bytes: &[u8; MBR_RECORD_SIZE]) -> Self {
        RawMbrPartitionRecord {
            boot_indicator: bytes[0],
            starting_chs: get(bytes, 1),
            os_type: bytes[4],
            ending_chs: get(bytes, 5),
            starting_lba: get_u32(bytes, 8),
            size_in_lba: get_u32(bytes, 12),
        }
    }

    pub fn to_bytes(&self) -> [u8; MBR_RECORD_SIZE] {
        let mut bytes = [0u8; MBR_RECORD_SIZE];
        bytes[0] = self.boot_indicator;
        put(&mut bytes, 1, &self.starting_chs);
        bytes[4] = self.os_type;
        put(&mut bytes, 5, &self.ending_chs);
        put(&mut bytes, 8, &self.starting_lba.to_le_bytes());
        put(&mut bytes, 12, &self.size_in_lba.to_le_bytes());
        bytes
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Formats a mixed-endian GUID the way partitioning tools print them.
pub fn format_guid(guid: &[u8; 16]) -> String {
    let mut buf = uuid::Uuid::encode_buffer();
    uuid::Uuid::from_bytes_le(*guid)
        .hyphenated()
        .encode_upper(&mut buf)
        .to_owned()
}
