//! Data Directory entries.

use crate::{Error, Result};

/// Index of the export table in the data directory array.
pub const EXPORT_DIRECTORY_INDEX: usize = 0;

/// Number of data directories in a standard optional header.
pub const NUMBER_OF_DIRECTORY_ENTRIES: usize = 16;

/// Data Directory entry (IMAGE_DATA_DIRECTORY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    /// RVA (Relative Virtual Address) of the table.
    pub virtual_address: u32,
    /// Size of the table in bytes.
    pub size: u32,
}

impl DataDirectory {
    /// Size of a data directory entry in bytes.
    pub const SIZE: usize = 8;

    /// Parse a data directory from a byte slice.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated("data directory", 0, Self::SIZE));
        }

        Ok(Self {
            virtual_address: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            size: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
        })
    }

    /// Write the data directory to a byte buffer.
    pub fn write(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < Self::SIZE {
            return Err(Error::truncated("data directory", 0, Self::SIZE));
        }

        buf[0..4].copy_from_slice(&self.virtual_address.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());

        Ok(())
    }

    /// An export table needs both an address and a size.
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }

    /// True if `rva` lies in `[virtual_address, virtual_address + size)`.
    pub fn contains(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address);
        let end = start + u64::from(self.size);
        (start..end).contains(&u64::from(rva))
    }
}
