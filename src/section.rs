//! Section table records.

use crate::reader::Reader;
use crate::{Error, Result};

/// The parts of a section header (IMAGE_SECTION_HEADER) used to map the
/// section into the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRecord {
    /// Section name (8-byte null-padded ASCII).
    pub name: [u8; 8],
    /// RVA of the section.
    pub virtual_address: u32,
    /// Size of raw data on disk.
    pub size_of_raw_data: u32,
    /// File offset to raw data.
    pub pointer_to_raw_data: u32,
}

impl SectionRecord {
    /// Size of a section header in bytes.
    pub const SIZE: usize = 40;

    /// Parse a section header from a byte slice.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated("section header", 0, Self::SIZE));
        }

        let mut name = [0u8; 8];
        name.copy_from_slice(&data[0..8]);

        Ok(Self {
            name,
            virtual_address: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            size_of_raw_data: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            pointer_to_raw_data: u32::from_le_bytes([data[20], data[21], data[22], data[23]]),
        })
    }

    /// Get the section name as a string (trimmed of null bytes).
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// One past the last RVA the raw data is copied to.
    pub fn raw_end(&self) -> u64 {
        u64::from(self.virtual_address) + u64::from(self.size_of_raw_data)
    }

    /// Read `count` consecutive section headers from a Reader.
    pub fn read_table<R: Reader>(reader: &R, offset: u64, count: usize) -> Result<Vec<Self>> {
        let table = reader
            .read_bytes_at(offset, count * Self::SIZE)
            .map_err(|e| e.reading("section table"))?;
        table.chunks_exact(Self::SIZE).map(Self::parse).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SliceReader;

    fn header_bytes(name: &[u8], va: u32, raw_size: u32, raw_ptr: u32) -> [u8; 40] {
        let mut buf = [0u8; 40];
        buf[..name.len()].copy_from_slice(name);
        buf[8..12].copy_from_slice(&raw_size.to_le_bytes());
        buf[12..16].copy_from_slice(&va.to_le_bytes());
        buf[16..20].copy_from_slice(&raw_size.to_le_bytes());
        buf[20..24].copy_from_slice(&raw_ptr.to_le_bytes());
        buf
    }

    #[test]
    fn test_section_header_size() {
        assert_eq!(SectionRecord::SIZE, 40);
    }

    #[test]
    fn test_section_record_parse() {
        let buf = header_bytes(b".edata", 0x2000, 0x200, 0x600);
        let record = SectionRecord::parse(&buf).unwrap();
        assert_eq!(record.name_str(), ".edata");
        assert_eq!(record.virtual_address, 0x2000);
        assert_eq!(record.size_of_raw_data, 0x200);
        assert_eq!(record.pointer_to_raw_data, 0x600);
        assert_eq!(record.raw_end(), 0x2200);
    }

    #[test]
    fn test_full_length_name() {
        let buf = header_bytes(b".textbss", 0x1000, 0, 0);
        let record = SectionRecord::parse(&buf).unwrap();
        assert_eq!(record.name_str(), ".textbss");
    }

    #[test]
    fn test_read_table() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&header_bytes(b".text", 0x1000, 0x200, 0x400));
        data.extend_from_slice(&header_bytes(b".rdata", 0x2000, 0x400, 0x600));

        let reader = SliceReader::new(&data);
        let records = SectionRecord::read_table(&reader, 8, 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name_str(), ".rdata");

        let result = SectionRecord::read_table(&reader, 8, 3);
        assert!(matches!(
            result,
            Err(Error::UnexpectedEndOfData {
                what: "section table",
                ..
            })
        ));
    }
}
