//! Header reader: DOS stub, PE signature, COFF header, optional header and
//! section table.

use crate::coff::{verify_pe_signature, CoffHeader, MachineType};
use crate::data_dir::DataDirectory;
use crate::dos::DosHeader;
use crate::optional::{ImageWidth, OptionalHeader};
use crate::reader::{FileReader, Reader, SliceReader};
use crate::section::SectionRecord;
use crate::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Everything the image mapper and export walker need from the headers of
/// a DLL that has an export table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeHeaders {
    /// Offset where the PE signature was found.
    pub pe_offset: u64,
    pub machine: MachineType,
    pub characteristics: u16,
    pub width: ImageWidth,
    pub size_of_image: u32,
    /// Offset of the data directory array within the optional header.
    pub data_directory_base: usize,
    /// Export table data directory entry, always present.
    pub export: DataDirectory,
    pub sections: Vec<SectionRecord>,
}

impl PeHeaders {
    /// Read and validate the headers from any Reader implementation.
    pub fn read_from<R: Reader>(reader: &R) -> Result<Self> {
        if reader.size() == Some(0) {
            return Err(Error::EmptyFile);
        }

        let dos_header = DosHeader::read_from(reader)?;
        let pe_offset = u64::from(dos_header.e_lfanew);
        verify_pe_signature(reader, pe_offset)?;

        // COFF header follows the 4-byte signature
        let coff_offset = pe_offset + 4;
        let coff_header = CoffHeader::read_from(reader, coff_offset)?;
        let machine = coff_header.validate()?;

        let optional_offset = coff_offset + CoffHeader::SIZE as u64;
        let optional_bytes = reader
            .read_bytes_at(
                optional_offset,
                coff_header.size_of_optional_header as usize,
            )
            .map_err(|e| e.reading("optional header"))?;
        let optional_header = OptionalHeader::parse(&optional_bytes, optional_offset)?;

        debug!(
            machine = machine.name(),
            pe32_plus = optional_header.is_64bit(),
            size_of_image = optional_header.size_of_image,
            directories = optional_header.number_of_rva_and_sizes,
            "parsed PE headers"
        );

        let export = optional_header
            .export
            .filter(DataDirectory::is_present)
            .ok_or(Error::NoExportTable)?;

        let sections_offset = optional_offset + u64::from(coff_header.size_of_optional_header);
        let sections = SectionRecord::read_table(
            reader,
            sections_offset,
            coff_header.number_of_sections as usize,
        )?;

        Ok(Self {
            pe_offset,
            machine,
            characteristics: coff_header.characteristics,
            width: optional_header.width,
            size_of_image: optional_header.size_of_image,
            data_directory_base: optional_header.data_directory_base,
            export,
            sections,
        })
    }

    /// Read headers from a file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = FileReader::open(path)?;
        Self::read_from(&reader)
    }

    /// Read headers from a byte slice.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let reader = SliceReader::new(data);
        Self::read_from(&reader)
    }

    /// Check if this is a 64-bit PE.
    pub fn is_64bit(&self) -> bool {
        self.width.is_64bit()
    }
}
