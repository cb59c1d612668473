//! Image mapper: places section bytes at their virtual addresses.

use crate::config::DecoderConfig;
use crate::reader::Reader;
use crate::section::SectionRecord;
use crate::{Error, Result};
use tracing::trace;

/// A flat, RVA-addressable copy of a PE image.
///
/// Built the way the loader would lay the sections out in memory, but never
/// relocated or executed. Bytes not covered by any section stay zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    data: Vec<u8>,
}

impl RawImage {
    /// Allocate `size_of_image` zero bytes and copy each section's raw data
    /// from the reader to its virtual address.
    pub fn map<R: Reader>(
        reader: &R,
        sections: &[SectionRecord],
        size_of_image: u32,
        config: &DecoderConfig,
    ) -> Result<Self> {
        if size_of_image > config.max_image_size {
            return Err(Error::ImageTooLarge {
                size_of_image,
                limit: config.max_image_size,
            });
        }

        let mut data = vec![0u8; size_of_image as usize];

        for section in sections {
            if section.size_of_raw_data == 0 {
                continue;
            }
            if section.raw_end() > u64::from(size_of_image) {
                return Err(Error::CorruptSectionLayout {
                    section: section.name_str(),
                    virtual_address: section.virtual_address,
                    raw_size: section.size_of_raw_data,
                    size_of_image,
                });
            }

            trace!(
                section = %section.name_str(),
                rva = section.virtual_address,
                file_offset = section.pointer_to_raw_data,
                len = section.size_of_raw_data,
                "mapping section"
            );

            let start = section.virtual_address as usize;
            let end = start + section.size_of_raw_data as usize;
            reader
                .read_exact_at(u64::from(section.pointer_to_raw_data), &mut data[start..end])
                .map_err(|e| e.reading("section data"))?;
        }

        Ok(Self { data })
    }

    /// Wrap bytes that are already laid out by RVA.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Borrow `len` bytes at `rva`.
    pub fn bytes_at(&self, rva: u32, len: usize, what: &'static str) -> Result<&[u8]> {
        let start = rva as usize;
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| Error::truncated(what, u64::from(rva), len))
    }

    /// Read a u16 at the given RVA (little-endian).
    pub fn read_u16(&self, rva: u32, what: &'static str) -> Result<u16> {
        let b = self.bytes_at(rva, 2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a u32 at the given RVA (little-endian).
    pub fn read_u32(&self, rva: u32, what: &'static str) -> Result<u32> {
        let b = self.bytes_at(rva, 4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a NUL-terminated single-byte string at `rva`.
    ///
    /// The end of the image counts as a terminator, so corrupt input can
    /// never make this fail or run away. Each byte maps to the char of the
    /// same value.
    pub fn read_cstr(&self, rva: u32) -> String {
        let tail = self.data.get(rva as usize..).unwrap_or_default();
        tail.iter()
            .take_while(|&&b| b != 0)
            .map(|&b| char::from(b))
            .collect()
    }
}
