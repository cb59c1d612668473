//! Optional Header layouts and parsing.
//!
//! PE32 and PE32+ differ in the width of a few fields, which moves every
//! field after `SizeOfHeapCommit` by 16 bytes. Instead of branching on the
//! magic at each read, the two layouts are described by [`OptionalLayout`]
//! tables and all offsets are looked up from the selected table.

use crate::data_dir::{DataDirectory, EXPORT_DIRECTORY_INDEX};
use crate::{Error, Result};

/// PE32 magic number.
pub const PE32_MAGIC: u16 = 0x10B;
/// PE32+ (64-bit) magic number.
pub const PE32PLUS_MAGIC: u16 = 0x20B;

/// Address width of the image, selected by the optional header magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ImageWidth {
    /// PE32, 32-bit addresses.
    Pe32,
    /// PE32+, 64-bit addresses.
    Pe32Plus,
}

impl ImageWidth {
    /// Determine the width from the optional header magic.
    pub fn from_magic(magic: u16) -> Option<Self> {
        match magic {
            PE32_MAGIC => Some(Self::Pe32),
            PE32PLUS_MAGIC => Some(Self::Pe32Plus),
            _ => None,
        }
    }

    pub const fn magic(self) -> u16 {
        match self {
            Self::Pe32 => PE32_MAGIC,
            Self::Pe32Plus => PE32PLUS_MAGIC,
        }
    }

    pub const fn layout(self) -> &'static OptionalLayout {
        match self {
            Self::Pe32 => &OptionalLayout::PE32,
            Self::Pe32Plus => &OptionalLayout::PE32_PLUS,
        }
    }

    pub const fn is_64bit(self) -> bool {
        matches!(self, Self::Pe32Plus)
    }
}

/// Field offsets within the optional header for one architecture width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalLayout {
    /// Offset of `SizeOfImage`.
    pub size_of_image: usize,
    /// Offset of `NumberOfRvaAndSizes`.
    pub number_of_rva_and_sizes: usize,
    /// Offset of the data directory array.
    pub data_directory: usize,
}

impl OptionalLayout {
    /// IMAGE_OPTIONAL_HEADER32.
    pub const PE32: Self = Self {
        size_of_image: 56,
        number_of_rva_and_sizes: 92,
        data_directory: 96,
    };

    /// IMAGE_OPTIONAL_HEADER64. No `BaseOfData`, and `ImageBase` plus the
    /// four stack/heap sizes are 8 bytes wide.
    pub const PE32_PLUS: Self = Self {
        size_of_image: 56,
        number_of_rva_and_sizes: 108,
        data_directory: 112,
    };

    /// Offset of data directory entry `index`.
    pub const fn directory_offset(&self, index: usize) -> usize {
        self.data_directory + index * DataDirectory::SIZE
    }
}

/// The optional header fields the export decoder consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalHeader {
    pub width: ImageWidth,
    pub size_of_image: u32,
    pub number_of_rva_and_sizes: u32,
    /// Offset of the data directory array within the optional header.
    pub data_directory_base: usize,
    /// Export table entry, `None` when the header declares no such entry.
    pub export: Option<DataDirectory>,
}

impl OptionalHeader {
    /// Parse from the `SizeOfOptionalHeader` bytes that follow the COFF
    /// header. `file_offset` is where those bytes start and only feeds error
    /// context.
    pub fn parse(data: &[u8], file_offset: u64) -> Result<Self> {
        let magic = read_u16(data, 0, file_offset, "optional header magic")?;
        let width = ImageWidth::from_magic(magic)
            .ok_or(Error::InvalidFormat("unknown optional header magic"))?;
        let layout = width.layout();

        let size_of_image = read_u32(data, layout.size_of_image, file_offset, "SizeOfImage")?;
        let number_of_rva_and_sizes = read_u32(
            data,
            layout.number_of_rva_and_sizes,
            file_offset,
            "NumberOfRvaAndSizes",
        )?;

        let export_offset = layout.directory_offset(EXPORT_DIRECTORY_INDEX);
        let export = if (number_of_rva_and_sizes as usize) > EXPORT_DIRECTORY_INDEX
            && data.len() >= export_offset + DataDirectory::SIZE
        {
            Some(DataDirectory::parse(&data[export_offset..])?)
        } else {
            None
        };

        Ok(Self {
            width,
            size_of_image,
            number_of_rva_and_sizes,
            data_directory_base: layout.data_directory,
            export,
        })
    }

    pub fn is_64bit(&self) -> bool {
        self.width.is_64bit()
    }
}

fn read_u16(data: &[u8], offset: usize, base: u64, what: &'static str) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| Error::truncated(what, base + offset as u64, 2))
}

fn read_u32(data: &[u8], offset: usize, base: u64, what: &'static str) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::truncated(what, base + offset as u64, 4))
}
