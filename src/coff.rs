//! COFF File Header structures and parsing.

use crate::reader::Reader;
use crate::{Error, Result};

/// PE signature "PE\0\0".
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";

/// Machine types a DLL export listing is supported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u16)]
pub enum MachineType {
    /// Intel 386 or later.
    I386 = 0x014C,
    /// x64 (AMD64).
    Amd64 = 0x8664,
}

impl MachineType {
    /// Convert from raw u16 value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x014C => Some(Self::I386),
            0x8664 => Some(Self::Amd64),
            _ => None,
        }
    }

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::I386 => "x86",
            Self::Amd64 => "x64",
        }
    }
}

/// Characteristics flags for the COFF header.
pub mod characteristics {
    /// File is executable.
    pub const EXECUTABLE_IMAGE: u16 = 0x0002;
    /// App can handle >2GB addresses.
    pub const LARGE_ADDRESS_AWARE: u16 = 0x0020;
    /// 32-bit word machine.
    pub const MACHINE_32BIT: u16 = 0x0100;
    /// File is a DLL.
    pub const DLL: u16 = 0x2000;
}

/// COFF File Header (IMAGE_FILE_HEADER).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoffHeader {
    /// Target machine type.
    pub machine: u16,
    /// Number of sections.
    pub number_of_sections: u16,
    /// Timestamp (seconds since epoch).
    pub time_date_stamp: u32,
    /// Size of optional header.
    pub size_of_optional_header: u16,
    /// Characteristics flags.
    pub characteristics: u16,
}

impl CoffHeader {
    /// Size of the COFF header in bytes.
    pub const SIZE: usize = 20;

    /// Parse a COFF header from a byte slice.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated("COFF header", 0, Self::SIZE));
        }

        Ok(Self {
            machine: u16::from_le_bytes([data[0], data[1]]),
            number_of_sections: u16::from_le_bytes([data[2], data[3]]),
            time_date_stamp: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            size_of_optional_header: u16::from_le_bytes([data[16], data[17]]),
            characteristics: u16::from_le_bytes([data[18], data[19]]),
        })
    }

    /// Get the machine type as an enum.
    pub fn machine_type(&self) -> Option<MachineType> {
        MachineType::from_u16(self.machine)
    }

    /// Check if the file is a DLL.
    pub fn is_dll(&self) -> bool {
        self.characteristics & characteristics::DLL != 0
    }

    /// Accept only x86/x64 DLLs.
    pub fn validate(&self) -> Result<MachineType> {
        let machine = self
            .machine_type()
            .ok_or(Error::UnsupportedArchitecture(self.machine))?;
        if !self.is_dll() {
            return Err(Error::NotADll {
                characteristics: self.characteristics,
            });
        }
        Ok(machine)
    }

    /// Parse a COFF header from a Reader at the given offset.
    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader
            .read_exact_at(offset, &mut buf)
            .map_err(|e| e.reading("COFF header"))?;
        Self::parse(&buf)
    }
}

/// Verify PE signature at the given offset.
pub fn verify_pe_signature<R: Reader>(reader: &R, offset: u64) -> Result<()> {
    let mut sig = [0u8; 4];
    reader
        .read_exact_at(offset, &mut sig)
        .map_err(|e| e.reading("PE signature"))?;
    if sig != PE_SIGNATURE {
        return Err(Error::InvalidFormat("missing PE signature"));
    }
    Ok(())
}
