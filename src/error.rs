//! Error types for DLL export decoding.

use thiserror::Error;

/// Result type alias for dllexports operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort a decode.
///
/// Every variant is fatal to the decode that produced it. `NoExportTable` is
/// the exception in spirit: it marks a well-formed DLL that exports nothing,
/// see [`Error::is_no_exports`].
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while opening or reading the input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input has zero length.
    #[error("DLL file is empty")]
    EmptyFile,

    /// Missing DOS stub, PE signature, or an unknown optional header magic.
    #[error("Invalid format: {0}")]
    InvalidFormat(&'static str),

    /// Machine type other than x86 or x64.
    #[error("Unsupported architecture: machine type {0:#06x}")]
    UnsupportedArchitecture(u16),

    /// COFF characteristics lack the DLL flag.
    #[error("Not a DLL (characteristics {characteristics:#06x})")]
    NotADll { characteristics: u16 },

    /// The data directory has no export entry.
    #[error("No export table")]
    NoExportTable,

    /// A section would be copied past the end of the image buffer.
    #[error(
        "Corrupt section layout: section '{section}' at {virtual_address:#x} with {raw_size:#x} raw bytes exceeds image size {size_of_image:#x}"
    )]
    CorruptSectionLayout {
        section: String,
        virtual_address: u32,
        raw_size: u32,
        size_of_image: u32,
    },

    /// A read ran past the end of the input or the mapped image.
    #[error("Unexpected end of data reading {what}: {len} bytes at {offset:#x}")]
    UnexpectedEndOfData {
        what: &'static str,
        offset: u64,
        len: usize,
    },

    /// `SizeOfImage` is larger than the configured limit.
    #[error("Image size {size_of_image:#x} exceeds limit {limit:#x}")]
    ImageTooLarge { size_of_image: u32, limit: u32 },
}

impl Error {
    /// Create an UnexpectedEndOfData error.
    pub fn truncated(what: &'static str, offset: u64, len: usize) -> Self {
        Error::UnexpectedEndOfData { what, offset, len }
    }

    /// Replace the generic description of a short read with the structure
    /// that was being read. Other errors pass through untouched.
    pub fn reading(self, what: &'static str) -> Self {
        match self {
            Error::UnexpectedEndOfData { offset, len, .. } => {
                Error::UnexpectedEndOfData { what, offset, len }
            }
            other => other,
        }
    }

    /// True when the module is valid but exports nothing.
    pub fn is_no_exports(&self) -> bool {
        matches!(self, Error::NoExportTable)
    }
}
