//! DOS header fields needed to locate the PE header.

use crate::reader::Reader;
use crate::{Error, Result};

/// DOS "MZ" signature.
pub const DOS_SIGNATURE: [u8; 2] = *b"MZ";

/// Offset of `e_lfanew`, the file offset of the PE signature.
pub const E_LFANEW_OFFSET: u64 = 0x3C;

/// The two DOS header (IMAGE_DOS_HEADER) fields a PE reader relies on.
///
/// The rest of the 64-byte header and the real-mode stub program are
/// irrelevant for export decoding and are never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosHeader {
    /// Magic number ("MZ").
    pub e_magic: [u8; 2],
    /// File address of new exe header (PE header offset).
    pub e_lfanew: u32,
}

impl DosHeader {
    /// Size of the DOS header in bytes.
    pub const SIZE: usize = 64;

    /// Read the signature and PE header offset from a Reader.
    ///
    /// Input that does not start with "MZ" is rejected as `InvalidFormat`
    /// even when it is shorter than two bytes.
    pub fn read_from<R: Reader>(reader: &R) -> Result<Self> {
        let mut e_magic = [0u8; 2];
        let n = reader.read_at(0, &mut e_magic)?;
        if n < e_magic.len() || e_magic != DOS_SIGNATURE {
            return Err(Error::InvalidFormat("not an MS-DOS/PE stub"));
        }

        let e_lfanew = reader
            .read_u32_at(E_LFANEW_OFFSET)
            .map_err(|e| e.reading("DOS header e_lfanew"))?;

        Ok(Self { e_magic, e_lfanew })
    }
}
