//! Export table walker.
//!
//! Decodes the Export Directory Table and its three parallel tables (address,
//! name pointer, ordinal) out of a mapped [`RawImage`].

use crate::data_dir::DataDirectory;
use crate::image::RawImage;
use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::collections::btree_map::{BTreeMap, Entry};
use std::fmt;
use tracing::{debug, warn};

/// IMAGE_EXPORT_DIRECTORY - 40 bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportDirectory {
    /// Export flags (reserved, must be 0).
    pub characteristics: u32,
    /// Time/date stamp.
    pub time_date_stamp: u32,
    /// Major version.
    pub major_version: u16,
    /// Minor version.
    pub minor_version: u16,
    /// RVA to the DLL name.
    pub name_rva: u32,
    /// Starting ordinal number.
    pub base: u32,
    /// Number of entries in the Export Address Table.
    pub number_of_functions: u32,
    /// Number of entries in the Name Pointer Table.
    pub number_of_names: u32,
    /// RVA to the Export Address Table (EAT).
    pub address_of_functions: u32,
    /// RVA to the Export Name Pointer Table.
    pub address_of_names: u32,
    /// RVA to the Export Ordinal Table.
    pub address_of_name_ordinals: u32,
}

impl ExportDirectory {
    pub const SIZE: usize = 40;

    /// Parse from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated("export directory", 0, Self::SIZE));
        }

        Ok(Self {
            characteristics: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            time_date_stamp: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            major_version: u16::from_le_bytes([data[8], data[9]]),
            minor_version: u16::from_le_bytes([data[10], data[11]]),
            name_rva: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            base: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            number_of_functions: u32::from_le_bytes([data[20], data[21], data[22], data[23]]),
            number_of_names: u32::from_le_bytes([data[24], data[25], data[26], data[27]]),
            address_of_functions: u32::from_le_bytes([data[28], data[29], data[30], data[31]]),
            address_of_names: u32::from_le_bytes([data[32], data[33], data[34], data[35]]),
            address_of_name_ordinals: u32::from_le_bytes([data[36], data[37], data[38], data[39]]),
        })
    }

    /// Parse the directory located at `rva` in the image.
    pub fn read(image: &RawImage, rva: u32) -> Result<Self> {
        Self::parse(image.bytes_at(rva, Self::SIZE, "export directory")?)
    }

    /// Write to a buffer.
    pub fn write(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < Self::SIZE {
            return Err(Error::truncated("export directory", 0, Self::SIZE));
        }

        buf[0..4].copy_from_slice(&self.characteristics.to_le_bytes());
        buf[4..8].copy_from_slice(&self.time_date_stamp.to_le_bytes());
        buf[8..10].copy_from_slice(&self.major_version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.minor_version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.name_rva.to_le_bytes());
        buf[16..20].copy_from_slice(&self.base.to_le_bytes());
        buf[20..24].copy_from_slice(&self.number_of_functions.to_le_bytes());
        buf[24..28].copy_from_slice(&self.number_of_names.to_le_bytes());
        buf[28..32].copy_from_slice(&self.address_of_functions.to_le_bytes());
        buf[32..36].copy_from_slice(&self.address_of_names.to_le_bytes());
        buf[36..40].copy_from_slice(&self.address_of_name_ordinals.to_le_bytes());

        Ok(())
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.write(&mut buf).expect("buffer size is correct");
        buf
    }
}

/// Where an exported function lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// RVA of the function inside this module.
    Rva(u32),
    /// Forwarded to another DLL (e.g., "NTDLL.RtlAllocateHeap").
    Forward(String),
}

impl EntryPoint {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Self::Forward(_))
    }

    /// The forwarding string, if any.
    pub fn forward_target(&self) -> Option<&str> {
        match self {
            Self::Forward(target) => Some(target),
            Self::Rva(_) => None,
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rva(rva) => write!(f, "0x{rva:08X}"),
            Self::Forward(target) => f.write_str(target),
        }
    }
}

impl Serialize for EntryPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single exported function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedFunction {
    /// Function name, empty if exported by ordinal only.
    pub name: String,
    /// Ordinal number (address table index plus the ordinal base).
    pub ordinal: u32,
    /// Raw address table value. For a forwarder this is the RVA of the
    /// forwarding string.
    pub address: u32,
    pub entry_point: EntryPoint,
}

/// The decoded export table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportTable {
    /// Export directory header.
    pub directory: ExportDirectory,
    /// DLL name stored in the directory.
    pub module_name: String,
    /// Exported functions in address table order.
    pub functions: Vec<ExportedFunction>,
}

impl ExportTable {
    /// Walk the export table described by the export data directory entry.
    ///
    /// Names are attached to address table slots through the ordinal table;
    /// only `min(NumberOfNames, NumberOfFunctions)` name entries are read.
    /// Slots holding a zero address and no name are unused and skipped.
    pub fn walk(image: &RawImage, export: DataDirectory) -> Result<Self> {
        let directory = ExportDirectory::read(image, export.virtual_address)?;
        let module_name = image.read_cstr(directory.name_rva);

        debug!(
            module = %module_name,
            base = directory.base,
            functions = directory.number_of_functions,
            names = directory.number_of_names,
            "export directory"
        );

        let function_count = directory.number_of_functions as usize;
        let addresses = image.bytes_at(
            directory.address_of_functions,
            table_len(function_count, 4),
            "export address table",
        )?;

        if directory.number_of_names > directory.number_of_functions {
            warn!(
                names = directory.number_of_names,
                functions = directory.number_of_functions,
                "more names than functions, ignoring the excess"
            );
        }
        let name_count = directory.number_of_names.min(directory.number_of_functions) as usize;
        let mut names = Self::read_names(image, &directory, name_count, function_count)?;

        // Counts come from the file; grow only with what is actually exported.
        let mut functions = Vec::new();
        for (slot, chunk) in addresses.chunks_exact(4).enumerate() {
            let address = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let name = u16::try_from(slot).ok().and_then(|s| names.remove(&s));
            if address == 0 && name.is_none() {
                continue;
            }

            let entry_point = if export.contains(address) {
                EntryPoint::Forward(image.read_cstr(address))
            } else {
                EntryPoint::Rva(address)
            };

            functions.push(ExportedFunction {
                name: name.unwrap_or_default(),
                ordinal: directory.base.wrapping_add(slot as u32),
                address,
                entry_point,
            });
        }

        Ok(Self {
            directory,
            module_name,
            functions,
        })
    }

    /// Map address table slots to the names that refer to them.
    ///
    /// Ordinal table entries are 16 bits wide, so at most 65536 slots can be
    /// named no matter what the directory claims.
    fn read_names(
        image: &RawImage,
        directory: &ExportDirectory,
        name_count: usize,
        function_count: usize,
    ) -> Result<BTreeMap<u16, String>> {
        let name_pointers = image.bytes_at(
            directory.address_of_names,
            table_len(name_count, 4),
            "export name pointer table",
        )?;
        let name_ordinals = image.bytes_at(
            directory.address_of_name_ordinals,
            table_len(name_count, 2),
            "export ordinal table",
        )?;

        let mut names = BTreeMap::new();
        for (pointer, index) in name_pointers
            .chunks_exact(4)
            .zip(name_ordinals.chunks_exact(2))
        {
            let name_rva = u32::from_le_bytes([pointer[0], pointer[1], pointer[2], pointer[3]]);
            let slot = u16::from_le_bytes([index[0], index[1]]);
            let name = image.read_cstr(name_rva);

            if usize::from(slot) >= function_count {
                warn!(slot, %name, "name ordinal outside the address table");
                continue;
            }
            match names.entry(slot) {
                Entry::Occupied(existing) => {
                    warn!(
                        slot,
                        existing = %existing.get(),
                        duplicate = %name,
                        "address table slot already named"
                    );
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(name);
                }
            }
        }
        Ok(names)
    }

    /// Check if the export table is empty.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Find an export by name.
    pub fn find_by_name(&self, name: &str) -> Option<&ExportedFunction> {
        self.functions.iter().find(|e| e.name == name)
    }

    /// Find an export by ordinal.
    pub fn find_by_ordinal(&self, ordinal: u32) -> Option<&ExportedFunction> {
        self.functions.iter().find(|e| e.ordinal == ordinal)
    }
}

fn table_len(count: usize, entry_size: usize) -> usize {
    count.saturating_mul(entry_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT_RVA: u32 = 0x100;

    /// Image with a directory at 0x100 and tables/strings following it.
    struct ImageBuilder {
        data: Vec<u8>,
    }

    impl ImageBuilder {
        fn new() -> Self {
            Self::with_len(0x400)
        }

        fn with_len(len: usize) -> Self {
            Self {
                data: vec![0u8; len],
            }
        }

        fn u16_at(mut self, rva: usize, value: u16) -> Self {
            self.data[rva..rva + 2].copy_from_slice(&value.to_le_bytes());
            self
        }

        fn u32_at(mut self, rva: usize, value: u32) -> Self {
            self.data[rva..rva + 4].copy_from_slice(&value.to_le_bytes());
            self
        }

        fn str_at(mut self, rva: usize, s: &str) -> Self {
            self.data[rva..rva + s.len()].copy_from_slice(s.as_bytes());
            self.data[rva + s.len()] = 0;
            self
        }

        fn directory(self, dir: &ExportDirectory) -> Self {
            let mut this = self;
            let at = EXPORT_RVA as usize;
            this.data[at..at + ExportDirectory::SIZE].copy_from_slice(&dir.to_bytes());
            this
        }

        fn build(self) -> RawImage {
            RawImage::from_vec(self.data)
        }
    }

    fn directory(functions: u32, names: u32) -> ExportDirectory {
        ExportDirectory {
            name_rva: 0x300,
            base: 1,
            number_of_functions: functions,
            number_of_names: names,
            address_of_functions: 0x140,
            address_of_names: 0x180,
            address_of_name_ordinals: 0x1C0,
            ..ExportDirectory::default()
        }
    }

    fn export_entry(size: u32) -> DataDirectory {
        DataDirectory {
            virtual_address: EXPORT_RVA,
            size,
        }
    }

    #[test]
    fn test_export_directory_size() {
        assert_eq!(ExportDirectory::SIZE, 40);
    }

    #[test]
    fn test_export_directory_write_then_parse() {
        let original = ExportDirectory {
            characteristics: 0,
            time_date_stamp: 0x12345678,
            major_version: 1,
            minor_version: 0,
            name_rva: 0x1000,
            base: 1,
            number_of_functions: 10,
            number_of_names: 8,
            address_of_functions: 0x2000,
            address_of_names: 0x3000,
            address_of_name_ordinals: 0x4000,
        };

        let bytes = original.to_bytes();
        let parsed = ExportDirectory::parse(&bytes).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_entry_point_display() {
        assert_eq!(EntryPoint::Rva(0x1000).to_string(), "0x00001000");
        assert_eq!(EntryPoint::Rva(0xDEADBEEF).to_string(), "0xDEADBEEF");
        assert_eq!(
            EntryPoint::Forward("NTDLL.RtlAllocateHeap".into()).to_string(),
            "NTDLL.RtlAllocateHeap"
        );
    }

    #[test]
    fn test_entry_point_serializes_as_string() {
        let json = serde_json::to_string(&EntryPoint::Rva(0x2A)).unwrap();
        assert_eq!(json, "\"0x0000002A\"");
    }

    #[test]
    fn test_walk_named_and_forwarded() {
        // slot 0: Beta @ 0x1000, slot 1: Alpha forwarded
        let image = ImageBuilder::new()
            .directory(&directory(2, 2))
            .u32_at(0x140, 0x1000)
            .u32_at(0x144, 0x320)
            .u32_at(0x180, 0x340)
            .u32_at(0x184, 0x350)
            .u16_at(0x1C0, 1)
            .u16_at(0x1C2, 0)
            .str_at(0x300, "mod.dll")
            .str_at(0x320, "Other.Func")
            .str_at(0x340, "Alpha")
            .str_at(0x350, "Beta")
            .build();

        let table = ExportTable::walk(&image, export_entry(0x300)).unwrap();
        assert_eq!(table.module_name, "mod.dll");
        assert_eq!(table.functions.len(), 2);

        let beta = &table.functions[0];
        assert_eq!(beta.name, "Beta");
        assert_eq!(beta.ordinal, 1);
        assert_eq!(beta.entry_point, EntryPoint::Rva(0x1000));

        let alpha = table.find_by_name("Alpha").unwrap();
        assert_eq!(alpha.ordinal, 2);
        assert_eq!(alpha.address, 0x320);
        assert_eq!(alpha.entry_point.forward_target(), Some("Other.Func"));
    }

    #[test]
    fn test_walk_forwarder_range_is_half_open() {
        let image = ImageBuilder::new()
            .directory(&directory(1, 0))
            .u32_at(0x140, EXPORT_RVA + 0x20)
            .build();

        // Address exactly at the end of the export range is not a forwarder.
        let table = ExportTable::walk(&image, export_entry(0x20)).unwrap();
        assert_eq!(table.functions[0].entry_point, EntryPoint::Rva(0x120));

        let table = ExportTable::walk(&image, export_entry(0x21)).unwrap();
        assert!(table.functions[0].entry_point.is_forwarded());
    }

    #[test]
    fn test_walk_large_function_count_stays_sparse() {
        // Nearly a million mostly empty slots; only the last one a u16
        // ordinal can reach is named.
        let functions = 0xF_0000;
        let dir = ExportDirectory {
            number_of_functions: functions,
            number_of_names: 1,
            address_of_functions: 0x1000,
            ..directory(0, 0)
        };
        let image = ImageBuilder::with_len(0x1000 + 4 * functions as usize)
            .directory(&dir)
            .u32_at(0x180, 0x340)
            .u16_at(0x1C0, 0xFFFF)
            .str_at(0x340, "Last")
            .u32_at(0x1000 + 4 * 7, 0x1700)
            .build();

        let table = ExportTable::walk(&image, export_entry(0x300)).unwrap();
        assert_eq!(table.directory.number_of_functions, functions);
        assert_eq!(table.functions.len(), 2);
        assert_eq!(table.functions[0].ordinal, 8);
        assert_eq!(table.functions[0].address, 0x1700);

        let last = &table.functions[1];
        assert_eq!(last.name, "Last");
        assert_eq!(last.ordinal, 1 + 0xFFFF);
        assert_eq!(last.address, 0);
    }

    #[test]
    fn test_walk_unnamed_and_gap_slots() {
        let image = ImageBuilder::new()
            .directory(&directory(3, 1))
            .u32_at(0x140, 0x1000)
            .u32_at(0x144, 0)
            .u32_at(0x148, 0x1200)
            .u32_at(0x180, 0x340)
            .u16_at(0x1C0, 2)
            .str_at(0x340, "Named")
            .build();

        let table = ExportTable::walk(&image, export_entry(0x40)).unwrap();
        assert_eq!(table.functions.len(), 2);
        assert_eq!(table.functions[0].name, "");
        assert_eq!(table.functions[0].ordinal, 1);
        assert_eq!(table.functions[1].name, "Named");
        assert_eq!(table.functions[1].ordinal, 3);
        assert!(table.find_by_ordinal(2).is_none());
    }

    #[test]
    fn test_walk_clamps_forged_name_count() {
        // NumberOfNames claims far more entries than the image holds.
        let image = ImageBuilder::new()
            .directory(&directory(1, 0x0100_0000))
            .u32_at(0x140, 0x1000)
            .u32_at(0x180, 0x340)
            .str_at(0x340, "Only")
            .build();

        let table = ExportTable::walk(&image, export_entry(0x40)).unwrap();
        assert_eq!(table.functions.len(), 1);
        assert_eq!(table.functions[0].name, "Only");
    }

    #[test]
    fn test_walk_ignores_out_of_range_name_ordinal() {
        let image = ImageBuilder::new()
            .directory(&directory(1, 1))
            .u32_at(0x140, 0x1000)
            .u32_at(0x180, 0x340)
            .u16_at(0x1C0, 7)
            .str_at(0x340, "Stray")
            .build();

        let table = ExportTable::walk(&image, export_entry(0x40)).unwrap();
        assert_eq!(table.functions.len(), 1);
        assert_eq!(table.functions[0].name, "");
    }

    #[test]
    fn test_walk_address_table_outside_image() {
        let image = ImageBuilder::new()
            .directory(&directory(0x1000, 0))
            .build();

        let result = ExportTable::walk(&image, export_entry(0x40));
        assert!(matches!(
            result,
            Err(Error::UnexpectedEndOfData {
                what: "export address table",
                offset: 0x140,
                ..
            })
        ));
    }

    #[test]
    fn test_walk_directory_outside_image() {
        let image = RawImage::from_vec(vec![0u8; 0x110]);
        let result = ExportTable::walk(&image, export_entry(0x40));
        assert!(matches!(
            result,
            Err(Error::UnexpectedEndOfData {
                what: "export directory",
                ..
            })
        ));
    }

    #[test]
    fn test_walk_ordinal_base_wraps() {
        let mut dir = directory(2, 0);
        dir.base = u32::MAX;
        let image = ImageBuilder::new()
            .directory(&dir)
            .u32_at(0x140, 0x1000)
            .u32_at(0x144, 0x1010)
            .build();

        let table = ExportTable::walk(&image, export_entry(0x40)).unwrap();
        assert_eq!(table.functions[0].ordinal, u32::MAX);
        assert_eq!(table.functions[1].ordinal, 0);
    }
}
