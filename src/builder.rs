//! Builder for small synthetic DLL images.
//!
//! The produced bytes are a complete, loader-shaped PE file with a `.text`
//! section and, when any export was added, an `.edata` section holding the
//! export directory. Useful for tests, fuzz seeds and examples.
//!
//! # Example
//!
//! ```
//! use dllexports::{decode_bytes, DllBuilder};
//!
//! let dll = DllBuilder::new()
//!     .module_name("sample.dll")
//!     .export("Foo", 0x1000)
//!     .forward("Bar", "NTDLL.RtlAllocateHeap")
//!     .build();
//!
//! let report = decode_bytes(&dll).unwrap();
//! assert_eq!(report.module_name, "sample.dll");
//! assert_eq!(report.functions.len(), 2);
//! ```

use crate::coff::{characteristics, MachineType};
use crate::data_dir::{EXPORT_DIRECTORY_INDEX, NUMBER_OF_DIRECTORY_ENTRIES};
use crate::dos::{DOS_SIGNATURE, E_LFANEW_OFFSET};
use crate::export::ExportDirectory;
use crate::optional::ImageWidth;
use crate::section::SectionRecord;

const CODE_SECTION: u32 = 0x6000_0020; // CODE | EXECUTE | READ
const DATA_SECTION: u32 = 0x4000_0040; // INITIALIZED_DATA | READ

/// Align a value up to the given alignment.
#[inline]
pub fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    (value + alignment - 1) & !(alignment - 1)
}

/// Target of one export address table slot.
#[derive(Debug, Clone)]
enum SlotTarget {
    Rva(u32),
    Forward(String),
}

/// Builder for synthetic DLL files.
#[derive(Debug, Clone)]
pub struct DllBuilder {
    machine: u16,
    width: ImageWidth,
    is_dll: bool,
    module_name: String,
    ordinal_base: u32,
    size_of_image: Option<u32>,
    slots: Vec<(Option<String>, SlotTarget)>,
}

impl Default for DllBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DllBuilder {
    /// File offset of the PE signature.
    pub const PE_OFFSET: usize = 0x80;
    pub const FILE_ALIGNMENT: u32 = 0x200;
    pub const SECTION_ALIGNMENT: u32 = 0x1000;
    /// RVA and file offset of `.text`.
    pub const TEXT_RVA: u32 = 0x1000;
    pub const TEXT_FILE_OFFSET: usize = 0x200;
    /// RVA and file offset of `.edata`; the export directory starts here.
    pub const EDATA_RVA: u32 = 0x2000;
    pub const EDATA_FILE_OFFSET: usize = 0x400;

    /// Create a builder for a 32-bit x86 DLL named `test.dll` with ordinal
    /// base 1 and no exports.
    pub fn new() -> Self {
        Self {
            machine: MachineType::I386 as u16,
            width: ImageWidth::Pe32,
            is_dll: true,
            module_name: "test.dll".to_string(),
            ordinal_base: 1,
            size_of_image: None,
            slots: Vec::new(),
        }
    }

    /// Switch to an x64 PE32+ image.
    pub fn x64(mut self) -> Self {
        self.machine = MachineType::Amd64 as u16;
        self.width = ImageWidth::Pe32Plus;
        self
    }

    /// Override the raw COFF machine value.
    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    /// Set or clear the DLL characteristics flag.
    pub fn dll(mut self, is_dll: bool) -> Self {
        self.is_dll = is_dll;
        self
    }

    pub fn module_name(mut self, name: &str) -> Self {
        self.module_name = name.to_string();
        self
    }

    pub fn ordinal_base(mut self, base: u32) -> Self {
        self.ordinal_base = base;
        self
    }

    /// Override the computed `SizeOfImage`.
    pub fn size_of_image(mut self, size: u32) -> Self {
        self.size_of_image = Some(size);
        self
    }

    /// Add a named export at the next address table slot.
    pub fn export(mut self, name: &str, rva: u32) -> Self {
        self.slots
            .push((Some(name.to_string()), SlotTarget::Rva(rva)));
        self
    }

    /// Add a named export forwarded to `target` ("Module.Function").
    pub fn forward(mut self, name: &str, target: &str) -> Self {
        self.slots.push((
            Some(name.to_string()),
            SlotTarget::Forward(target.to_string()),
        ));
        self
    }

    /// Add an export reachable by ordinal only. An RVA of zero leaves an
    /// unused slot.
    pub fn unnamed(mut self, rva: u32) -> Self {
        self.slots.push((None, SlotTarget::Rva(rva)));
        self
    }

    /// File offset of the section table for the given width.
    pub fn section_table_offset(is_64bit: bool) -> usize {
        let width = if is_64bit {
            ImageWidth::Pe32Plus
        } else {
            ImageWidth::Pe32
        };
        Self::PE_OFFSET + 4 + 20 + Self::optional_header_size(width)
    }

    fn optional_header_size(width: ImageWidth) -> usize {
        width.layout().directory_offset(NUMBER_OF_DIRECTORY_ENTRIES)
    }

    /// Build the DLL file bytes.
    pub fn build(&self) -> Vec<u8> {
        let edata = if self.slots.is_empty() {
            None
        } else {
            Some(self.build_edata())
        };

        let edata_len = edata.as_ref().map_or(0, |d| d.len() as u32);
        let edata_raw = align_up(edata_len, Self::FILE_ALIGNMENT);
        let computed_image_size =
            Self::EDATA_RVA + align_up(edata_len, Self::SECTION_ALIGNMENT);
        let size_of_image = self.size_of_image.unwrap_or(computed_image_size);

        let mut out = vec![0u8; Self::EDATA_FILE_OFFSET + edata_raw as usize];

        // DOS header
        out[0..2].copy_from_slice(&DOS_SIGNATURE);
        let lfanew = E_LFANEW_OFFSET as usize;
        out[lfanew..lfanew + 4].copy_from_slice(&(Self::PE_OFFSET as u32).to_le_bytes());

        // PE signature and COFF header
        let pe = Self::PE_OFFSET;
        out[pe..pe + 4].copy_from_slice(b"PE\0\0");
        let coff = pe + 4;
        let section_count: u16 = if edata.is_some() { 2 } else { 1 };
        let optional_size = Self::optional_header_size(self.width);
        let mut coff_flags = characteristics::EXECUTABLE_IMAGE;
        coff_flags |= if self.width.is_64bit() {
            characteristics::LARGE_ADDRESS_AWARE
        } else {
            characteristics::MACHINE_32BIT
        };
        if self.is_dll {
            coff_flags |= characteristics::DLL;
        }
        put_u16(&mut out, coff, self.machine);
        put_u16(&mut out, coff + 2, section_count);
        put_u16(&mut out, coff + 16, optional_size as u16);
        put_u16(&mut out, coff + 18, coff_flags);

        // Optional header
        let opt = coff + 20;
        let layout = self.width.layout();
        put_u16(&mut out, opt, self.width.magic());
        out[opt + 2] = 14; // linker version
        put_u32(&mut out, opt + 20, Self::TEXT_RVA); // BaseOfCode
        if self.width.is_64bit() {
            out[opt + 24..opt + 32].copy_from_slice(&0x1_8000_0000u64.to_le_bytes());
        } else {
            put_u32(&mut out, opt + 28, 0x1000_0000);
        }
        put_u32(&mut out, opt + 32, Self::SECTION_ALIGNMENT);
        put_u32(&mut out, opt + 36, Self::FILE_ALIGNMENT);
        put_u16(&mut out, opt + 40, 6); // OS version
        put_u16(&mut out, opt + 48, 6); // subsystem version
        put_u32(&mut out, opt + layout.size_of_image, size_of_image);
        put_u32(&mut out, opt + 60, Self::TEXT_FILE_OFFSET as u32); // SizeOfHeaders
        put_u16(&mut out, opt + 68, 2); // WINDOWS_GUI
        put_u16(&mut out, opt + 70, 0x0140); // DYNAMIC_BASE | NX_COMPAT
        put_u32(
            &mut out,
            opt + layout.number_of_rva_and_sizes,
            NUMBER_OF_DIRECTORY_ENTRIES as u32,
        );
        if edata.is_some() {
            let off = opt + layout.directory_offset(EXPORT_DIRECTORY_INDEX);
            put_u32(&mut out, off, Self::EDATA_RVA);
            put_u32(&mut out, off + 4, edata_len);
        }

        // Section table
        let table = opt + optional_size;
        write_section(
            &mut out[table..table + SectionRecord::SIZE],
            b".text",
            Self::TEXT_RVA,
            Self::FILE_ALIGNMENT,
            Self::TEXT_FILE_OFFSET as u32,
            CODE_SECTION,
        );
        out[Self::TEXT_FILE_OFFSET..Self::EDATA_FILE_OFFSET].fill(0xCC);

        if let Some(edata) = edata {
            let entry = table + SectionRecord::SIZE;
            write_section(
                &mut out[entry..entry + SectionRecord::SIZE],
                b".edata",
                Self::EDATA_RVA,
                edata_raw,
                Self::EDATA_FILE_OFFSET as u32,
                DATA_SECTION,
            );
            // VirtualSize is the unpadded length
            put_u32(&mut out, entry + 8, edata_len);
            out[Self::EDATA_FILE_OFFSET..Self::EDATA_FILE_OFFSET + edata.len()]
                .copy_from_slice(&edata);
        }

        out
    }

    /// Lay out the export directory, its three tables and all strings.
    fn build_edata(&self) -> Vec<u8> {
        let mut named: Vec<(&str, u16)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, (name, _))| name.as_deref().map(|n| (n, i as u16)))
            .collect();
        // The loader binary-searches the name pointer table.
        named.sort_by(|a, b| a.0.cmp(b.0));

        let functions = self.slots.len();
        let eat = ExportDirectory::SIZE;
        let npt = eat + 4 * functions;
        let ot = npt + 4 * named.len();
        let strings = ot + 2 * named.len();

        let mut buf = vec![0u8; strings];
        let rva_of = |offset: usize| Self::EDATA_RVA + offset as u32;

        let module_name_rva = rva_of(push_cstr(&mut buf, &self.module_name));

        for (j, (name, slot)) in named.iter().enumerate() {
            let name_rva = rva_of(push_cstr(&mut buf, name));
            put_u32(&mut buf, npt + 4 * j, name_rva);
            put_u16(&mut buf, ot + 2 * j, *slot);
        }

        for (i, (_, target)) in self.slots.iter().enumerate() {
            let address = match target {
                SlotTarget::Rva(rva) => *rva,
                SlotTarget::Forward(to) => rva_of(push_cstr(&mut buf, to)),
            };
            put_u32(&mut buf, eat + 4 * i, address);
        }

        let directory = ExportDirectory {
            name_rva: module_name_rva,
            base: self.ordinal_base,
            number_of_functions: functions as u32,
            number_of_names: named.len() as u32,
            address_of_functions: rva_of(eat),
            address_of_names: rva_of(npt),
            address_of_name_ordinals: rva_of(ot),
            ..ExportDirectory::default()
        };
        buf[..ExportDirectory::SIZE].copy_from_slice(&directory.to_bytes());

        buf
    }
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Append a NUL-terminated string, returning its offset.
fn push_cstr(buf: &mut Vec<u8>, s: &str) -> usize {
    let offset = buf.len();
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    offset
}

fn write_section(
    buf: &mut [u8],
    name: &[u8],
    virtual_address: u32,
    raw_size: u32,
    raw_pointer: u32,
    flags: u32,
) {
    buf[..name.len()].copy_from_slice(name);
    put_u32(buf, 8, raw_size);
    put_u32(buf, 12, virtual_address);
    put_u32(buf, 16, raw_size);
    put_u32(buf, 20, raw_pointer);
    put_u32(buf, 36, flags);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_dir::DataDirectory;
    use crate::pe::PeHeaders;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 0x200), 0);
        assert_eq!(align_up(1, 0x200), 0x200);
        assert_eq!(align_up(0x200, 0x200), 0x200);
        assert_eq!(align_up(0x201, 0x200), 0x400);
        assert_eq!(align_up(0x1001, 0x1000), 0x2000);
    }

    #[test]
    fn test_headers_fit_before_text() {
        assert!(DllBuilder::section_table_offset(true) + 2 * SectionRecord::SIZE
            <= DllBuilder::TEXT_FILE_OFFSET);
    }

    #[test]
    fn test_builder_creates_parseable_dll() {
        let bytes = DllBuilder::new().export("Foo", 0x1000).build();
        let headers = PeHeaders::from_slice(&bytes).expect("headers should parse");

        assert_eq!(headers.sections.len(), 2);
        assert_eq!(headers.sections[0].name_str(), ".text");
        assert_eq!(headers.sections[1].name_str(), ".edata");
        assert_eq!(headers.size_of_image, 0x3000);
        assert_eq!(bytes.len(), 0x600);
    }

    #[test]
    fn test_builder_export_directory_counts() {
        let bytes = DllBuilder::new()
            .export("B", 0x1000)
            .unnamed(0x1010)
            .export("A", 0x1020)
            .build();
        let dir = ExportDirectory::parse(&bytes[DllBuilder::EDATA_FILE_OFFSET..]).unwrap();
        assert_eq!(dir.number_of_functions, 3);
        assert_eq!(dir.number_of_names, 2);
        assert_eq!(dir.base, 1);
    }

    #[test]
    fn test_builder_writes_export_data_directory() {
        // directory + one EAT, NPT and ordinal entry + "test.dll\0" + "Foo\0"
        let expected = DataDirectory {
            virtual_address: DllBuilder::EDATA_RVA,
            size: 40 + 4 + 4 + 2 + 9 + 4,
        };
        for builder in [DllBuilder::new(), DllBuilder::new().x64()] {
            let bytes = builder.export("Foo", 0x1000).build();
            let headers = PeHeaders::from_slice(&bytes).unwrap();
            assert_eq!(headers.export, expected);

            let entry = DllBuilder::PE_OFFSET + 4 + 20 + headers.data_directory_base;
            let raw = DataDirectory::parse(&bytes[entry..]).unwrap();
            assert_eq!(raw, expected);
        }
    }
}
