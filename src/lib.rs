//! # dllexports
//!
//! Reads the export table of a Windows DLL straight from its bytes.
//!
//! The decoder walks the PE container itself (DOS stub, PE signature, COFF
//! header, PE32/PE32+ optional header, section table) without any help from
//! the OS loader, maps the sections into a flat image and then decodes the
//! Export Directory into a [`ModuleExportReport`].
//!
//! ## Features
//!
//! - **Untrusted input**: every read is bounds checked; corrupt files give an
//!   [`Error`], never a panic or an out-of-bounds read.
//! - **Multiple sources**: decode files, memory slices, or implement the
//!   `Reader` trait for custom sources.
//! - **Batch scanning**: decode many files in parallel with one outcome per
//!   file, then export the results as CSV, XML or JSON.
//!
//! ## Example
//!
//! ```
//! use dllexports::{decode_bytes, DllBuilder, EntryPoint};
//!
//! let dll = DllBuilder::new().export("Foo", 0x1000).build();
//! let report = decode_bytes(&dll).unwrap();
//!
//! assert!(report.is_32bit());
//! assert_eq!(report.functions[0].name, "Foo");
//! assert_eq!(report.functions[0].entry_point, EntryPoint::Rva(0x1000));
//! ```

pub mod batch;
pub mod builder;
pub mod coff;
pub mod config;
pub mod data_dir;
pub mod decoder;
pub mod dos;
pub mod error;
pub mod export;
pub mod format;
pub mod image;
pub mod optional;
pub mod pe;
pub mod reader;
pub mod report;
pub mod section;

pub use batch::{ScanOutcome, ScanResult, ScanSummary};
pub use builder::DllBuilder;
pub use coff::MachineType;
pub use config::DecoderConfig;
pub use data_dir::DataDirectory;
pub use decoder::{decode_bytes, decode_file, Decoder};
pub use error::{Error, Result};
pub use export::{EntryPoint, ExportDirectory, ExportTable, ExportedFunction};
pub use format::Format;
pub use image::RawImage;
pub use optional::ImageWidth;
pub use pe::PeHeaders;
pub use reader::{FileReader, Reader, SliceReader};
pub use report::ModuleExportReport;
pub use section::SectionRecord;
