//! The decode pipeline: headers, image mapping, export walk.

use crate::config::DecoderConfig;
use crate::export::ExportTable;
use crate::image::RawImage;
use crate::pe::PeHeaders;
use crate::reader::{FileReader, Reader, SliceReader};
use crate::report::ModuleExportReport;
use crate::Result;
use std::path::Path;
use tracing::debug;

/// Decodes DLL export tables.
///
/// Holds only configuration; every call allocates its own image and result,
/// so one decoder can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Run all three stages. Either a complete report or the first error is
    /// returned; no partial state escapes.
    pub fn decode<R: Reader>(&self, reader: &R) -> Result<ModuleExportReport> {
        let headers = PeHeaders::read_from(reader)?;
        let image = RawImage::map(reader, &headers.sections, headers.size_of_image, &self.config)?;
        let table = ExportTable::walk(&image, headers.export)?;

        debug!(
            module = %table.module_name,
            exports = table.functions.len(),
            "decoded export table"
        );

        Ok(ModuleExportReport::new(&headers, table))
    }

    /// Decode a file on disk. The file is closed before this returns.
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> Result<ModuleExportReport> {
        let reader = FileReader::open(path)?;
        self.decode(&reader)
    }

    /// Decode an in-memory image.
    pub fn decode_bytes(&self, data: &[u8]) -> Result<ModuleExportReport> {
        self.decode(&SliceReader::new(data))
    }
}

/// Decode a file with the default configuration.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<ModuleExportReport> {
    Decoder::default().decode_file(path)
}

/// Decode bytes with the default configuration.
pub fn decode_bytes(data: &[u8]) -> Result<ModuleExportReport> {
    Decoder::default().decode_bytes(data)
}
