//! The top-level decode result.

use crate::coff::MachineType;
use crate::export::{ExportTable, ExportedFunction};
use crate::optional::ImageWidth;
use crate::pe::PeHeaders;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Exports of one DLL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExportReport {
    /// Name recorded in the export directory, not the file name.
    pub module_name: String,
    pub ordinal_base: u32,
    /// `NumberOfFunctions` as declared by the directory.
    pub function_count: u32,
    /// `NumberOfNames` as declared by the directory.
    pub name_count: u32,
    pub width: ImageWidth,
    pub machine: MachineType,
    /// Exported functions in address table slot order. Unused slots (zero
    /// address, no name) are left out, so this can be shorter than
    /// `function_count`.
    pub functions: Vec<ExportedFunction>,
}

impl ModuleExportReport {
    pub fn new(headers: &PeHeaders, table: ExportTable) -> Self {
        Self {
            module_name: table.module_name,
            ordinal_base: table.directory.base,
            function_count: table.directory.number_of_functions,
            name_count: table.directory.number_of_names,
            width: headers.width,
            machine: headers.machine,
            functions: table.functions,
        }
    }

    pub fn is_32bit(&self) -> bool {
        !self.width.is_64bit()
    }

    pub fn is_64bit(&self) -> bool {
        self.width.is_64bit()
    }
}

impl fmt::Display for ModuleExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} functions with {} names from ordinal base {})",
            self.module_name, self.function_count, self.name_count, self.ordinal_base
        )
    }
}

impl Serialize for ModuleExportReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ModuleExportReport", 8)?;
        state.serialize_field("module_name", &self.module_name)?;
        state.serialize_field("ordinal_base", &self.ordinal_base)?;
        state.serialize_field("function_count", &self.function_count)?;
        state.serialize_field("name_count", &self.name_count)?;
        state.serialize_field("machine", self.machine.name())?;
        state.serialize_field("is_32bit", &self.is_32bit())?;
        state.serialize_field("is_64bit", &self.is_64bit())?;
        state.serialize_field("functions", &self.functions)?;
        state.end()
    }
}
