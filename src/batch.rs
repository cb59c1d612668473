//! Multi-file scanning.
//!
//! Each file is decoded independently and gets its own outcome, so a corrupt
//! DLL never stops the rest of the batch.

use crate::decoder::Decoder;
use crate::report::ModuleExportReport;
use crate::Error;
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of decoding one file.
#[derive(Debug)]
pub enum ScanOutcome {
    Exports(ModuleExportReport),
    /// A valid DLL without an export table.
    NoExports,
    Failed(Error),
}

/// One scanned file.
#[derive(Debug)]
pub struct ScanResult {
    pub path: PathBuf,
    pub outcome: ScanOutcome,
}

impl ScanResult {
    /// Decode `path` and classify the result.
    pub fn scan(decoder: &Decoder, path: &Path) -> Self {
        let outcome = match decoder.decode_file(path) {
            Ok(report) => {
                info!(path = %path.display(), exports = report.functions.len(), "decoded");
                ScanOutcome::Exports(report)
            }
            Err(e) if e.is_no_exports() => {
                info!(path = %path.display(), "no export table");
                ScanOutcome::NoExports
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to decode");
                ScanOutcome::Failed(e)
            }
        };
        Self {
            path: path.to_path_buf(),
            outcome,
        }
    }

    /// File name without directories.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn report(&self) -> Option<&ModuleExportReport> {
        match &self.outcome {
            ScanOutcome::Exports(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            ScanOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Scan files one after another.
pub fn scan<P: AsRef<Path>>(decoder: &Decoder, paths: &[P]) -> Vec<ScanResult> {
    paths
        .iter()
        .map(|p| ScanResult::scan(decoder, p.as_ref()))
        .collect()
}

/// Scan files on the rayon thread pool. Output order matches `paths`.
pub fn scan_parallel<P: AsRef<Path> + Sync>(decoder: &Decoder, paths: &[P]) -> Vec<ScanResult> {
    paths
        .par_iter()
        .map(|p| ScanResult::scan(decoder, p.as_ref()))
        .collect()
}

/// Expand a command-line path: a directory yields its `*.dll` files (not
/// recursive, extension compared case-insensitively, sorted); anything else
/// is returned as is.
pub fn collect_dlls(path: &Path) -> io::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut dlls = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        let is_dll = entry_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"));
        if is_dll && entry_path.is_file() {
            dlls.push(entry_path);
        }
    }
    dlls.sort();
    Ok(dlls)
}

/// Counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub decoded: usize,
    pub no_exports: usize,
    pub failed: usize,
}

impl ScanSummary {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.outcome {
                ScanOutcome::Exports(_) => summary.decoded += 1,
                ScanOutcome::NoExports => summary.no_exports += 1,
                ScanOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.decoded + self.no_exports + self.failed
    }

    /// True when there was at least one file and none could be read.
    pub fn all_failed(&self) -> bool {
        self.total() > 0 && self.failed == self.total()
    }
}
