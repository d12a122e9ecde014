use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::config::ExportSettings;
use crate::dbf::{remove_companions, TableWriter, WriteOptions, DETAIL_TABLE, HEADER_TABLE};
use crate::error::{ExportError, Result, WriteError};
use crate::invoice::Invoice;
use crate::mapping::{map_invoice, MappingWarning};
use crate::source::{DateRange, InvoiceSource};

/// Outcome of writing both tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportStats {
    /// Header rows written (one per invoice)
    pub records: usize,
    pub detail_records: usize,
    pub header_bytes: u64,
    pub detail_bytes: u64,
    pub warnings: Vec<MappingWarning>,
}

/// Write `invoices` into a fresh header table and detail table.
///
/// Both tables are closed before any error is returned. Rows appended
/// before a failure stay on disk.
pub fn export(
    invoices: &[Invoice],
    header_path: &Path,
    detail_path: &Path,
    options: WriteOptions,
) -> Result<ExportStats> {
    let mut header = TableWriter::create(header_path, &HEADER_TABLE, options)?;
    let mut detail = match TableWriter::create(detail_path, &DETAIL_TABLE, options) {
        Ok(writer) => writer,
        Err(e) => {
            if let Err(close_err) = header.close() {
                debug!(error = %close_err, "closing header table after failure");
            }
            return Err(e.into());
        }
    };

    let outcome = write_invoices(invoices, &mut header, &mut detail);
    let header_closed = header.close();
    let detail_closed = detail.close();

    let warnings = outcome?;
    let header_summary = header_closed?;
    let detail_summary = detail_closed?;

    let stats = ExportStats {
        records: header_summary.record_count() as usize,
        detail_records: detail_summary.record_count() as usize,
        header_bytes: header_summary.byte_size(),
        detail_bytes: detail_summary.byte_size(),
        warnings,
    };
    info!(
        records = stats.records,
        detail_records = stats.detail_records,
        warnings = stats.warnings.len(),
        "export finished"
    );
    Ok(stats)
}

fn write_invoices(
    invoices: &[Invoice],
    header: &mut TableWriter<'_>,
    detail: &mut TableWriter<'_>,
) -> std::result::Result<Vec<MappingWarning>, WriteError> {
    let mut warnings = Vec::new();

    for invoice in invoices {
        let mapped = map_invoice(invoice);
        for warning in &mapped.warnings {
            warn!("{warning}");
        }

        header.append(&mapped.header.to_values())?;
        for line in &mapped.details {
            detail.append(&line.to_values())?;
        }
        warnings.extend(mapped.warnings);
    }

    Ok(warnings)
}

/// Runs exports into the configured output directory
pub struct Exporter {
    settings: ExportSettings,
    last_update: Option<NaiveDate>,
}

impl Exporter {
    pub fn new(settings: ExportSettings) -> Self {
        Self {
            settings,
            last_update: None,
        }
    }

    /// Stamp tables with a fixed date instead of today
    pub fn with_last_update(mut self, date: NaiveDate) -> Self {
        self.last_update = Some(date);
        self
    }

    pub fn header_path(&self) -> PathBuf {
        self.settings.header_path()
    }

    pub fn detail_path(&self) -> PathBuf {
        self.settings.detail_path()
    }

    fn write_options(&self) -> WriteOptions {
        let defaults = WriteOptions::default();
        WriteOptions {
            codepage: self.settings.codepage,
            last_update: self.last_update.unwrap_or(defaults.last_update),
        }
    }

    /// Fetch invoices for `range` and write both tables. Nothing is touched
    /// on disk if the fetch fails.
    pub fn run(&self, source: &dyn InvoiceSource, range: &DateRange) -> Result<ExportStats> {
        let invoices = source.fetch(range)?;

        let dir = self.settings.output_dir();
        fs::create_dir_all(&dir)?;
        info!(count = invoices.len(), dir = %dir.display(), "exporting invoices");

        export(
            &invoices,
            &self.header_path(),
            &self.detail_path(),
            self.write_options(),
        )
    }

    /// Download the server-built tables and unpack them into the output directory
    pub fn run_prebuilt(
        &self,
        source: &dyn InvoiceSource,
        range: &DateRange,
    ) -> Result<Vec<PathBuf>> {
        let bytes = source.download_prebuilt_bundle(range)?;
        extract_bundle(&bytes, &self.settings.output_dir())
    }
}

/// Unpack a ZIP archive into `target`, returning the files written.
/// Stale index/memo files next to each unpacked table are removed.
pub fn extract_bundle(bytes: &[u8], target: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(target)?;
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut written = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| ExportError::UnsafeBundleEntry(entry.name().to_string()))?;
        let out_path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let is_table = out_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dbf"));
        if is_table {
            remove_companions(&out_path)?;
        }

        let mut file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut file)?;
        debug!(path = %out_path.display(), "extracted");
        written.push(out_path);
    }

    info!(files = written.len(), dir = %target.display(), "bundle extracted");
    Ok(written)
}
