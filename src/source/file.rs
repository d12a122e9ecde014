use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{parse_invoices, DateRange, InvoiceSource};
use crate::error::SourceError;
use crate::invoice::Invoice;

/// Invoices saved from an earlier API response. The file is taken as the
/// complete answer for any range.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn failure(&self, reason: impl ToString) -> SourceError {
        SourceError::File {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl InvoiceSource for JsonFileSource {
    fn fetch(&self, _range: &DateRange) -> Result<Vec<Invoice>, SourceError> {
        let body = fs::read_to_string(&self.path).map_err(|e| self.failure(e))?;
        let invoices = parse_invoices(&body).map_err(|e| self.failure(e))?;
        info!(count = invoices.len(), path = %self.path.display(), "loaded invoices");
        Ok(invoices)
    }

    fn download_prebuilt_bundle(&self, _range: &DateRange) -> Result<Vec<u8>, SourceError> {
        Err(SourceError::BundleUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn range() -> DateRange {
        DateRange::single_day(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
    }

    #[test]
    fn test_reads_invoice_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("facturas.json");
        fs::write(&path, r#"{"results": [{"numero": 45, "items": []}]}"#).unwrap();

        let invoices = JsonFileSource::new(&path).fetch(&range()).unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].number.as_deref(), Some("45"));
    }

    #[test]
    fn test_missing_or_bad_file() {
        let dir = TempDir::new().unwrap();
        let missing = JsonFileSource::new(dir.path().join("missing.json"));
        assert!(matches!(missing.fetch(&range()), Err(SourceError::File { .. })));

        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileSource::new(&path).fetch(&range()),
            Err(SourceError::File { .. })
        ));
        assert!(matches!(
            JsonFileSource::new(&path).download_prebuilt_bundle(&range()),
            Err(SourceError::BundleUnavailable)
        ));
    }
}
