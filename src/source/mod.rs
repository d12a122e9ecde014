mod api;
mod file;

pub use api::ApiClient;
pub use file::JsonFileSource;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{ExportError, Result, SourceError};
use crate::invoice::Invoice;

/// Where invoices come from
pub trait InvoiceSource {
    /// Invoices issued within the range, in the order the source returns them
    fn fetch(&self, range: &DateRange) -> std::result::Result<Vec<Invoice>, SourceError>;

    /// A ZIP archive holding both tables already built by the server
    fn download_prebuilt_bundle(
        &self,
        range: &DateRange,
    ) -> std::result::Result<Vec<u8>, SourceError>;
}

/// Inclusive range of issue dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(ExportError::InvalidDateRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self { from, to })
    }

    /// Parse two `YYYY-MM-DD` dates
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    /// Query parameters understood by the API
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("fecha_desde", self.from.format("%Y-%m-%d").to_string()),
            ("fecha_hasta", self.to.format("%Y-%m-%d").to_string()),
        ]
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ExportError::InvalidDate(value.to_string()))
}

/// The list endpoint answers with either a bare array or a paginated object
#[derive(Deserialize)]
#[serde(untagged)]
enum InvoiceList {
    Page { results: Vec<Invoice> },
    Bare(Vec<Invoice>),
}

fn parse_invoices(body: &str) -> serde_json::Result<Vec<Invoice>> {
    Ok(match serde_json::from_str(body)? {
        InvoiceList::Page { results } => results,
        InvoiceList::Bare(list) => list,
    })
}
