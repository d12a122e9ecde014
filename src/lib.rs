pub mod config;
pub mod dbf;
pub mod error;
pub mod export;
pub mod invoice;
pub mod mapping;
pub mod source;

pub use config::{Config, ExportSettings, Session};
pub use error::{ExportError, Result, SourceError, WriteError};
pub use export::{export, extract_bundle, ExportStats, Exporter};
pub use invoice::{Client, Invoice, LineItem, Product};
pub use mapping::{map_invoice, DetailRecord, HeaderRecord, MappedInvoice, MappingWarning};
pub use source::{ApiClient, DateRange, InvoiceSource, JsonFileSource};
