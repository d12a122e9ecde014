use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the invoice source. Always raised before any table is touched.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("Unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    #[error("Login rejected: no access token in response")]
    MissingToken,

    #[error("Failed to read invoices from {path}: {reason}")]
    File { path: PathBuf, reason: String },

    #[error("This source cannot provide a pre-built bundle")]
    BundleUnavailable,
}

/// Failures creating, appending to or closing a table.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Record has {found} values but table {table} has {expected} fields")]
    FieldCount {
        table: String,
        expected: usize,
        found: usize,
    },

    #[error("Field {field} expects a {expected} value")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("Value {value} does not fit field {field} (width {width})")]
    FieldOverflow {
        field: String,
        value: String,
        width: u8,
    },

    #[error("Table {0} is full")]
    TooManyRecords(PathBuf),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Config directory not found at {0}. Run 'invoice-dbf init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Not logged in. Run 'invoice-dbf login' first or pass --input.")]
    NotLoggedIn,

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid date range: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },

    #[error("Not a DBF table: {path} ({reason})")]
    NotATable { path: PathBuf, reason: String },

    #[error("Bundle entry '{0}' would be written outside the output directory")]
    UnsafeBundleEntry(String),

    #[error("Failed to extract bundle: {0}")]
    Bundle(#[from] zip::result::ZipError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
