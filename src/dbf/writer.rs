use chrono::{Datelike, Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::schema::{FieldKind, FieldSpec, FieldValue, TableSchema};
use super::{
    Codepage, ACTIVE_RECORD, BACKLINK_LEN, EOF_MARKER, HEADER_TERMINATOR, VFP_SIGNATURE,
};
use crate::error::WriteError;

/// Side files sharing a table's base name that must not survive a rewrite
/// (table, structural index, memo), in both cases.
pub const COMPANION_EXTENSIONS: [&str; 6] = ["dbf", "cdx", "fpt", "DBF", "CDX", "FPT"];

/// Offset of the record counter in the table header
const RECORD_COUNT_OFFSET: u64 = 4;

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub codepage: Codepage,
    /// Stored in the header as the table's last update
    pub last_update: NaiveDate,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            codepage: Codepage::default(),
            last_update: Local::now().date_naive(),
        }
    }
}

/// Final shape of a closed table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub path: PathBuf,
    records: u32,
    bytes: u64,
}

impl TableSummary {
    pub fn record_count(&self) -> u32 {
        self.records
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes
    }
}

/// Appends fixed-layout records to a freshly created table.
///
/// Every append rewrites the end-of-file marker and the header's record
/// counter, so the file on disk is a valid table after each record.
pub struct TableWriter<'a> {
    path: PathBuf,
    schema: &'a TableSchema,
    codepage: Codepage,
    file: File,
    records: u32,
    buf: Vec<u8>,
}

impl<'a> TableWriter<'a> {
    /// Create (or replace) the table at `path`, removing stale companion files first
    pub fn create(
        path: &Path,
        schema: &'a TableSchema,
        options: WriteOptions,
    ) -> Result<Self, WriteError> {
        remove_companions(path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| io_error(path, e))?;

        let mut header = encode_header(schema, &options);
        header.push(EOF_MARKER);
        file.write_all(&header).map_err(|e| io_error(path, e))?;
        file.flush().map_err(|e| io_error(path, e))?;

        debug!(table = schema.name, path = %path.display(), "created table");

        Ok(Self {
            path: path.to_path_buf(),
            schema,
            codepage: options.codepage,
            file,
            records: 0,
            buf: Vec::with_capacity(schema.record_len() + 1),
        })
    }

    /// Append one record; `values` must follow the schema's field order
    pub fn append(&mut self, values: &[FieldValue]) -> Result<(), WriteError> {
        let fields = self.schema.fields;
        if values.len() != fields.len() {
            return Err(WriteError::FieldCount {
                table: self.schema.name.to_string(),
                expected: fields.len(),
                found: values.len(),
            });
        }

        let next = self
            .records
            .checked_add(1)
            .ok_or_else(|| WriteError::TooManyRecords(self.path.clone()))?;

        self.buf.clear();
        self.buf.push(ACTIVE_RECORD);
        for (field, value) in fields.iter().zip(values) {
            encode_value(&mut self.buf, field, value, self.codepage)?;
        }
        self.buf.push(EOF_MARKER);

        let offset = self.schema.header_len() as u64
            + self.records as u64 * self.schema.record_len() as u64;

        write_at(&mut self.file, offset, &self.buf)
            .and_then(|_| write_at(&mut self.file, RECORD_COUNT_OFFSET, &next.to_le_bytes()))
            .map_err(|e| io_error(&self.path, e))?;

        self.records = next;
        Ok(())
    }

    pub fn record_count(&self) -> u32 {
        self.records
    }

    /// Flush to disk and report the final record count and size
    pub fn close(mut self) -> Result<TableSummary, WriteError> {
        let path = &self.path;
        self.file.flush().map_err(|e| io_error(path, e))?;
        self.file.sync_all().map_err(|e| io_error(path, e))?;
        let bytes = self.file.metadata().map_err(|e| io_error(path, e))?.len();

        debug!(
            table = self.schema.name,
            records = self.records,
            bytes,
            "closed table"
        );

        Ok(TableSummary {
            path: self.path,
            records: self.records,
            bytes,
        })
    }
}

fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)
}

fn io_error(path: &Path, source: std::io::Error) -> WriteError {
    WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Delete the table and its index/memo side files at the same base path
pub(crate) fn remove_companions(path: &Path) -> Result<(), WriteError> {
    for ext in COMPANION_EXTENSIONS {
        let candidate = path.with_extension(ext);
        match fs::remove_file(&candidate) {
            Ok(()) => debug!(path = %candidate.display(), "removed stale table file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&candidate, e)),
        }
    }
    Ok(())
}

fn encode_header(schema: &TableSchema, options: &WriteOptions) -> Vec<u8> {
    let mut out = Vec::with_capacity(schema.header_len() + 1);
    let date = options.last_update;

    out.push(VFP_SIGNATURE);
    out.push(date.year().saturating_sub(1900).clamp(0, 255) as u8);
    out.push(date.month() as u8);
    out.push(date.day() as u8);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(schema.header_len() as u16).to_le_bytes());
    out.extend_from_slice(&(schema.record_len() as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.push(0); // table flags
    out.push(options.codepage.mark());
    out.extend_from_slice(&[0u8; 2]);

    // Displacement of each field inside the record; byte 0 is the deletion flag
    let mut displacement: u32 = 1;
    for field in schema.fields {
        let mut name = [0u8; 11];
        let bytes = field.name.as_bytes();
        let len = bytes.len().min(10);
        name[..len].copy_from_slice(&bytes[..len]);

        out.extend_from_slice(&name);
        out.push(field.kind.type_code());
        out.extend_from_slice(&displacement.to_le_bytes());
        out.push(field.width);
        out.push(field.decimals);
        out.push(0); // field flags
        out.extend_from_slice(&[0u8; 4]); // autoincrement next value
        out.push(0); // autoincrement step
        out.extend_from_slice(&[0u8; 8]);

        displacement += field.width as u32;
    }

    out.push(HEADER_TERMINATOR);
    out.extend_from_slice(&[0u8; BACKLINK_LEN]);
    out
}

fn encode_value(
    out: &mut Vec<u8>,
    field: &FieldSpec,
    value: &FieldValue,
    codepage: Codepage,
) -> Result<(), WriteError> {
    let width = field.width as usize;
    match (field.kind, value) {
        (FieldKind::Text, FieldValue::Text(text)) => {
            let mut bytes = text
                .as_deref()
                .map(|t| codepage.encode(t))
                .unwrap_or_default();
            bytes.resize(width, b' ');
            out.extend_from_slice(&bytes);
        }
        (FieldKind::Numeric, FieldValue::Numeric(number)) => {
            let rendered = render_numeric(field, number.unwrap_or(0.0))?;
            out.extend_from_slice(rendered.as_bytes());
        }
        (FieldKind::Date, FieldValue::Date(date)) => match date {
            Some(d) => out.extend_from_slice(d.format("%Y%m%d").to_string().as_bytes()),
            None => out.extend(std::iter::repeat(b' ').take(width)),
        },
        (kind, _) => {
            return Err(WriteError::TypeMismatch {
                field: field.name.to_string(),
                expected: kind.label(),
            })
        }
    }
    Ok(())
}

/// Right-aligned with exactly `decimals` fractional digits
fn render_numeric(field: &FieldSpec, value: f64) -> Result<String, WriteError> {
    let overflow = || WriteError::FieldOverflow {
        field: field.name.to_string(),
        value: value.to_string(),
        width: field.width,
    };
    if !value.is_finite() {
        return Err(overflow());
    }

    // Avoid writing "-0"
    let value = if value == 0.0 { 0.0 } else { value };
    let width = field.width as usize;
    let rendered = format!("{:>width$.prec$}", value, width = width, prec = field.decimals as usize);
    if rendered.len() > width {
        return Err(overflow());
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbf::schema::{DETAIL_TABLE, HEADER_TABLE};
    use tempfile::TempDir;

    static TINY_TABLE: TableSchema = TableSchema {
        name: "TINY",
        fields: &[
            FieldSpec::text("NAME", 4),
            FieldSpec::numeric("QTY", 6, 2),
            FieldSpec::date("WHEN"),
        ],
    };

    fn options() -> WriteOptions {
        WriteOptions {
            codepage: Codepage::Cp1252,
            last_update: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        }
    }

    fn encode(field: FieldSpec, value: FieldValue) -> Result<String, WriteError> {
        let mut out = Vec::new();
        encode_value(&mut out, &field, &value, Codepage::Cp1252)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_text_is_padded_and_truncated() {
        let field = FieldSpec::text("NAME", 4);
        assert_eq!(encode(field, FieldValue::text("ab")).unwrap(), "ab  ");
        assert_eq!(encode(field, FieldValue::text("abcdef")).unwrap(), "abcd");
        assert_eq!(encode(field, FieldValue::Text(None)).unwrap(), "    ");
    }

    #[test]
    fn test_numeric_rendering() {
        let field = FieldSpec::numeric("QTY", 6, 2);
        assert_eq!(encode(field, FieldValue::number(3.5)).unwrap(), "  3.50");
        assert_eq!(encode(field, FieldValue::Numeric(None)).unwrap(), "  0.00");
        assert_eq!(encode(field, FieldValue::number(-0.0)).unwrap(), "  0.00");

        let whole = FieldSpec::numeric("TOTAL", 5, 0);
        assert_eq!(encode(whole, FieldValue::number(1200)).unwrap(), " 1200");
    }

    #[test]
    fn test_numeric_overflow_is_an_error() {
        let field = FieldSpec::numeric("ULTFILA", 2, 0);
        let err = encode(field, FieldValue::number(100)).unwrap_err();
        assert!(matches!(err, WriteError::FieldOverflow { width: 2, .. }));

        let err = encode(field, FieldValue::number(f64::NAN)).unwrap_err();
        assert!(matches!(err, WriteError::FieldOverflow { .. }));
    }

    #[test]
    fn test_date_rendering() {
        let field = FieldSpec::date("WHEN");
        let date = NaiveDate::from_ymd_opt(2024, 1, 31);
        assert_eq!(encode(field, FieldValue::Date(date)).unwrap(), "20240131");
        assert_eq!(encode(field, FieldValue::Date(None)).unwrap(), "        ");
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let err = encode(FieldSpec::date("WHEN"), FieldValue::text("x")).unwrap_err();
        assert!(matches!(err, WriteError::TypeMismatch { expected: "date", .. }));
    }

    #[test]
    fn test_header_bytes() {
        let header = encode_header(&TINY_TABLE, &options());
        assert_eq!(header.len(), TINY_TABLE.header_len());
        assert_eq!(header[0], VFP_SIGNATURE);
        assert_eq!(&header[1..4], &[124, 3, 10]);
        assert_eq!(u16::from_le_bytes([header[8], header[9]]) as usize, 32 + 3 * 32 + 264);
        assert_eq!(u16::from_le_bytes([header[10], header[11]]), 1 + 4 + 6 + 8);
        assert_eq!(header[29], 0x03);

        let second = &header[64..96];
        assert_eq!(&second[..3], b"QTY");
        assert_eq!(second[11], b'N');
        assert_eq!(u32::from_le_bytes([second[12], second[13], second[14], second[15]]), 5);
        assert_eq!(second[16], 6);
        assert_eq!(second[17], 2);
        assert_eq!(header[32 + 3 * 32], HEADER_TERMINATOR);
    }

    #[test]
    fn test_write_and_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.dbf");

        let mut writer = TableWriter::create(&path, &TINY_TABLE, options()).unwrap();
        writer
            .append(&[
                FieldValue::text("ab"),
                FieldValue::number(1.25),
                FieldValue::Date(None),
            ])
            .unwrap();
        assert_eq!(writer.record_count(), 1);
        let summary = writer.close().unwrap();

        assert_eq!(summary.record_count(), 1);
        let expected = TINY_TABLE.header_len() + TINY_TABLE.record_len() + 1;
        assert_eq!(summary.byte_size(), expected as u64);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), expected);
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        let record = &bytes[TINY_TABLE.header_len()..expected - 1];
        assert_eq!(record, b" ab    1.25        ");
        assert_eq!(bytes[expected - 1], EOF_MARKER);
    }

    #[test]
    fn test_file_is_consistent_after_each_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.dbf");

        let mut writer = TableWriter::create(&path, &TINY_TABLE, options()).unwrap();
        for n in 1..=3u32 {
            writer
                .append(&[
                    FieldValue::text("x"),
                    FieldValue::number(n),
                    FieldValue::Date(None),
                ])
                .unwrap();

            // Read while the writer is still open
            let bytes = fs::read(&path).unwrap();
            assert_eq!(&bytes[4..8], &n.to_le_bytes());
            let expected = TINY_TABLE.header_len() + TINY_TABLE.record_len() * n as usize + 1;
            assert_eq!(bytes.len(), expected);
            assert_eq!(*bytes.last().unwrap(), EOF_MARKER);
        }
        writer.close().unwrap();
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.dbf");
        let mut writer = TableWriter::create(&path, &TINY_TABLE, options()).unwrap();

        let err = writer.append(&[FieldValue::text("x")]).unwrap_err();
        assert!(matches!(
            err,
            WriteError::FieldCount {
                expected: 3,
                found: 1,
                ..
            }
        ));
        assert_eq!(writer.close().unwrap().record_count(), 0);
    }

    #[test]
    fn test_create_removes_companion_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("MOVIMCAB.DBF");
        let index = dir.path().join("MOVIMCAB.CDX");
        let memo = dir.path().join("MOVIMCAB.fpt");
        let unrelated = dir.path().join("MOVIMITE.CDX");
        for p in [&path, &index, &memo, &unrelated] {
            fs::write(p, b"stale").unwrap();
        }

        let writer = TableWriter::create(&path, &DETAIL_TABLE, options()).unwrap();
        writer.close().unwrap();

        assert!(path.exists());
        assert!(!index.exists());
        assert!(!memo.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_overwrite_with_different_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.dbf");

        let mut writer = TableWriter::create(&path, &DETAIL_TABLE, options()).unwrap();
        let row: Vec<FieldValue> = DETAIL_TABLE
            .fields
            .iter()
            .map(|f| match f.kind {
                FieldKind::Text => FieldValue::Text(None),
                FieldKind::Numeric => FieldValue::Numeric(None),
                FieldKind::Date => FieldValue::Date(None),
            })
            .collect();
        writer.append(&row).unwrap();
        writer.append(&row).unwrap();
        writer.close().unwrap();

        let summary = TableWriter::create(&path, &HEADER_TABLE, options())
            .unwrap()
            .close()
            .unwrap();
        assert_eq!(summary.record_count(), 0);
        assert_eq!(summary.byte_size(), HEADER_TABLE.header_len() as u64 + 1);
    }
}
