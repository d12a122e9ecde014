use chrono::NaiveDate;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use super::schema::{FieldKind, TableSchema, DETAIL_TABLE, HEADER_TABLE};
use super::{Codepage, BACKLINK_LEN, HEADER_PREFIX_LEN, VFP_SIGNATURE};
use crate::error::{ExportError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub width: u8,
    /// Only known when the table has one of the export layouts
    pub decimals: Option<u8>,
}

impl FieldDescriptor {
    /// Compact notation such as `C(19)` or `N(12,3)`
    pub fn notation(&self) -> String {
        match (self.kind, self.decimals) {
            (FieldKind::Text, _) => format!("C({})", self.width),
            (FieldKind::Numeric, Some(d)) => format!("N({},{})", self.width, d),
            (FieldKind::Numeric, None) => format!("N({})", self.width),
            (FieldKind::Date, _) => "D".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub signature: u8,
    pub last_update: Option<NaiveDate>,
    pub records: u32,
    pub header_len: u16,
    pub record_len: u16,
    pub codepage: Option<Codepage>,
    pub fields: Vec<FieldDescriptor>,
}

/// A table read fully into memory. Text keeps its leading spaces; numbers
/// and dates are rendered back to text; blank values are empty strings.
#[derive(Debug, Clone)]
pub struct Table {
    pub info: TableInfo,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Value of the named field in a row
    pub fn value(&self, row: usize, field: &str) -> Option<&str> {
        let col = self.info.fields.iter().position(|f| f.name == field)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

/// Read a table's header, field descriptors and active records
pub fn read_table(path: &Path) -> Result<Table> {
    let prefix = read_prefix(path)?;

    let mut reader =
        dbase::Reader::from_path(path).map_err(|e| not_a_table(path, e.to_string()))?;
    reader.set_options(dbase::ReadingOptions::default().character_trim(dbase::TrimOption::End));

    let layout = known_layout(reader.fields());
    let mut fields = Vec::with_capacity(reader.fields().len());
    for (i, field) in reader.fields().iter().enumerate() {
        let kind = FieldKind::from_type_code(u8::from(field.field_type())).ok_or_else(|| {
            not_a_table(
                path,
                format!("field {} has unsupported type {:?}", field.name(), field.field_type()),
            )
        })?;
        fields.push(FieldDescriptor {
            name: field.name().to_string(),
            kind,
            width: field.length(),
            decimals: match kind {
                FieldKind::Numeric => layout.map(|schema| schema.fields[i].decimals),
                _ => None,
            },
        });
    }

    let header = reader.header();
    let updated = header.last_update;
    let info = TableInfo {
        signature: prefix[0],
        last_update: NaiveDate::from_ymd_opt(
            updated.year() as i32,
            updated.month(),
            updated.day(),
        ),
        records: header.num_records,
        header_len: header.offset_to_first_record,
        record_len: header.size_of_record,
        codepage: Codepage::from_mark(prefix[29]),
        fields,
    };

    let records = reader
        .read()
        .map_err(|e| not_a_table(path, e.to_string()))?;
    let rows = records
        .iter()
        .map(|record| {
            info.fields
                .iter()
                .map(|f| record.get(&f.name).map(render).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(Table { info, rows })
}

/// Sanity-check the fixed header prefix before handing the file to the
/// dbase reader, which assumes a well-formed header.
fn read_prefix(path: &Path) -> Result<[u8; HEADER_PREFIX_LEN]> {
    let mut prefix = [0u8; HEADER_PREFIX_LEN];
    File::open(path)?.read_exact(&mut prefix).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => not_a_table(path, "file too short".to_string()),
        _ => ExportError::Io(e),
    })?;

    let header_len = u16::from_le_bytes([prefix[8], prefix[9]]) as usize;
    let record_len = u16::from_le_bytes([prefix[10], prefix[11]]);
    let mut minimum = HEADER_PREFIX_LEN + 1;
    if (VFP_SIGNATURE..=VFP_SIGNATURE + 2).contains(&prefix[0]) {
        minimum += BACKLINK_LEN;
    }
    if header_len < minimum || record_len < 2 {
        return Err(not_a_table(
            path,
            format!("header length {header_len} or record length {record_len} is invalid"),
        ));
    }
    Ok(prefix)
}

/// The export layout with exactly these fields, if any
fn known_layout(fields: &[dbase::FieldInfo]) -> Option<&'static TableSchema> {
    [&HEADER_TABLE, &DETAIL_TABLE].into_iter().find(|schema| {
        schema.fields.len() == fields.len()
            && schema
                .fields
                .iter()
                .zip(fields)
                .all(|(spec, f)| spec.name == f.name() && spec.width == f.length())
    })
}

fn render(value: &dbase::FieldValue) -> String {
    use dbase::FieldValue as V;

    match value {
        V::Character(Some(s)) => s.clone(),
        V::Numeric(Some(n)) => n.to_string(),
        V::Date(Some(d)) => format!("{:04}{:02}{:02}", d.year(), d.month(), d.day()),
        V::Character(None) | V::Numeric(None) | V::Date(None) => String::new(),
        other => format!("{other:?}"),
    }
}

fn not_a_table(path: &Path, reason: String) -> ExportError {
    ExportError::NotATable {
        path: PathBuf::from(path),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbf::{FieldSpec, FieldValue, TableWriter, WriteOptions};
    use std::fs;
    use tempfile::TempDir;

    fn options() -> WriteOptions {
        WriteOptions {
            codepage: Codepage::Cp1252,
            last_update: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
        }
    }

    #[test]
    fn test_reads_back_written_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("MOVIMITE.DBF");

        let mut writer = TableWriter::create(&path, &DETAIL_TABLE, options()).unwrap();
        writer
            .append(&[
                FieldValue::text("EU1520240310000004"),
                FieldValue::text("01"),
                FieldValue::text("P-001"),
                FieldValue::number(2.5),
                FieldValue::number(500.0),
                FieldValue::number(550.0),
                FieldValue::number(0),
                FieldValue::number(0),
                FieldValue::number(0),
                FieldValue::number(10),
                FieldValue::text("Señal"),
            ])
            .unwrap();
        writer.close().unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.info.signature, 0x30);
        assert_eq!(table.info.records, 1);
        assert_eq!(table.info.header_len, 648);
        assert_eq!(table.info.record_len, 101);
        assert_eq!(table.info.codepage, Some(Codepage::Cp1252));
        assert_eq!(table.info.last_update, NaiveDate::from_ymd_opt(2025, 12, 1));
        assert_eq!(table.info.fields.len(), 11);
        assert_eq!(table.info.fields[0].notation(), "C(19)");
        assert_eq!(table.info.fields[7].notation(), "N(10,5)");

        assert_eq!(table.value(0, "ITEM"), Some("01"));
        assert_eq!(table.value(0, "CANTIDAD"), Some("2.5"));
        assert_eq!(table.value(0, "PRECIOCODL"), Some("0"));
        assert_eq!(table.value(0, "TASA"), Some("10"));
        assert_eq!(table.value(0, "LOTE"), Some("Señal"));
        assert_eq!(table.value(1, "ITEM"), None);
    }

    #[test]
    fn test_unknown_layout_has_no_decimals() {
        static NOTES: TableSchema = TableSchema {
            name: "NOTES",
            fields: &[
                FieldSpec::text("NOTE", 6),
                FieldSpec::numeric("AMOUNT", 8, 2),
                FieldSpec::date("WHEN"),
            ],
        };

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("NOTES.DBF");
        let mut writer = TableWriter::create(&path, &NOTES, options()).unwrap();
        writer
            .append(&[
                FieldValue::text("  left"),
                FieldValue::number(12.5),
                FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 31)),
            ])
            .unwrap();
        writer
            .append(&[
                FieldValue::Text(None),
                FieldValue::Numeric(None),
                FieldValue::Date(None),
            ])
            .unwrap();
        writer.close().unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.info.fields[1].notation(), "N(8)");
        assert_eq!(table.value(0, "NOTE"), Some("  left"));
        assert_eq!(table.value(0, "AMOUNT"), Some("12.5"));
        assert_eq!(table.value(0, "WHEN"), Some("20240131"));
        assert_eq!(table.value(1, "NOTE"), Some(""));
        assert_eq!(table.value(1, "AMOUNT"), Some("0"));
        assert_eq!(table.value(1, "WHEN"), Some(""));
    }

    #[test]
    fn test_rejects_non_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.dbf");
        fs::write(&path, b"hello").unwrap();

        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, ExportError::NotATable { .. }));
    }

    #[test]
    fn test_rejects_truncated_foxpro_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.dbf");
        let mut bytes = vec![0u8; 64];
        bytes[0] = VFP_SIGNATURE;
        bytes[8..10].copy_from_slice(&64u16.to_le_bytes());
        bytes[10..12].copy_from_slice(&10u16.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, ExportError::NotATable { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_table(&dir.path().join("absent.dbf")).unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));
    }
}
