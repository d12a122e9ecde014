use chrono::NaiveDate;

use super::{BACKLINK_LEN, DESCRIPTOR_LEN, HEADER_PREFIX_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
    Date,
}

impl FieldKind {
    /// Single-letter type code stored in the field descriptor
    pub fn type_code(self) -> u8 {
        match self {
            FieldKind::Text => b'C',
            FieldKind::Numeric => b'N',
            FieldKind::Date => b'D',
        }
    }

    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            b'C' => Some(FieldKind::Text),
            b'N' => Some(FieldKind::Numeric),
            b'D' => Some(FieldKind::Date),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Numeric => "numeric",
            FieldKind::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub width: u8,
    pub decimals: u8,
}

impl FieldSpec {
    pub const fn text(name: &'static str, width: u8) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            width,
            decimals: 0,
        }
    }

    pub const fn numeric(name: &'static str, width: u8, decimals: u8) -> Self {
        Self {
            name,
            kind: FieldKind::Numeric,
            width,
            decimals,
        }
    }

    pub const fn date(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Date,
            width: 8,
            decimals: 0,
        }
    }
}

/// An ordered, fixed record layout
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl TableSchema {
    /// Bytes per record, including the leading deletion flag
    pub fn record_len(&self) -> usize {
        1 + self.fields.iter().map(|f| f.width as usize).sum::<usize>()
    }

    /// Bytes before the first record: prefix, descriptors, terminator and backlink
    pub fn header_len(&self) -> usize {
        HEADER_PREFIX_LEN + DESCRIPTOR_LEN * self.fields.len() + 1 + BACKLINK_LEN
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single field value handed to the writer. `None` means unset.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Numeric(Option<f64>),
    Date(Option<NaiveDate>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(Some(value.into()))
    }

    pub fn number(value: impl Into<f64>) -> Self {
        FieldValue::Numeric(Some(value.into()))
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Numeric(_) => FieldKind::Numeric,
            FieldValue::Date(_) => FieldKind::Date,
        }
    }
}

/// Invoice header table (one row per invoice)
pub static HEADER_TABLE: TableSchema = TableSchema {
    name: "MOVIMCAB",
    fields: &[
        FieldSpec::text("CODSUCUR", 2),
        FieldSpec::text("TIPO", 2),
        FieldSpec::text("FECHA", 8),
        FieldSpec::text("BOLETA", 7),
        FieldSpec::date("FECHABOL"),
        FieldSpec::text("PRIMNROSBO", 6),
        FieldSpec::text("CLIPROV", 4),
        FieldSpec::text("TIMBRADO", 8),
        FieldSpec::date("TIMBRAVENC"),
        FieldSpec::numeric("TOTALIVA", 11, 0),
        FieldSpec::numeric("ANTICIREN", 8, 0),
        FieldSpec::numeric("TOTALVTA10", 12, 0),
        FieldSpec::numeric("TOTALVTA5", 12, 0),
        FieldSpec::numeric("TOTALEXEN", 12, 0),
        FieldSpec::numeric("COSTOFLETE", 13, 3),
        FieldSpec::numeric("TOTCOSTODL", 9, 2),
        FieldSpec::date("VENCIMIENT"),
        FieldSpec::date("FECHADESPA"),
        FieldSpec::text("NRODESPA", 16),
        FieldSpec::numeric("DESPACHO", 8, 0),
        FieldSpec::numeric("VALORFACTU", 12, 0),
        FieldSpec::numeric("BASEIMP", 12, 0),
        FieldSpec::numeric("TIPOCAMBIO", 5, 0),
        FieldSpec::numeric("TOTALKILOS", 9, 3),
        FieldSpec::numeric("RETENCION", 8, 0),
        FieldSpec::text("BOLETARETE", 7),
        FieldSpec::text("FECHARETEN", 8),
        FieldSpec::numeric("VENTAS10Y5", 12, 0),
        FieldSpec::text("LINEAPRECI", 1),
        FieldSpec::text("COMVTAASO", 13),
        FieldSpec::numeric("TIMVTAASO", 8, 0),
        FieldSpec::text("OPERMONEXT", 1),
        FieldSpec::text("ELECTVIRTU", 1),
        FieldSpec::text("VENDECLAVE", 2),
        FieldSpec::text("FORMAPAGO", 1),
        FieldSpec::text("CLIRUC", 9),
        FieldSpec::text("CLIDESCRIP", 40),
        FieldSpec::numeric("ULTFILA", 2, 0),
        FieldSpec::text("REPROCESO", 1),
        FieldSpec::numeric("TARJETA", 2, 0),
        FieldSpec::text("EMAIL", 40),
    ],
};

/// Invoice line table (one row per line item, linked by CLAVE)
pub static DETAIL_TABLE: TableSchema = TableSchema {
    name: "MOVIMITE",
    fields: &[
        FieldSpec::text("CLAVE", 19),
        FieldSpec::text("ITEM", 2),
        FieldSpec::text("CODIGO", 5),
        FieldSpec::numeric("CANTIDAD", 11, 3),
        FieldSpec::numeric("PRECIOVENT", 12, 3),
        FieldSpec::numeric("PRECIOIVA", 12, 3),
        FieldSpec::numeric("PRECIOCOST", 12, 3),
        FieldSpec::numeric("PRECIOCODL", 10, 5),
        FieldSpec::numeric("PRECIVENDL", 9, 4),
        FieldSpec::numeric("TASA", 2, 0),
        FieldSpec::text("LOTE", 6),
    ],
};
