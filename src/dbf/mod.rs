mod reader;
pub mod schema;
mod writer;

pub use reader::{read_table, FieldDescriptor, Table, TableInfo};
pub use schema::{FieldKind, FieldSpec, FieldValue, TableSchema, DETAIL_TABLE, HEADER_TABLE};
pub(crate) use writer::remove_companions;
pub use writer::{TableSummary, TableWriter, WriteOptions, COMPANION_EXTENSIONS};

use encoding::all::{WINDOWS_1250, WINDOWS_1251, WINDOWS_1252};
use encoding::{EncoderTrap, EncodingRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual FoxPro table signature (first header byte)
pub const VFP_SIGNATURE: u8 = 0x30;
pub const HEADER_PREFIX_LEN: usize = 32;
pub const DESCRIPTOR_LEN: usize = 32;
pub const BACKLINK_LEN: usize = 263;
pub const HEADER_TERMINATOR: u8 = 0x0D;
pub const EOF_MARKER: u8 = 0x1A;
pub const ACTIVE_RECORD: u8 = b' ';

/// Code page used for text fields, stored as a mark byte in the table header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codepage {
    #[default]
    Cp1252,
    Cp1250,
    Cp1251,
}

impl Codepage {
    pub fn mark(self) -> u8 {
        match self {
            Codepage::Cp1252 => 0x03,
            Codepage::Cp1250 => 0xC8,
            Codepage::Cp1251 => 0xC9,
        }
    }

    pub fn from_mark(mark: u8) -> Option<Self> {
        match mark {
            0x03 => Some(Codepage::Cp1252),
            0xC8 => Some(Codepage::Cp1250),
            0xC9 => Some(Codepage::Cp1251),
            _ => None,
        }
    }

    fn encoding(self) -> EncodingRef {
        match self {
            Codepage::Cp1252 => WINDOWS_1252,
            Codepage::Cp1250 => WINDOWS_1250,
            Codepage::Cp1251 => WINDOWS_1251,
        }
    }

    /// Encode text, replacing characters the code page cannot represent with '?'
    pub fn encode(self, input: &str) -> Vec<u8> {
        self.encoding()
            .encode(input, EncoderTrap::Replace)
            .unwrap_or_else(|_| input.bytes().map(|b| if b.is_ascii() { b } else { b'?' }).collect())
    }
}

impl fmt::Display for Codepage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codepage::Cp1252 => "cp1252",
            Codepage::Cp1250 => "cp1250",
            Codepage::Cp1251 => "cp1251",
        };
        f.write_str(name)
    }
}
