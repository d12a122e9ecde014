use chrono::NaiveDate;
use std::fmt;

use crate::dbf::FieldValue;
use crate::invoice::{Invoice, LineItem};

/// Branch code written on every header
pub const BRANCH_CODE: &str = "EU";
pub const CLAVE_WIDTH: usize = 19;
pub const BOLETA_WIDTH: usize = 7;

const CASH_TIPO: &str = "15";
const CREDIT_TIPO: &str = "17";

/// One MOVIMCAB row. Fields not listed here are always written unset.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub codsucur: String,
    pub tipo: String,
    pub fecha: String,
    pub boleta: String,
    pub primnrosbo: String,
    pub cliprov: Option<String>,
    pub totaliva: i64,
    pub totalvta10: i64,
    pub totalvta5: i64,
    pub totalexen: i64,
    pub vencimiento: Option<NaiveDate>,
    pub electvirtu: String,
    pub vendeclave: String,
    pub formapago: Option<String>,
    pub cliruc: String,
    pub clidescrip: String,
    pub ultfila: usize,
}

impl HeaderRecord {
    /// Values in MOVIMCAB field order
    pub fn to_values(&self) -> Vec<FieldValue> {
        let int = |v: i64| FieldValue::Numeric(Some(v as f64));
        let unset_text = || FieldValue::Text(None);
        let unset_num = || FieldValue::Numeric(None);
        let unset_date = || FieldValue::Date(None);

        vec![
            FieldValue::text(&self.codsucur),
            FieldValue::text(&self.tipo),
            FieldValue::text(&self.fecha),
            FieldValue::text(&self.boleta),
            unset_date(), // FECHABOL
            FieldValue::text(&self.primnrosbo),
            FieldValue::Text(self.cliprov.clone()),
            unset_text(), // TIMBRADO
            unset_date(), // TIMBRAVENC
            int(self.totaliva),
            unset_num(), // ANTICIREN
            int(self.totalvta10),
            int(self.totalvta5),
            int(self.totalexen),
            unset_num(), // COSTOFLETE
            unset_num(), // TOTCOSTODL
            FieldValue::Date(self.vencimiento),
            unset_date(), // FECHADESPA
            unset_text(), // NRODESPA
            unset_num(),  // DESPACHO
            unset_num(),  // VALORFACTU
            unset_num(),  // BASEIMP
            unset_num(),  // TIPOCAMBIO
            unset_num(),  // TOTALKILOS
            unset_num(),  // RETENCION
            unset_text(), // BOLETARETE
            unset_text(), // FECHARETEN
            unset_num(),  // VENTAS10Y5
            unset_text(), // LINEAPRECI
            unset_text(), // COMVTAASO
            unset_num(),  // TIMVTAASO
            unset_text(), // OPERMONEXT
            FieldValue::text(&self.electvirtu),
            FieldValue::text(&self.vendeclave),
            FieldValue::Text(self.formapago.clone()),
            FieldValue::text(&self.cliruc),
            FieldValue::text(&self.clidescrip),
            int(self.ultfila as i64),
            unset_text(), // REPROCESO
            unset_num(),  // TARJETA
            unset_text(), // EMAIL
        ]
    }
}

/// One MOVIMITE row
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub clave: String,
    pub item: String,
    pub codigo: String,
    pub cantidad: f64,
    pub precioivent: f64,
    pub precioiva: f64,
    pub tasa: i64,
    pub lote: String,
}

impl DetailRecord {
    /// Values in MOVIMITE field order
    pub fn to_values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::text(&self.clave),
            FieldValue::text(&self.item),
            FieldValue::text(&self.codigo),
            FieldValue::number(self.cantidad),
            FieldValue::number(self.precioivent),
            FieldValue::number(self.precioiva),
            FieldValue::number(0),
            FieldValue::number(0),
            FieldValue::number(0),
            FieldValue::Numeric(Some(self.tasa as f64)),
            FieldValue::text(&self.lote),
        ]
    }
}

/// A field that could not be read and was written unset instead
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingWarning {
    pub boleta: String,
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "boleta '{}': {} '{}' left blank ({})",
            self.boleta, self.field, self.value, self.reason
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedInvoice {
    pub header: HeaderRecord,
    pub details: Vec<DetailRecord>,
    pub warnings: Vec<MappingWarning>,
}

/// Build the header row and one detail row per line item for an invoice
pub fn map_invoice(invoice: &Invoice) -> MappedInvoice {
    let mut warnings = Vec::new();

    let tipo = tipo_for(invoice.payment_term.as_deref()).to_string();
    let fecha = invoice.date.as_deref().map(compact_date).unwrap_or_default();
    let boleta = match invoice.number.as_deref() {
        Some(n) if !n.is_empty() => zero_pad_tail(n, BOLETA_WIDTH),
        _ => String::new(),
    };

    let establishment = zero_pad_tail(invoice.establishment.as_deref().unwrap_or(""), 3);
    let expedition = zero_pad_tail(invoice.expedition_point.as_deref().unwrap_or(""), 3);
    let primnrosbo: String = format!("{establishment}{expedition}").chars().take(6).collect();

    let client = invoice.client.as_ref();
    let cliprov = if tipo == CASH_TIPO {
        None
    } else {
        client.map(|c| zero_pad_tail(c.id.as_deref().unwrap_or(""), 4))
    };

    let (totalvta10, totalvta5) = sales_by_rate(&invoice.items);

    let vencimiento = match invoice.due_date.as_deref() {
        None | Some("") => None,
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(e) => {
                warnings.push(MappingWarning {
                    boleta: boleta.clone(),
                    field: "VENCIMIENT",
                    value: raw.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        },
    };

    let clave = pad_or_truncate(&format!("{BRANCH_CODE}{tipo}{fecha}{boleta}"), CLAVE_WIDTH);
    let details = invoice
        .items
        .iter()
        .map(|item| map_line(item, &clave))
        .collect();

    let header = HeaderRecord {
        codsucur: BRANCH_CODE.to_string(),
        formapago: (tipo == CASH_TIPO).then(|| "N".to_string()),
        tipo,
        fecha,
        boleta,
        primnrosbo,
        cliprov,
        totaliva: whole(invoice.total_vat),
        totalvta10,
        totalvta5,
        totalexen: whole(invoice.total_exempt),
        vencimiento,
        electvirtu: "N".to_string(),
        vendeclave: "BB".to_string(),
        cliruc: client.and_then(|c| c.tax_id.clone()).unwrap_or_default(),
        clidescrip: client.and_then(|c| c.name.clone()).unwrap_or_default(),
        ultfila: invoice.items.len(),
    };

    MappedInvoice {
        header,
        details,
        warnings,
    }
}

fn map_line(item: &LineItem, clave: &str) -> DetailRecord {
    let product = item.product.as_ref();
    DetailRecord {
        clave: clave.to_string(),
        item: zero_pad_tail(item.line_number.as_deref().unwrap_or(""), 2),
        codigo: product.and_then(|p| p.code.clone()).unwrap_or_default(),
        cantidad: item.quantity.unwrap_or(0.0),
        precioivent: item.net_price.unwrap_or(0.0),
        precioiva: item.price.unwrap_or(0.0),
        tasa: rate_of(item),
        lote: product
            .and_then(|p| p.lot.as_deref())
            .map(|lot| lot.chars().take(6).collect())
            .unwrap_or_default(),
    }
}

fn tipo_for(payment_term: Option<&str>) -> &'static str {
    match payment_term {
        Some("CO") => CASH_TIPO,
        Some("CR") => CREDIT_TIPO,
        _ => "",
    }
}

/// Subtotals rounded half to even, summed into the 10% and 5% buckets
fn sales_by_rate(items: &[LineItem]) -> (i64, i64) {
    items.iter().fold((0, 0), |(ten, five), item| {
        let subtotal = item.subtotal.unwrap_or(0.0).round_ties_even() as i64;
        match rate_of(item) {
            10 => (ten + subtotal, five),
            5 => (ten, five + subtotal),
            _ => (ten, five),
        }
    })
}

fn rate_of(item: &LineItem) -> i64 {
    item.tax_rate.map(|r| r.trunc() as i64).unwrap_or(0)
}

fn whole(amount: Option<f64>) -> i64 {
    amount.map(|v| v.trunc() as i64).unwrap_or(0)
}

/// `2024-03-10` -> `20240310`
fn compact_date(date: &str) -> String {
    date.chars()
        .filter(|c| !matches!(c, '-' | '/' | '.'))
        .take(8)
        .collect()
}

/// Left-pad with zeros to `width`, then keep the last `width` characters
fn zero_pad_tail(value: &str, width: usize) -> String {
    let padded = format!("{value:0>width$}");
    let len = padded.chars().count();
    padded.chars().skip(len - width).collect()
}

fn pad_or_truncate(value: &str, width: usize) -> String {
    format!("{value:<width$}").chars().take(width).collect()
}
