use serde::{Deserialize, Deserializer};

/// An invoice as returned by the accounting API. Every field is optional;
/// the field mapper documents the default used for each one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Invoice {
    #[serde(rename = "numero_establecimiento", default, deserialize_with = "code")]
    pub establishment: Option<String>,
    #[serde(rename = "punto_expedicion", default, deserialize_with = "code")]
    pub expedition_point: Option<String>,
    #[serde(rename = "numero", default, deserialize_with = "code")]
    pub number: Option<String>,
    /// Issue date, `YYYY-MM-DD`
    #[serde(rename = "fecha", default, deserialize_with = "code")]
    pub date: Option<String>,
    /// Payment term tag: "CO" (cash), "CR" (credit) or others
    #[serde(rename = "tipo_plazo", default, deserialize_with = "code")]
    pub payment_term: Option<String>,
    /// Any non-empty client object counts, even one without known keys
    #[serde(rename = "cliente", default, deserialize_with = "client")]
    pub client: Option<Client>,
    #[serde(rename = "total_iva", default, deserialize_with = "amount")]
    pub total_vat: Option<f64>,
    #[serde(rename = "total_exentas", default, deserialize_with = "amount")]
    pub total_exempt: Option<f64>,
    #[serde(rename = "vencimiento", default, deserialize_with = "code")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "list")]
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Client {
    #[serde(rename = "id_cliente", default, deserialize_with = "code")]
    pub id: Option<String>,
    #[serde(rename = "ruc", default, deserialize_with = "code")]
    pub tax_id: Option<String>,
    #[serde(rename = "nombre", default, deserialize_with = "code")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItem {
    #[serde(rename = "numero_linea", default, deserialize_with = "code")]
    pub line_number: Option<String>,
    #[serde(rename = "producto", default)]
    pub product: Option<Product>,
    #[serde(rename = "cantidad", default, deserialize_with = "amount")]
    pub quantity: Option<f64>,
    /// Unit price excluding tax
    #[serde(rename = "precio_neto", default, deserialize_with = "amount")]
    pub net_price: Option<f64>,
    /// Unit price including tax
    #[serde(rename = "precio", default, deserialize_with = "amount")]
    pub price: Option<f64>,
    #[serde(rename = "tasa", default, deserialize_with = "amount")]
    pub tax_rate: Option<f64>,
    #[serde(default, deserialize_with = "amount")]
    pub subtotal: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Product {
    #[serde(rename = "codigo", default, deserialize_with = "code")]
    pub code: Option<String>,
    #[serde(rename = "lote", default, deserialize_with = "code")]
    pub lot: Option<String>,
}

/// JSON scalars as the API sends them: decimals often arrive as strings,
/// identifiers sometimes as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(t) => t,
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Scalar::Float(f) => f.to_string(),
    }))
}

fn amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.and_then(|s| match s {
        Scalar::Text(t) => t.trim().parse().ok(),
        Scalar::Integer(i) => Some(i as f64),
        Scalar::Float(f) => Some(f),
    }))
}

/// `null` and `{}` both mean no client
fn client<'de, D>(deserializer: D) -> Result<Option<Client>, D::Error>
where
    D: Deserializer<'de>,
{
    let fields = Option::<serde_json::Map<String, serde_json::Value>>::deserialize(deserializer)?;
    match fields {
        Some(fields) if !fields.is_empty() => {
            Client::deserialize(serde_json::Value::Object(fields))
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
        _ => Ok(None),
    }
}

fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_api_invoice() {
        let json = r#"{
            "numero_establecimiento": "001",
            "punto_expedicion": 2,
            "numero": 45,
            "fecha": "2024-03-10",
            "tipo_plazo": "CR",
            "cliente": {"id_cliente": 7, "ruc": "80012345-6", "nombre": "Comercial Sur"},
            "total_iva": "109.09",
            "total_exentas": 0,
            "vencimiento": null,
            "items": [
                {"numero_linea": 1, "producto": {"codigo": "A1", "lote": null},
                 "cantidad": "2.000", "precio_neto": 454.55, "precio": "500", "tasa": 10,
                 "subtotal": "1000.00"}
            ]
        }"#;

        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.establishment.as_deref(), Some("001"));
        assert_eq!(invoice.expedition_point.as_deref(), Some("2"));
        assert_eq!(invoice.number.as_deref(), Some("45"));
        assert_eq!(invoice.total_vat, Some(109.09));
        assert_eq!(invoice.total_exempt, Some(0.0));
        assert_eq!(invoice.due_date, None);

        let client = invoice.client.unwrap();
        assert_eq!(client.id.as_deref(), Some("7"));
        assert_eq!(client.name.as_deref(), Some("Comercial Sur"));

        let item = &invoice.items[0];
        assert_eq!(item.line_number.as_deref(), Some("1"));
        assert_eq!(item.quantity, Some(2.0));
        assert_eq!(item.price, Some(500.0));
        assert_eq!(item.subtotal, Some(1000.0));
        assert_eq!(item.product.as_ref().unwrap().lot, None);
    }

    #[test]
    fn test_missing_and_null_fields_default() {
        let invoice: Invoice = serde_json::from_str(r#"{"items": null, "cliente": {}}"#).unwrap();
        assert!(invoice.number.is_none());
        assert!(invoice.items.is_empty());
        assert!(invoice.client.is_none());

        let invoice: Invoice = serde_json::from_str(r#"{"cliente": null}"#).unwrap();
        assert!(invoice.client.is_none());

        let invoice: Invoice = serde_json::from_str("{}").unwrap();
        assert!(invoice.client.is_none());
    }

    #[test]
    fn test_client_with_only_unknown_keys_is_present() {
        let invoice: Invoice =
            serde_json::from_str(r#"{"cliente": {"email": "compras@example.com"}}"#).unwrap();
        let client = invoice.client.unwrap();
        assert!(client.id.is_none());
        assert!(client.tax_id.is_none());
        assert!(client.name.is_none());

        let invoice: Invoice = serde_json::from_str(r#"{"cliente": {"id_cliente": null}}"#).unwrap();
        assert!(invoice.client.is_some());
    }

    #[test]
    fn test_unparseable_amount_is_absent() {
        let item: LineItem = serde_json::from_str(r#"{"subtotal": "n/a", "tasa": 5.0}"#).unwrap();
        assert_eq!(item.subtotal, None);
        assert_eq!(item.tax_rate, Some(5.0));
    }
}
