use crate::invoice::fields::INVOICE_CURRENCY;
use crate::invoice::fields::INVOICE_NUMBER;
use crate::invoice::fields::STATUS;
use crate::invoice::fields::TOTAL_PRICE;
use crate::invoice::rates::CurrencyRates;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;
use std::sync::OnceLock;

/// Total used when `total price` is absent or not numeric
pub const DEFAULT_TOTAL_PRICE: f64 = 0.0;
/// Rate used when the invoice currency has no usable entry in the rate table
pub const DEFAULT_RATE: f64 = 1.0;

/// One invoice line: the values of its mapped mandatory fields, in
/// mandatory-field order, plus the converted total and validation messages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceRecord {
    values: Vec<(String, String)>,
    pub invoice_total: f64,
    pub validation_errors: Vec<String>,
}

impl InvoiceRecord {
    /// Builds a record from `(field, cell text)` pairs. A repeated field keeps its last value.
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = InvoiceRecord::default();
        for (field, value) in values {
            record.set(field.into(), value.into());
        }
        record
    }

    fn set(&mut self, field: String, value: String) {
        match self.values.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.values.push((field, value)),
        }
    }

    /// Text of `field`, `None` when the field is not mapped.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Whether `field` is mapped and holds any text, whitespace included.
    pub fn has_value(&self, field: &str) -> bool {
        self.get(field).map(|value| !value.is_empty()).unwrap_or(false)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Upper-cased `invoice currency`, `None` when unmapped.
    pub fn invoice_currency(&self) -> Option<String> {
        self.get(INVOICE_CURRENCY).map(str::to_uppercase)
    }

    /// A line is ready for invoicing when its lower-cased status is exactly
    /// `ready` or it already carries an invoice number.
    pub fn is_relevant(&self) -> bool {
        let ready = self
            .get(STATUS)
            .map(|status| status.to_lowercase() == "ready")
            .unwrap_or(false);
        ready || self.has_value(INVOICE_NUMBER)
    }
}

impl Serialize for InvoiceRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
        for (field, value) in &self.values {
            map.serialize_entry(field, value)?;
        }
        map.serialize_entry("invoiceTotal", &self.invoice_total)?;
        map.serialize_entry("validationErrors", &self.validation_errors)?;
        map.end()
    }
}

/// Leading numeric value of `total price`, or [`DEFAULT_TOTAL_PRICE`].
pub fn resolve_total_price(record: &InvoiceRecord) -> f64 {
    record
        .get(TOTAL_PRICE)
        .and_then(parse_leading_number)
        .unwrap_or(DEFAULT_TOTAL_PRICE)
}

/// Rate of `currency` from the table, or [`DEFAULT_RATE`] when the currency
/// is unmapped, missing from the table or has a zero rate.
pub fn resolve_rate(rates: &CurrencyRates, currency: Option<&str>) -> f64 {
    currency
        .and_then(|currency| rates.get(currency))
        .copied()
        .filter(|rate| *rate != 0.0)
        .unwrap_or(DEFAULT_RATE)
}

fn number_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?").expect("Hardcode regex pattern")
    })
}

/// Parses the longest numeric prefix of the trimmed text: `"100 EUR"` is 100,
/// `"abc"` is `None`.
pub fn parse_leading_number(text: &str) -> Option<f64> {
    number_prefix_pattern()
        .find(text.trim_start())
        .and_then(|prefix| prefix.as_str().parse::<f64>().ok())
        .filter(|value| value.is_finite())
}
