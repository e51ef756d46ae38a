use crate::spreadsheet::CellGrid;
use std::collections::BTreeMap;
use tracing::debug;

/// Upper-cased currency code → conversion rate.
pub type CurrencyRates = BTreeMap<String, f64>;

/// First row of the rate block; rows 0 and 1 hold the month label and a separator.
const FIRST_RATE_ROW: usize = 2;
const LABEL_COL: usize = 0;
const VALUE_COL: usize = 1;

/// Reads the contiguous `"<Currency> Rate"` / value block starting at row 2.
/// The scan ends at the first row whose label lacks `rate` or whose value is
/// not a number.
pub fn extract_currency_rates<G: CellGrid + ?Sized>(sheet: &G) -> CurrencyRates {
    let mut rates = CurrencyRates::new();
    for row in FIRST_RATE_ROW..=sheet.last_row() {
        let label = sheet.cell_text(row, LABEL_COL).to_lowercase();
        let value = sheet.cell_text(row, VALUE_COL);
        match parse_number(&value) {
            Some(rate) if label.contains("rate") => {
                let code = label.replacen("rate", "", 1).trim().to_uppercase();
                rates.insert(code, rate);
            }
            _ => break,
        }
    }
    debug!(count = rates.len(), "currency rates extracted");
    rates
}

/// Parses the whole trimmed text as a finite number. Blank text reads as 0.
fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0.0);
    }
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::Sheet;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rate_block() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec![],
            vec!["USD Rate", "1.0"],
            vec!["EUR Rate", "0.9"],
            vec!["notes", "x"],
            vec!["GBP Rate", "1.2"],
        ]);
        let rates = extract_currency_rates(&sheet);

        assert_eq!(rates, CurrencyRates::from([("USD".to_owned(), 1.0), ("EUR".to_owned(), 0.9)]));
    }

    #[test]
    fn test_rate_block_requires_numeric_value() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec![],
            vec!["CHF rate", "0.95"],
            vec!["EUR Rate", "n/a"],
            vec!["USD Rate", "1.0"],
        ]);
        let rates = extract_currency_rates(&sheet);

        assert_eq!(rates, CurrencyRates::from([("CHF".to_owned(), 0.95)]));
    }

    #[test]
    fn test_rate_block_blank_value_reads_as_zero() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec![],
            vec!["EUR Rate"],
            vec!["USD Rate", "1.0"],
            vec!["GBP Rate", "n/a"],
            vec!["CHF Rate", "0.95"],
        ]);

        assert_eq!(
            extract_currency_rates(&sheet),
            CurrencyRates::from([("EUR".to_owned(), 0.0), ("USD".to_owned(), 1.0)])
        );
    }

    #[test]
    fn test_rate_code_removes_first_rate_only() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec![],
            vec!["Rate SEK  ", " 11.5 "],
            vec!["Exchange rate EUR", "1e0"],
        ]);
        let rates = extract_currency_rates(&sheet);

        assert_eq!(rates.get("SEK"), Some(&11.5));
        assert_eq!(rates.get("EXCHANGE  EUR"), Some(&1.0));
    }

    #[test]
    fn test_rate_block_absent() {
        let sheet = Sheet::from_rows("Invoices", [vec!["2024-03"], vec![], vec!["Customer", "Status"]]);
        assert!(extract_currency_rates(&sheet).is_empty());

        let sheet = Sheet::from_rows("Invoices", [vec!["2024-03"]]);
        assert!(extract_currency_rates(&sheet).is_empty());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0.9"), Some(0.9));
        assert_eq!(parse_number(" 2 "), Some(2.0));
        assert_eq!(parse_number(""), Some(0.0));
        assert_eq!(parse_number("   "), Some(0.0));
        assert_eq!(parse_number("1.2 EUR"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("1,5"), None);
    }
}
