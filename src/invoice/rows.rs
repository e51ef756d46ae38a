use crate::invoice::fields::MandatoryFields;
use crate::invoice::header::FieldColumnMapping;
use crate::invoice::header::HeaderRow;
use crate::invoice::rates::CurrencyRates;
use crate::invoice::record::resolve_rate;
use crate::invoice::record::resolve_total_price;
use crate::invoice::record::InvoiceRecord;
use crate::spreadsheet::CellGrid;
use tracing::debug;

/// Converts the data rows below `header` into records, keeping only relevant lines.
///
/// Each mapped field reads the last column whose label equals its mapped
/// label. Rows are converted one at a time; dropped rows are never collected.
pub fn extract_records<G: CellGrid + ?Sized>(
    sheet: &G,
    header: &HeaderRow,
    mapping: &FieldColumnMapping,
    fields: &MandatoryFields,
    rates: &CurrencyRates,
) -> Vec<InvoiceRecord> {
    let projection = project_columns(header, mapping, fields);
    let mut dropped = 0usize;
    let records: Vec<InvoiceRecord> = (header.start_row..=sheet.last_row())
        .filter_map(|row| {
            let mut record = InvoiceRecord::new(
                projection
                    .iter()
                    .map(|(field, col)| (*field, sheet.cell_text(row, *col))),
            );
            let currency = record.invoice_currency();
            record.invoice_total = resolve_total_price(&record) * resolve_rate(rates, currency.as_deref());
            if record.is_relevant() {
                Some(record)
            } else {
                dropped += 1;
                None
            }
        })
        .collect();
    debug!(kept = records.len(), dropped, "invoice rows extracted");
    records
}

/// Resolves every mapped field to a column index, in mandatory-field order.
fn project_columns<'a>(
    header: &HeaderRow,
    mapping: &FieldColumnMapping,
    fields: &'a MandatoryFields,
) -> Vec<(&'a str, usize)> {
    fields
        .iter()
        .filter_map(|field| {
            let label = mapping.get(field)?;
            let col = header.columns.iter().rposition(|column| column == label)?;
            Some((field, col))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::fields::SubstringMatcher;
    use crate::invoice::header::locate_header;
    use crate::invoice::rates::extract_currency_rates;
    use crate::spreadsheet::Sheet;
    use pretty_assertions::assert_eq;

    fn extract(sheet: &Sheet, fields: &MandatoryFields) -> Vec<InvoiceRecord> {
        let info = locate_header(sheet, fields, &SubstringMatcher);
        let header = info.header.as_ref().unwrap();
        let rates = extract_currency_rates(sheet);
        extract_records(sheet, header, &info.field_column_mapping, fields, &rates)
    }

    fn fields() -> MandatoryFields {
        MandatoryFields::new(["customer", "total price", "invoice currency", "status"]).unwrap()
    }

    #[test]
    fn test_converted_total() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec![],
            vec!["USD Rate", "1.0"],
            vec!["EUR Rate", "0.9"],
            vec![],
            vec!["Customer", "Total Price", "Invoice Currency", "Status"],
            vec!["ACME", "100", "EUR", "Ready"],
            vec!["Globex", "50", "usd", "ready"],
            vec!["Initech", "20", "GBP", "Ready"],
        ]);
        let records = extract(&sheet, &fields());

        assert_eq!(records.len(), 3);
        assert!((records[0].invoice_total - 90.0).abs() < 1e-9);
        assert_eq!(records[1].invoice_total, 50.0);
        assert_eq!(records[2].invoice_total, 20.0);
        assert_eq!(records[0].get("customer"), Some("ACME"));
        assert_eq!(records[0].fields().map(|(field, _)| field).collect::<Vec<_>>(),
                   vec!["customer", "total price", "invoice currency", "status"]);
    }

    #[test]
    fn test_missing_total_defaults_to_zero() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec!["Customer", "Total Price", "Invoice Currency", "Status"],
            vec!["ACME", "", "EUR", "Ready"],
            vec!["ACME", "tbd", "", "Ready"],
        ]);
        let records = extract(&sheet, &fields());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].invoice_total, 0.0);
        assert_eq!(records[1].invoice_total, 0.0);
        assert_eq!(records[0].get("total price"), Some(""));
    }

    #[test]
    fn test_irrelevant_rows_dropped() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec!["Customer", "Total Price", "Invoice Currency", "Status", "Invoice #"],
            vec!["ACME", "100", "EUR", "Draft"],
            vec!["Globex", "10", "EUR", "Draft", "INV-1"],
            vec![],
            vec!["Initech", "5", "EUR", "Ready"],
        ]);
        let records = extract(&sheet, &fields());

        let customers: Vec<_> = records.iter().filter_map(|record| record.get("customer")).collect();
        // `invoice #` is not a mandatory field here, so only the status counts
        assert_eq!(customers, vec!["Initech"]);
        assert!(records.iter().all(|record| record.get("invoice #").is_none()));
    }

    #[test]
    fn test_unmapped_field_absent() {
        let fields = MandatoryFields::new(["customer", "status", "invoice #"]).unwrap();
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec!["Customer", "Status", "Invoice #"],
            vec!["ACME", "Draft", "INV-9"],
        ]);
        let records = extract(&sheet, &fields);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("invoice #"), Some("INV-9"));
        assert_eq!(records[0].get("total price"), None);
        assert_eq!(records[0].invoice_total, 0.0);
    }

    #[test]
    fn test_relevance_compares_untrimmed_text() {
        let fields = MandatoryFields::new(["customer", "status", "invoice #"]).unwrap();
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec!["Customer", "Status", "Invoice #"],
            vec!["ACME", "Draft", " "],
            vec!["Globex", " Ready ", ""],
            vec![" ", "Ready", "INV-2"],
        ]);
        let records = extract(&sheet, &fields);

        let customers: Vec<_> = records.iter().filter_map(|record| record.get("customer")).collect();
        assert_eq!(customers, vec!["ACME", " "]);
    }

    #[test]
    fn test_project_columns_uses_last_duplicate_label() {
        let header = HeaderRow {
            start_row: 2,
            columns: vec!["customer".to_owned(), "status".to_owned(), "customer".to_owned()],
        };
        let mapping = FieldColumnMapping::from([
            ("customer".to_owned(), "customer".to_owned()),
            ("status".to_owned(), "status".to_owned()),
        ]);
        let fields = MandatoryFields::new(["status", "customer", "quantity"]).unwrap();

        assert_eq!(project_columns(&header, &mapping, &fields), vec![("status", 1), ("customer", 2)]);
    }

    #[test]
    fn test_no_data_rows() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec!["Customer", "Total Price", "Invoice Currency", "Status"],
        ]);
        assert!(extract(&sheet, &fields()).is_empty());
    }
}
