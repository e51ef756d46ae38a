//! # Invoice Extraction Engine
//!
//! Interprets the first sheet of a supplier invoice workbook whose layout is
//! only loosely fixed:
//!
//! - cell `A1` holds the invoicing month;
//! - a block of `"<Currency> Rate"` / value pairs may start at row 3;
//! - somewhere below, a header row names the mandatory fields in any order
//!   and wording, followed by one invoice line per row.
//!
//! The engine locates the header, maps each mandatory field to a column,
//! reads the rate table, converts every relevant line into an
//! [`InvoiceRecord`] with a converted total, and reports missing fields per
//! record. Malformed cells never fail a request; only structural problems do.
use crate::spreadsheet::CellGrid;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

mod fields;
mod header;
mod month;
mod rates;
mod record;
mod rows;
mod validator;

pub use fields::ExactMatcher;
pub use fields::FieldMatcher;
pub use fields::MandatoryFields;
pub use fields::MatchPolicy;
pub use fields::SubstringMatcher;
pub use fields::DEFAULT_FIELDS;
pub use fields::INVOICE_CURRENCY;
pub use fields::INVOICE_NUMBER;
pub use fields::STATUS;
pub use fields::TOTAL_PRICE;
pub use header::locate_header;
pub use header::FieldColumnMapping;
pub use header::HeaderInfo;
pub use header::HeaderRow;
pub use month::invoicing_month;
pub use month::normalize_month;
pub use month::require_period;
pub use month::validate_period;
pub use rates::extract_currency_rates;
pub use rates::CurrencyRates;
pub use record::parse_leading_number;
pub use record::resolve_rate;
pub use record::resolve_total_price;
pub use record::InvoiceRecord;
pub use record::DEFAULT_RATE;
pub use record::DEFAULT_TOTAL_PRICE;
pub use rows::extract_records;
pub use validator::missing_field_message;
pub use validator::missing_fields;
pub use validator::validate_records;

/// Request-level failures. Data quality problems in single cells are never
/// errors; they surface in [`InvoiceRecord::validation_errors`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvoiceError {
    #[error("No file uploaded")]
    MissingDocument,

    #[error("Invoicing month parameter required")]
    MissingPeriod,

    #[error("Invalid invoicing month '{0}'. Expected format: YYYY-MM")]
    InvalidPeriod(String),

    #[error("At least one mandatory field is required")]
    NoMandatoryFields,

    #[error("Invalid file structure. The sheet declares no cell range.")]
    MissingBounds,

    #[error("Invalid file structure. Unable to find the required header row.")]
    HeaderNotFound,

    #[error("Invoicing month '{found}' in the sheet does not match the requested month '{expected}'")]
    PeriodMismatch { expected: String, found: String },
}

/// Coarse classification of [`InvoiceError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The sheet layout is not recognized
    Structural,
    /// The request lacks a document, a period or a field list
    MissingInput,
    /// The sheet belongs to another invoicing month
    PeriodMismatch,
}

impl InvoiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvoiceError::HeaderNotFound | InvoiceError::MissingBounds => ErrorKind::Structural,
            InvoiceError::MissingDocument
            | InvoiceError::MissingPeriod
            | InvoiceError::InvalidPeriod(_)
            | InvoiceError::NoMandatoryFields => ErrorKind::MissingInput,
            InvoiceError::PeriodMismatch { .. } => ErrorKind::PeriodMismatch,
        }
    }
}

/// Engine output, serialized as the upload response body.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceExtraction {
    pub invoicing_month: Option<String>,
    pub currency_rates: CurrencyRates,
    pub invoices_data: Vec<InvoiceRecord>,
}

/// Mandatory fields plus the policy matching them against column labels.
/// Holds no per-request state, so one engine serves concurrent requests.
pub struct InvoiceEngine {
    fields: MandatoryFields,
    matcher: Box<dyn FieldMatcher>,
}

impl Default for InvoiceEngine {
    fn default() -> Self {
        InvoiceEngine::new(MandatoryFields::default(), Box::new(SubstringMatcher))
    }
}

impl std::fmt::Debug for InvoiceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceEngine").field("fields", &self.fields).finish_non_exhaustive()
    }
}

impl InvoiceEngine {
    pub fn new(fields: MandatoryFields, matcher: Box<dyn FieldMatcher>) -> Self {
        InvoiceEngine { fields, matcher }
    }

    pub fn with_policy(fields: MandatoryFields, policy: MatchPolicy) -> Self {
        InvoiceEngine::new(fields, policy.matcher())
    }

    pub fn fields(&self) -> &MandatoryFields {
        &self.fields
    }

    pub fn locate_header<G: CellGrid + ?Sized>(&self, sheet: &G) -> HeaderInfo {
        locate_header(sheet, &self.fields, self.matcher.as_ref())
    }

    /// Extracts records without checking the invoicing month.
    pub fn extract<G: CellGrid + ?Sized>(&self, sheet: &G) -> Result<InvoiceExtraction, InvoiceError> {
        let info = self.locate_header(sheet);
        self.extract_with_header(sheet, info)
    }

    /// Checks an upload and extracts its records.
    ///
    /// Checks run in this order: a document is present, a period is present
    /// and shaped `YYYY-MM`, the sheet has bounds, a header row exists, and
    /// the sheet's month label falls in the declared period.
    pub fn process<G: CellGrid + ?Sized>(
        &self,
        sheet: Option<&G>,
        period: Option<&str>,
    ) -> Result<InvoiceExtraction, InvoiceError> {
        let sheet = sheet.ok_or(InvoiceError::MissingDocument)?;
        let period = require_period(period)?;
        if !sheet.has_bounds() {
            return Err(InvoiceError::MissingBounds);
        }

        let info = self.locate_header(sheet);
        if info.header.is_none() {
            return Err(InvoiceError::HeaderNotFound);
        }

        let label = invoicing_month(sheet);
        let sheet_month = label.as_deref().and_then(normalize_month);
        if sheet_month.as_deref() != Some(period) {
            return Err(InvoiceError::PeriodMismatch {
                expected: period.to_owned(),
                found: label.unwrap_or_default(),
            });
        }

        self.extract_with_header(sheet, info)
    }

    fn extract_with_header<G: CellGrid + ?Sized>(
        &self,
        sheet: &G,
        info: HeaderInfo,
    ) -> Result<InvoiceExtraction, InvoiceError> {
        let header = info.header.ok_or(InvoiceError::HeaderNotFound)?;
        let currency_rates = extract_currency_rates(sheet);
        let mut invoices_data = extract_records(sheet, &header, &info.field_column_mapping, &self.fields, &currency_rates);
        validate_records(&mut invoices_data, &self.fields);
        debug!(
            start_row = header.start_row,
            rates = currency_rates.len(),
            records = invoices_data.len(),
            "invoice sheet extracted"
        );
        Ok(InvoiceExtraction {
            invoicing_month: invoicing_month(sheet),
            currency_rates,
            invoices_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::Sheet;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn invoice_sheet(month: &str) -> Sheet {
        Sheet::from_rows("Invoices", [
            vec![month],
            vec![],
            vec!["USD Rate", "1.0"],
            vec!["EUR Rate", "0.9"],
            vec!["notes", "x"],
            vec![
                "Customer", "Cust No", "Project Type", "Quantity", "Price Per Item",
                "Price Currency", "Total Price", "Invoice Currency", "Status",
            ],
            vec!["ACME", "C-1", "Audit", "1", "100", "EUR", "100", "EUR", "Ready"],
            vec!["Globex", "C-2", "Audit", "2", "10", "USD", "20", "USD", "Draft"],
            vec!["", "C-3", "Review", "1", "50", "USD", "50", "GBP", "ready"],
        ])
    }

    #[test]
    fn test_process_invoice_sheet() {
        let sheet = invoice_sheet("2024-03-01");
        let extraction = InvoiceEngine::default().process(Some(&sheet), Some("2024-03")).unwrap();

        assert_eq!(extraction.invoicing_month.as_deref(), Some("2024-03-01"));
        assert_eq!(extraction.currency_rates, CurrencyRates::from([("USD".to_owned(), 1.0), ("EUR".to_owned(), 0.9)]));
        assert_eq!(extraction.invoices_data.len(), 2);

        let first = &extraction.invoices_data[0];
        assert_eq!(first.get("customer"), Some("ACME"));
        assert!((first.invoice_total - 90.0).abs() < 1e-9);
        assert!(first.validation_errors.is_empty());

        let second = &extraction.invoices_data[1];
        assert_eq!(second.invoice_total, 50.0);
        assert_eq!(second.validation_errors, vec!["Missing required field: customer"]);
    }

    #[test]
    fn test_extraction_json_shape() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec!["Customer", "Status"],
            vec!["ACME", "Ready"],
        ]);
        let engine = InvoiceEngine::new(MandatoryFields::new(["customer", "status"]).unwrap(), Box::new(SubstringMatcher));
        let extraction = engine.process(Some(&sheet), Some("2024-03")).unwrap();

        assert_eq!(
            serde_json::to_value(&extraction).unwrap(),
            json!({
                "invoicingMonth": "2024-03",
                "currencyRates": {},
                "invoicesData": [
                    { "customer": "ACME", "status": "Ready", "invoiceTotal": 0.0, "validationErrors": [] }
                ],
            })
        );
    }

    #[test]
    fn test_process_check_order() {
        let engine = InvoiceEngine::default();
        let sheet = invoice_sheet("2024-03");

        assert_eq!(engine.process(None::<&Sheet>, None), Err(InvoiceError::MissingDocument));
        assert_eq!(engine.process(Some(&sheet), None), Err(InvoiceError::MissingPeriod));
        assert_eq!(engine.process(Some(&sheet), Some(" ")), Err(InvoiceError::MissingPeriod));
        assert_eq!(
            engine.process(Some(&sheet), Some("03/2024")),
            Err(InvoiceError::InvalidPeriod("03/2024".to_owned()))
        );
        assert_eq!(engine.process(Some(&Sheet::default()), Some("2024-03")), Err(InvoiceError::MissingBounds));

        let headless = Sheet::from_rows("Invoices", [vec!["2024-03"], vec!["Customer"]]);
        assert_eq!(engine.process(Some(&headless), Some("2024-03")), Err(InvoiceError::HeaderNotFound));

        assert_eq!(
            engine.process(Some(&sheet), Some("2024-04")),
            Err(InvoiceError::PeriodMismatch { expected: "2024-04".to_owned(), found: "2024-03".to_owned() })
        );
    }

    #[test]
    fn test_period_mismatch_without_label() {
        let engine = InvoiceEngine::default();
        for label in ["", "March", "2024-13-01"] {
            let sheet = invoice_sheet(label);
            let error = engine.process(Some(&sheet), Some("2024-03")).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::PeriodMismatch);
        }
    }

    #[test]
    fn test_matching_month_formats() {
        let engine = InvoiceEngine::default();
        for label in ["2024-03", "2024-03-31", "2024-03-15 00:00:00"] {
            let sheet = invoice_sheet(label);
            assert!(engine.process(Some(&sheet), Some("2024-03")).is_ok(), "label {label}");
        }
    }

    #[test]
    fn test_extract_skips_month_check() {
        let sheet = invoice_sheet("");
        let extraction = InvoiceEngine::default().extract(&sheet).unwrap();

        assert_eq!(extraction.invoicing_month, None);
        assert_eq!(extraction.invoices_data.len(), 2);
    }

    #[test]
    fn test_exact_policy() {
        let sheet = Sheet::from_rows("Invoices", [
            vec!["2024-03"],
            vec!["Customer Name", "Status"],
            vec!["ACME", "Ready"],
        ]);
        let fields = MandatoryFields::new(["customer", "status"]).unwrap();

        let exact = InvoiceEngine::with_policy(fields.clone(), MatchPolicy::Exact);
        assert_eq!(exact.extract(&sheet), Err(InvoiceError::HeaderNotFound));

        let substring = InvoiceEngine::with_policy(fields, MatchPolicy::Substring);
        assert_eq!(substring.extract(&sheet).map(|extraction| extraction.invoices_data.len()), Ok(1));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(InvoiceError::HeaderNotFound.kind(), ErrorKind::Structural);
        assert_eq!(InvoiceError::MissingBounds.kind(), ErrorKind::Structural);
        assert_eq!(InvoiceError::MissingDocument.kind(), ErrorKind::MissingInput);
        assert_eq!(InvoiceError::MissingPeriod.kind(), ErrorKind::MissingInput);
        assert_eq!(InvoiceError::NoMandatoryFields.kind(), ErrorKind::MissingInput);
        assert_eq!(
            InvoiceError::HeaderNotFound.to_string(),
            "Invalid file structure. Unable to find the required header row."
        );
    }
}
