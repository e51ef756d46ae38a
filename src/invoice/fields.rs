use crate::invoice::InvoiceError;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// Field holding the line amount before currency conversion
pub const TOTAL_PRICE: &str = "total price";
/// Field naming the currency the line is invoiced in
pub const INVOICE_CURRENCY: &str = "invoice currency";
/// Field holding the workflow status of the line
pub const STATUS: &str = "status";
/// Field holding an already assigned invoice number
pub const INVOICE_NUMBER: &str = "invoice #";

/// Mandatory fields of a supplier invoice sheet, as labelled by the upload form
pub const DEFAULT_FIELDS: [&str; 9] = [
    "Customer",
    "Cust No",
    "Project Type",
    "Quantity",
    "Price Per Item",
    "Price Currency",
    "Total Price",
    "Invoice Currency",
    "Status",
];

/// Ordered, non-empty set of lower-cased field names a sheet must provide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MandatoryFields(Vec<String>);

impl MandatoryFields {
    /// Lower-cases and trims every name, dropping blanks and repeated names.
    pub fn new<I, S>(names: I) -> Result<Self, InvoiceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = Vec::<String>::new();
        for name in names {
            let field = name.as_ref().trim().to_lowercase();
            if !field.is_empty() && !fields.contains(&field) {
                fields.push(field);
            }
        }
        if fields.is_empty() {
            Err(InvoiceError::NoMandatoryFields)
        } else {
            Ok(MandatoryFields(fields))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|name| name == field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: construction rejects an empty list.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for MandatoryFields {
    fn default() -> Self {
        MandatoryFields(DEFAULT_FIELDS.iter().map(|name| name.to_lowercase()).collect())
    }
}

/// Decides whether a lower-cased column label satisfies a lower-cased field name.
pub trait FieldMatcher: Send + Sync {
    fn matches(&self, column: &str, field: &str) -> bool;
}

/// The column label contains the field name anywhere (`"total price (eur)"` satisfies `"total price"`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SubstringMatcher;

impl FieldMatcher for SubstringMatcher {
    fn matches(&self, column: &str, field: &str) -> bool {
        column.contains(field)
    }
}

/// The trimmed column label equals the field name.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactMatcher;

impl FieldMatcher for ExactMatcher {
    fn matches(&self, column: &str, field: &str) -> bool {
        column.trim() == field
    }
}

/// Configurable choice of [`FieldMatcher`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    #[default]
    Substring,
    Exact,
}

impl MatchPolicy {
    pub fn matcher(self) -> Box<dyn FieldMatcher> {
        match self {
            MatchPolicy::Substring => Box::new(SubstringMatcher),
            MatchPolicy::Exact => Box::new(ExactMatcher),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "substring" => Ok(MatchPolicy::Substring),
            "exact" => Ok(MatchPolicy::Exact),
            other => Err(format!("Unknown match policy '{other}', expected 'substring' or 'exact'")),
        }
    }
}

impl Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::Substring => write!(f, "substring"),
            MatchPolicy::Exact => write!(f, "exact"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandatory_fields_normalized() {
        let fields = MandatoryFields::new(["Customer", " Total Price ", "customer", ""]).unwrap();
        assert_eq!(fields.iter().collect::<Vec<_>>(), vec!["customer", "total price"]);
        assert!(fields.contains("total price"));
        assert!(!fields.contains("Total Price"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_mandatory_fields_reject_empty() {
        assert_eq!(MandatoryFields::new(Vec::<String>::new()), Err(InvoiceError::NoMandatoryFields));
        assert_eq!(MandatoryFields::new(["  "]), Err(InvoiceError::NoMandatoryFields));
    }

    #[test]
    fn test_default_fields() {
        let fields = MandatoryFields::default();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields.iter().next(), Some("customer"));
        assert!(fields.contains(TOTAL_PRICE));
        assert!(fields.contains(INVOICE_CURRENCY));
        assert!(fields.contains(STATUS));
        assert!(!fields.contains(INVOICE_NUMBER));
    }

    #[test]
    fn test_matchers() {
        assert!(SubstringMatcher.matches("total price (eur)", "total price"));
        assert!(SubstringMatcher.matches("cust no", "cust no"));
        assert!(!SubstringMatcher.matches("price", "total price"));

        assert!(ExactMatcher.matches(" status ", "status"));
        assert!(!ExactMatcher.matches("total price (eur)", "total price"));
    }

    #[test]
    fn test_match_policy() {
        assert_eq!("Exact".parse::<MatchPolicy>(), Ok(MatchPolicy::Exact));
        assert_eq!("substring".parse::<MatchPolicy>(), Ok(MatchPolicy::Substring));
        assert!("fuzzy".parse::<MatchPolicy>().is_err());
        assert_eq!(MatchPolicy::default().to_string(), "substring");
        assert!(MatchPolicy::Exact.matcher().matches("status", "status"));
        assert!(!MatchPolicy::Exact.matcher().matches("status text", "status"));
    }
}
