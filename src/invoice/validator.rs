use crate::invoice::fields::MandatoryFields;
use crate::invoice::record::InvoiceRecord;

/// Message reported for a mandatory field without a value
pub fn missing_field_message(field: &str) -> String {
    format!("Missing required field: {field}")
}

/// Mandatory fields that are unmapped or blank in `record`, in mandatory-field order.
pub fn missing_fields<'a>(record: &InvoiceRecord, fields: &'a MandatoryFields) -> Vec<&'a str> {
    fields.iter().filter(|field| !record.has_value(field)).collect()
}

/// Replaces the validation messages of every record. Records are never removed.
pub fn validate_records(records: &mut [InvoiceRecord], fields: &MandatoryFields) {
    for record in records.iter_mut() {
        record.validation_errors = missing_fields(record, fields)
            .into_iter()
            .map(missing_field_message)
            .collect();
    }
}
