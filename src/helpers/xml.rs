//! XML parsing utilities shared by the xlsx and ods readers
//! Provides a pull reader wrapper and helper traits for attribute and text processing

use crate::error::InvoiceSheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute '{name}' value '{value}' failed")]
    ParseAttributeValueError { name: String, value: String },
}

/// Pull reader over a workbook part, configured for cell markup
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event, `None` at end of document
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, InvoiceSheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(InvoiceSheetError::XmlError(error)),
        }
    }
}

/// Attribute lookup on start tags
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets the unescaped value of an attribute by qualified name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, InvoiceSheetError>;

    /// Parses an attribute value to the specified type
    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, InvoiceSheetError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, InvoiceSheetError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, InvoiceSheetError> {
        match self.get_attribute_value(name)? {
            Some(value) => value.parse::<T>().map(Some).map_err(|_| {
                XmlError::ParseAttributeValueError {
                    name: name.to_owned(),
                    value: value.to_string(),
                }
                .into()
            }),
            None => Ok(None),
        }
    }
}

/// Helper trait for accumulating text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from a text event
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), InvoiceSheetError>;

    /// Appends an entity or character reference (`&amp;`, `&#x41;`)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), InvoiceSheetError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), InvoiceSheetError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), InvoiceSheetError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_text(xml: &str) -> Result<String, InvoiceSheetError> {
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Text(event) => text.push_bytes_text(&event)?,
            Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
        });
        Ok(text)
    }

    #[test]
    fn test_text_with_references() {
        assert_eq!(collect_text("<t>Fish &amp; Chips</t>").unwrap(), "Fish & Chips");
        assert_eq!(collect_text("<t>&#65;&#x42;C</t>").unwrap(), "ABC");
    }

    #[test]
    fn test_attribute_helpers() {
        let mut reader = XmlReader::new(r#"<c r="B2" s="3" t="s"/>"#.as_bytes());
        let event = reader.next().unwrap().unwrap();
        match event {
            Event::Start(event) => {
                assert_eq!(event.get_attribute_value("r").unwrap().as_deref(), Some("B2"));
                assert_eq!(event.parse_attribute_value::<usize>("s").unwrap(), Some(3));
                assert_eq!(event.get_attribute_value("missing").unwrap(), None);
                assert!(event.parse_attribute_value::<usize>("t").is_err());
            }
            _ => panic!("expected start event"),
        }
    }
}
