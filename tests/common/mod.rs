//! In-memory workbook builders shared by the integration tests
#![allow(dead_code)]

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A cell of a generated workbook
pub enum Value<'a> {
    /// Text, stored as a shared string (xlsx) or a string cell (ods)
    Text(&'a str),
    /// Numeric literal
    Number(&'a str),
    /// Date given as `YYYY-MM-DD` for ods and as a serial number for xlsx
    Date(&'a str, &'a str),
}

pub use Value::{Date, Number, Text};

/// Text-only row helper
pub fn texts<'a>(cells: &[&'a str]) -> Vec<Value<'a>> {
    cells.iter().map(|text| Text(*text)).collect()
}

pub const HEADER: [&str; 9] = [
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

/// Invoice sheet for March 2024: rate block at rows 3-4, header at row 7
pub fn invoice_rows<'a>() -> Vec<Vec<Value<'a>>> {
    vec![
        vec![Date("2024-03-01", "45352")],
        vec![],
        vec![Text("USD Rate"), Number("1")],
        vec![Text("EUR Rate"), Number("0.9")],
        vec![Text("Notes"), Text("Rates as of 1 March")],
        vec![],
        texts(&HEADER),
        vec![
            Text("ACME"), Text("C-100"), Text("Audit"), Number("1"), Number("100"),
            Text("EUR"), Number("100"), Text("EUR"), Text("Ready"),
        ],
        vec![
            Text("Globex"), Text("C-200"), Text("Audit"), Number("2"), Number("10"),
            Text("USD"), Number("20"), Text("USD"), Text("Draft"),
        ],
        vec![
            Text("Initech"), Text("C-300"), Text("Review"), Number("1"), Number("50"),
            Text("GBP"), Number("50"), Text("GBP"), Text("READY"),
        ],
        vec![
            Text(""), Text("C-400"), Text("Review"), Number("4"), Number("25"),
            Text("USD"), Number("100"), Text("USD"), Text("ready"),
        ],
    ]
}

fn column_name(col: usize) -> String {
    let mut name = String::new();
    let mut index = col + 1;
    while index > 0 {
        let remainder = (index - 1) % 26;
        name.insert(0, (b'A' + remainder as u8) as char);
        index = (index - 1) / 26;
    }
    name
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Writes `(name, content)` parts into a ZIP archive
pub fn zip_parts(parts: &[(&str, String)], stored_first: bool) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (index, (name, content)) in parts.iter().enumerate() {
        let method = if stored_first && index == 0 {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = SimpleFileOptions::default().compression_method(method);
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builds an `.xlsx` package whose first sheet holds `rows`.
/// Dates use style 1 (built-in format 14).
pub fn xlsx(rows: &[Vec<Value>], dimension: Option<&str>) -> Vec<u8> {
    let mut shared = Vec::<String>::new();
    let mut sheet_data = String::new();
    for (row, cells) in rows.iter().enumerate() {
        sheet_data.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (col, value) in cells.iter().enumerate() {
            let reference = format!("{}{}", column_name(col), row + 1);
            match value {
                Text("") => {}
                Text(text) => {
                    shared.push(escape(text));
                    sheet_data.push_str(&format!(r#"<c r="{}" t="s"><v>{}</v></c>"#, reference, shared.len() - 1));
                }
                Number(number) => sheet_data.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, number)),
                Date(_, serial) => sheet_data.push_str(&format!(r#"<c r="{}" s="1"><v>{}</v></c>"#, reference, serial)),
            }
        }
        sheet_data.push_str("</row>");
    }
    let dimension = dimension
        .map(|reference| format!(r#"<dimension ref="{}"/>"#, reference))
        .unwrap_or_default();
    let worksheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{}<sheetData>{}</sheetData></worksheet>"#,
        dimension, sheet_data
    );
    xlsx_package(&worksheet, &shared)
}

/// Wraps a raw worksheet part and shared strings into an `.xlsx` package
pub fn xlsx_package(worksheet: &str, shared: &[String]) -> Vec<u8> {
    let shared_strings = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{1}</sst>"#,
        shared.len(),
        shared.iter().map(|text| format!("<si><t>{}</t></si>", text)).collect::<String>()
    );
    zip_parts(
        &[
            ("[Content_Types].xml", r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#.to_string()),
            ("xl/workbook.xml", r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr/><sheets><sheet name="Invoices" sheetId="1" r:id="rId1"/><sheet name="Archive" sheetId="2" r:id="rId2"/></sheets></workbook>"#.to_string()),
            ("xl/_rels/workbook.xml.rels", r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#.to_string()),
            ("xl/styles.xml", r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#.to_string()),
            ("xl/sharedStrings.xml", shared_strings),
            ("xl/worksheets/sheet1.xml", worksheet.to_string()),
            ("xl/worksheets/sheet2.xml", r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>2023-12</t></is></c></row></sheetData></worksheet>"#.to_string()),
        ],
        false,
    )
}

/// Builds an `.ods` package whose first table holds `rows`
pub fn ods(rows: &[Vec<Value>]) -> Vec<u8> {
    let mut table = String::new();
    for cells in rows {
        table.push_str("<table:table-row>");
        if cells.is_empty() {
            table.push_str("<table:table-cell/>");
        }
        for value in cells {
            match value {
                Text("") => table.push_str("<table:table-cell/>"),
                Text(text) => table.push_str(&format!(
                    r#"<table:table-cell office:value-type="string"><text:p>{}</text:p></table:table-cell>"#,
                    escape(text)
                )),
                Number(number) => table.push_str(&format!(
                    r#"<table:table-cell office:value-type="float" office:value="{0}"><text:p>{0}</text:p></table:table-cell>"#,
                    number
                )),
                Date(date, _) => table.push_str(&format!(
                    r#"<table:table-cell office:value-type="date" office:date-value="{0}"><text:p>{0}</text:p></table:table-cell>"#,
                    date
                )),
            }
        }
        table.push_str("</table:table-row>");
    }
    ods_package(&table)
}

/// Wraps raw `table:table-row` markup into an `.ods` package with two tables
pub fn ods_package(rows: &str) -> Vec<u8> {
    let content = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.3">
<office:body><office:spreadsheet>
<table:table table:name="Invoices">{}</table:table>
<table:table table:name="Archive"><table:table-row><table:table-cell office:value-type="string"><text:p>2023-12</text:p></table:table-cell></table:table-row></table:table>
</office:spreadsheet></office:body></office:document-content>"#,
        rows
    );
    zip_parts(
        &[
            ("mimetype", "application/vnd.oasis.opendocument.spreadsheet".to_string()),
            ("META-INF/manifest.xml", r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.3">
<manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/>
<manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
</manifest:manifest>"#.to_string()),
            ("content.xml", content),
        ],
        true,
    )
}

/// Appends one BIFF8 record
pub fn biff_record(stream: &mut Vec<u8>, kind: u16, body: &[u8]) {
    stream.extend_from_slice(&kind.to_le_bytes());
    stream.extend_from_slice(&(body.len() as u16).to_le_bytes());
    stream.extend_from_slice(body);
}

/// Character count, then an uncompressed or UTF-16 payload behind its flag byte
fn biff_string(text: &str, count_bytes: usize) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut bytes = units.len().to_le_bytes()[..count_bytes].to_vec();
    if text.is_ascii() {
        bytes.push(0);
        bytes.extend_from_slice(text.as_bytes());
    } else {
        bytes.push(1);
        bytes.extend(units.iter().flat_map(|unit| unit.to_le_bytes()));
    }
    bytes
}

/// Worksheet substream: BOF, DIMENSIONS, LABELSST/NUMBER cells, EOF
fn biff_sheet(rows: &[Vec<Value>], shared: &mut Vec<String>) -> Vec<u8> {
    let mut stream = Vec::new();
    biff_record(&mut stream, 2057, &[0x00, 0x06, 0x10, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0) as u16;
    let mut dimensions = 0u32.to_le_bytes().to_vec();
    dimensions.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    dimensions.extend_from_slice(&0u16.to_le_bytes());
    dimensions.extend_from_slice(&columns.to_le_bytes());
    dimensions.extend_from_slice(&0u16.to_le_bytes());
    biff_record(&mut stream, 512, &dimensions);
    for (row, cells) in rows.iter().enumerate() {
        for (col, value) in cells.iter().enumerate() {
            let mut body = (row as u16).to_le_bytes().to_vec();
            body.extend_from_slice(&(col as u16).to_le_bytes());
            match value {
                Text("") => continue,
                Text(text) => {
                    shared.push(text.to_string());
                    body.extend_from_slice(&0u16.to_le_bytes());
                    body.extend_from_slice(&(shared.len() as u32 - 1).to_le_bytes());
                    biff_record(&mut stream, 253, &body);
                }
                Number(number) => {
                    body.extend_from_slice(&0u16.to_le_bytes());
                    body.extend_from_slice(&number.parse::<f64>().unwrap().to_le_bytes());
                    biff_record(&mut stream, 515, &body);
                }
                Date(_, serial) => {
                    body.extend_from_slice(&1u16.to_le_bytes());
                    body.extend_from_slice(&serial.parse::<f64>().unwrap().to_le_bytes());
                    biff_record(&mut stream, 515, &body);
                }
            }
        }
    }
    biff_record(&mut stream, 10, &[]);
    stream
}

/// BIFF8 workbook stream with an "Invoices" sheet holding `rows` and an "Archive" sheet.
/// Dates use XF 1 (built-in format 14).
pub fn xls_workbook_stream(rows: &[Vec<Value>]) -> Vec<u8> {
    let mut shared = Vec::<String>::new();
    let invoices = biff_sheet(rows, &mut shared);
    let archive = biff_sheet(&[vec![Text("2023-12")]], &mut shared);

    let globals = |positions: [u32; 2]| {
        let mut stream = Vec::new();
        biff_record(&mut stream, 2057, &[0x00, 0x06, 0x05, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        for format in [0u16, 14] {
            let mut xf = vec![0u8; 20];
            xf[2..4].copy_from_slice(&format.to_le_bytes());
            biff_record(&mut stream, 224, &xf);
        }
        let mut sst = (shared.len() as u32).to_le_bytes().to_vec();
        sst.extend_from_slice(&(shared.len() as u32).to_le_bytes());
        for text in &shared {
            sst.extend(biff_string(text, 2));
        }
        biff_record(&mut stream, 252, &sst);
        for (name, position) in ["Invoices", "Archive"].iter().zip(positions) {
            let mut sheet = position.to_le_bytes().to_vec();
            sheet.extend_from_slice(&[0, 0]);
            sheet.extend(biff_string(name, 1));
            biff_record(&mut stream, 133, &sheet);
        }
        biff_record(&mut stream, 10, &[]);
        stream
    };
    let length = globals([0, 0]).len() as u32;
    let mut stream = globals([length, length + invoices.len() as u32]);
    stream.extend(invoices);
    stream.extend(archive);
    stream
}

/// Wraps a stream into a version 3 compound file under `name`.
/// The stream is padded to 4096 bytes so it lives in regular sectors.
pub fn compound_file(name: &str, stream: &[u8]) -> Vec<u8> {
    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE_SECT: u32 = 0xFFFF_FFFF;
    let mut stream = stream.to_vec();
    stream.resize(stream.len().max(4096).div_ceil(512) * 512, 0);
    let sectors = stream.len() / 512;
    assert!(sectors <= 126, "stream does not fit one FAT sector");

    let mut header = vec![0u8; 512];
    header[0..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    header[24..26].copy_from_slice(&0x3Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    for slot in (80..512).step_by(4) {
        header[slot..slot + 4].copy_from_slice(&FREE_SECT.to_le_bytes());
    }

    let mut fat: Vec<u32> = vec![0xFFFF_FFFD, END_OF_CHAIN];
    fat.extend((3..sectors as u32 + 2).chain([END_OF_CHAIN]));
    fat.resize(128, FREE_SECT);

    let entry = |entry_name: &str, kind: u8, start: u32, size: u32| {
        let mut entry = vec![0u8; 128];
        let encoded: Vec<u8> = entry_name.encode_utf16().chain([0]).flat_map(u16::to_le_bytes).collect();
        entry[..encoded.len()].copy_from_slice(&encoded);
        entry[64..66].copy_from_slice(&(encoded.len() as u16).to_le_bytes());
        entry[66] = kind;
        entry[116..120].copy_from_slice(&start.to_le_bytes());
        entry[120..124].copy_from_slice(&size.to_le_bytes());
        entry
    };
    let mut directory = entry("Root Entry", 5, END_OF_CHAIN, 0);
    directory.extend(entry(name, 2, 2, stream.len() as u32));
    directory.resize(512, 0);

    let mut bytes = header;
    bytes.extend(fat.iter().flat_map(|next| next.to_le_bytes()));
    bytes.extend(directory);
    bytes.extend(stream);
    bytes
}

/// Builds an `.xls` workbook whose first sheet holds `rows`
pub fn xls(rows: &[Vec<Value>]) -> Vec<u8> {
    compound_file("Workbook", &xls_workbook_stream(rows))
}
