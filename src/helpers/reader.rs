use crate::error::InvoiceSheetError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

/// Magic bytes of an OLE2 compound document (legacy `.xls`, or an encrypted OOXML package).
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Magic bytes of a ZIP local file header.
const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// A unified reader over a workbook stored on disk or received as an upload
pub(crate) enum SourceReader {
    /// Local file reader
    Local(BufReader<File>),
    /// Uploaded workbook (in-memory buffer)
    Memory(Cursor<Vec<u8>>),
}

impl SourceReader {
    /// Opens a workbook from a local path
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<SourceReader, InvoiceSheetError> {
        let file = File::open(path)?;
        Ok(SourceReader::Local(BufReader::new(file)))
    }

    /// Wraps the bytes of an uploaded workbook
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> SourceReader {
        SourceReader::Memory(Cursor::new(bytes))
    }

    /// Reads the first bytes of the source and rewinds it.
    fn peek_signature(&mut self) -> Result<[u8; 8], InvoiceSheetError> {
        let mut buffer = [0u8; 8];
        let mut filled = 0usize;
        while filled < buffer.len() {
            let count = self.read(&mut buffer[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        self.rewind()?;
        Ok(buffer)
    }

    /// Checks whether the source is a compound document rather than a ZIP package
    pub(crate) fn is_compound_document(&mut self) -> Result<bool, InvoiceSheetError> {
        Ok(self.peek_signature()? == CFB_SIGNATURE)
    }

    /// Checks whether the source starts with a ZIP local file header
    pub(crate) fn is_zip_package(&mut self) -> Result<bool, InvoiceSheetError> {
        Ok(self.peek_signature()?[..4] == ZIP_SIGNATURE)
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SourceReader::Local(reader) => reader.read(buf),
            SourceReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            SourceReader::Local(reader) => reader.seek(pos),
            SourceReader::Memory(reader) => reader.seek(pos),
        }
    }
}
