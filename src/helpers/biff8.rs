//! Record reader for the BIFF8 stream of Excel 97-2003 workbooks.
//! Records are read through their CONTINUE chunks as one logical body.

use crate::error::InvoiceSheetError;
use crate::helpers::string::to_f64;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use encoding_rs::Encoding;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 format parsing
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

/// Reader for BIFF8 records with their continuation records
pub(crate) struct Biff8Reader {
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    pointer: usize, // Next record position in buffer
    chunks: Vec<(usize, usize)>, // Current record chunks (start, end)
    index: usize,  // Current chunk index
    offset: usize, // Offset within current chunk
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: encoding_rs::UTF_16LE,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Reads the next record type and prepares its body for reading.
    /// Returns `None` at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, InvoiceSheetError> {
        if self.pointer.saturating_add(4) <= self.buffer.len() {
            self.index = 0;
            self.offset = 0;

            let kind = self.get_u16_at(self.pointer)?;
            let chunk = self.next_chunk()?;
            self.chunks.clear();
            self.chunks.push(chunk);
            while self.pointer.saturating_add(4) <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
                let chunk = self.next_chunk()?;
                self.chunks.push(chunk);
            }

            Ok(Some(kind))
        } else {
            Ok(None)
        }
    }

    /// Body bounds of the record at the pointer, clamped to the buffer
    fn next_chunk(&mut self) -> Result<(usize, usize), InvoiceSheetError> {
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        let lower = self.pointer + 4;
        let upper = self.buffer.len().min(lower + size);
        self.pointer = upper;
        Ok((lower, upper))
    }

    /// Moves the reader to an absolute stream position
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    /// Reads exactly `length` bytes of the current record
    fn read_extract(&mut self, length: usize) -> Result<&[u8], InvoiceSheetError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Reads up to `length` bytes without crossing into the next chunk.
    /// Returns the data slice and the number of bytes read.
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source.saturating_add(length));
            let size = target - source;
            if source < upper {
                if target == upper {
                    self.index += 1;
                    self.offset = 0;
                } else {
                    self.offset += size;
                }
                return (&self.buffer[source..target], size);
            }
        }
        (&[], 0)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<&[u8], InvoiceSheetError> {
        self.read_extract(length)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, InvoiceSheetError> {
        self.read_extract(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, InvoiceSheetError> {
        self.read_extract(2).map(to_u16)
    }

    /// Gets a 16-bit value located `offset` bytes before the end of the record
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, InvoiceSheetError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            } else {
                offset -= *upper - *lower;
            }
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    /// Gets a 16-bit value at an absolute stream position
    pub(crate) fn get_u16_at(&self, index: usize) -> Result<u16, InvoiceSheetError> {
        match self.buffer.get(index..index.saturating_add(2)) {
            Some(bytes) if bytes.len() == 2 => Ok(to_u16(bytes)),
            _ => Err(Biff8Error::NoEnoughDataError(2))?,
        }
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, InvoiceSheetError> {
        self.read_extract(4).map(to_u32)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, InvoiceSheetError> {
        self.read_extract(4).map(to_usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, InvoiceSheetError> {
        self.read_extract(8).map(to_u64)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, InvoiceSheetError> {
        self.read_extract(8).map(to_f64)
    }

    /// Reads an RK number: a 30-bit integer or the high bits of a double,
    /// optionally divided by 100.
    pub(crate) fn read_rk_number(&mut self) -> Result<String, InvoiceSheetError> {
        let value = self.read_u32()?;
        let is_percentage = (value & 0x01) != 0;
        let is_integer = (value & 0x02) != 0;

        let mut number = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            f64::from_bits(((value >> 2) as u64) << 34)
        };
        if is_percentage {
            number /= 100.0;
        }
        Ok(if is_integer && !is_percentage {
            (number as i64).to_string()
        } else {
            number.to_string()
        })
    }

    /// Reads a string with a 1-byte character count
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, InvoiceSheetError> {
        let mut string = String::new();
        let chars = self.read_u8()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a string with a 2-byte character count
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, InvoiceSheetError> {
        let mut string = String::new();
        let chars = self.read_u16()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a shared string table entry, which may continue in the next chunk
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, InvoiceSheetError> {
        let mut string = String::new();
        let mut expected = self.read_u16()? as usize;
        let mut actual = self.read_string_into(expected, true, &mut string)?;
        while actual < expected {
            expected -= actual;
            actual = self.read_string_into(expected, false, &mut string)?;
        }
        Ok(string)
    }

    /// Appends up to `chars` characters and skips formatting runs and phonetic data.
    /// Returns the number of characters read from the current chunk.
    fn read_string_into(&mut self, chars: usize, is_extend: bool, content: &mut String) -> Result<usize, InvoiceSheetError> {
        let encoding = self.encoding;
        let flag = self.read_u8()?;
        let is_high_byte = (flag & 0x1) > 0;
        let expected = Self::chars_to_bytes(is_high_byte, chars);
        let rich_string_count = if is_extend && (flag & 0x8) > 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_count = if is_extend && (flag & 0x4) > 0 {
            self.read_usize()?
        } else {
            0
        };
        let (bytes, actual) = self.read(expected);
        if is_high_byte {
            let (string, _, _) = encoding.decode(bytes);
            content.push_str(&string);
        } else {
            content.extend(bytes.iter().map(|byte| char::from(*byte)));
        }
        // Formatting runs, then phonetic data
        self.skip(rich_string_count.saturating_mul(4))?;
        self.skip(phonetic_count)?;
        Ok(Self::bytes_to_chars(is_high_byte, actual))
    }

    #[inline]
    fn chars_to_bytes(is_high_byte: bool, chars: usize) -> usize {
        if is_high_byte { chars << 1 } else { chars }
    }

    #[inline]
    fn bytes_to_chars(is_high_byte: bool, bytes: usize) -> usize {
        if is_high_byte { bytes >> 1 } else { bytes }
    }
}

/// Dispatches every record of a BIFF8 stream by its type.
#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
