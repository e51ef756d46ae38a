//! OLE Compound File Binary (CFB) reader for legacy Excel (.xls) workbooks.
//! Loads the whole container and follows the allocation chains on demand.

use crate::error::InvoiceSheetError;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use crate::helpers::string::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

/// Sector IDs from here on are markers (free, end of chain)
const MAX_REG_SECT: usize = 0xFFFFFFFB;
/// Streams smaller than this live in the mini stream
const MINI_STREAM_CUTOFF: usize = 4096;
const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;

/// Errors specific to Compound File Binary format parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table error: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("The number of file allocation table error: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// Compound File Binary structure representing the entire OLE file
pub(crate) struct Cfb {
    /// Directory index mapping stream names to directory entries
    directories: HashMap<String, Directory>,
    /// File allocation table for regular sectors
    file_allocation_table: Vec<usize>,
    /// Regular sectors containing stream data
    sectors: Sectors,
    /// Mini file allocation table for small streams
    mini_file_allocation_table: Vec<usize>,
    /// Mini sectors for small streams (64-byte sectors)
    mini_sectors: Sectors,
}

impl Cfb {
    /// Reads and indexes a whole compound file.
    ///
    /// # Arguments
    /// * `reader` - Source positioned anywhere, it is rewound first
    ///
    /// # Returns
    /// * `Result<Cfb, InvoiceSheetError>` - Indexed container or a [`CfbError`]
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, InvoiceSheetError> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < HEADER_SIZE as u64 {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let header = Header::new(&data[..HEADER_SIZE])?;
        let sectors = Sectors { data, size: header.sector_size()?, offset: 1 };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_shift)?;
        let mini_file_allocation_table = Self::load_mini_file_allocation_table(&file_allocation_table, &sectors, &header)?;
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => Self::load_mini_sectors(&file_allocation_table, &sectors, root)?,
            None => Sectors { data: Vec::new(), size: 64, offset: 0 },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    /// Reads the contents of a stream, `None` when the container has no such entry
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, InvoiceSheetError> {
        if let Some(directory) = self.directories.get(name) {
            let mut bytes = if directory.count < MINI_STREAM_CUTOFF {
                Self::read_bytes(&self.mini_file_allocation_table, &self.mini_sectors, directory.index)?
            } else {
                Self::read_bytes(&self.file_allocation_table, &self.sectors, directory.index)?
            };
            bytes.truncate(directory.count);
            Ok(Some(bytes))
        } else {
            Ok(None)
        }
    }

    /// Loads the file allocation table through the double indirect table
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, InvoiceSheetError> {
        let mut double_indirect_file_allocation_table = Vec::<usize>::new();
        double_indirect_file_allocation_table.extend(to_usize_iter(sectors.slice(76, HEADER_SIZE)));

        let mut count = 0usize;
        let mut index = header.double_indirect_file_allocation_table_shift;
        while index < MAX_REG_SECT {
            if count >= sectors.count() {
                Err(CfbError::FileFormatError)?
            }
            double_indirect_file_allocation_table.extend(to_usize_iter(sectors.get(index)));
            index = double_indirect_file_allocation_table.pop().ok_or(CfbError::FileFormatError)?;
            count += 1;
        }
        if count != header.double_indirect_file_allocation_table_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(header.double_indirect_file_allocation_table_count, count))?
        }

        let mut file_allocation_table: Vec<usize> = Vec::new();
        let mut count = 0usize;
        for index in double_indirect_file_allocation_table {
            if index < MAX_REG_SECT {
                file_allocation_table.extend(to_usize_iter(sectors.get(index)));
                count += 1;
            }
        }
        if count != header.file_allocation_table_count {
            Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
        }

        Ok(file_allocation_table)
    }

    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<HashMap<String, Directory>, InvoiceSheetError> {
        let bytes = Self::read_bytes(file_allocation_table, sectors, index)?;
        let directories: HashMap<String, Directory> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(Directory::new)
            .filter(|(name, _)| !name.is_empty())
            .collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    fn load_mini_file_allocation_table(file_allocation_table: &[usize], sectors: &Sectors, header: &Header) -> Result<Vec<usize>, InvoiceSheetError> {
        Ok(if header.mini_file_allocation_table_sector_count > 0 {
            let bytes = Self::read_bytes(file_allocation_table, sectors, header.mini_file_allocation_table_sector_shift)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        })
    }

    /// The mini stream is the content of the root entry
    fn load_mini_sectors(file_allocation_table: &[usize], sectors: &Sectors, root: &Directory) -> Result<Sectors, InvoiceSheetError> {
        let mut data = Self::read_bytes(file_allocation_table, sectors, root.index)?;
        data.truncate(root.count);
        Ok(Sectors { data, size: 64, offset: 0 })
    }

    /// Follows a sector chain until its end marker.
    /// A chain longer than the table or pointing outside it is corrupt.
    fn read_bytes(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, InvoiceSheetError> {
        let mut content: Vec<u8> = Vec::new();
        let mut index = index;
        let mut steps = 0usize;
        while index < MAX_REG_SECT {
            if steps >= file_allocation_table.len() {
                Err(CfbError::FileFormatError)?
            }
            content.extend_from_slice(sectors.get(index));
            index = file_allocation_table.get(index).copied().ok_or(CfbError::FileFormatError)?;
            steps += 1;
        }
        Ok(content)
    }
}

/// Fixed size sectors over a byte buffer
#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    /// Size of individual sectors
    size: usize,
    /// Sectors occupied by the header before sector 0
    offset: usize,
}

impl Sectors {
    /// Sector content, empty when the index lies outside the buffer
    fn get(&self, index: usize) -> &[u8] {
        let source = index
            .checked_add(self.offset)
            .and_then(|position| position.checked_mul(self.size))
            .unwrap_or(usize::MAX);
        let target = self.data.len().min(source.saturating_add(self.size));
        self.data.get(source..target).unwrap_or(&[])
    }

    fn slice(&self, source: usize, target: usize) -> &[u8] {
        self.data.get(source..target).unwrap_or(&[])
    }

    /// Number of whole or partial sectors after the header
    fn count(&self) -> usize {
        (self.data.len() / self.size).saturating_sub(self.offset) + 1
    }
}

/// CFB file header fields
#[derive(Debug)]
struct Header {
    signature: u64,
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_shift: usize,
    mini_file_allocation_table_sector_shift: usize,
    mini_file_allocation_table_sector_count: usize,
    double_indirect_file_allocation_table_shift: usize,
    double_indirect_file_allocation_table_count: usize,
}

impl Header {
    /// Parses the first 512 bytes of the container
    fn new(data: &[u8]) -> Result<Self, InvoiceSheetError> {
        let field = |source: usize, target: usize| data.get(source..target).unwrap_or(&[]);
        let header = Header {
            signature: to_u64(field(0, 8)),
            major_version: to_u16(field(26, 28)),
            sector_shift: to_u16(field(30, 32)),
            file_allocation_table_count: to_usize(field(44, 48)),
            directory_shift: to_usize(field(48, 52)),
            mini_file_allocation_table_sector_shift: to_usize(field(60, 64)),
            mini_file_allocation_table_sector_count: to_usize(field(64, 68)),
            double_indirect_file_allocation_table_shift: to_usize(field(68, 72)),
            double_indirect_file_allocation_table_count: to_usize(field(72, 76)),
        };

        if header.signature != 0xE11A_B1A1_E011_CFD0 {
            Err(CfbError::OleSignatureError)?;
        }

        Ok(header)
    }

    fn sector_size(&self) -> Result<usize, InvoiceSheetError> {
        if self.major_version == 3 && self.sector_shift == 0x0009 {
            Ok(512)
        } else if self.major_version == 4 && self.sector_shift == 0x000C {
            // Version 4 pads the header to a whole 4096-byte sector
            Ok(4096)
        } else {
            Err(CfbError::SectorSizeError(self.major_version, self.sector_shift))?
        }
    }
}

/// Directory entry: first sector and stream size
#[derive(Debug)]
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    /// Decodes a 128-byte directory entry into its name and location
    fn new(bytes: &[u8]) -> (String, Directory) {
        let size = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..size]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.to_string(),
        };

        let index = to_usize(&bytes[116..120]);
        let count = usize::try_from(to_u64(&bytes[120..128])).unwrap_or(usize::MAX);
        (name, Directory { index, count })
    }
}
