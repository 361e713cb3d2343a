//! Section table reader
//!
//! Production images are ELF-style object files. To decide which memories an
//! image can program we only need the names of its sections, so this reader
//! follows a handful of fixed header offsets to the string table and splits
//! it. No magic or version check is done; this is a best-effort heuristic,
//! not a conformant object-file parser.
//!
//! Header fields used (offsets from the start of the file):
//!
//! ```text
//! 0x20  section table offset       (1 byte)
//! 0x2E  section table entry size   (1 byte)
//! 0x30  section table entry count  (1 byte)
//! ```
//!
//! Within a section table entry:
//!
//! ```text
//! +0x04  type (0x03 = string table)
//! +0x10  offset of section data    (3 bytes, little endian)
//! +0x14  size of section data      (3 bytes, little endian)
//! ```

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::ImageError;

/// Size of the fixed header region
pub const HEADER_SIZE: usize = 0x34;

/// Offset of the section table offset byte
const SECTION_TABLE_OFFSET: usize = 0x20;

/// Offset of the section table entry size byte
const SECTION_ENTRY_SIZE: usize = 0x2E;

/// Offset of the section table entry count byte
const SECTION_COUNT: usize = 0x30;

/// Offset of the type byte within an entry
const ENTRY_TYPE: usize = 0x04;

/// Offset of the data offset field within an entry
const ENTRY_DATA_OFFSET: usize = 0x10;

/// Offset of the data size field within an entry
const ENTRY_DATA_SIZE: usize = 0x14;

/// Shortest entry that still holds the data size field
const MIN_ENTRY_SIZE: usize = ENTRY_DATA_SIZE + 3;

/// Section type of a string table
const SECTION_TYPE_STRTAB: u8 = 0x03;

/// Location of the string table within the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StringTable {
    offset: u32,
    size: u32,
}

/// Read a 3-byte little-endian field
fn read_u24_le(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], 0])
}

/// Read exactly `buf.len()` bytes, mapping EOF to a truncation error
fn read_exact_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    buf: &mut [u8],
    what: &'static str,
) -> Result<(), ImageError> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ImageError::Truncated { what, offset },
        _ => ImageError::Io(e),
    })
}

/// Find the first string table entry in the section table
fn find_string_table(table: &[u8], entry_size: usize) -> Option<StringTable> {
    table.chunks_exact(entry_size).find_map(|entry| {
        (entry[ENTRY_TYPE] == SECTION_TYPE_STRTAB).then(|| StringTable {
            offset: read_u24_le(&entry[ENTRY_DATA_OFFSET..]),
            size: read_u24_le(&entry[ENTRY_DATA_SIZE..]),
        })
    })
}

/// Split string table bytes into section names
fn split_names(strings: &[u8]) -> Vec<String> {
    strings
        .split(|&b| b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect()
}

/// Read section names from any seekable source
///
/// Either every name is returned or an error is; there are no partial
/// results.
pub fn read_sections<R: Read + Seek>(reader: &mut R) -> Result<Vec<String>, ImageError> {
    let mut header = [0u8; HEADER_SIZE];
    reader.seek(SeekFrom::Start(0))?;
    reader.read_exact(&mut header).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ImageError::TruncatedHeader {
            needed: HEADER_SIZE,
        },
        _ => ImageError::Io(e),
    })?;

    let table_offset = header[SECTION_TABLE_OFFSET] as u64;
    let entry_size = header[SECTION_ENTRY_SIZE] as usize;
    let entry_count = header[SECTION_COUNT] as usize;

    if entry_size < MIN_ENTRY_SIZE {
        return Err(ImageError::MalformedSectionTable(
            "entry size too small for string table fields",
        ));
    }

    // Seeking past the end succeeds, so offsets are checked against the length
    let len = reader.seek(SeekFrom::End(0))?;
    if table_offset > len {
        return Err(ImageError::Truncated {
            what: "section table",
            offset: table_offset,
        });
    }

    let mut table = vec![0u8; entry_count * entry_size];
    read_exact_at(reader, table_offset, &mut table, "section table")?;

    let strtab = find_string_table(&table, entry_size).ok_or(ImageError::NoStringTable)?;
    log::trace!(
        "String table at 0x{:06X}, {} bytes",
        strtab.offset,
        strtab.size
    );

    if strtab.offset as u64 >= len {
        return Err(ImageError::Truncated {
            what: "string table",
            offset: strtab.offset as u64,
        });
    }

    // Skip the leading NUL of the string table
    let start = strtab.offset as u64 + 1;
    let mut strings = Vec::with_capacity(strtab.size as usize);
    reader.seek(SeekFrom::Start(start))?;
    reader
        .by_ref()
        .take(strtab.size as u64)
        .read_to_end(&mut strings)?;

    // Skipping the NUL shifts the window one byte past the table; only that
    // final byte may be missing at end of file.
    if strings.len() + 1 < strtab.size as usize {
        return Err(ImageError::Truncated {
            what: "string table",
            offset: start,
        });
    }

    Ok(split_names(&strings))
}

/// Read section names from an image file
pub fn read_section_names(path: impl AsRef<Path>) -> Result<Vec<String>, ImageError> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let names = read_sections(&mut file)?;
    log::debug!("{}: {} sections", path.display(), names.len());
    Ok(names)
}

/// Read section names from an in-memory image
pub fn section_names_from_bytes(data: &[u8]) -> Result<Vec<String>, ImageError> {
    read_sections(&mut Cursor::new(data))
}
