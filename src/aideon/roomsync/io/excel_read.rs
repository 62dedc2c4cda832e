use std::io::Cursor;
use std::path::Path;

use calamine::{DataType, Range, Reader, Xls, Xlsb, Xlsx};
use tracing::debug;

use crate::aideon::roomsync::error::{Result, ToolError};
use crate::aideon::roomsync::model::{RawCell, RawSheet, Source};

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Spreadsheet encodings the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    /// Legacy BIFF workbook inside an OLE compound file (`.xls`).
    Xls,
    /// Zipped SpreadsheetML (`.xlsx`, `.xlsm`).
    Xlsx,
    /// Zipped binary workbook (`.xlsb`).
    Xlsb,
}

/// Identifies the workbook encoding from the leading bytes and, for zip
/// containers, the name of the workbook part. File extensions are not
/// consulted.
pub fn sniff_format(bytes: &[u8]) -> Option<WorkbookFormat> {
    if bytes.starts_with(&OLE_MAGIC) {
        return Some(WorkbookFormat::Xls);
    }
    if bytes.starts_with(&ZIP_MAGIC) {
        if contains(bytes, b"xl/workbook.bin") {
            return Some(WorkbookFormat::Xlsb);
        }
        if contains(bytes, b"xl/workbook.xml") {
            return Some(WorkbookFormat::Xlsx);
        }
    }
    None
}

/// Reads the first worksheet of an in-memory workbook.
///
/// Leading empty rows and columns are kept, so row indices match the
/// worksheet's own (zero-based) row numbers.
pub fn read_first_sheet(bytes: &[u8], side: Source) -> Result<RawSheet> {
    let format = sniff_format(bytes).ok_or(ToolError::UnsupportedFormat { side })?;
    debug!(%side, ?format, size = bytes.len(), "reading workbook");

    let cursor = Cursor::new(bytes);
    let range = match format {
        WorkbookFormat::Xls => Xls::new(cursor)
            .map_err(calamine::Error::from)
            .and_then(|mut workbook| {
                workbook
                    .worksheet_range_at(0)
                    .transpose()
                    .map_err(calamine::Error::from)
            }),
        WorkbookFormat::Xlsx => Xlsx::new(cursor)
            .map_err(calamine::Error::from)
            .and_then(|mut workbook| {
                workbook
                    .worksheet_range_at(0)
                    .transpose()
                    .map_err(calamine::Error::from)
            }),
        WorkbookFormat::Xlsb => Xlsb::new(cursor)
            .map_err(calamine::Error::from)
            .and_then(|mut workbook| {
                workbook
                    .worksheet_range_at(0)
                    .transpose()
                    .map_err(calamine::Error::from)
            }),
    }
    .map_err(|source| ToolError::ExcelRead { side, source })?
    .ok_or(ToolError::EmptyInput { side })?;

    let sheet = to_raw_sheet(&range);
    debug!(%side, rows = sheet.row_count(), columns = sheet.width(), "loaded first worksheet");
    Ok(sheet)
}

/// Reads the first worksheet of the workbook stored at `path`.
pub fn read_sheet_file(path: &Path, side: Source) -> Result<RawSheet> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    read_first_sheet(&bytes, side)
}

fn to_raw_sheet(range: &Range<DataType>) -> RawSheet {
    let (row_offset, column_offset) = range
        .start()
        .map(|(row, column)| (row as usize, column as usize))
        .unwrap_or((0, 0));

    let mut rows = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![RawCell::Empty; column_offset];
        cells.extend(row.iter().map(cell_to_raw));
        rows.push(cells);
    }
    RawSheet::new(rows)
}

fn cell_to_raw(cell: &DataType) -> RawCell {
    match cell {
        DataType::String(value) => RawCell::from(value.as_str()),
        DataType::Float(value) => RawCell::Number(*value),
        DataType::Int(value) => RawCell::Number(*value as f64),
        DataType::Bool(value) => RawCell::Bool(*value),
        DataType::Empty => RawCell::Empty,
        other => RawCell::Text(other.to_string()),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
