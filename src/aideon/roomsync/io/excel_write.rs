use std::collections::BTreeSet;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::aideon::roomsync::error::Result;
use crate::aideon::roomsync::model::{Field, FieldValue, MergedRoomRecord, Source};

/// Name of the single worksheet in the merged workbook.
pub const MERGED_SHEET: &str = "Merged Data";
/// Zero-based row holding the column headers in the merged workbook.
pub const WORKBOOK_HEADER_ROW: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    RoomId,
    Floor,
    RoomType,
    Area,
    Heating(Field),
    Ventilation(Field),
    OriginalRoomType,
    MatchStatus,
}

impl Column {
    fn header(self) -> String {
        match self {
            Column::RoomId => "room_id".into(),
            Column::Floor => "floor".into(),
            Column::RoomType => "room_type".into(),
            Column::Area => "area_m2".into(),
            Column::Heating(field) => format!("{field} ({})", Source::Heating),
            Column::Ventilation(field) => format!("{field} ({})", Source::Ventilation),
            Column::OriginalRoomType => "original_room_type".into(),
            Column::MatchStatus => "match_status".into(),
        }
    }
}

/// Column layout of the merged workbook: the four core columns, the heating
/// fields, the ventilation fields, then the original room type and the match
/// status. Only fields present in at least one record get a column.
///
/// Side columns carry a `(heating)` or `(ventilation)` marker. Detection keeps
/// them apart, so normalizing the sheet as [`Source::Heating`] reads back each
/// record's heating fields and as [`Source::Ventilation`] its ventilation
/// fields.
pub fn merged_headers(records: &[MergedRoomRecord]) -> Vec<String> {
    columns(records).into_iter().map(Column::header).collect()
}

fn columns(records: &[MergedRoomRecord]) -> Vec<Column> {
    let heating: BTreeSet<Field> = records
        .iter()
        .flat_map(|record| record.heating_fields.keys().copied())
        .collect();
    let ventilation: BTreeSet<Field> = records
        .iter()
        .flat_map(|record| record.ventilation_fields.keys().copied())
        .collect();

    let mut columns = vec![Column::RoomId, Column::Floor, Column::RoomType, Column::Area];
    columns.extend(heating.into_iter().map(Column::Heating));
    columns.extend(ventilation.into_iter().map(Column::Ventilation));
    columns.push(Column::OriginalRoomType);
    columns.push(Column::MatchStatus);
    columns
}

/// Serialises the merged records into an `.xlsx` workbook held in memory.
pub fn write_workbook(records: &[MergedRoomRecord]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(MERGED_SHEET)?;

    let columns = columns(records);
    let header_row = WORKBOOK_HEADER_ROW as u32;
    let header_format = Format::new().set_bold();
    for (col_idx, column) in columns.iter().enumerate() {
        worksheet.write_string_with_format(header_row, col_idx as u16, column.header(), &header_format)?;
    }

    for (row_idx, record) in records.iter().enumerate() {
        let row = header_row + 1 + row_idx as u32;
        for (col_idx, column) in columns.iter().enumerate() {
            write_cell(worksheet, row, col_idx as u16, record, *column)?;
        }
    }

    let col_end = (columns.len() as u16).saturating_sub(1);
    worksheet.autofilter(header_row, 0, header_row + records.len() as u32, col_end)?;
    worksheet.set_freeze_panes(header_row + 1, 0)?;

    Ok(workbook.save_to_buffer()?)
}

/// Writes the merged workbook to `path`.
pub fn save_workbook(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    record: &MergedRoomRecord,
    column: Column,
) -> Result<()> {
    let value = match column {
        Column::RoomId => Some(FieldValue::Text(record.room_id.clone())),
        Column::Floor => Some(FieldValue::Text(record.floor.clone())),
        Column::RoomType => Some(FieldValue::Text(record.room_type.clone())),
        Column::Area => record.area_m2.map(FieldValue::Number),
        Column::Heating(field) => record.heating_fields.get(&field).cloned(),
        Column::Ventilation(field) => record.ventilation_fields.get(&field).cloned(),
        Column::OriginalRoomType => Some(FieldValue::Text(record.original_room_type.clone())),
        Column::MatchStatus => Some(FieldValue::Text(record.match_status.to_string())),
    };

    match value {
        Some(FieldValue::Number(number)) => {
            worksheet.write_number(row, col, number)?;
        }
        Some(FieldValue::Text(text)) if !text.is_empty() => {
            worksheet.write_string(row, col, &text)?;
        }
        _ => {}
    }
    Ok(())
}
