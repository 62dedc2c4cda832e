use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::aideon::roomsync::error::{DetectionError, Result, ToolError};
use crate::aideon::roomsync::model::{
    CanonicalRoomRecord, DetectedStructure, Field, FieldValue, RawCell, RawSheet, Source,
};

/// Converts the data rows below the detected header into canonical room
/// records.
///
/// Rows without a room id are skipped. Later rows repeating a room id already
/// seen in the same sheet are dropped with a warning. Numeric cells that
/// cannot be parsed are left out of the record and listed in
/// [`CanonicalRoomRecord::unparseable`]. Where the header labels a field per
/// side, only the column of `source` is read.
#[instrument(level = "debug", skip_all, fields(source = %source, header_row = structure.header_row_index))]
pub fn normalize(
    sheet: &RawSheet,
    structure: &DetectedStructure,
    source: Source,
) -> Result<Vec<CanonicalRoomRecord>> {
    let Some(id_column) = structure.column_for(Field::RoomId, source) else {
        warn!(%source, header_row = structure.header_row_index, "no room id column found in header row");
        return Err(ToolError::StructureDetection {
            side: source,
            source: DetectionError::MissingColumn {
                field: Field::RoomId,
                row: structure.header_row_index,
            },
        });
    };

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (row_index, row) in sheet
        .rows()
        .iter()
        .enumerate()
        .skip(structure.header_row_index + 1)
    {
        let cell = |field: Field| field_cell(structure, row, field, source);

        let room_id = row.get(id_column).map(RawCell::to_text).unwrap_or_default();
        if room_id.is_empty() {
            debug!(row = row_index, "skipping row without room id");
            continue;
        }
        let room_key = room_key(&room_id);
        if !seen.insert(room_key.clone()) {
            warn!(%source, row = row_index, room = %room_id, "duplicate room id, keeping first occurrence");
            continue;
        }

        let mut unparseable = Vec::new();
        let area_m2 = match parse_cell(cell(Field::Area)) {
            Parsed::Value(area) if area >= 0.0 => Some(area),
            Parsed::Missing => None,
            _ => {
                unparseable.push(Field::Area);
                None
            }
        };

        let mut raw_fields = BTreeMap::new();
        for field in Field::ALL.into_iter().filter(|field| !field.is_core()) {
            let value = cell(field);
            if field.is_numeric() {
                match parse_cell(value) {
                    Parsed::Value(number) => {
                        raw_fields.insert(field, FieldValue::Number(number));
                    }
                    Parsed::Invalid => unparseable.push(field),
                    Parsed::Missing => {}
                }
            } else if !value.is_empty() {
                raw_fields.insert(field, FieldValue::Text(value.to_text()));
            }
        }

        if !unparseable.is_empty() {
            debug!(row = row_index, room = %room_id, fields = ?unparseable, "unparseable numeric cells");
        }

        records.push(CanonicalRoomRecord {
            room_id,
            room_key,
            floor: cell(Field::Floor).to_text(),
            room_type: cell(Field::RoomType).to_text(),
            area_m2,
            source,
            raw_fields,
            unparseable,
            row_index,
        });
    }

    if records.is_empty() {
        return Err(ToolError::EmptyInput { side: source });
    }
    info!(%source, record_count = records.len(), "normalized sheet");
    Ok(records)
}

static EMPTY_CELL: RawCell = RawCell::Empty;

fn field_cell<'a>(
    structure: &DetectedStructure,
    row: &'a [RawCell],
    field: Field,
    source: Source,
) -> &'a RawCell {
    structure
        .column_for(field, source)
        .and_then(|column| row.get(column))
        .unwrap_or(&EMPTY_CELL)
}

/// Join key for a room id: trimmed, lowercased, inner whitespace collapsed.
pub fn room_key(room_id: &str) -> String {
    room_id
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

enum Parsed {
    Value(f64),
    Missing,
    Invalid,
}

fn parse_cell(cell: &RawCell) -> Parsed {
    match cell {
        RawCell::Number(value) if value.is_finite() => Parsed::Value(*value),
        RawCell::Text(text) if !text.trim().is_empty() => match parse_number(text) {
            Some(value) => Parsed::Value(value),
            None => Parsed::Invalid,
        },
        RawCell::Empty | RawCell::Text(_) => Parsed::Missing,
        _ => Parsed::Invalid,
    }
}

/// Tolerant number parsing for hand-typed spreadsheet cells.
///
/// Takes the first number in the text, so prefixes such as `ca.` or `~` and
/// trailing units such as `m²` or `m³/h` are ignored. Accepts `,` or `.` as
/// decimal separator and thousands separators in either convention,
/// including spaces and apostrophes.
pub fn parse_number(text: &str) -> Option<f64> {
    lazy_static::lazy_static! {
        static ref NUMBER_RE: Regex =
            Regex::new(r"[-+]?\d+(?:[.,'\x{A0} ]\d+)*").expect("number pattern is valid");
    }

    let token = NUMBER_RE.find(text)?.as_str();
    let numeric: String = token
        .chars()
        .filter(|ch| !matches!(*ch, ' ' | '\'' | '\u{a0}'))
        .collect();

    let commas = numeric.matches(',').count();
    let dots = numeric.matches('.').count();
    let canonical = match (commas, dots) {
        (0, 0) => numeric,
        (1, 0) => numeric.replace(',', "."),
        (_, 0) => numeric.replace(',', ""),
        (0, 1) => numeric,
        (0, _) => numeric.replace('.', ""),
        _ => {
            let last_comma = numeric.rfind(',').unwrap_or(0);
            let last_dot = numeric.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                numeric.replace('.', "").replace(',', ".")
            } else {
                numeric.replace(',', "")
            }
        }
    };

    canonical.parse::<f64>().ok().filter(|value| value.is_finite())
}
