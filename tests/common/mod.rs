#![allow(dead_code)]

use std::collections::BTreeMap;

use aideon_roomsync::model::{
    CanonicalRoomRecord, MatchStatus, MergedRoomRecord, RawCell, RawSheet, Source,
};
use aideon_roomsync::normalize::room_key;
use rust_xlsxwriter::Workbook;

/// Builds an `.xlsx` workbook in memory. Cells that parse as numbers are
/// written as numbers, empty strings are left blank.
pub fn xlsx(rows: &[Vec<&str>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            if let Ok(number) = value.parse::<f64>() {
                worksheet
                    .write_number(row_idx as u32, col_idx as u16, number)
                    .expect("number written");
            } else {
                worksheet
                    .write_string(row_idx as u32, col_idx as u16, *value)
                    .expect("string written");
            }
        }
    }
    workbook.save_to_buffer().expect("workbook saved")
}

/// Builds a raw sheet with the same cell typing rules as [`xlsx`].
pub fn sheet(rows: &[Vec<&str>]) -> RawSheet {
    RawSheet::new(
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|value| match value.parse::<f64>() {
                        Ok(number) => RawCell::Number(number),
                        Err(_) => RawCell::from(*value),
                    })
                    .collect()
            })
            .collect(),
    )
}

pub fn heating_rows() -> Vec<Vec<&'static str>> {
    vec![
        vec!["Raum-Nr.", "Geschoss", "Raumtyp", "Fläche", "Heizlast"],
        vec!["101", "EG", "Büro Standard", "20", "1200"],
        vec!["102", "EG", "Büro standard", "25", "1500"],
        vec!["103", "OG", "Lager", "10,5 m²", "300"],
    ]
}

pub fn ventilation_rows() -> Vec<Vec<&'static str>> {
    vec![
        vec!["Raum-Nr.", "Geschoss", "Raumtyp", "Zuluft m³/h"],
        vec!["101", "EG", "Büro Standard", "80"],
        vec!["102", "", "Büro (Standard)", "100"],
    ]
}

pub fn canonical(id: &str, source: Source, floor: &str, room_type: &str) -> CanonicalRoomRecord {
    CanonicalRoomRecord {
        room_id: id.to_string(),
        room_key: room_key(id),
        floor: floor.to_string(),
        room_type: room_type.to_string(),
        area_m2: None,
        source,
        raw_fields: BTreeMap::new(),
        unparseable: Vec::new(),
        row_index: 0,
    }
}

pub fn room(id: &str, room_type: &str, area_m2: Option<f64>) -> MergedRoomRecord {
    MergedRoomRecord {
        room_id: id.to_string(),
        room_key: room_key(id),
        floor: "EG".to_string(),
        room_type: room_type.to_string(),
        original_room_type: room_type.to_string(),
        area_m2,
        heating_fields: BTreeMap::new(),
        ventilation_fields: BTreeMap::new(),
        match_status: MatchStatus::Matched,
        unparseable_cells: 0,
    }
}
