mod common;

use std::io::Cursor;

use aideon_roomsync::detect::StructureDetector;
use aideon_roomsync::io::excel_read::{self, WorkbookFormat};
use aideon_roomsync::io::excel_write::{self, MERGED_SHEET, WORKBOOK_HEADER_ROW};
use aideon_roomsync::model::{
    CanonicalRoomRecord, DetectionMethod, Field, FieldValue, MatchStatus, Source,
};
use aideon_roomsync::normalize::normalize;
use aideon_roomsync::pipeline::{AnalyzeOptions, Analyzer};
use calamine::{Reader, Xlsx};
use common::{heating_rows, room, ventilation_rows, xlsx};

fn reread(bytes: &[u8], side: Source) -> Vec<CanonicalRoomRecord> {
    let sheet = excel_read::read_first_sheet(bytes, side).expect("merged workbook readable");
    let structure = StructureDetector::default()
        .detect(&sheet, Some(WORKBOOK_HEADER_ROW))
        .expect("header row accepted");
    normalize(&sheet, &structure, side).expect("rows normalized")
}

#[test]
fn merged_workbook_reproduces_core_fields() {
    let analyzer = Analyzer::default();
    let result = analyzer
        .analyze(
            &xlsx(&heating_rows()),
            &xlsx(&ventilation_rows()),
            &AnalyzeOptions::default(),
        )
        .expect("analysis succeeded");

    assert_eq!(
        excel_read::sniff_format(&result.workbook_bytes),
        Some(WorkbookFormat::Xlsx)
    );

    let sheet = excel_read::read_first_sheet(&result.workbook_bytes, Source::Heating)
        .expect("merged workbook readable");
    let structure = StructureDetector::default()
        .detect(&sheet, Some(WORKBOOK_HEADER_ROW))
        .expect("header row accepted");
    assert_eq!(structure.method, DetectionMethod::Manual);
    assert_eq!(structure.column(Field::RoomId), Some(0));
    assert_eq!(structure.column(Field::Floor), Some(1));
    assert_eq!(structure.column(Field::RoomType), Some(2));
    assert_eq!(structure.column(Field::Area), Some(3));

    let heating = normalize(&sheet, &structure, Source::Heating).expect("rows normalized");
    let ventilation = reread(&result.workbook_bytes, Source::Ventilation);
    assert_eq!(heating.len(), result.merged_records.len());
    assert_eq!(ventilation.len(), result.merged_records.len());
    for ((original, heat), vent) in result.merged_records.iter().zip(&heating).zip(&ventilation) {
        assert_eq!(heat.room_id, original.room_id);
        assert_eq!(heat.floor, original.floor);
        assert_eq!(heat.room_type, original.room_type);
        assert_eq!(heat.area_m2, original.area_m2);
        assert_eq!(heat.raw_fields, original.heating_fields);
        assert_eq!(vent.raw_fields, original.ventilation_fields);
    }
}

#[test]
fn side_fields_are_read_back_from_their_own_columns() {
    let mut heating_only = room("101", "Büro", Some(20.0));
    heating_only.match_status = MatchStatus::HeatingOnly;
    heating_only
        .heating_fields
        .insert(Field::CoolingLoad, FieldValue::Number(900.0));
    heating_only
        .heating_fields
        .insert(Field::RoomName, FieldValue::Text("Name 101".into()));
    let mut ventilation_only = room("201", "Labor", Some(30.0));
    ventilation_only.match_status = MatchStatus::VentilationOnly;
    ventilation_only
        .ventilation_fields
        .insert(Field::RoomName, FieldValue::Text("Name 201".into()));
    ventilation_only
        .ventilation_fields
        .insert(Field::SupplyAir, FieldValue::Number(120.0));
    let records = vec![heating_only, ventilation_only];

    let bytes = excel_write::write_workbook(&records).expect("workbook written");
    let heating = reread(&bytes, Source::Heating);
    let ventilation = reread(&bytes, Source::Ventilation);

    assert_eq!(heating.len(), 2);
    assert_eq!(ventilation.len(), 2);
    for ((record, heat), vent) in records.iter().zip(&heating).zip(&ventilation) {
        assert_eq!(heat.room_id, record.room_id);
        assert_eq!(vent.room_id, record.room_id);
        assert_eq!(heat.area_m2, record.area_m2);
        assert_eq!(heat.raw_fields, record.heating_fields);
        assert_eq!(vent.raw_fields, record.ventilation_fields);
    }
    assert_eq!(
        heating[0].raw_fields.get(&Field::CoolingLoad),
        Some(&FieldValue::Number(900.0))
    );
    assert!(!heating[0].raw_fields.contains_key(&Field::HeatingLoad));
    assert_eq!(
        ventilation[1].raw_fields.get(&Field::RoomName),
        Some(&FieldValue::Text("Name 201".into()))
    );
}

#[test]
fn merged_headers_follow_fixed_column_order() {
    let analyzer = Analyzer::default();
    let result = analyzer
        .analyze(
            &xlsx(&heating_rows()),
            &xlsx(&ventilation_rows()),
            &AnalyzeOptions::default(),
        )
        .expect("analysis succeeded");

    let headers = excel_write::merged_headers(&result.merged_records);
    assert_eq!(
        headers,
        vec![
            "room_id",
            "floor",
            "room_type",
            "area_m2",
            "heating_load (heating)",
            "supply_air (ventilation)",
            "original_room_type",
            "match_status",
        ]
    );

    let sheet = excel_read::read_first_sheet(&result.workbook_bytes, Source::Ventilation)
        .expect("merged workbook readable");
    let header_row: Vec<String> = sheet.rows()[WORKBOOK_HEADER_ROW]
        .iter()
        .map(|cell| cell.to_text())
        .collect();
    assert_eq!(header_row, headers);

    let status_column = headers.len() - 1;
    let last_row = sheet.rows().last().expect("data rows present");
    assert_eq!(
        last_row[status_column].to_text(),
        MatchStatus::HeatingOnly.as_str()
    );

    let workbook = Xlsx::new(Cursor::new(result.workbook_bytes.clone())).expect("xlsx opened");
    assert_eq!(workbook.sheet_names().to_vec(), vec![MERGED_SHEET.to_string()]);
}

#[test]
fn workbook_of_no_records_still_has_headers() {
    let bytes = excel_write::write_workbook(&[]).expect("empty workbook written");
    let sheet = excel_read::read_first_sheet(&bytes, Source::Heating).expect("readable");
    let header: Vec<String> = sheet.rows()[0].iter().map(|cell| cell.to_text()).collect();
    assert_eq!(
        header,
        vec![
            "room_id",
            "floor",
            "room_type",
            "area_m2",
            "original_room_type",
            "match_status"
        ]
    );
    assert_eq!(sheet.row_count(), 1);
}
