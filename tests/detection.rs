mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use aideon_roomsync::config::DetectorConfig;
use aideon_roomsync::detect::{AssistedDetection, HEURISTIC_CONFIDENCE_CEILING, StructureDetector};
use aideon_roomsync::error::{AssistError, DetectionError};
use aideon_roomsync::io::excel_read;
use aideon_roomsync::model::{
    DetectedStructure, DetectionMethod, Field, SideColumn, Source, UnmappedColumn,
};
use aideon_roomsync::vocabulary::Vocabulary;
use common::{sheet, xlsx};

/// Header with two recognised columns out of five; scores 0.4.
fn weak_header_rows() -> Vec<Vec<&'static str>> {
    vec![
        vec!["Raum-Nr.", "Fläche", "Spalte A", "Spalte B", "Spalte C"],
        vec!["101", "20", "x", "y", "z"],
        vec!["102", "25", "x", "y", "z"],
    ]
}

fn fast_config() -> DetectorConfig {
    DetectorConfig {
        assist_timeout_ms: 50,
        ..DetectorConfig::default()
    }
}

struct SlowAssist;

impl AssistedDetection for SlowAssist {
    fn detect_assisted(
        &self,
        _sample_rows: &[Vec<String>],
        _vocabulary: &Vocabulary,
    ) -> Result<DetectedStructure, AssistError> {
        thread::sleep(Duration::from_millis(500));
        Err(AssistError::Failed("never answered in time".into()))
    }
}

struct FixedAssist {
    answer: DetectedStructure,
    calls: AtomicUsize,
}

impl FixedAssist {
    fn new(header_row_index: usize, columns: &[(Field, usize)], confidence: f64) -> Self {
        Self {
            answer: DetectedStructure {
                header_row_index,
                column_map: columns.iter().copied().collect::<BTreeMap<_, _>>(),
                side_columns: Vec::new(),
                unmapped_columns: Vec::new(),
                confidence,
                method: DetectionMethod::Heuristic,
            },
            calls: AtomicUsize::new(0),
        }
    }
}

impl AssistedDetection for FixedAssist {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect_assisted(
        &self,
        _sample_rows: &[Vec<String>],
        _vocabulary: &Vocabulary,
    ) -> Result<DetectedStructure, AssistError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

struct UnavailableAssist;

impl AssistedDetection for UnavailableAssist {
    fn detect_assisted(
        &self,
        _sample_rows: &[Vec<String>],
        _vocabulary: &Vocabulary,
    ) -> Result<DetectedStructure, AssistError> {
        Err(AssistError::Unavailable("no credentials".into()))
    }
}

#[test]
fn finds_header_below_leading_blank_rows() {
    let rows = vec![
        vec![],
        vec![],
        vec![],
        vec![],
        vec![],
        vec!["Geschoss", "Raum-Nr.", "Raumtyp", "Fläche"],
        vec!["EG", "101", "Büro", "20"],
        vec!["EG", "102", "Büro", "25"],
    ];

    let structure = StructureDetector::default()
        .detect(&sheet(&rows), None)
        .expect("header detected");

    assert_eq!(structure.header_row_index, 5);
    assert_eq!(structure.method, DetectionMethod::Heuristic);
    assert!(structure.confidence > 0.5);
    assert!(structure.confidence <= HEURISTIC_CONFIDENCE_CEILING);
    assert_eq!(structure.column(Field::Floor), Some(0));
    assert_eq!(structure.column(Field::RoomId), Some(1));
    assert_eq!(structure.column(Field::RoomType), Some(2));
    assert_eq!(structure.column(Field::Area), Some(3));
}

#[test]
fn leading_blank_rows_survive_workbook_loading() {
    let rows = vec![
        vec![],
        vec![],
        vec![],
        vec![],
        vec![],
        vec!["Geschoss", "Raum-Nr.", "Raumtyp", "Fläche"],
        vec!["EG", "101", "Büro", "20"],
    ];
    let loaded = excel_read::read_first_sheet(&xlsx(&rows), Source::Heating)
        .expect("workbook readable");

    let structure = StructureDetector::default()
        .detect(&loaded, None)
        .expect("header detected");
    assert_eq!(structure.header_row_index, 5);
}

#[test]
fn title_row_above_header_is_skipped() {
    let rows = vec![
        vec!["Heizlastberechnung Projekt Nord", "", "", ""],
        vec!["Raumnummer", "Etage", "Nutzung", "Raumfläche [m²]"],
        vec!["A.01", "1.OG", "Labor", "42"],
    ];

    let structure = StructureDetector::default()
        .detect(&sheet(&rows), None)
        .expect("header detected");
    assert_eq!(structure.header_row_index, 1);
    assert_eq!(structure.column(Field::Area), Some(3));
}

#[test]
fn unknown_headers_are_kept_as_unmapped_columns() {
    let rows = vec![
        vec!["Raum-Nr.", "Raumtyp", "Fläche", "Bemerkung"],
        vec!["101", "Büro", "20", "Fenster offen"],
    ];

    let structure = StructureDetector::default()
        .detect(&sheet(&rows), None)
        .expect("header detected");
    assert_eq!(
        structure.unmapped_columns,
        vec![UnmappedColumn {
            index: 3,
            header: "Bemerkung".into()
        }]
    );
    assert!((structure.confidence - 0.75).abs() < 1e-9);
}

#[test]
fn manual_header_row_is_deterministic_and_certain() {
    let rows = weak_header_rows();
    let detector =
        StructureDetector::new(fast_config()).with_assist(Arc::new(FixedAssist::new(1, &[], 0.9)));

    let first = detector.detect(&sheet(&rows), Some(0)).expect("hint accepted");
    let second = detector.detect(&sheet(&rows), Some(0)).expect("hint accepted");

    assert_eq!(first, second);
    assert_eq!(first.method, DetectionMethod::Manual);
    assert_eq!(first.confidence, 1.0);
    assert_eq!(first.header_row_index, 0);
    assert_eq!(first.column(Field::RoomId), Some(0));
    assert_eq!(first.column(Field::Area), Some(1));
}

#[test]
fn manual_header_row_outside_sheet_is_rejected() {
    let error = StructureDetector::default()
        .detect(&sheet(&weak_header_rows()), Some(10))
        .expect_err("hint out of range");
    assert_eq!(error, DetectionError::HintOutOfRange { row: 10, rows: 3 });
}

#[test]
fn slow_assist_falls_back_to_heuristic() {
    let detector = StructureDetector::new(fast_config()).with_assist(Arc::new(SlowAssist));

    let structure = detector
        .detect(&sheet(&weak_header_rows()), None)
        .expect("heuristic fallback");

    assert_eq!(structure.method, DetectionMethod::Heuristic);
    assert!(structure.confidence < 1.0);
    assert!((structure.confidence - 0.4).abs() < 1e-9);
    assert_eq!(structure.header_row_index, 0);
}

#[test]
fn unavailable_assist_falls_back_to_heuristic() {
    let detector = StructureDetector::new(fast_config()).with_assist(Arc::new(UnavailableAssist));

    let structure = detector
        .detect(&sheet(&weak_header_rows()), None)
        .expect("heuristic fallback");
    assert_eq!(structure.method, DetectionMethod::Heuristic);
}

#[test]
fn confident_assist_answer_is_used() {
    let assist = Arc::new(FixedAssist::new(
        0,
        &[(Field::RoomId, 0), (Field::Area, 1), (Field::RoomType, 2)],
        0.8,
    ));
    let detector = StructureDetector::new(fast_config()).with_assist(assist.clone());

    let structure = detector
        .detect(&sheet(&weak_header_rows()), None)
        .expect("assisted answer accepted");

    assert_eq!(assist.calls.load(Ordering::SeqCst), 1);
    assert_eq!(structure.method, DetectionMethod::AiAssisted);
    assert_eq!(structure.confidence, 0.8);
    assert_eq!(structure.column(Field::RoomType), Some(2));
    let unmapped: Vec<usize> = structure
        .unmapped_columns
        .iter()
        .map(|column| column.index)
        .collect();
    assert_eq!(unmapped, vec![3, 4]);
}

#[test]
fn assist_confidence_is_capped_below_certainty() {
    let assist = Arc::new(FixedAssist::new(0, &[(Field::RoomId, 0)], 1.0));
    let detector = StructureDetector::new(fast_config()).with_assist(assist);

    let structure = detector
        .detect(&sheet(&weak_header_rows()), None)
        .expect("assisted answer accepted");
    assert_eq!(structure.confidence, HEURISTIC_CONFIDENCE_CEILING);
}

#[test]
fn assist_answer_outside_sheet_is_ignored() {
    let assist = Arc::new(FixedAssist::new(0, &[(Field::RoomId, 9)], 0.9));
    let detector = StructureDetector::new(fast_config()).with_assist(assist.clone());

    let structure = detector
        .detect(&sheet(&weak_header_rows()), None)
        .expect("heuristic fallback");
    assert_eq!(assist.calls.load(Ordering::SeqCst), 1);
    assert_eq!(structure.method, DetectionMethod::Heuristic);
    assert_eq!(structure.column(Field::RoomId), Some(0));
}

#[test]
fn weaker_assist_answer_is_ignored() {
    let assist = Arc::new(FixedAssist::new(1, &[(Field::RoomId, 0)], 0.1));
    let detector = StructureDetector::new(fast_config()).with_assist(assist);

    let structure = detector
        .detect(&sheet(&weak_header_rows()), None)
        .expect("heuristic kept");
    assert_eq!(structure.method, DetectionMethod::Heuristic);
    assert_eq!(structure.header_row_index, 0);
}

#[test]
fn assist_is_skipped_when_disabled_or_confident() {
    let assist = Arc::new(FixedAssist::new(0, &[(Field::RoomId, 0)], 0.9));
    let detector = StructureDetector::new(fast_config()).with_assist(assist.clone());

    detector
        .detect_with(&sheet(&weak_header_rows()), None, false)
        .expect("heuristic result");
    let strong = vec![
        vec!["Raum-Nr.", "Raumtyp", "Fläche"],
        vec!["101", "Büro", "20"],
    ];
    detector.detect(&sheet(&strong), None).expect("heuristic result");

    assert_eq!(assist.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn sheet_without_header_is_rejected() {
    let rows = vec![vec!["1", "2", "3"], vec!["4", "5", "6"]];
    let error = StructureDetector::default()
        .detect(&sheet(&rows), None)
        .expect_err("no header");
    assert!(matches!(error, DetectionError::NoHeaderRow { .. }));

    let empty = sheet(&[]);
    assert_eq!(
        StructureDetector::default().detect(&empty, None),
        Err(DetectionError::EmptySheet)
    );
}

#[test]
fn side_labelled_headers_map_per_side() {
    let rows = vec![
        vec![
            "Raum-Nr.",
            "room_name (heating)",
            "cooling_load (heating)",
            "room_name (ventilation)",
        ],
        vec!["101", "Büro", "900", ""],
    ];

    let structure = StructureDetector::default()
        .detect(&sheet(&rows), Some(0))
        .expect("hint accepted");

    assert_eq!(structure.column(Field::RoomName), Some(1));
    assert_eq!(structure.column(Field::CoolingLoad), Some(2));
    assert_eq!(structure.column(Field::HeatingLoad), None);
    assert_eq!(structure.column_for(Field::RoomName, Source::Ventilation), Some(3));
    assert_eq!(structure.column_for(Field::CoolingLoad, Source::Ventilation), None);
    assert_eq!(structure.column_for(Field::RoomId, Source::Ventilation), Some(0));
    assert_eq!(
        structure.side_columns,
        vec![
            SideColumn {
                field: Field::RoomName,
                side: Source::Heating,
                index: 1
            },
            SideColumn {
                field: Field::CoolingLoad,
                side: Source::Heating,
                index: 2
            },
            SideColumn {
                field: Field::RoomName,
                side: Source::Ventilation,
                index: 3
            },
        ]
    );
    assert!(structure.unmapped_columns.is_empty());
}
