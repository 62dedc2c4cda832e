use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic column a spreadsheet header can resolve to.
///
/// The declaration order is significant: it is the order in which fields are
/// written to the merged workbook and the order used to break ties when a
/// header matches more than one field equally well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    RoomId,
    Floor,
    RoomType,
    RoomName,
    Area,
    Volume,
    Height,
    HeatingLoad,
    CoolingLoad,
    DesignTemperature,
    SupplyAir,
    ExhaustAir,
    AirChangeRate,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::RoomId,
        Field::Floor,
        Field::RoomType,
        Field::RoomName,
        Field::Area,
        Field::Volume,
        Field::Height,
        Field::HeatingLoad,
        Field::CoolingLoad,
        Field::DesignTemperature,
        Field::SupplyAir,
        Field::ExhaustAir,
        Field::AirChangeRate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::RoomId => "room_id",
            Field::Floor => "floor",
            Field::RoomType => "room_type",
            Field::RoomName => "room_name",
            Field::Area => "area",
            Field::Volume => "volume",
            Field::Height => "height",
            Field::HeatingLoad => "heating_load",
            Field::CoolingLoad => "cooling_load",
            Field::DesignTemperature => "design_temperature",
            Field::SupplyAir => "supply_air",
            Field::ExhaustAir => "exhaust_air",
            Field::AirChangeRate => "air_change_rate",
        }
    }

    /// Fields whose cells are parsed as numbers.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Field::RoomId | Field::Floor | Field::RoomType | Field::RoomName
        )
    }

    /// Fields lifted onto the record itself rather than kept in `raw_fields`.
    pub fn is_core(self) -> bool {
        matches!(
            self,
            Field::RoomId | Field::Floor | Field::RoomType | Field::Area
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two input workbooks a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Heating,
    Ventilation,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Heating => write!(f, "heating"),
            Source::Ventilation => write!(f, "ventilation"),
        }
    }
}

/// A single cell as read from a workbook, before any semantic typing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawCell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the cell as display text. Integral numbers drop their
    /// fractional part so that a room number stored as `101.0` reads `101`.
    ///
    /// Number formats are not available from the reader, so a numeric cell
    /// displayed as `1.10` reads `1.1`. Room ids like that only join across
    /// sheets when both sheets store them the same way.
    pub fn to_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(value) => value.trim().to_string(),
            RawCell::Number(value) => value.to_string(),
            RawCell::Bool(value) => value.to_string(),
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

static EMPTY_CELL: RawCell = RawCell::Empty;

/// Rows × columns of raw cells, as loaded from the first worksheet of a file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSheet {
    rows: Vec<Vec<RawCell>>,
}

impl RawSheet {
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<RawCell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Widest row in the sheet.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    /// The first `limit` rows rendered as text, padded to the sheet width.
    pub fn text_sample(&self, limit: usize) -> Vec<Vec<String>> {
        let width = self.width();
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                (0..width)
                    .map(|column| row.get(column).map(RawCell::to_text).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

/// How a sheet's header row was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Heuristic,
    AiAssisted,
    Manual,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMethod::Heuristic => write!(f, "heuristic"),
            DetectionMethod::AiAssisted => write!(f, "ai_assisted"),
            DetectionMethod::Manual => write!(f, "manual"),
        }
    }
}

/// A header cell that did not resolve to any semantic field. Kept for
/// traceability only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedColumn {
    pub index: usize,
    pub header: String,
}

/// A header cell naming a field for one side only, such as
/// `room_name (ventilation)` in the merged workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideColumn {
    pub field: Field,
    pub side: Source,
    pub index: usize,
}

/// Header row and column layout of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedStructure {
    pub header_row_index: usize,
    /// First column naming each field, whatever its side.
    pub column_map: BTreeMap<Field, usize>,
    #[serde(default)]
    pub side_columns: Vec<SideColumn>,
    pub unmapped_columns: Vec<UnmappedColumn>,
    pub confidence: f64,
    pub method: DetectionMethod,
}

impl DetectedStructure {
    pub fn column(&self, field: Field) -> Option<usize> {
        self.column_map.get(&field).copied()
    }

    /// Column holding `field` when reading rows as `side`. A field with
    /// side-labelled columns is only read from the column of that side, so a
    /// ventilation value is never taken for a heating one.
    pub fn column_for(&self, field: Field, side: Source) -> Option<usize> {
        let mut labelled = self
            .side_columns
            .iter()
            .filter(|column| column.field == field)
            .peekable();
        if labelled.peek().is_none() {
            return self.column(field);
        }
        labelled
            .find(|column| column.side == side)
            .map(|column| column.index)
    }
}

/// Typed value of a non-core field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

/// A room after its columns have been resolved to semantic fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRoomRecord {
    /// Room identifier as displayed in the source sheet.
    pub room_id: String,
    /// Trimmed, case-folded identifier used as the join key.
    pub room_key: String,
    pub floor: String,
    pub room_type: String,
    pub area_m2: Option<f64>,
    pub source: Source,
    pub raw_fields: BTreeMap<Field, FieldValue>,
    /// Numeric fields whose cell was filled but could not be parsed.
    pub unparseable: Vec<Field>,
    /// Zero-based worksheet row the record was read from.
    pub row_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    HeatingOnly,
    VentilationOnly,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::HeatingOnly => "heating_only",
            MatchStatus::VentilationOnly => "ventilation_only",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One room of the merged dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRoomRecord {
    pub room_id: String,
    pub room_key: String,
    pub floor: String,
    /// Consolidated label once the optimizer has run.
    pub room_type: String,
    /// Label as it appeared in the inputs.
    pub original_room_type: String,
    pub area_m2: Option<f64>,
    pub heating_fields: BTreeMap<Field, FieldValue>,
    pub ventilation_fields: BTreeMap<Field, FieldValue>,
    pub match_status: MatchStatus,
    pub unparseable_cells: usize,
}

/// Room present in only one of the two inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedRoom {
    pub room_id: String,
    pub side: Source,
}

/// Set of room-type labels consolidated under one canonical label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTypeCluster {
    pub canonical_label: String,
    pub member_labels: std::collections::BTreeSet<String>,
    pub member_count: usize,
}

/// A distinct room-type rewrite performed by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChange {
    pub from: String,
    pub to: String,
    pub count: usize,
}
