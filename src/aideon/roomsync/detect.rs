//! Header-row and column-layout detection for loosely structured sheets.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use tracing::{debug, info, warn};

use crate::aideon::roomsync::config::DetectorConfig;
use crate::aideon::roomsync::error::{AssistError, DetectionError};
use crate::aideon::roomsync::model::{
    DetectedStructure, DetectionMethod, Field, RawCell, RawSheet, SideColumn, UnmappedColumn,
};
use crate::aideon::roomsync::vocabulary::{Vocabulary, split_side_suffix};

/// Highest confidence the heuristic may report. Only a manual header row is
/// fully certain.
pub const HEURISTIC_CONFIDENCE_CEILING: f64 = 0.95;

/// Optional capability that proposes a sheet structure from a sample of rows,
/// for instance by asking a remote model. The detector bounds every call with
/// a timeout and recovers from any failure.
pub trait AssistedDetection: Send + Sync {
    fn name(&self) -> &str {
        "assisted"
    }

    fn detect_assisted(
        &self,
        sample_rows: &[Vec<String>],
        vocabulary: &Vocabulary,
    ) -> Result<DetectedStructure, AssistError>;
}

#[derive(Debug, Default)]
struct ColumnLayout {
    column_map: BTreeMap<Field, usize>,
    side_columns: Vec<SideColumn>,
    unmapped: Vec<UnmappedColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    row: usize,
    score: f64,
}

/// Finds the header row of a sheet and maps its columns to [`Field`]s.
#[derive(Clone)]
pub struct StructureDetector {
    config: DetectorConfig,
    vocabulary: Vocabulary,
    assist: Option<Arc<dyn AssistedDetection>>,
}

impl Default for StructureDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl StructureDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            vocabulary: Vocabulary::standard(),
            assist: None,
        }
    }

    /// Attaches an assisted-detection strategy consulted for low-scoring sheets.
    pub fn with_assist(mut self, assist: Arc<dyn AssistedDetection>) -> Self {
        self.assist = Some(assist);
        self
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Detects the structure of `sheet`, consulting the assisted strategy when
    /// one is attached.
    pub fn detect(
        &self,
        sheet: &RawSheet,
        hint: Option<usize>,
    ) -> Result<DetectedStructure, DetectionError> {
        self.detect_with(sheet, hint, true)
    }

    /// Like [`detect`](Self::detect) but lets the caller switch assisted
    /// detection off for this call.
    pub fn detect_with(
        &self,
        sheet: &RawSheet,
        hint: Option<usize>,
        allow_assist: bool,
    ) -> Result<DetectedStructure, DetectionError> {
        if let Some(row) = hint {
            return self.manual(sheet, row);
        }
        if sheet.row_count() == 0 {
            return Err(DetectionError::EmptySheet);
        }

        let best = self.best_candidate(sheet);
        debug!(row = best.row, score = best.score, "best heuristic header candidate");

        if best.score < self.config.assist_below && allow_assist {
            if let Some(assist) = &self.assist {
                match self.consult(assist, sheet) {
                    Ok(structure) if structure.confidence >= best.score => {
                        info!(
                            strategy = assist.name(),
                            row = structure.header_row_index,
                            confidence = structure.confidence,
                            "using assisted structure detection"
                        );
                        return Ok(structure);
                    }
                    Ok(structure) => debug!(
                        strategy = assist.name(),
                        confidence = structure.confidence,
                        "assisted answer weaker than heuristic, ignoring"
                    ),
                    Err(error) => warn!(
                        strategy = assist.name(),
                        %error,
                        "assisted detection failed, falling back to heuristic"
                    ),
                }
            }
        }

        if best.score < self.config.min_confidence {
            return Err(DetectionError::NoHeaderRow {
                row: best.row,
                score: best.score,
            });
        }

        let layout = self.map_columns(&sheet.rows()[best.row]);
        Ok(DetectedStructure {
            header_row_index: best.row,
            column_map: layout.column_map,
            side_columns: layout.side_columns,
            unmapped_columns: layout.unmapped,
            confidence: best.score.min(HEURISTIC_CONFIDENCE_CEILING),
            method: DetectionMethod::Heuristic,
        })
    }

    /// Scores a row as (share of filled cells) × (share of filled cells that
    /// name a known column).
    pub fn score_row(&self, row: &[RawCell], width: usize) -> f64 {
        let filled: Vec<&RawCell> = row.iter().filter(|cell| !cell.is_empty()).collect();
        if filled.is_empty() || width == 0 {
            return 0.0;
        }
        let matched = filled
            .iter()
            .filter(|cell| match cell {
                RawCell::Text(text) => self.vocabulary.match_header(text).is_some(),
                _ => false,
            })
            .count();
        let fill_ratio = filled.len() as f64 / width as f64;
        let match_ratio = matched as f64 / filled.len() as f64;
        fill_ratio * match_ratio
    }

    fn best_candidate(&self, sheet: &RawSheet) -> Candidate {
        let width = sheet.width();
        let mut best = Candidate { row: 0, score: 0.0 };
        for (index, row) in sheet.rows().iter().take(self.config.scan_rows).enumerate() {
            let score = self.score_row(row, width);
            if score > best.score {
                best = Candidate { row: index, score };
            }
        }
        best
    }

    fn manual(&self, sheet: &RawSheet, row: usize) -> Result<DetectedStructure, DetectionError> {
        let cells = sheet
            .rows()
            .get(row)
            .ok_or(DetectionError::HintOutOfRange {
                row,
                rows: sheet.row_count(),
            })?;
        let layout = self.map_columns(cells);
        Ok(DetectedStructure {
            header_row_index: row,
            column_map: layout.column_map,
            side_columns: layout.side_columns,
            unmapped_columns: layout.unmapped,
            confidence: 1.0,
            method: DetectionMethod::Manual,
        })
    }

    /// Maps header cells to fields. The first column naming a field claims it
    /// in the column map; side-labelled headers are also kept per side, and
    /// everything else is kept as an unmapped column.
    fn map_columns(&self, header: &[RawCell]) -> ColumnLayout {
        let mut layout = ColumnLayout::default();

        for (index, cell) in header.iter().enumerate() {
            let text = cell.to_text();
            if text.is_empty() {
                continue;
            }
            let Some(found) = self.vocabulary.match_header(&text) else {
                layout.unmapped.push(UnmappedColumn { index, header: text });
                continue;
            };

            let claimed = match layout.column_map.entry(found.field) {
                Entry::Vacant(slot) => {
                    slot.insert(index);
                    true
                }
                Entry::Occupied(_) => false,
            };
            let (_, side) = split_side_suffix(&text);
            match side {
                Some(side) => layout.side_columns.push(SideColumn {
                    field: found.field,
                    side,
                    index,
                }),
                None if !claimed => layout.unmapped.push(UnmappedColumn { index, header: text }),
                None => {}
            }
        }

        layout
    }

    fn consult(
        &self,
        assist: &Arc<dyn AssistedDetection>,
        sheet: &RawSheet,
    ) -> Result<DetectedStructure, AssistError> {
        let sample = sheet.text_sample(self.config.sample_rows);
        let width = sheet.width();
        let timeout = self.config.assist_timeout();

        let (sender, receiver) = mpsc::channel();
        let strategy = Arc::clone(assist);
        let vocabulary = self.vocabulary.clone();
        let worker_sample = sample.clone();
        thread::Builder::new()
            .name("assisted-detection".into())
            .spawn(move || {
                // The receiver is gone when the call already timed out.
                let _ = sender.send(strategy.detect_assisted(&worker_sample, &vocabulary));
            })
            .map_err(|error| AssistError::Unavailable(error.to_string()))?;

        let mut structure = match receiver.recv_timeout(timeout) {
            Ok(answer) => answer?,
            Err(RecvTimeoutError::Timeout) => return Err(AssistError::TimedOut(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(AssistError::Failed("assisted detection worker panicked".into()));
            }
        };

        if structure.header_row_index >= sample.len() {
            return Err(AssistError::InvalidAnswer(format!(
                "header row {} outside the {}-row sample",
                structure.header_row_index,
                sample.len()
            )));
        }
        if let Some((field, column)) = structure
            .column_map
            .iter()
            .find(|(_, column)| **column >= width)
        {
            return Err(AssistError::InvalidAnswer(format!(
                "{field} mapped to column {column} of a {width}-column sheet"
            )));
        }
        if let Some(column) = structure
            .side_columns
            .iter()
            .find(|column| column.index >= width)
        {
            return Err(AssistError::InvalidAnswer(format!(
                "{} ({}) mapped to column {} of a {width}-column sheet",
                column.field, column.side, column.index
            )));
        }

        let header = &sheet.rows()[structure.header_row_index];
        structure.unmapped_columns = header
            .iter()
            .enumerate()
            .filter(|(index, cell)| {
                !cell.is_empty()
                    && !structure.column_map.values().any(|column| column == index)
                    && !structure.side_columns.iter().any(|column| column.index == *index)
            })
            .map(|(index, cell)| UnmappedColumn {
                index,
                header: cell.to_text(),
            })
            .collect();
        structure.confidence = structure.confidence.clamp(0.0, HEURISTIC_CONFIDENCE_CEILING);
        structure.method = DetectionMethod::AiAssisted;
        Ok(structure)
    }
}
