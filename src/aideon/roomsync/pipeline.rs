//! The `analyze` entry point chaining detection, normalization, merging,
//! room-type consolidation, metrics and workbook output.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::aideon::roomsync::config::EngineConfig;
use crate::aideon::roomsync::detect::{AssistedDetection, StructureDetector};
use crate::aideon::roomsync::error::{Result, ToolError};
use crate::aideon::roomsync::io::{excel_read, excel_write};
use crate::aideon::roomsync::merge::merge;
use crate::aideon::roomsync::metrics::{DetectionConfidence, Metrics, aggregate};
use crate::aideon::roomsync::model::{
    CanonicalRoomRecord, DetectedStructure, KeyChange, MergedRoomRecord, RawSheet,
    RoomTypeCluster, Source, UnmatchedRoom,
};
use crate::aideon::roomsync::normalize::normalize;
use crate::aideon::roomsync::optimize::{ClusterStrategy, optimize};

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeOptions {
    /// Allow the assisted-detection strategy, if one is attached.
    pub auto_detect_structure: bool,
    /// Zero-based header row applied to both sheets, bypassing detection.
    pub header_row: Option<usize>,
    pub cluster_strategy: ClusterStrategy,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            auto_detect_structure: true,
            header_row: None,
            cluster_strategy: ClusterStrategy::default(),
        }
    }
}

impl AnalyzeOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            cluster_strategy: config.cluster_strategy,
            ..Self::default()
        }
    }
}

/// Everything one analysis run produces. Owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub merged_records: Vec<MergedRoomRecord>,
    pub clusters: Vec<RoomTypeCluster>,
    pub key_changes: Vec<KeyChange>,
    /// Rooms found in one sheet only.
    pub unmatched: Vec<UnmatchedRoom>,
    pub heating_structure: DetectedStructure,
    pub ventilation_structure: DetectedStructure,
    pub metrics: Metrics,
    pub workbook_bytes: Vec<u8>,
}

/// Pipeline stage boundaries at which a run can be aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Detect,
    Normalize,
    Merge,
    Optimize,
    Aggregate,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Detect => "detect",
            Stage::Normalize => "normalize",
            Stage::Merge => "merge",
            Stage::Optimize => "optimize",
            Stage::Aggregate => "aggregate",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// Shared flag the caller sets to stop a run at the next stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stateless analysis engine. Each call to [`analyze`](Self::analyze) works
/// on its own copies of the input data.
#[derive(Clone)]
pub struct Analyzer {
    detector: StructureDetector,
    cancel: CancelFlag,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Analyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            detector: StructureDetector::new(config.detector.clone()),
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_assist(mut self, assist: Arc<dyn AssistedDetection>) -> Self {
        self.detector = self.detector.with_assist(assist);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the full pipeline over two in-memory workbooks.
    #[instrument(
        level = "info",
        skip_all,
        fields(heating_bytes = heating_bytes.len(), ventilation_bytes = ventilation_bytes.len())
    )]
    pub fn analyze(
        &self,
        heating_bytes: &[u8],
        ventilation_bytes: &[u8],
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult> {
        self.checkpoint(Stage::Load)?;
        let heating_sheet = excel_read::read_first_sheet(heating_bytes, Source::Heating)?;
        let ventilation_sheet = excel_read::read_first_sheet(ventilation_bytes, Source::Ventilation)?;

        self.checkpoint(Stage::Detect)?;
        let heating_structure = self.detect(&heating_sheet, Source::Heating, options)?;
        let ventilation_structure = self.detect(&ventilation_sheet, Source::Ventilation, options)?;

        self.checkpoint(Stage::Normalize)?;
        let heating = normalize(&heating_sheet, &heating_structure, Source::Heating)?;
        let ventilation = normalize(&ventilation_sheet, &ventilation_structure, Source::Ventilation)?;

        self.analyze_records(
            &heating,
            &ventilation,
            (heating_structure, ventilation_structure),
            options,
        )
    }

    fn detect(
        &self,
        sheet: &RawSheet,
        side: Source,
        options: &AnalyzeOptions,
    ) -> Result<DetectedStructure> {
        let structure = self
            .detector
            .detect_with(sheet, options.header_row, options.auto_detect_structure)
            .map_err(|source| ToolError::StructureDetection { side, source })?;
        info!(
            %side,
            header_row = structure.header_row_index,
            confidence = structure.confidence,
            method = %structure.method,
            mapped_columns = structure.column_map.len(),
            "detected sheet structure"
        );
        Ok(structure)
    }

    fn analyze_records(
        &self,
        heating: &[CanonicalRoomRecord],
        ventilation: &[CanonicalRoomRecord],
        (heating_structure, ventilation_structure): (DetectedStructure, DetectedStructure),
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult> {
        let confidence = DetectionConfidence {
            heating: heating_structure.confidence,
            ventilation: ventilation_structure.confidence,
        };

        self.checkpoint(Stage::Merge)?;
        let merged = merge(heating, ventilation);

        self.checkpoint(Stage::Optimize)?;
        let optimization = optimize(merged.records, options.cluster_strategy);

        self.checkpoint(Stage::Aggregate)?;
        let metrics = aggregate(&optimization.records, &optimization.clusters, confidence);

        self.checkpoint(Stage::Write)?;
        let workbook_bytes = excel_write::write_workbook(&optimization.records)?;
        debug!(size = workbook_bytes.len(), "merged workbook written");

        Ok(AnalysisResult {
            merged_records: optimization.records,
            clusters: optimization.clusters,
            key_changes: optimization.key_changes,
            unmatched: merged.unmatched,
            heating_structure,
            ventilation_structure,
            metrics,
            workbook_bytes,
        })
    }

    fn checkpoint(&self, stage: Stage) -> Result<()> {
        if self.cancel.is_cancelled() {
            info!(%stage, "analysis cancelled");
            return Err(ToolError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

/// Reads both workbooks from disk, runs the analysis and writes the merged
/// workbook to `output`.
#[instrument(
    level = "info",
    skip_all,
    fields(
        heating = %heating.display(),
        ventilation = %ventilation.display(),
        output = %output.display()
    )
)]
pub fn analyze_files(
    analyzer: &Analyzer,
    heating: &Path,
    ventilation: &Path,
    output: &Path,
    options: &AnalyzeOptions,
) -> Result<AnalysisResult> {
    for path in [heating, ventilation] {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
    }
    let heating_bytes = std::fs::read(heating)?;
    let ventilation_bytes = std::fs::read(ventilation)?;
    let result = analyzer.analyze(&heating_bytes, &ventilation_bytes, options)?;
    excel_write::save_workbook(output, &result.workbook_bytes)?;
    info!(
        rooms = result.metrics.total_rooms,
        unmatched = result.unmatched.len(),
        "analysis written"
    );
    Ok(result)
}
