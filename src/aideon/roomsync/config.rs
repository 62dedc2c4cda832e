use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aideon::roomsync::error::{Result, ToolError};
use crate::aideon::roomsync::optimize::ClusterStrategy;

/// Tuning knobs of the structure detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of leading rows considered as header candidates.
    pub scan_rows: usize,
    /// Below this score a sheet is rejected unless assisted detection answers.
    pub min_confidence: f64,
    /// Below this score the assisted strategy, if any, is consulted.
    pub assist_below: f64,
    /// Number of rows handed to the assisted strategy.
    pub sample_rows: usize,
    /// Upper bound on a single assisted-detection call.
    pub assist_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scan_rows: 15,
            min_confidence: 0.2,
            assist_below: 0.6,
            sample_rows: 20,
            assist_timeout_ms: 10_000,
        }
    }
}

impl DetectorConfig {
    pub fn assist_timeout(&self) -> Duration {
        Duration::from_millis(self.assist_timeout_ms)
    }
}

/// Engine-wide configuration, loadable from a JSON file. Missing keys take
/// their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub detector: DetectorConfig,
    pub cluster_strategy: ClusterStrategy,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let detector = &self.detector;
        if detector.scan_rows == 0 {
            return Err(ToolError::Config("detector.scan_rows must be at least 1".into()));
        }
        for (name, value) in [
            ("detector.min_confidence", detector.min_confidence),
            ("detector.assist_below", detector.assist_below),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ToolError::Config(format!(
                    "{name} must lie within [0, 1], got {value}"
                )));
            }
        }
        if detector.assist_below < detector.min_confidence {
            return Err(ToolError::Config(
                "detector.assist_below must not be lower than detector.min_confidence".into(),
            ));
        }
        if let ClusterStrategy::Fuzzy { max_distance: 0 } = self.cluster_strategy {
            return Err(ToolError::Config(
                "cluster_strategy.max_distance must be at least 1; use the exact strategy instead"
                    .into(),
            ));
        }
        Ok(())
    }
}
