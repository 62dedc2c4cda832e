use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aideon::roomsync::model::{Field, MatchStatus, MergedRoomRecord, RoomTypeCluster};

/// Structure-detection confidences of the two input sheets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfidence {
    pub heating: f64,
    pub ventilation: f64,
}

impl DetectionConfidence {
    /// The weaker sheet limits the overall confidence.
    pub fn combined(&self) -> f64 {
        self.heating.min(self.ventilation).clamp(0.0, 1.0)
    }
}

/// Summary analytics of one analysis run. Rates and percentages come both
/// rounded for reporting and at full precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_rooms: usize,
    pub matched_rooms: usize,
    pub heating_only_rooms: usize,
    pub ventilation_only_rooms: usize,
    pub original_room_types: usize,
    pub optimized_room_types: usize,
    /// Rooms whose room type was rewritten to a canonical label.
    pub relabelled_rooms: usize,
    pub improvement_rate: u32,
    pub improvement_rate_exact: f64,
    pub avg_room_size_m2: f64,
    pub total_area_m2: f64,
    pub total_heating_load_w: f64,
    pub total_supply_air_m3h: f64,
    pub rooms_without_area: usize,
    pub unparseable_cells: usize,
    pub confidence: f64,
    pub confidence_percent: u32,
}

/// Computes the summary metrics over optimized records and their clusters.
pub fn aggregate(
    records: &[MergedRoomRecord],
    clusters: &[RoomTypeCluster],
    confidence: DetectionConfidence,
) -> Metrics {
    let count_status =
        |status: MatchStatus| records.iter().filter(|record| record.match_status == status).count();

    let original_room_types = clusters
        .iter()
        .flat_map(|cluster| cluster.member_labels.iter())
        .collect::<BTreeSet<_>>()
        .len();
    let optimized_room_types = clusters.len();
    let improvement_rate_exact = if original_room_types > 0 {
        100.0 * (1.0 - optimized_room_types as f64 / original_room_types as f64)
    } else {
        0.0
    };

    let areas: Vec<f64> = records.iter().filter_map(|record| record.area_m2).collect();
    let total_area_m2: f64 = areas.iter().sum();
    let avg_room_size_m2 = if areas.is_empty() {
        0.0
    } else {
        total_area_m2 / areas.len() as f64
    };

    let total_heating_load_w: f64 = records
        .iter()
        .filter_map(|record| record.heating_fields.get(&Field::HeatingLoad))
        .filter_map(|value| value.as_number())
        .sum();
    let total_supply_air_m3h: f64 = records
        .iter()
        .filter_map(|record| record.ventilation_fields.get(&Field::SupplyAir))
        .filter_map(|value| value.as_number())
        .sum();

    let combined = confidence.combined();
    let metrics = Metrics {
        total_rooms: records.len(),
        matched_rooms: count_status(MatchStatus::Matched),
        heating_only_rooms: count_status(MatchStatus::HeatingOnly),
        ventilation_only_rooms: count_status(MatchStatus::VentilationOnly),
        original_room_types,
        optimized_room_types,
        relabelled_rooms: records
            .iter()
            .filter(|record| record.room_type != record.original_room_type)
            .count(),
        improvement_rate: improvement_rate_exact.round() as u32,
        improvement_rate_exact,
        avg_room_size_m2,
        total_area_m2,
        total_heating_load_w,
        total_supply_air_m3h,
        rooms_without_area: records.len() - areas.len(),
        unparseable_cells: records.iter().map(|record| record.unparseable_cells).sum(),
        confidence: combined,
        confidence_percent: (combined * 100.0).round() as u32,
    };
    debug!(?metrics, "aggregated metrics");
    metrics
}
