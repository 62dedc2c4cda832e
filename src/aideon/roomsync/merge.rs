use std::collections::{HashMap, HashSet};

use tracing::{info, instrument, warn};

use crate::aideon::roomsync::model::{
    CanonicalRoomRecord, MatchStatus, MergedRoomRecord, Source, UnmatchedRoom,
};

/// Merged rooms plus the rooms found in only one of the two sheets.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub records: Vec<MergedRoomRecord>,
    pub unmatched: Vec<UnmatchedRoom>,
}

/// Joins heating and ventilation rooms on their normalized room id.
///
/// Heating rooms come first in their original order, followed by rooms that
/// only appear in the ventilation sheet. For matched rooms the heating sheet
/// is authoritative for floor, room type and area; ventilation only fills in
/// values the heating sheet leaves empty.
#[instrument(level = "info", skip_all, fields(heating = heating.len(), ventilation = ventilation.len()))]
pub fn merge(
    heating: &[CanonicalRoomRecord],
    ventilation: &[CanonicalRoomRecord],
) -> MergeOutcome {
    let mut ventilation_by_key: HashMap<&str, &CanonicalRoomRecord> = HashMap::new();
    for record in ventilation {
        ventilation_by_key
            .entry(record.room_key.as_str())
            .or_insert(record);
    }

    let mut records = Vec::with_capacity(heating.len() + ventilation.len());
    let mut unmatched = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for heat in heating {
        if !seen.insert(heat.room_key.as_str()) {
            warn!(room = %heat.room_id, "heating room listed twice, ignoring repeat");
            continue;
        }
        match ventilation_by_key.get(heat.room_key.as_str()) {
            Some(vent) => records.push(matched(heat, vent)),
            None => {
                unmatched.push(UnmatchedRoom {
                    room_id: heat.room_id.clone(),
                    side: Source::Heating,
                });
                records.push(single_sided(heat, MatchStatus::HeatingOnly));
            }
        }
    }

    for vent in ventilation {
        if !seen.insert(vent.room_key.as_str()) {
            continue;
        }
        unmatched.push(UnmatchedRoom {
            room_id: vent.room_id.clone(),
            side: Source::Ventilation,
        });
        records.push(single_sided(vent, MatchStatus::VentilationOnly));
    }

    for room in &unmatched {
        warn!(room = %room.room_id, side = %room.side, "room present in one sheet only");
    }
    info!(
        merged = records.len(),
        unmatched = unmatched.len(),
        "merged heating and ventilation rooms"
    );

    MergeOutcome { records, unmatched }
}

fn matched(heat: &CanonicalRoomRecord, vent: &CanonicalRoomRecord) -> MergedRoomRecord {
    let room_type = prefer_filled(&heat.room_type, &vent.room_type);
    MergedRoomRecord {
        room_id: heat.room_id.clone(),
        room_key: heat.room_key.clone(),
        floor: prefer_filled(&heat.floor, &vent.floor),
        original_room_type: room_type.clone(),
        room_type,
        area_m2: heat.area_m2.or(vent.area_m2),
        heating_fields: heat.raw_fields.clone(),
        ventilation_fields: vent.raw_fields.clone(),
        match_status: MatchStatus::Matched,
        unparseable_cells: heat.unparseable.len() + vent.unparseable.len(),
    }
}

fn single_sided(record: &CanonicalRoomRecord, status: MatchStatus) -> MergedRoomRecord {
    let (heating_fields, ventilation_fields) = match record.source {
        Source::Heating => (record.raw_fields.clone(), Default::default()),
        Source::Ventilation => (Default::default(), record.raw_fields.clone()),
    };
    MergedRoomRecord {
        room_id: record.room_id.clone(),
        room_key: record.room_key.clone(),
        floor: record.floor.clone(),
        room_type: record.room_type.clone(),
        original_room_type: record.room_type.clone(),
        area_m2: record.area_m2,
        heating_fields,
        ventilation_fields,
        match_status: status,
        unparseable_cells: record.unparseable.len(),
    }
}

fn prefer_filled(primary: &str, fallback: &str) -> String {
    if primary.trim().is_empty() {
        fallback.to_string()
    } else {
        primary.to_string()
    }
}
