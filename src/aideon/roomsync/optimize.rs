//! Room-type consolidation.
//!
//! Near-duplicate room-type labels ("Büro Standard", "Büro standard",
//! "Büro (Standard)") are clustered and every record is relabelled with its
//! cluster's canonical label. Clustering is repeated until no further labels
//! link, so running the optimizer on its own output changes nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::aideon::roomsync::model::{KeyChange, MergedRoomRecord, RoomTypeCluster};
use crate::aideon::roomsync::vocabulary::fold_text;

/// How aggressively room-type labels are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClusterStrategy {
    /// Only labels that are identical after folding case, accents,
    /// punctuation and whitespace are merged.
    Exact,
    /// Additionally merges labels within `max_distance` edits of each other
    /// when they carry the same digits and a comparable area profile.
    Fuzzy { max_distance: usize },
}

impl Default for ClusterStrategy {
    fn default() -> Self {
        ClusterStrategy::Fuzzy { max_distance: 2 }
    }
}

/// Relabelled records together with the clusters and rewrites that produced
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimization {
    pub records: Vec<MergedRoomRecord>,
    pub clusters: Vec<RoomTypeCluster>,
    pub key_changes: Vec<KeyChange>,
}

#[derive(Debug)]
struct LabelGroup {
    normalized: String,
    digits: String,
    profile: Option<i32>,
    records: Vec<usize>,
}

/// Clusters the room types of `records` and rewrites each record's
/// `room_type` to its cluster's canonical label.
///
/// The canonical label is the most frequent original label in the cluster;
/// ties go to the shorter label, then to the lexicographically smaller one.
/// Records without a room type are left alone and belong to no cluster.
#[instrument(level = "info", skip_all, fields(records = records.len(), strategy = ?strategy))]
pub fn optimize(mut records: Vec<MergedRoomRecord>, strategy: ClusterStrategy) -> Optimization {
    let originals: Vec<String> = records.iter().map(|record| record.room_type.clone()).collect();
    let mut current = originals.clone();

    loop {
        let groups = label_groups(&records, &current);
        let components = link(&groups, strategy);
        if components.len() == groups.len() {
            break;
        }
        debug!(
            labels = groups.len(),
            clusters = components.len(),
            "room-type labels linked"
        );
        for component in components {
            let members: Vec<usize> = component
                .iter()
                .flat_map(|group| groups[*group].records.iter().copied())
                .collect();
            let Some(canonical) =
                canonical_label(members.iter().map(|index| originals[*index].as_str()))
            else {
                continue;
            };
            for index in members {
                current[index].clone_from(&canonical);
            }
        }
    }

    let clusters = build_clusters(&originals, &current);
    let key_changes = key_changes(&originals, &current);
    for (record, label) in records.iter_mut().zip(current) {
        record.room_type = label;
    }

    info!(
        original_types = clusters.iter().map(|c| c.member_labels.len()).sum::<usize>(),
        optimized_types = clusters.len(),
        rewrites = key_changes.len(),
        "consolidated room types"
    );

    Optimization {
        records,
        clusters,
        key_changes,
    }
}

fn label_groups(records: &[MergedRoomRecord], labels: &[String]) -> Vec<LabelGroup> {
    let mut by_label: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        if !label.trim().is_empty() {
            by_label.entry(label.as_str()).or_default().push(index);
        }
    }

    by_label
        .into_iter()
        .map(|(label, members)| {
            let normalized = fold_text(label);
            let digits = normalized.chars().filter(char::is_ascii_digit).collect();
            let areas = members.iter().filter_map(|index| records[*index].area_m2);
            LabelGroup {
                normalized,
                digits,
                profile: median(areas).map(area_bucket),
                records: members,
            }
        })
        .collect()
}

/// Groups label groups into connected components under the strategy's
/// linking rule. Components are returned in order of their first group.
fn link(groups: &[LabelGroup], strategy: ClusterStrategy) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..groups.len()).collect();

    let mut first_by_normalized: HashMap<&str, usize> = HashMap::new();
    for (index, group) in groups.iter().enumerate() {
        match first_by_normalized.get(group.normalized.as_str()) {
            Some(first) => union(&mut parent, *first, index),
            None => {
                first_by_normalized.insert(group.normalized.as_str(), index);
            }
        }
    }

    if let ClusterStrategy::Fuzzy { max_distance } = strategy {
        for left in 0..groups.len() {
            for right in left + 1..groups.len() {
                if fuzzy_linked(&groups[left], &groups[right], max_distance) {
                    union(&mut parent, left, right);
                }
            }
        }
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for index in 0..groups.len() {
        let root = find(&mut parent, index);
        components.entry(root).or_default().push(index);
    }
    let mut components: Vec<Vec<usize>> = components.into_values().collect();
    components.sort_by_key(|members| members[0]);
    components
}

fn fuzzy_linked(left: &LabelGroup, right: &LabelGroup, max_distance: usize) -> bool {
    if left.digits != right.digits {
        return false;
    }
    if let (Some(a), Some(b)) = (left.profile, right.profile) {
        if a != b {
            return false;
        }
    }
    let shorter = left
        .normalized
        .chars()
        .count()
        .min(right.normalized.chars().count());
    let distance = levenshtein(&left.normalized, &right.normalized);
    // Short labels like "Lager"/"Labor" sit a couple of edits apart by chance.
    distance <= max_distance && distance * 3 <= shorter
}

fn find(parent: &mut [usize], mut node: usize) -> usize {
    let mut root = node;
    while parent[root] != root {
        root = parent[root];
    }
    while parent[node] != root {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
    root
}

fn union(parent: &mut [usize], left: usize, right: usize) {
    let left = find(parent, left);
    let right = find(parent, right);
    if left != right {
        let (keep, merge) = if left < right { (left, right) } else { (right, left) };
        parent[merge] = keep;
    }
}

fn canonical_label<'a>(labels: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    counts
        .into_iter()
        .min_by(|(left, left_count), (right, right_count)| {
            right_count
                .cmp(left_count)
                .then_with(|| left.chars().count().cmp(&right.chars().count()))
                .then_with(|| left.cmp(right))
        })
        .map(|(label, _)| label.to_string())
}

fn build_clusters(originals: &[String], current: &[String]) -> Vec<RoomTypeCluster> {
    let mut clusters: BTreeMap<&str, RoomTypeCluster> = BTreeMap::new();
    for (original, label) in originals.iter().zip(current) {
        if label.trim().is_empty() {
            continue;
        }
        let cluster = clusters.entry(label.as_str()).or_insert_with(|| RoomTypeCluster {
            canonical_label: label.clone(),
            member_labels: BTreeSet::new(),
            member_count: 0,
        });
        cluster.member_labels.insert(original.clone());
        cluster.member_count += 1;
    }

    let mut clusters: Vec<RoomTypeCluster> = clusters.into_values().collect();
    clusters.sort_by(|left, right| {
        right
            .member_count
            .cmp(&left.member_count)
            .then_with(|| left.canonical_label.cmp(&right.canonical_label))
    });
    clusters
}

fn key_changes(originals: &[String], current: &[String]) -> Vec<KeyChange> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for (original, label) in originals.iter().zip(current) {
        if original != label {
            *counts.entry((original.as_str(), label.as_str())).or_default() += 1;
        }
    }

    let mut changes: Vec<KeyChange> = counts
        .into_iter()
        .map(|((from, to), count)| KeyChange {
            from: from.to_string(),
            to: to.to_string(),
            count,
        })
        .collect();
    changes.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.from.cmp(&right.from))
    });
    changes
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(values[(values.len() - 1) / 2])
}

/// Logarithmic size class: 1–2 m², 2–4 m², 4–8 m², ...
fn area_bucket(area: f64) -> i32 {
    if area < 1.0 {
        0
    } else {
        area.log2().floor() as i32 + 1
    }
}

fn levenshtein(left: &str, right: &str) -> usize {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    if left.is_empty() {
        return right.len();
    }

    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut row = vec![0; right.len() + 1];
    for (i, left_char) in left.iter().enumerate() {
        row[0] = i + 1;
        for (j, right_char) in right.iter().enumerate() {
            let cost = usize::from(left_char != right_char);
            row[j + 1] = (previous[j + 1] + 1)
                .min(row[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut row);
    }
    previous[right.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_counts_edits() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("buero standard", "buero standart"), 1);
    }

    #[test]
    fn canonical_label_prefers_frequency_then_length_then_order() {
        let pick = |labels: &[&str]| canonical_label(labels.iter().copied());
        assert_eq!(pick(&["B", "A", "B"]).as_deref(), Some("B"));
        assert_eq!(pick(&["Büro (Standard)", "Büro Standard"]).as_deref(), Some("Büro Standard"));
        assert_eq!(pick(&["Büro standard", "Büro Standard"]).as_deref(), Some("Büro Standard"));
        assert_eq!(pick(&[]), None);
    }

    #[test]
    fn area_buckets_are_logarithmic() {
        assert_eq!(area_bucket(0.5), 0);
        assert_eq!(area_bucket(12.0), area_bucket(15.9));
        assert_ne!(area_bucket(12.0), area_bucket(40.0));
    }
}
