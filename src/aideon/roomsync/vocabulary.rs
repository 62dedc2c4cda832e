//! Column-name vocabulary and the text folding shared by header matching and
//! room-type consolidation.

use std::collections::BTreeSet;

use crate::aideon::roomsync::model::{Field, Source};

/// Known header spellings per field, German and English. Entries are folded
/// with [`fold_text`] when the vocabulary is built, so they may be written
/// with umlauts and punctuation.
const SYNONYMS: &[(Field, &[&str])] = &[
    (
        Field::RoomId,
        &[
            "Raum-Nr.",
            "Raumnummer",
            "Raumnr",
            "Raum-ID",
            "Room number",
            "Room ID",
            "Room no",
        ],
    ),
    (
        Field::Floor,
        &["Geschoss", "Etage", "Stockwerk", "Ebene", "Floor", "Level", "Storey"],
    ),
    (
        Field::RoomType,
        &[
            "Raumtyp",
            "Raumart",
            "Nutzung",
            "Raumnutzung",
            "Nutzungsart",
            "Room type",
            "Usage",
        ],
    ),
    (
        Field::RoomName,
        &[
            "Raum-Bezeichnung",
            "Raumbezeichnung",
            "Bezeichnung",
            "Raumname",
            "Room name",
            "Name",
            "Description",
        ],
    ),
    (
        Field::Area,
        &[
            "Fläche",
            "Nutzfläche",
            "Grundfläche",
            "Raumfläche",
            "NGF",
            "Area",
            "Floor area",
        ],
    ),
    (
        Field::Volume,
        &["Volumen", "Raumvolumen", "Rauminhalt", "Volume"],
    ),
    (
        Field::Height,
        &["Höhe", "Raumhöhe", "Lichte Höhe", "Height", "Room height"],
    ),
    (
        Field::HeatingLoad,
        &[
            "Heizlast",
            "Norm-Heizlast",
            "Heizleistung",
            "Wärmebedarf",
            "Leistung Heizung",
            "Heating load",
            "Heating power",
        ],
    ),
    (
        Field::CoolingLoad,
        &["Kühllast", "Kühlleistung", "Cooling load", "Cooling power"],
    ),
    (
        Field::DesignTemperature,
        &[
            "Temperatur",
            "Raumtemperatur",
            "Innentemperatur",
            "Norm-Innentemperatur",
            "Temperature",
        ],
    ),
    (
        Field::SupplyAir,
        &[
            "Zuluft",
            "Zuluftvolumenstrom",
            "Zuluftmenge",
            "Supply air",
        ],
    ),
    (
        Field::ExhaustAir,
        &[
            "Abluft",
            "Abluftvolumenstrom",
            "Abluftmenge",
            "Exhaust air",
            "Extract air",
        ],
    ),
    (
        Field::AirChangeRate,
        &[
            "Luftwechsel",
            "Luftwechselrate",
            "Air change rate",
            "Air changes",
            "ACH",
        ],
    ),
];

/// Lowercases, folds German umlauts and common Latin accents, turns every
/// non-alphanumeric character into a space and collapses whitespace.
pub fn fold_text(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        match ch {
            'ä' => folded.push_str("ae"),
            'ö' => folded.push_str("oe"),
            'ü' => folded.push_str("ue"),
            'ß' => folded.push_str("ss"),
            'à' | 'á' | 'â' | 'ã' | 'å' => folded.push('a'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ø' => folded.push('o'),
            'ù' | 'ú' | 'û' => folded.push('u'),
            'ç' => folded.push('c'),
            'ñ' => folded.push('n'),
            '²' => folded.push('2'),
            '³' => folded.push('3'),
            other if other.is_alphanumeric() => folded.push(other),
            _ => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folded tokens of a header, with the usual "number" abbreviations unified.
pub fn header_tokens(text: &str) -> Vec<String> {
    fold_text(text)
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| match token {
            "no" | "nr" | "num" | "nummer" | "number" => "nr".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Splits a trailing `(heating)` or `(ventilation)` marker off a header, as
/// written by the merged workbook. Matching is ASCII case-insensitive.
pub fn split_side_suffix(header: &str) -> (&str, Option<Source>) {
    let trimmed = header.trim_end();
    for side in [Source::Heating, Source::Ventilation] {
        let suffix = format!("({side})");
        let Some(start) = trimmed.len().checked_sub(suffix.len()) else {
            continue;
        };
        if trimmed.is_char_boundary(start) && trimmed[start..].eq_ignore_ascii_case(&suffix) {
            return (trimmed[..start].trim_end(), Some(side));
        }
    }
    (trimmed, None)
}

/// Result of matching one header cell against the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderMatch {
    pub field: Field,
    /// Share of the header's tokens covered by the matching synonym; exact
    /// matches score above every subset match.
    pub specificity: f64,
}

#[derive(Debug, Clone)]
struct Synonym {
    label: &'static str,
    tokens: Vec<String>,
}

/// Column-name vocabulary used to recognise header rows.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<(Field, Vec<Synonym>)>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

impl Vocabulary {
    /// The built-in German/English HVAC vocabulary.
    pub fn standard() -> Self {
        let entries = SYNONYMS
            .iter()
            .map(|(field, labels)| {
                let synonyms = labels
                    .iter()
                    .map(|label| Synonym {
                        label,
                        tokens: header_tokens(label),
                    })
                    .collect();
                (*field, synonyms)
            })
            .collect();
        Self { entries }
    }

    /// Human-readable spellings known for `field`, as handed to assisted
    /// detection strategies.
    pub fn labels(&self, field: Field) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(candidate, _)| *candidate == field)
            .flat_map(|(_, synonyms)| synonyms.iter().map(|synonym| synonym.label))
            .collect()
    }

    /// Resolves a header cell to the field it most specifically names.
    ///
    /// A side marker (`(heating)`, `(ventilation)`) is ignored. Among equally
    /// specific synonyms, one found as a contiguous phrase beats one whose
    /// tokens are scattered, and between phrases the later one wins, so
    /// "Bezeichnung Raumtyp" names the room type.
    pub fn match_header(&self, header: &str) -> Option<HeaderMatch> {
        let (header, _) = split_side_suffix(header);
        let tokens = header_tokens(header);
        if tokens.is_empty() {
            return None;
        }
        let token_set: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();

        let mut best: Option<(HeaderMatch, Option<usize>)> = None;
        for (field, synonyms) in &self.entries {
            for synonym in synonyms.iter().filter(|synonym| !synonym.tokens.is_empty()) {
                let specificity = if synonym.tokens == tokens {
                    2.0
                } else if synonym
                    .tokens
                    .iter()
                    .all(|token| token_set.contains(token.as_str()))
                {
                    synonym.tokens.len() as f64 / tokens.len() as f64
                } else {
                    continue;
                };
                let phrase = tokens
                    .windows(synonym.tokens.len())
                    .rposition(|window| window == synonym.tokens.as_slice());

                let better = match best {
                    None => true,
                    Some((current, current_phrase)) => {
                        specificity > current.specificity
                            || (specificity == current.specificity && phrase > current_phrase)
                    }
                };
                if better {
                    let found = HeaderMatch {
                        field: *field,
                        specificity,
                    };
                    best = Some((found, phrase));
                }
            }
        }
        best.map(|(found, _)| found)
    }
}
