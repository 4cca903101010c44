use strsim::jaro_winkler;
use tracing::debug;

use crate::models::UNASSIGNED_DISTRICT;

/// Similarity floor a fuzzy candidate must clear to count as a match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;

// ── resolve_entity ────────────────────────────────────────────────────────────

/// Outcome of resolving a raw name against a candidate list.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// A candidate was selected, with the similarity score that selected it.
    Matched { name: String, score: f64 },
    /// No candidate cleared the threshold.
    Unmatched,
}

/// Resolve a raw entity name against a list of canonical candidates.
///
/// The policy, in order:
/// 1. normalized equality;
/// 2. a candidate appearing as a whole-word sequence inside the name
///    (`"Lakeview Sch. Dist."` contains `"Lakeview"`); the longest such
///    candidate wins;
/// 3. best Jaro-Winkler similarity over normalized forms, accepted when it
///    reaches `threshold`.
///
/// Pure function: both normalizers resolve district identity through this one
/// policy so the two sources agree.
pub fn resolve_entity(name: &str, candidates: &[String], threshold: f64) -> MatchResult {
    let needle = normalize_name(name);
    if needle.is_empty() {
        return MatchResult::Unmatched;
    }

    for candidate in candidates {
        if normalize_name(candidate) == needle {
            return MatchResult::Matched {
                name: candidate.clone(),
                score: 1.0,
            };
        }
    }

    let mut contained: Option<&String> = None;
    for candidate in candidates {
        let norm = normalize_name(candidate);
        if !norm.is_empty() && contains_word_seq(&needle, &norm) {
            let longer = match contained {
                Some(current) => norm.len() > normalize_name(current).len(),
                None => true,
            };
            if longer {
                contained = Some(candidate);
            }
        }
    }
    if let Some(candidate) = contained {
        return MatchResult::Matched {
            name: candidate.clone(),
            score: 1.0,
        };
    }

    let mut best: Option<(&String, f64)> = None;
    for candidate in candidates {
        let score = jaro_winkler(&needle, &normalize_name(candidate));
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((candidate, score));
        }
    }
    match best {
        Some((candidate, score)) if score >= threshold => MatchResult::Matched {
            name: candidate.clone(),
            score,
        },
        _ => MatchResult::Unmatched,
    }
}

/// Lowercase and reduce to alphanumeric words: every other character becomes
/// a space, runs of spaces collapse. `"Lakeview Sch. Dist."` becomes
/// `"lakeview sch dist"`, `"Bridgewater-Raynham"` becomes
/// `"bridgewater raynham"`.
pub fn normalize_name(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `needle`'s words appear consecutively among `haystack`'s words.
/// Both arguments must already be normalized.
fn contains_word_seq(haystack: &str, needle: &str) -> bool {
    let hay: Vec<&str> = haystack.split_whitespace().collect();
    let nee: Vec<&str> = needle.split_whitespace().collect();
    if nee.is_empty() || nee.len() > hay.len() {
        return false;
    }
    hay.windows(nee.len()).any(|w| w == nee.as_slice())
}

// ── DistrictCatalog ───────────────────────────────────────────────────────────

/// The district roster the practice serves.
const DEFAULT_DISTRICTS: &[&str] = &[
    "Acton-Boxborough",
    "Ashland",
    "Blue Hills",
    "Bridgewater-Raynham",
    "Chelsea",
    "Easthampton",
    "Greenfield",
    "Holbrook",
    "KIPP",
    "Lawrence",
    "Lilypad",
    "Lynnfield",
    "Mansfield",
    "Milton",
    "New Heights",
    "Randolph",
    "Salem",
    "Tewksbury",
    "Waltham",
    "Wareham",
    "West Springfield",
];

/// Known spellings, abbreviations, and school names that map to a canonical
/// district. An alias matches by normalized equality or by appearing as a
/// whole-word sequence in the raw text.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("LHS", "Lawrence"),
    ("Lawrence High", "Lawrence"),
    ("Lawrence High School", "Lawrence"),
    ("Waltham High", "Waltham"),
    ("Waltham Elementary", "Waltham"),
    ("WSHS", "West Springfield"),
    ("W. Springfield", "West Springfield"),
    ("West Springfield High School", "West Springfield"),
    ("West Springfield HS", "West Springfield"),
    ("Springfield", "West Springfield"),
    ("Bridgewater", "Bridgewater-Raynham"),
    ("BMS", "Bridgewater-Raynham"),
    ("Raynham", "Bridgewater-Raynham"),
    ("Raynahm", "Bridgewater-Raynham"),
    ("BRHS", "Bridgewater-Raynham"),
    ("BRRHS", "Bridgewater-Raynham"),
    ("Bridgewater Middle", "Bridgewater-Raynham"),
    ("Randolph Middle", "Randolph"),
    ("Randolph Middle School", "Randolph"),
    ("Randolph High", "Randolph"),
    ("Donovan", "Randolph"),
    ("Donnovan", "Randolph"),
    ("Donovan Elementary", "Randolph"),
    ("Donovan School", "Randolph"),
    ("Wareham Elementary", "Wareham"),
    ("WES", "Wareham"),
    ("AMS", "Ashland"),
    ("AHS", "Ashland"),
    ("Ashland Middle", "Ashland"),
    ("Central Elementary", "Tewksbury"),
    ("Central Elementary School", "Tewksbury"),
    ("Center Elementary", "Tewksbury"),
    ("Center School", "Tewksbury"),
    ("TWyMS", "Tewksbury"),
    ("Milton HS", "Milton"),
    ("Milton High School", "Milton"),
    ("Blue Hils", "Blue Hills"),
    ("BlueHills", "Blue Hills"),
    ("Admin", "Lilypad"),
    ("LL", "Lilypad"),
    ("Lilypad Greenfield", "Greenfield"),
    ("Lilypad Holbrook", "Holbrook"),
    ("Salem Saltonstall", "Salem"),
    ("Saltonstall Elementary", "Salem"),
    ("Bentley School", "Salem"),
    ("Bentley Elementary", "Salem"),
    ("HMHS", "Holbrook"),
    ("GMS", "Greenfield"),
    ("Green Field", "Greenfield"),
];

/// Canonical district roster with its alias table and fuzzy threshold.
///
/// Resolution ladder: exact canonical, then alias table (longest alias
/// first), then [`resolve_entity`] over the roster. Anything that survives
/// all three unresolved is tagged [`UNASSIGNED_DISTRICT`] rather than
/// dropped.
#[derive(Debug, Clone)]
pub struct DistrictCatalog {
    canonical: Vec<String>,
    aliases: Vec<(String, String)>,
    threshold: f64,
}

impl DistrictCatalog {
    pub fn new(canonical: Vec<String>, aliases: Vec<(String, String)>, threshold: f64) -> Self {
        Self {
            canonical,
            aliases,
            threshold,
        }
    }

    /// Catalog built from the compiled-in roster and alias table.
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_DISTRICTS.iter().map(|d| d.to_string()).collect(),
            DEFAULT_ALIASES
                .iter()
                .map(|(a, d)| (a.to_string(), d.to_string()))
                .collect(),
            DEFAULT_MATCH_THRESHOLD,
        )
    }

    /// Add alias pairs ahead of the existing table.
    pub fn with_aliases(mut self, extra: Vec<(String, String)>) -> Self {
        let mut aliases = extra;
        aliases.append(&mut self.aliases);
        self.aliases = aliases;
        self
    }

    /// Replace the fuzzy-match threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// The canonical district names, in roster order.
    pub fn canonical_names(&self) -> &[String] {
        &self.canonical
    }

    /// Resolve raw district or customer text to a canonical name, or
    /// [`UNASSIGNED_DISTRICT`] when nothing clears the threshold.
    pub fn resolve(&self, raw: &str) -> String {
        match self.resolve_match(raw) {
            MatchResult::Matched { name, .. } => name,
            MatchResult::Unmatched => {
                debug!("no district match for \"{}\"", raw);
                UNASSIGNED_DISTRICT.to_string()
            }
        }
    }

    /// Like [`DistrictCatalog::resolve`] but exposing the match outcome.
    pub fn resolve_match(&self, raw: &str) -> MatchResult {
        let needle = normalize_name(raw);
        if needle.is_empty() {
            return MatchResult::Unmatched;
        }

        for candidate in &self.canonical {
            if normalize_name(candidate) == needle {
                return MatchResult::Matched {
                    name: candidate.clone(),
                    score: 1.0,
                };
            }
        }

        // Longest alias wins so "Central Elementary School" beats "Central
        // Elementary" when both are present in the text.
        let mut best_alias: Option<(&str, usize)> = None;
        for (alias, district) in &self.aliases {
            let alias_norm = normalize_name(alias);
            if alias_norm == needle || contains_word_seq(&needle, &alias_norm) {
                let len = alias_norm.len();
                if best_alias.map(|(_, l)| len > l).unwrap_or(true) {
                    best_alias = Some((district.as_str(), len));
                }
            }
        }
        if let Some((district, _)) = best_alias {
            return MatchResult::Matched {
                name: district.to_string(),
                score: 1.0,
            };
        }

        resolve_entity(raw, &self.canonical, self.threshold)
    }
}

impl Default for DistrictCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}
