// src/classify/ner.rs
//! Location entity extraction behind an injectable capability.
//!
//! The classifier only needs "how many location-like entities does this text
//! mention"; everything else is an implementation detail. The default
//! implementation is a case-sensitive gazetteer compiled from
//! `location_gazetteer.json` at the repo root (word-boundary regexes, each
//! occurrence counts). Tests inject fixed fakes through [`EntityExtractor`]
//! so the scoring arithmetic stays independent of any concrete extractor.
//!
//! Extraction is infallible at the trait boundary: a bad pattern or an
//! internal failure degrades to "no entities", never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Entity classes that count toward the location score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityTag {
    /// Geo-political entity: countries, cities, states.
    Gpe,
    /// Non-political location: oceans, mountain ranges, regions.
    Loc,
}

#[derive(Debug, Clone)]
pub struct TaggedEntity {
    pub text: String,
    pub tag: EntityTag,
}

/// Capability seam: anything that can turn raw text into tagged entities.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<TaggedEntity>;
}

#[derive(Debug, Deserialize)]
struct GazetteerFile {
    #[serde(default)]
    gpe: Vec<String>,
    #[serde(default)]
    loc: Vec<String>,
}

/// Case-sensitive place-name matcher over a fixed gazetteer.
///
/// Runs on the raw, un-normalized text: casing is the main signal that
/// distinguishes "Turkey" the country from "turkey" the bird.
pub struct GazetteerExtractor {
    patterns: Vec<(Regex, EntityTag)>,
}

static BUNDLED: Lazy<GazetteerExtractor> = Lazy::new(|| {
    GazetteerExtractor::from_json(include_str!("../../location_gazetteer.json"))
});

impl GazetteerExtractor {
    /// Extractor over the gazetteer bundled into the binary.
    pub fn bundled() -> &'static Self {
        &BUNDLED
    }

    /// Parse a `{ "gpe": [...], "loc": [...] }` gazetteer. Unparseable input
    /// or individual bad names degrade to an empty/smaller pattern set.
    pub fn from_json(raw: &str) -> Self {
        let file: GazetteerFile = match serde_json::from_str(raw) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = ?e, "gazetteer parse failed; extractor is empty");
                GazetteerFile {
                    gpe: Vec::new(),
                    loc: Vec::new(),
                }
            }
        };

        let mut patterns = Vec::with_capacity(file.gpe.len() + file.loc.len());
        for (names, tag) in [(file.gpe, EntityTag::Gpe), (file.loc, EntityTag::Loc)] {
            for name in names {
                let pat = format!(r"\b{}\b", regex::escape(&name));
                if let Ok(re) = Regex::new(&pat) {
                    patterns.push((re, tag));
                }
            }
        }
        Self { patterns }
    }
}

impl EntityExtractor for GazetteerExtractor {
    fn extract(&self, text: &str) -> Vec<TaggedEntity> {
        let mut out = Vec::new();
        for (re, tag) in &self.patterns {
            for m in re.find_iter(text) {
                out.push(TaggedEntity {
                    text: m.as_str().to_string(),
                    tag: *tag,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_finds_cased_places() {
        let ents = GazetteerExtractor::bundled().extract("Evacuations underway in Tokyo and Manila");
        let names: Vec<_> = ents.iter().map(|e| e.text.as_str()).collect();
        assert!(names.contains(&"Tokyo"));
        assert!(names.contains(&"Manila"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let ents = GazetteerExtractor::bundled().extract("we had turkey for dinner in paris");
        assert!(ents.is_empty());
    }

    #[test]
    fn occurrences_count_not_distinct_names() {
        let ents = GazetteerExtractor::bundled().extract("Haiti again: Haiti needs aid");
        assert_eq!(ents.len(), 2);
    }

    #[test]
    fn malformed_gazetteer_degrades_to_empty() {
        let ex = GazetteerExtractor::from_json("not json at all");
        assert!(ex.extract("Tokyo").is_empty());
    }

    #[test]
    fn loc_entries_are_tagged_loc() {
        let ents = GazetteerExtractor::bundled().extract("storm surge across the Gulf Coast");
        assert!(ents.iter().any(|e| e.tag == EntityTag::Loc));
    }
}
