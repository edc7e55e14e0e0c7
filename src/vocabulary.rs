use std::cmp::Reverse;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::model::PatternLabel;

const BUILTIN_NEEDLES: &[(&str, PatternLabel)] = &[
    ("hermes answers are just a filler", PatternLabel::AiQualityFailures),
    ("ai (atlas/hermes) provides wrong information", PatternLabel::AiQualityFailures),
    ("ai is promissing", PatternLabel::AiQualityFailures),
    ("customer is expressing frustation", PatternLabel::AiQualityFailures),
    ("support agents are not checking past similar tickets", PatternLabel::IgnoringContext),
    ("after customer provided all the information", PatternLabel::IgnoringContext),
    ("feedback on shared patch", PatternLabel::IgnoringContext),
    ("with multiple issue reported in single ticket", PatternLabel::IgnoringContext),
    ("support does not recognize recurring issue patterns", PatternLabel::IgnoringContext),
    ("customer get's locked in an \"ai wall\"", PatternLabel::AiWallLooping),
    ("ai is requesting same information", PatternLabel::AiWallLooping),
    ("tickets being closed  after 7 days", PatternLabel::PrematureClosure),
    ("chat conversations are closed prematuraly", PatternLabel::PrematureClosure),
    ("ai resolution is high because customer give up", PatternLabel::PrematureClosure),
    ("slow ai/agent resposnes with gaps", PatternLabel::ResponseDelays),
    ("ticket automation malfunctioning", PatternLabel::ResponseDelays),
    ("ai/atlas responds to sev1/p1 outages with generic", PatternLabel::P1Sev1Mishandling),
    ("support consistently begins with customer environment investigation", PatternLabel::P1Sev1Mishandling),
    ("sev1/p1 platform issues spend multiple days", PatternLabel::P1Sev1Mishandling),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Needle {
    pub phrase: String,
    pub label: PatternLabel,
}

#[derive(Debug, Clone)]
pub struct PatternVocabulary {
    needles: Vec<Needle>,
}

#[derive(Debug, Deserialize)]
struct PatternMappingFile {
    needles: Vec<PatternMappingEntry>,
}

#[derive(Debug, Deserialize)]
struct PatternMappingEntry {
    needle: String,
    label: String,
}

impl PatternVocabulary {
    pub fn builtin() -> Self {
        let needles = BUILTIN_NEEDLES
            .iter()
            .map(|(phrase, label)| Needle {
                phrase: (*phrase).to_string(),
                label: *label,
            })
            .collect();
        Self::from_sorted_input(needles)
    }

    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, PatternLabel)>,
    {
        let mut needles = Vec::new();
        for (phrase, label) in entries {
            let phrase = phrase.trim().to_lowercase();
            if phrase.is_empty() {
                bail!("pattern needle for {label} is empty");
            }
            needles.push(Needle { phrase, label });
        }
        if needles.is_empty() {
            bail!("pattern vocabulary has no needles");
        }
        Ok(Self::from_sorted_input(needles))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let mapping: PatternMappingFile = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse pattern mapping {}", path.display()))?;

        let mut entries = Vec::with_capacity(mapping.needles.len());
        for entry in mapping.needles {
            let Some(label) = PatternLabel::parse(&entry.label) else {
                bail!(
                    "pattern mapping {} uses unknown label {:?} for needle {:?}",
                    path.display(),
                    entry.label,
                    entry.needle
                );
            };
            entries.push((entry.needle, label));
        }

        Self::from_entries(entries)
            .with_context(|| format!("invalid pattern mapping {}", path.display()))
    }

    fn from_sorted_input(mut needles: Vec<Needle>) -> Self {
        // sort_by_key is stable, which makes declaration order the tie-break.
        needles.sort_by_key(|needle| Reverse(needle.phrase.chars().count()));
        Self { needles }
    }

    pub fn needle_count(&self) -> usize {
        self.needles.len()
    }

    pub fn map_text_to_label(&self, text: &str) -> Option<PatternLabel> {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        self.needles
            .iter()
            .find(|needle| normalized.contains(needle.phrase.as_str()))
            .map(|needle| needle.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary(entries: &[(&str, PatternLabel)]) -> PatternVocabulary {
        PatternVocabulary::from_entries(
            entries
                .iter()
                .map(|(phrase, label)| ((*phrase).to_string(), *label)),
        )
        .expect("vocabulary should build")
    }

    #[test]
    fn longer_needle_wins_over_shorter_match() {
        let vocab = vocabulary(&[
            ("ai", PatternLabel::AiQualityFailures),
            ("ai wall", PatternLabel::AiWallLooping),
        ]);

        assert_eq!(
            vocab.map_text_to_label("customer hits ai wall"),
            Some(PatternLabel::AiWallLooping)
        );
        assert_eq!(
            vocab.map_text_to_label("AI gave a filler answer"),
            Some(PatternLabel::AiQualityFailures)
        );
    }

    #[test]
    fn equal_length_needles_resolve_by_declaration_order() {
        let vocab = vocabulary(&[
            ("slow", PatternLabel::ResponseDelays),
            ("loop", PatternLabel::AiWallLooping),
        ]);
        assert_eq!(
            vocab.map_text_to_label("slow replies and a loop"),
            Some(PatternLabel::ResponseDelays)
        );

        let reversed = vocabulary(&[
            ("loop", PatternLabel::AiWallLooping),
            ("slow", PatternLabel::ResponseDelays),
        ]);
        assert_eq!(
            reversed.map_text_to_label("slow replies and a loop"),
            Some(PatternLabel::AiWallLooping)
        );
    }

    #[test]
    fn blank_or_unmatched_text_has_no_mapping() {
        let vocab = PatternVocabulary::builtin();
        assert_eq!(vocab.map_text_to_label(""), None);
        assert_eq!(vocab.map_text_to_label("   \t"), None);
        assert_eq!(vocab.map_text_to_label("billing portal typo"), None);
    }

    #[test]
    fn builtin_table_maps_curated_descriptions() {
        let vocab = PatternVocabulary::builtin();
        assert_eq!(vocab.needle_count(), 19);
        assert_eq!(
            vocab.map_text_to_label(
                "  Customer get's locked in an \"AI wall\" and cannot reach a human"
            ),
            Some(PatternLabel::AiWallLooping)
        );
        assert_eq!(
            vocab.map_text_to_label("SEV1/P1 platform issues spend multiple days in L1"),
            Some(PatternLabel::P1Sev1Mishandling)
        );
    }

    #[test]
    fn blank_needle_is_rejected() {
        let error = PatternVocabulary::from_entries(vec![(
            "  ".to_string(),
            PatternLabel::ResponseDelays,
        )])
        .expect_err("blank needle should be rejected");
        assert!(error.to_string().contains("empty"), "unexpected error: {error}");
    }

    #[test]
    fn load_rejects_labels_outside_vocabulary() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("mapping.json");
        fs::write(
            &path,
            r#"{"needles": [{"needle": "slow", "label": "SLOWNESS"}]}"#,
        )
        .expect("fixture should write");

        let error = PatternVocabulary::load(&path).expect_err("unknown label should fail");
        assert!(
            error.to_string().contains("SLOWNESS"),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn load_reads_needles_in_declaration_order() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("mapping.json");
        fs::write(
            &path,
            r#"{"needles": [
                {"needle": "Delay", "label": "RESPONSE_DELAYS"},
                {"needle": "wall!", "label": "AI_WALL_LOOPING"}
            ]}"#,
        )
        .expect("fixture should write");

        let vocab = PatternVocabulary::load(&path).expect("mapping should load");
        assert_eq!(vocab.needle_count(), 2);
        assert_eq!(
            vocab.map_text_to_label("delay then wall!"),
            Some(PatternLabel::ResponseDelays)
        );
    }
}
