use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

pub const DEFAULT_TICKET_ID_PATTERN: &str = r"\b\d{6,9}\b";

pub type TicketId = u64;
pub type LabelSet = BTreeSet<PatternLabel>;
pub type ExpectedLabels = BTreeMap<TicketId, LabelSet>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PatternLabel {
    #[serde(rename = "AI_QUALITY_FAILURES")]
    AiQualityFailures,
    #[serde(rename = "AI_WALL_LOOPING")]
    AiWallLooping,
    #[serde(rename = "IGNORING_CONTEXT")]
    IgnoringContext,
    #[serde(rename = "RESPONSE_DELAYS")]
    ResponseDelays,
    #[serde(rename = "PREMATURE_CLOSURE")]
    PrematureClosure,
    #[serde(rename = "P1_SEV1_MISHANDLING")]
    P1Sev1Mishandling,
}

impl PatternLabel {
    pub const ALL: [PatternLabel; 6] = [
        PatternLabel::AiQualityFailures,
        PatternLabel::AiWallLooping,
        PatternLabel::IgnoringContext,
        PatternLabel::ResponseDelays,
        PatternLabel::PrematureClosure,
        PatternLabel::P1Sev1Mishandling,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AiQualityFailures => "AI_QUALITY_FAILURES",
            Self::AiWallLooping => "AI_WALL_LOOPING",
            Self::IgnoringContext => "IGNORING_CONTEXT",
            Self::ResponseDelays => "RESPONSE_DELAYS",
            Self::PrematureClosure => "PREMATURE_CLOSURE",
            Self::P1Sev1Mishandling => "P1_SEV1_MISHANDLING",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL.into_iter().find(|label| label.as_str() == trimmed)
    }
}

impl fmt::Display for PatternLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn label_names(labels: &LabelSet) -> Vec<&'static str> {
    labels.iter().map(|label| label.as_str()).collect()
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceFingerprint {
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroundTruthNotes {
    pub source_patterns_csv: SourceFingerprint,
    pub source_universe_csv: SourceFingerprint,
    pub source_overrides_json: Option<SourceFingerprint>,
    pub ticket_id_pattern: String,
    pub excluded_seed_tickets_count: usize,
    pub overrides_count: usize,
    pub tickets_after_filtering: usize,
    pub unmapped_pattern_rows: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub our_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroundTruthManifest {
    pub manifest_version: u32,
    pub notes: GroundTruthNotes,
    pub expected_by_ticket: BTreeMap<String, Vec<String>>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_vocabulary_members() {
        assert_eq!(
            PatternLabel::parse("RESPONSE_DELAYS"),
            Some(PatternLabel::ResponseDelays)
        );
        assert_eq!(
            PatternLabel::parse(" P1_SEV1_MISHANDLING "),
            Some(PatternLabel::P1Sev1Mishandling)
        );
        assert_eq!(PatternLabel::parse("response_delays"), None);
        assert_eq!(PatternLabel::parse("NOT_A_REAL_LABEL"), None);
    }

    #[test]
    fn serde_names_match_display_names() {
        for label in PatternLabel::ALL {
            let encoded = serde_json::to_string(&label).expect("label should serialize");
            assert_eq!(encoded, format!("\"{}\"", label.as_str()));
        }
    }
}
