use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::model::{LabelSet, PatternLabel, TicketId};

const RESULT_FILE_PREFIX: &str = "ticket_";
const RESULT_FILE_SUFFIX: &str = ".json";
const MODEL_KEY: &str = "_model";

pub fn result_file_path(results_dir: &Path, ticket_id: TicketId) -> PathBuf {
    results_dir.join(format!("{RESULT_FILE_PREFIX}{ticket_id}{RESULT_FILE_SUFFIX}"))
}

pub fn ticket_id_from_file_name(file_name: &str) -> Option<TicketId> {
    file_name
        .strip_prefix(RESULT_FILE_PREFIX)?
        .strip_suffix(RESULT_FILE_SUFFIX)?
        .parse()
        .ok()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionBlock {
    pub detected: bool,
    pub reasoning: Option<String>,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionDocument {
    pub model: Option<String>,
    pub blocks: BTreeMap<PatternLabel, PredictionBlock>,
}

impl PredictionDocument {
    /// Only a top-level object naming at least one vocabulary key is trusted.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let Some(object) = value.as_object() else {
            return Err(format!("top-level value is {}, not an object", json_kind(value)));
        };

        if !PatternLabel::ALL
            .iter()
            .any(|label| object.contains_key(label.as_str()))
        {
            return Err("no pattern label keys present".to_string());
        }

        let mut blocks = BTreeMap::new();
        for label in PatternLabel::ALL {
            let Some(Value::Object(block)) = object.get(label.as_str()) else {
                continue;
            };

            let detected = matches!(block.get("detected"), Some(Value::Bool(true)));
            let reasoning = block
                .get("reasoning")
                .and_then(Value::as_str)
                .map(flatten_text)
                .filter(|text| !text.is_empty());
            let evidence = block
                .get("evidence")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| match item {
                            Value::String(text) => flatten_text(text),
                            other => flatten_text(&other.to_string()),
                        })
                        .filter(|text| !text.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            blocks.insert(
                label,
                PredictionBlock {
                    detected,
                    reasoning,
                    evidence,
                },
            );
        }

        Ok(Self {
            model: object
                .get(MODEL_KEY)
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            blocks,
        })
    }

    pub fn detected_labels(&self) -> LabelSet {
        self.blocks
            .iter()
            .filter(|(_, block)| block.detected)
            .map(|(label, _)| *label)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Loaded(PredictionDocument),
    Missing,
    Malformed(String),
}

impl PredictionOutcome {
    pub fn detected_labels(&self) -> LabelSet {
        match self {
            Self::Loaded(document) => document.detected_labels(),
            Self::Missing | Self::Malformed(_) => LabelSet::new(),
        }
    }
}

pub fn load_prediction(path: &Path) -> PredictionOutcome {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return PredictionOutcome::Missing,
        Err(err) => return PredictionOutcome::Malformed(format!("unreadable: {err}")),
    };

    let value: Value = match serde_json::from_slice(&raw) {
        Ok(value) => value,
        Err(err) => return PredictionOutcome::Malformed(format!("invalid json: {err}")),
    };

    match PredictionDocument::from_value(&value) {
        Ok(document) => PredictionOutcome::Loaded(document),
        Err(reason) => PredictionOutcome::Malformed(reason),
    }
}

fn flatten_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn only_literal_true_counts_as_detected() {
        let value = json!({
            "AI_QUALITY_FAILURES": {"detected": true, "reasoning": "filler"},
            "AI_WALL_LOOPING": {"detected": "true"},
            "IGNORING_CONTEXT": {"detected": false},
            "RESPONSE_DELAYS": {"reasoning": "no flag"},
            "PREMATURE_CLOSURE": true,
            "P1_SEV1_MISHANDLING": {"detected": 1}
        });

        let document = PredictionDocument::from_value(&value).expect("document should parse");
        let labels = document.detected_labels();
        assert_eq!(
            labels.into_iter().collect::<Vec<_>>(),
            vec![PatternLabel::AiQualityFailures]
        );
    }

    #[test]
    fn documents_without_any_label_key_are_malformed() {
        let error = PredictionDocument::from_value(&json!({"_model": "judge", "error": "timeout"}))
            .expect_err("document without labels should be rejected");
        assert!(error.contains("no pattern label"), "unexpected reason: {error}");

        let error = PredictionDocument::from_value(&json!(["AI_WALL_LOOPING"]))
            .expect_err("array should be rejected");
        assert!(error.contains("an array"), "unexpected reason: {error}");
    }

    #[test]
    fn reasoning_and_evidence_are_flattened() {
        let value = json!({
            "_model": "judge-v6",
            "RESPONSE_DELAYS": {
                "detected": true,
                "reasoning": "Waited\n three days",
                "evidence": ["gap of 72h\n", "", 42]
            }
        });

        let document = PredictionDocument::from_value(&value).expect("document should parse");
        assert_eq!(document.model.as_deref(), Some("judge-v6"));
        let block = document
            .blocks
            .get(&PatternLabel::ResponseDelays)
            .expect("block should be kept");
        assert_eq!(block.reasoning.as_deref(), Some("Waited three days"));
        assert_eq!(block.evidence, vec!["gap of 72h".to_string(), "42".to_string()]);
    }

    #[test]
    fn load_distinguishes_missing_from_malformed() {
        let dir = tempfile::tempdir().expect("tempdir should be created");

        let missing = load_prediction(&result_file_path(dir.path(), 1001));
        assert_eq!(missing, PredictionOutcome::Missing);
        assert!(missing.detected_labels().is_empty());

        let garbage_path = result_file_path(dir.path(), 1002);
        fs::write(&garbage_path, "{not json").expect("fixture should write");
        let garbage = load_prediction(&garbage_path);
        assert!(
            matches!(&garbage, PredictionOutcome::Malformed(reason) if reason.starts_with("invalid json")),
            "unexpected outcome: {garbage:?}"
        );
        assert!(garbage.detected_labels().is_empty());

        let valid_path = result_file_path(dir.path(), 1003);
        fs::write(
            &valid_path,
            json!({"PREMATURE_CLOSURE": {"detected": true}}).to_string(),
        )
        .expect("fixture should write");
        let valid = load_prediction(&valid_path);
        assert!(valid.detected_labels().contains(&PatternLabel::PrematureClosure));
    }

    #[test]
    fn result_file_names_round_trip_ticket_ids() {
        let path = result_file_path(Path::new("results"), 1234567);
        assert_eq!(path, PathBuf::from("results/ticket_1234567.json"));
        assert_eq!(ticket_id_from_file_name("ticket_1234567.json"), Some(1234567));
        assert_eq!(ticket_id_from_file_name("ticket_abc.json"), None);
        assert_eq!(ticket_id_from_file_name("summary.json"), None);
    }
}
