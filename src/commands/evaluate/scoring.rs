use super::*;

pub type PredictionMap = BTreeMap<TicketId, PredictionOutcome>;

pub fn safe_div(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn f1_score(precision: f64, recall: f64) -> f64 {
    let denominator = precision + recall;
    if denominator == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / denominator
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedResult {
    pub ticket_id: TicketId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelRecall {
    pub recall: f64,
    pub hit: usize,
    pub expected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecallOnlyResult {
    pub ticket_coverage: f64,
    pub tickets_full_covered: usize,
    pub tickets_with_expected: usize,
    pub overall_recall: f64,
    pub total_hit: usize,
    pub total_expected: usize,
    pub per_label: BTreeMap<PatternLabel, LabelRecall>,
    pub missed_by_label: BTreeMap<PatternLabel, Vec<TicketId>>,
    pub missing_result_files: Vec<TicketId>,
    pub malformed_result_files: Vec<MalformedResult>,
}

impl RecallOnlyResult {
    pub fn misses(&self) -> Vec<(PatternLabel, TicketId)> {
        self.missed_by_label
            .iter()
            .flat_map(|(label, tickets)| tickets.iter().map(move |ticket_id| (*label, *ticket_id)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl CountMetrics {
    fn from_counts(true_positives: usize, false_positives: usize, false_negatives: usize) -> Self {
        let precision = safe_div(true_positives, true_positives + false_positives);
        let recall = safe_div(true_positives, true_positives + false_negatives);
        Self {
            precision,
            recall,
            f1: f1_score(precision, recall),
            true_positives,
            false_positives,
            false_negatives,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LabelCounts {
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
    support: usize,
}

impl LabelCounts {
    fn record(&mut self, expected: bool, predicted: bool) {
        if expected {
            self.support += 1;
        }
        match (expected, predicted) {
            (true, true) => self.true_positives += 1,
            (false, true) => self.false_positives += 1,
            (true, false) => self.false_negatives += 1,
            (false, false) => {}
        }
    }

    fn metrics(&self) -> CountMetrics {
        CountMetrics::from_counts(self.true_positives, self.false_positives, self.false_negatives)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelMetrics {
    #[serde(flatten)]
    pub metrics: CountMetrics,
    pub support: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FullResult {
    pub micro: CountMetrics,
    pub macro_f1: f64,
    /// Labels with non-zero support; the macro average's denominator.
    pub macro_label_count: usize,
    pub per_label: BTreeMap<PatternLabel, LabelMetrics>,
    pub missing_result_files: Vec<TicketId>,
    pub malformed_result_files: Vec<MalformedResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_only: Option<RecallOnlyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<FullResult>,
}

pub fn load_predictions(expected: &ExpectedLabels, results_dir: &Path) -> PredictionMap {
    let mut predictions = PredictionMap::new();
    for ticket_id in expected.keys() {
        let outcome = load_prediction(&result_file_path(results_dir, *ticket_id));
        if let PredictionOutcome::Malformed(reason) = &outcome {
            warn!(ticket_id, reason = %reason, "prediction file is malformed; scored as no prediction");
        }
        predictions.insert(*ticket_id, outcome);
    }
    predictions
}

pub fn evaluate(expected: &ExpectedLabels, results_dir: &Path, mode: EvalMode) -> Result<EvaluationResult> {
    if !results_dir.is_dir() {
        bail!("results directory not found: {}", results_dir.display());
    }

    let predictions = load_predictions(expected, results_dir);
    Ok(EvaluationResult {
        mode: mode.as_str().to_string(),
        recall_only: mode
            .includes_recall()
            .then(|| evaluate_recall_only(expected, &predictions)),
        full: mode
            .includes_full()
            .then(|| evaluate_full(expected, &predictions)),
    })
}

static NO_PREDICTION: PredictionOutcome = PredictionOutcome::Missing;

fn outcome_for(predictions: &PredictionMap, ticket_id: TicketId) -> &PredictionOutcome {
    predictions.get(&ticket_id).unwrap_or(&NO_PREDICTION)
}

fn note_untrusted(
    ticket_id: TicketId,
    outcome: &PredictionOutcome,
    missing: &mut Vec<TicketId>,
    malformed: &mut Vec<MalformedResult>,
) {
    match outcome {
        PredictionOutcome::Missing => missing.push(ticket_id),
        PredictionOutcome::Malformed(reason) => malformed.push(MalformedResult {
            ticket_id,
            reason: reason.clone(),
        }),
        PredictionOutcome::Loaded(_) => {}
    }
}

pub fn evaluate_recall_only(expected: &ExpectedLabels, predictions: &PredictionMap) -> RecallOnlyResult {
    let mut result = RecallOnlyResult::default();
    let mut hits = BTreeMap::<PatternLabel, usize>::new();
    let mut totals = BTreeMap::<PatternLabel, usize>::new();

    for (ticket_id, expected_labels) in expected {
        if expected_labels.is_empty() {
            continue;
        }
        result.tickets_with_expected += 1;

        let outcome = outcome_for(predictions, *ticket_id);
        note_untrusted(
            *ticket_id,
            outcome,
            &mut result.missing_result_files,
            &mut result.malformed_result_files,
        );
        let predicted = outcome.detected_labels();

        for label in expected_labels {
            *totals.entry(*label).or_default() += 1;
            if predicted.contains(label) {
                *hits.entry(*label).or_default() += 1;
            } else {
                result
                    .missed_by_label
                    .entry(*label)
                    .or_default()
                    .push(*ticket_id);
            }
        }

        if expected_labels.is_subset(&predicted) {
            result.tickets_full_covered += 1;
        }
    }

    for label in PatternLabel::ALL {
        let hit = hits.get(&label).copied().unwrap_or_default();
        let expected_count = totals.get(&label).copied().unwrap_or_default();
        result.total_hit += hit;
        result.total_expected += expected_count;
        result.per_label.insert(
            label,
            LabelRecall {
                recall: safe_div(hit, expected_count),
                hit,
                expected: expected_count,
            },
        );
    }

    result.overall_recall = safe_div(result.total_hit, result.total_expected);
    result.ticket_coverage = safe_div(result.tickets_full_covered, result.tickets_with_expected);
    result
}

pub fn evaluate_full(expected: &ExpectedLabels, predictions: &PredictionMap) -> FullResult {
    let mut result = FullResult::default();
    let mut counts = PatternLabel::ALL
        .into_iter()
        .map(|label| (label, LabelCounts::default()))
        .collect::<BTreeMap<_, _>>();

    for (ticket_id, expected_labels) in expected {
        let outcome = outcome_for(predictions, *ticket_id);
        note_untrusted(
            *ticket_id,
            outcome,
            &mut result.missing_result_files,
            &mut result.malformed_result_files,
        );
        let predicted = outcome.detected_labels();

        for label in PatternLabel::ALL {
            counts.entry(label).or_default().record(
                expected_labels.contains(&label),
                predicted.contains(&label),
            );
        }
    }

    let mut total = LabelCounts::default();
    let mut macro_sum = 0.0;
    for (label, label_counts) in counts {
        total.true_positives += label_counts.true_positives;
        total.false_positives += label_counts.false_positives;
        total.false_negatives += label_counts.false_negatives;

        let metrics = label_counts.metrics();
        if label_counts.support > 0 {
            macro_sum += metrics.f1;
            result.macro_label_count += 1;
        }
        result.per_label.insert(
            label,
            LabelMetrics {
                metrics,
                support: label_counts.support,
            },
        );
    }

    result.micro = total.metrics();
    result.macro_f1 = if result.macro_label_count == 0 {
        0.0
    } else {
        macro_sum / result.macro_label_count as f64
    };
    result
}
