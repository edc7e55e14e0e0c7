use super::*;

const RULE_WIDTH: usize = 72;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub generated_at: String,
    pub ground_truth: String,
    pub results_dir: String,
    pub tickets: usize,
    #[serde(flatten)]
    pub result: EvaluationResult,
}

impl EvaluationReport {
    pub fn new(
        ground_truth: &Path,
        results_dir: &Path,
        expected: &ExpectedLabels,
        result: EvaluationResult,
    ) -> Self {
        Self {
            generated_at: now_utc_string(),
            ground_truth: ground_truth.display().to_string(),
            results_dir: results_dir.display().to_string(),
            tickets: expected.len(),
            result,
        }
    }
}

pub fn write_text_report<W: Write>(
    output: &mut W,
    report: &EvaluationReport,
    show_misses: usize,
) -> io::Result<()> {
    writeln!(output, "Evaluation")?;
    writeln!(output, "- Ground truth: {}", report.ground_truth)?;
    writeln!(output, "- Results dir:  {}", report.results_dir)?;
    writeln!(output, "- Tickets:      {}", report.tickets)?;

    if let Some(recall) = &report.result.recall_only {
        writeln!(output)?;
        write_recall_section(output, recall, show_misses)?;
    }
    if let Some(full) = &report.result.full {
        writeln!(output)?;
        write_full_section(output, full)?;
    }
    Ok(())
}

fn write_heading<W: Write>(output: &mut W, title: &str) -> io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(output, "{rule}")?;
    writeln!(output, "{title}")?;
    writeln!(output, "{rule}")?;
    writeln!(output)
}

fn write_untrusted_files<W: Write>(
    output: &mut W,
    missing: &[TicketId],
    malformed: &[MalformedResult],
    consequence: &str,
) -> io::Result<()> {
    if !missing.is_empty() {
        writeln!(
            output,
            "WARNING: {} result files missing ({consequence})",
            missing.len()
        )?;
        writeln!(output, "         Missing tickets: {}", preview_ids(missing))?;
    }
    if !malformed.is_empty() {
        writeln!(
            output,
            "WARNING: {} result files malformed ({consequence})",
            malformed.len()
        )?;
        for entry in malformed.iter().take(MISSING_PREVIEW_LIMIT) {
            writeln!(output, "         ticket {}: {}", entry.ticket_id, entry.reason)?;
        }
        if malformed.len() > MISSING_PREVIEW_LIMIT {
            writeln!(output, "         ...")?;
        }
    }
    if !missing.is_empty() || !malformed.is_empty() {
        writeln!(output)?;
    }
    Ok(())
}

fn preview_ids(ids: &[TicketId]) -> String {
    let shown = ids
        .iter()
        .take(MISSING_PREVIEW_LIMIT)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if ids.len() > MISSING_PREVIEW_LIMIT {
        format!("[{shown}]...")
    } else {
        format!("[{shown}]")
    }
}

pub fn write_recall_section<W: Write>(
    output: &mut W,
    result: &RecallOnlyResult,
    show_misses: usize,
) -> io::Result<()> {
    write_heading(output, "RECALL-FIRST EVALUATION (ignores false positives)")?;
    write_untrusted_files(
        output,
        &result.missing_result_files,
        &result.malformed_result_files,
        "treated as all labels missed",
    )?;

    writeln!(
        output,
        "Ticket-level full coverage: {}/{} = {:.3}",
        result.tickets_full_covered, result.tickets_with_expected, result.ticket_coverage
    )?;
    writeln!(output)?;
    writeln!(output, "Label-level recall (TP/expected):")?;
    for (label, recall) in &result.per_label {
        if recall.expected == 0 {
            writeln!(output, "  {label}: n/a (0 expected)")?;
        } else {
            writeln!(
                output,
                "  {label}: {}/{} = {:.3}",
                recall.hit, recall.expected, recall.recall
            )?;
        }
    }
    writeln!(output)?;
    writeln!(
        output,
        "Overall label recall: {}/{} = {:.3}",
        result.total_hit, result.total_expected, result.overall_recall
    )?;

    let misses = result.misses();
    if show_misses > 0 && !misses.is_empty() {
        writeln!(output)?;
        writeln!(output, "Missed expected labels (showing up to {show_misses}):")?;
        for (label, ticket_id) in misses.iter().take(show_misses) {
            writeln!(output, "  - ticket {ticket_id}: missed {label}")?;
        }
        if misses.len() > show_misses {
            writeln!(output, "  ... ({} more)", misses.len() - show_misses)?;
        }
    }
    Ok(())
}

pub fn write_full_section<W: Write>(output: &mut W, result: &FullResult) -> io::Result<()> {
    write_heading(output, "PRECISION/RECALL/F1 EVALUATION")?;
    write_untrusted_files(
        output,
        &result.missing_result_files,
        &result.malformed_result_files,
        "treated as no predictions",
    )?;

    let micro = &result.micro;
    writeln!(
        output,
        "Micro precision: {}/{} = {:.3}",
        micro.true_positives,
        micro.true_positives + micro.false_positives,
        micro.precision
    )?;
    writeln!(
        output,
        "Micro recall:    {}/{} = {:.3}",
        micro.true_positives,
        micro.true_positives + micro.false_negatives,
        micro.recall
    )?;
    writeln!(output, "Micro F1:        {:.3}", micro.f1)?;
    writeln!(
        output,
        "Macro F1:        {:.3} (over {} labels with support)",
        result.macro_f1, result.macro_label_count
    )?;
    writeln!(output)?;
    writeln!(output, "Per-label (P / R / F1) with counts (TP, FP, FN, support):")?;
    for (label, entry) in &result.per_label {
        let metrics = &entry.metrics;
        writeln!(output, "  {label}:")?;
        writeln!(
            output,
            "    P={:.3} R={:.3} F1={:.3}",
            metrics.precision, metrics.recall, metrics.f1
        )?;
        writeln!(
            output,
            "    TP={}, FP={}, FN={}, support={}",
            metrics.true_positives, metrics.false_positives, metrics.false_negatives, entry.support
        )?;
    }
    Ok(())
}
