use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::SummarizeArgs;
use crate::commands::evaluate::load_expected_labels;
use crate::model::{PatternLabel, TicketId, label_names};
use crate::predictions::{
    PredictionDocument, PredictionOutcome, load_prediction, result_file_path,
    ticket_id_from_file_name,
};
use crate::universe::TicketUniverse;
use crate::util::ensure_parent_directory;

const UNKNOWN_BRAND: &str = "(unknown)";
const EVIDENCE_SEPARATOR: &str = " | ";

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub ticket_id: TicketId,
    pub brand: Option<String>,
    pub document: PredictionDocument,
}

#[derive(Debug, Clone, Default)]
pub struct ResultsSummary {
    pub rows: Vec<SummaryRow>,
    pub missing: Vec<TicketId>,
    pub malformed: Vec<(TicketId, String)>,
}

impl ResultsSummary {
    pub fn label_counts(&self) -> BTreeMap<PatternLabel, usize> {
        let mut counts = PatternLabel::ALL
            .into_iter()
            .map(|label| (label, 0))
            .collect::<BTreeMap<_, _>>();
        for row in &self.rows {
            for label in row.document.detected_labels() {
                *counts.entry(label).or_default() += 1;
            }
        }
        counts
    }

    pub fn label_counts_by_brand(&self) -> BTreeMap<String, BTreeMap<PatternLabel, usize>> {
        let mut by_brand = BTreeMap::<String, BTreeMap<PatternLabel, usize>>::new();
        for row in &self.rows {
            let brand = row.brand.as_deref().unwrap_or(UNKNOWN_BRAND).to_string();
            let counts = by_brand.entry(brand).or_default();
            for label in row.document.detected_labels() {
                *counts.entry(label).or_default() += 1;
            }
        }
        by_brand
    }
}

pub fn run(args: SummarizeArgs) -> Result<()> {
    let out_path = args
        .out
        .clone()
        .unwrap_or_else(|| args.data_root.join("llm_results_summary.csv"));

    if !args.results_dir.is_dir() {
        bail!("results directory not found: {}", args.results_dir.display());
    }

    let ticket_ids: Vec<TicketId> = match &args.ground_truth {
        Some(path) => load_expected_labels(path)?.into_keys().collect(),
        None => scan_result_files(&args.results_dir)?,
    };
    let universe = args
        .universe_csv
        .as_deref()
        .map(TicketUniverse::load)
        .transpose()?;

    let summary = summarize_results(&ticket_ids, &args.results_dir, universe.as_ref());
    if !summary.missing.is_empty() {
        warn!(
            missing = summary.missing.len(),
            "result files missing; tickets excluded from the summary"
        );
    }
    for (ticket_id, reason) in &summary.malformed {
        warn!(ticket_id, reason = %reason, "result file malformed; ticket excluded from the summary");
    }

    write_summary_csv_file(&out_path, &summary)?;
    info!(path = %out_path.display(), rows = summary.rows.len(), "wrote results summary");

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_summary_text(&mut output, &summary, &args.results_dir, &out_path)?;
    output.flush()?;
    Ok(())
}

fn scan_result_files(results_dir: &Path) -> Result<Vec<TicketId>> {
    let entries = fs::read_dir(results_dir)
        .with_context(|| format!("failed to list {}", results_dir.display()))?;

    let mut ticket_ids = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", results_dir.display()))?;
        if let Some(ticket_id) = entry.file_name().to_str().and_then(ticket_id_from_file_name) {
            ticket_ids.push(ticket_id);
        }
    }
    ticket_ids.sort_unstable();
    ticket_ids.dedup();
    Ok(ticket_ids)
}

pub fn summarize_results(
    ticket_ids: &[TicketId],
    results_dir: &Path,
    universe: Option<&TicketUniverse>,
) -> ResultsSummary {
    let mut summary = ResultsSummary::default();
    for ticket_id in ticket_ids {
        match load_prediction(&result_file_path(results_dir, *ticket_id)) {
            PredictionOutcome::Loaded(document) => summary.rows.push(SummaryRow {
                ticket_id: *ticket_id,
                brand: universe
                    .and_then(|universe| universe.get(*ticket_id))
                    .and_then(|record| record.brand.clone()),
                document,
            }),
            PredictionOutcome::Missing => summary.missing.push(*ticket_id),
            PredictionOutcome::Malformed(reason) => summary.malformed.push((*ticket_id, reason)),
        }
    }
    summary
}

pub fn write_summary_csv<W: Write>(writer: W, summary: &ResultsSummary) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec![
        "ticket_id".to_string(),
        "brand".to_string(),
        "_model".to_string(),
        "predicted_labels".to_string(),
    ];
    for label in PatternLabel::ALL {
        header.push(format!("{label}__detected"));
        header.push(format!("{label}__reasoning"));
        header.push(format!("{label}__evidence"));
    }
    csv_writer
        .write_record(&header)
        .context("failed to write summary header")?;

    for row in &summary.rows {
        let predicted = label_names(&row.document.detected_labels());
        let mut record = vec![
            row.ticket_id.to_string(),
            row.brand.clone().unwrap_or_default(),
            row.document.model.clone().unwrap_or_default(),
            serde_json::to_string(&predicted).context("failed to encode predicted labels")?,
        ];
        for label in PatternLabel::ALL {
            let block = row.document.blocks.get(&label);
            let detected = block.is_some_and(|block| block.detected);
            record.push(if detected { "1" } else { "0" }.to_string());
            record.push(
                block
                    .and_then(|block| block.reasoning.clone())
                    .unwrap_or_default(),
            );
            record.push(
                block
                    .map(|block| block.evidence.join(EVIDENCE_SEPARATOR))
                    .unwrap_or_default(),
            );
        }
        csv_writer
            .write_record(&record)
            .with_context(|| format!("failed to write summary row for ticket {}", row.ticket_id))?;
    }

    csv_writer.flush().context("failed to flush summary csv")?;
    Ok(())
}

fn write_summary_csv_file(path: &Path, summary: &ResultsSummary) -> Result<()> {
    ensure_parent_directory(path)?;
    let file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_summary_csv(file, summary).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_summary_text<W: Write>(
    output: &mut W,
    summary: &ResultsSummary,
    results_dir: &Path,
    out_path: &Path,
) -> io::Result<()> {
    writeln!(output, "Results summary")?;
    writeln!(output, "- Results dir: {}", results_dir.display())?;
    writeln!(
        output,
        "- Output CSV:  {} ({} rows)",
        out_path.display(),
        summary.rows.len()
    )?;
    if !summary.missing.is_empty() || !summary.malformed.is_empty() {
        writeln!(
            output,
            "- Skipped:     {} missing, {} malformed",
            summary.missing.len(),
            summary.malformed.len()
        )?;
    }
    writeln!(output)?;

    writeln!(output, "Predicted label counts (tickets flagged):")?;
    for (label, count) in summary.label_counts() {
        writeln!(output, "- {label}: {count}")?;
    }
    writeln!(output)?;

    writeln!(output, "Predicted label counts by brand:")?;
    for (brand, counts) in summary.label_counts_by_brand() {
        let rendered = counts
            .iter()
            .map(|(label, count)| format!("{label}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(output, "- {brand}: {{{rendered}}}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::universe::TicketRecord;

    use super::*;

    fn write_prediction(dir: &Path, ticket_id: TicketId, body: &serde_json::Value) {
        fs::write(result_file_path(dir, ticket_id), body.to_string())
            .expect("prediction file should be written");
    }

    fn results_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        write_prediction(
            dir.path(),
            1234567,
            &json!({
                "_model": "judge-v6",
                "AI_WALL_LOOPING": {
                    "detected": true,
                    "reasoning": "bot repeats\nthe same answer",
                    "evidence": ["first loop", "second\nloop"]
                },
                "RESPONSE_DELAYS": {"detected": false, "reasoning": "fast replies", "evidence": []}
            }),
        );
        write_prediction(
            dir.path(),
            2345678,
            &json!({"PREMATURE_CLOSURE": {"detected": true, "evidence": ["closed day 7"]}}),
        );
        fs::write(result_file_path(dir.path(), 3456789), "[]").expect("bad file should be written");
        fs::write(dir.path().join("notes.json"), "{}").expect("stray file should be written");
        dir
    }

    fn universe() -> TicketUniverse {
        [TicketRecord {
            ticket_id: 1234567,
            brand: Some("Khoros".to_string()),
            ..TicketRecord::default()
        }]
        .into_iter()
        .collect()
    }

    #[test]
    fn scan_finds_only_ticket_result_files() {
        let dir = results_fixture();
        let ticket_ids = scan_result_files(dir.path()).expect("scan should succeed");
        assert_eq!(ticket_ids, vec![1234567, 2345678, 3456789]);
    }

    #[test]
    fn summary_skips_missing_and_malformed_files() {
        let dir = results_fixture();
        let summary = summarize_results(&[1234567, 2345678, 3456789, 4567890], dir.path(), None);

        let ids = summary.rows.iter().map(|row| row.ticket_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1234567, 2345678]);
        assert_eq!(summary.missing, vec![4567890]);
        assert_eq!(summary.malformed.len(), 1);
        assert_eq!(summary.malformed[0].0, 3456789);
    }

    #[test]
    fn csv_flattens_blocks_into_wide_columns() {
        let dir = results_fixture();
        let universe = universe();
        let summary = summarize_results(&[1234567, 2345678], dir.path(), Some(&universe));

        let mut buffer = Vec::new();
        write_summary_csv(&mut buffer, &summary).expect("csv should be written");

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let headers = reader.headers().expect("headers should parse").clone();
        assert_eq!(headers.len(), 4 + 3 * PatternLabel::ALL.len());
        assert_eq!(&headers[4], "AI_QUALITY_FAILURES__detected");

        let column = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .expect("column should exist")
        };
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .expect("rows should parse");
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(&first[0], "1234567");
        assert_eq!(&first[1], "Khoros");
        assert_eq!(&first[2], "judge-v6");
        assert_eq!(&first[3], r#"["AI_WALL_LOOPING"]"#);
        assert_eq!(&first[column("AI_WALL_LOOPING__detected")], "1");
        assert_eq!(
            &first[column("AI_WALL_LOOPING__reasoning")],
            "bot repeats the same answer"
        );
        assert_eq!(
            &first[column("AI_WALL_LOOPING__evidence")],
            "first loop | second loop"
        );
        assert_eq!(&first[column("RESPONSE_DELAYS__detected")], "0");
        assert_eq!(&first[column("PREMATURE_CLOSURE__reasoning")], "");

        let second = &rows[1];
        assert_eq!(&second[1], "");
        assert_eq!(&second[2], "");
        assert_eq!(&second[column("PREMATURE_CLOSURE__evidence")], "closed day 7");
    }

    #[test]
    fn text_summary_counts_labels_overall_and_by_brand() {
        let dir = results_fixture();
        let universe = universe();
        let summary = summarize_results(&[1234567, 2345678], dir.path(), Some(&universe));

        let counts = summary.label_counts();
        assert_eq!(counts.len(), PatternLabel::ALL.len());
        assert_eq!(counts[&PatternLabel::AiWallLooping], 1);
        assert_eq!(counts[&PatternLabel::ResponseDelays], 0);

        let mut output = Vec::new();
        write_summary_text(&mut output, &summary, dir.path(), Path::new("summary.csv"))
            .expect("summary should render");
        let text = String::from_utf8(output).expect("summary should be utf-8");
        assert!(text.contains("- Output CSV:  summary.csv (2 rows)"));
        assert!(text.contains("- PREMATURE_CLOSURE: 1"));
        assert!(text.contains("- Khoros: {AI_WALL_LOOPING=1}"));
        assert!(text.contains("- (unknown): {PREMATURE_CLOSURE=1}"));
    }
}
