use super::*;

pub fn run(args: EvaluateArgs) -> Result<()> {
    let ground_truth = args
        .ground_truth
        .clone()
        .unwrap_or_else(|| args.data_root.join("ground_truth_expected.csv"));

    let expected = load_expected_labels(&ground_truth)?;
    let result = evaluate(&expected, &args.results_dir, args.mode)?;
    log_untrusted_files(&result);

    let report = EvaluationReport::new(&ground_truth, &args.results_dir, &expected, result);

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote evaluation report");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize evaluation report")?;
        writeln!(output)?;
    } else {
        write_text_report(&mut output, &report, args.show_misses)?;
    }
    output.flush()?;

    info!(
        mode = args.mode.as_str(),
        tickets = expected.len(),
        "evaluation completed"
    );
    Ok(())
}

fn log_untrusted_files(result: &EvaluationResult) {
    let (missing, malformed) = match (&result.recall_only, &result.full) {
        (_, Some(full)) => (
            full.missing_result_files.len(),
            full.malformed_result_files.len(),
        ),
        (Some(recall), None) => (
            recall.missing_result_files.len(),
            recall.malformed_result_files.len(),
        ),
        (None, None) => (0, 0),
    };
    if missing > 0 {
        warn!(missing, "prediction files missing for ground-truth tickets");
    }
    if malformed > 0 {
        warn!(malformed, "prediction files could not be used");
    }
}
