use super::*;

pub fn run(args: BuildGroundTruthArgs) -> Result<()> {
    let overrides_path = args
        .overrides
        .clone()
        .unwrap_or_else(|| args.data_root.join("ground_truth_overrides.json"));
    let out_csv = args
        .out_csv
        .clone()
        .unwrap_or_else(|| args.data_root.join("ground_truth_expected.csv"));
    let out_json = args
        .out_json
        .clone()
        .unwrap_or_else(|| args.data_root.join("ground_truth_expected.json"));

    let vocabulary = match &args.pattern_mapping {
        Some(path) => PatternVocabulary::load(path)?,
        None => PatternVocabulary::builtin(),
    };
    info!(needles = vocabulary.needle_count(), "pattern vocabulary ready");

    let extractor = TicketIdExtractor::new(&args.ticket_id_pattern)?;
    let universe = TicketUniverse::load(&args.universe_csv)?;
    if universe.is_empty() {
        warn!(path = %args.universe_csv.display(), "ticket universe is empty; ground truth will be empty");
    }
    let matrix = PatternMatrix::load(&args.patterns_csv)?;
    let overrides = OverrideConfig::load_optional(&overrides_path)?;

    let build = build_ground_truth(&matrix, &universe, &vocabulary, &extractor, &overrides);
    for warning in &build.warnings {
        warn!(warning = %warning, "ground-truth data-quality warning");
    }
    if !build.unmapped.is_empty() {
        warn!(
            distinct = build.unmapped.len(),
            rows = build.unmapped.values().sum::<usize>(),
            "pattern rows did not map to a label"
        );
    }

    let sources = BuildSources {
        patterns: source_fingerprint(&args.patterns_csv)?,
        universe: source_fingerprint(&args.universe_csv)?,
        overrides: if overrides_path.exists() {
            Some(source_fingerprint(&overrides_path)?)
        } else {
            None
        },
    };
    let manifest = build_manifest(&build, sources, &extractor, &overrides);

    write_ground_truth_csv_file(&out_csv, &build, &universe)?;
    info!(path = %out_csv.display(), "wrote ground-truth csv");
    write_json_pretty(&out_json, &manifest)?;
    info!(path = %out_json.display(), "wrote ground-truth json");

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_build_summary(&mut output, &build, args.show_unmapped)?;
    output.flush()?;

    info!(
        tickets = build.expected.len(),
        warnings = build.warnings.len(),
        "ground-truth build completed"
    );
    Ok(())
}
