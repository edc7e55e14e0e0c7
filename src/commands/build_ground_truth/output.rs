use super::*;

pub const TICKET_ID_HEADER: &str = "Ticket ID";
pub const EXPECTED_LABELS_HEADER: &str = "Expected Labels";

#[derive(Debug, Clone)]
pub struct BuildSources {
    pub patterns: SourceFingerprint,
    pub universe: SourceFingerprint,
    pub overrides: Option<SourceFingerprint>,
}

pub fn source_fingerprint(path: &Path) -> Result<SourceFingerprint> {
    Ok(SourceFingerprint {
        filename: file_name_string(path),
        sha256: sha256_file(path)?,
    })
}

pub fn build_manifest(
    build: &GroundTruthBuild,
    sources: BuildSources,
    extractor: &TicketIdExtractor,
    overrides: &OverrideConfig,
) -> GroundTruthManifest {
    let label_counts = build
        .label_counts()
        .into_iter()
        .map(|(label, count)| (label.as_str().to_string(), count))
        .collect();

    GroundTruthManifest {
        manifest_version: GROUND_TRUTH_MANIFEST_VERSION,
        notes: GroundTruthNotes {
            source_patterns_csv: sources.patterns,
            source_universe_csv: sources.universe,
            source_overrides_json: sources.overrides,
            ticket_id_pattern: extractor.as_str().to_string(),
            excluded_seed_tickets_count: overrides.excluded.len(),
            overrides_count: overrides.rules.len(),
            tickets_after_filtering: build.expected.len(),
            unmapped_pattern_rows: build.unmapped.values().sum(),
            label_counts,
            our_patterns: PatternLabel::ALL
                .iter()
                .map(|label| label.as_str().to_string())
                .collect(),
        },
        expected_by_ticket: build
            .expected
            .iter()
            .map(|(ticket_id, labels)| {
                (
                    ticket_id.to_string(),
                    label_names(labels).into_iter().map(ToOwned::to_owned).collect(),
                )
            })
            .collect(),
        warnings: build.warnings.iter().map(ToString::to_string).collect(),
    }
}

pub fn write_ground_truth_csv<W: Write>(
    writer: W,
    build: &GroundTruthBuild,
    universe: &TicketUniverse,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let context_columns = universe.present_columns();

    let mut header = vec![TICKET_ID_HEADER, EXPECTED_LABELS_HEADER];
    header.extend(context_columns.iter().map(|column| column.header()));
    header.extend(PatternLabel::ALL.iter().map(|label| label.as_str()));
    csv_writer
        .write_record(&header)
        .context("failed to write ground-truth header")?;

    for (ticket_id, labels) in &build.expected {
        let record = universe.get(*ticket_id);
        let mut row = Vec::with_capacity(header.len());
        row.push(ticket_id.to_string());
        row.push(
            serde_json::to_string(&label_names(labels))
                .context("failed to encode expected labels")?,
        );
        for column in context_columns {
            row.push(
                record
                    .and_then(|record| record.column_value(*column))
                    .unwrap_or_default(),
            );
        }
        for label in PatternLabel::ALL {
            row.push(if labels.contains(&label) { "1" } else { "0" }.to_string());
        }
        csv_writer
            .write_record(&row)
            .with_context(|| format!("failed to write ground-truth row for ticket {ticket_id}"))?;
    }

    csv_writer.flush().context("failed to flush ground-truth csv")?;
    Ok(())
}

pub fn write_ground_truth_csv_file(
    path: &Path,
    build: &GroundTruthBuild,
    universe: &TicketUniverse,
) -> Result<()> {
    ensure_parent_directory(path)?;
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_ground_truth_csv(file, build, universe)
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_build_summary<W: Write>(
    output: &mut W,
    build: &GroundTruthBuild,
    show_unmapped: usize,
) -> Result<()> {
    writeln!(output, "Tickets in filtered ground truth: {}", build.expected.len())?;
    writeln!(
        output,
        "Seeded tickets: {} (outside universe: {}, excluded: {})",
        build.seeded_tickets,
        build.dropped_outside_universe.len(),
        build.dropped_excluded.len()
    )?;
    writeln!(output, "Counts by label:")?;
    for (label, count) in build.label_counts() {
        writeln!(output, "- {label}: {count}")?;
    }

    if !build.unmapped.is_empty() {
        writeln!(output)?;
        writeln!(output, "WARNING: unmapped pattern rows (ignored):")?;
        for (text, count) in build.top_unmapped(show_unmapped) {
            writeln!(output, "- ({count}x) {text}")?;
        }
        if build.unmapped.len() > show_unmapped {
            writeln!(output, "... ({} more)", build.unmapped.len() - show_unmapped)?;
        }
    }

    write_orphan_list(
        output,
        "excluded_seed_tickets not in universe (already excluded by universe filter):",
        &build.orphan_exclusions(),
    )?;
    write_orphan_list(
        output,
        "overrides not in universe (won't affect scoring):",
        &build.orphan_overrides(),
    )?;

    Ok(())
}

fn write_orphan_list<W: Write>(output: &mut W, heading: &str, ticket_ids: &[TicketId]) -> Result<()> {
    if ticket_ids.is_empty() {
        return Ok(());
    }

    writeln!(output)?;
    writeln!(output, "WARNING: {heading}")?;
    for ticket_id in ticket_ids.iter().take(ORPHAN_LIST_LIMIT) {
        writeln!(output, "- {ticket_id}")?;
    }
    if ticket_ids.len() > ORPHAN_LIST_LIMIT {
        writeln!(output, "... ({} more)", ticket_ids.len() - ORPHAN_LIST_LIMIT)?;
    }
    Ok(())
}
