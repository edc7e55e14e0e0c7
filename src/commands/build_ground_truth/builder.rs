use super::*;

#[derive(Debug, Clone, Default)]
pub struct GroundTruthBuild {
    pub expected: ExpectedLabels,
    pub seeded_tickets: usize,
    pub dropped_outside_universe: BTreeSet<TicketId>,
    pub dropped_excluded: BTreeSet<TicketId>,
    pub unmapped: BTreeMap<String, usize>,
    pub warnings: Vec<BuildWarning>,
}

impl GroundTruthBuild {
    pub fn label_counts(&self) -> BTreeMap<PatternLabel, usize> {
        let mut counts = PatternLabel::ALL
            .into_iter()
            .map(|label| (label, 0usize))
            .collect::<BTreeMap<_, _>>();
        for labels in self.expected.values() {
            for label in labels {
                *counts.entry(*label).or_default() += 1;
            }
        }
        counts
    }

    pub fn top_unmapped(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut entries = self
            .unmapped
            .iter()
            .map(|(text, count)| (text.as_str(), *count))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        entries.truncate(limit);
        entries
    }

    pub fn orphan_exclusions(&self) -> Vec<TicketId> {
        self.warnings
            .iter()
            .filter_map(|warning| match warning {
                BuildWarning::ExcludedTicketOutsideUniverse { ticket_id } => Some(*ticket_id),
                _ => None,
            })
            .collect()
    }

    pub fn orphan_overrides(&self) -> Vec<TicketId> {
        self.warnings
            .iter()
            .filter_map(|warning| match warning {
                BuildWarning::OverrideOutsideUniverse { ticket_id } => Some(*ticket_id),
                _ => None,
            })
            .collect()
    }
}

pub fn build_ground_truth(
    matrix: &PatternMatrix,
    universe: &TicketUniverse,
    vocabulary: &PatternVocabulary,
    extractor: &TicketIdExtractor,
    overrides: &OverrideConfig,
) -> GroundTruthBuild {
    let mut build = GroundTruthBuild {
        warnings: overrides.warnings.clone(),
        ..GroundTruthBuild::default()
    };

    let mut seeded = BTreeMap::<TicketId, LabelSet>::new();
    for row in &matrix.rows {
        let description = row.description.trim();
        let Some(label) = vocabulary.map_text_to_label(description) else {
            if !description.is_empty() {
                *build.unmapped.entry(description.to_string()).or_default() += 1;
            }
            continue;
        };

        for cell in &row.cells {
            for ticket_id in extractor.extract(cell) {
                seeded.entry(ticket_id).or_default().insert(label);
            }
        }
    }
    build.seeded_tickets = seeded.len();

    for (ticket_id, labels) in seeded {
        if !universe.contains(ticket_id) {
            build.dropped_outside_universe.insert(ticket_id);
        } else if overrides.excluded.contains(&ticket_id) {
            build.dropped_excluded.insert(ticket_id);
        } else {
            build.expected.insert(ticket_id, labels);
        }
    }

    for ticket_id in &overrides.excluded {
        if !universe.contains(*ticket_id) {
            build
                .warnings
                .push(BuildWarning::ExcludedTicketOutsideUniverse {
                    ticket_id: *ticket_id,
                });
        }
    }

    for (ticket_id, action) in &overrides.rules {
        let ticket_id = *ticket_id;
        if !universe.contains(ticket_id) {
            build
                .warnings
                .push(BuildWarning::OverrideOutsideUniverse { ticket_id });
            continue;
        }
        if overrides.excluded.contains(&ticket_id) {
            build
                .warnings
                .push(BuildWarning::OverrideForExcludedTicket { ticket_id });
            continue;
        }

        // Unseeded in-universe tickets start empty, so `add` can introduce them.
        let labels = build.expected.entry(ticket_id).or_default();
        match action {
            OverrideAction::Keep(keep) => *labels = keep.clone(),
            OverrideAction::Adjust { remove, add } => {
                labels.retain(|label| !remove.contains(label));
                labels.extend(add.iter().copied());
            }
        }
    }

    build
}
