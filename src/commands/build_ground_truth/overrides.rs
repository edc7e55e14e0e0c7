use super::*;

#[derive(Debug, Deserialize, Default)]
struct OverrideFile {
    #[serde(default)]
    excluded_seed_tickets: Vec<ExcludedSeedEntry>,
    #[serde(default)]
    overrides: Vec<RawOverrideRule>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExcludedSeedEntry {
    Bare(TicketIdField),
    Detailed { ticket_id: TicketIdField },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TicketIdField {
    Number(TicketId),
    Text(String),
}

impl TicketIdField {
    fn resolve(&self) -> Result<TicketId> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Text(value) => value
                .trim()
                .parse::<TicketId>()
                .with_context(|| format!("invalid ticket_id {value:?} in overrides")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawOverrideRule {
    ticket_id: TicketIdField,
    #[serde(default)]
    keep: Option<Vec<String>>,
    #[serde(default)]
    remove: Option<Vec<String>>,
    #[serde(default)]
    add: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideAction {
    Keep(LabelSet),
    Adjust { remove: LabelSet, add: LabelSet },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    UnknownOverrideLabel {
        ticket_id: TicketId,
        field: &'static str,
        label: String,
    },
    KeepWithAdjustments {
        ticket_id: TicketId,
    },
    DuplicateOverride {
        ticket_id: TicketId,
    },
    ExcludedTicketOutsideUniverse {
        ticket_id: TicketId,
    },
    OverrideOutsideUniverse {
        ticket_id: TicketId,
    },
    OverrideForExcludedTicket {
        ticket_id: TicketId,
    },
}

impl BuildWarning {
    fn describes_rule_of(&self, ticket: TicketId) -> bool {
        match self {
            Self::UnknownOverrideLabel { ticket_id, .. } | Self::KeepWithAdjustments { ticket_id } => {
                *ticket_id == ticket
            }
            _ => false,
        }
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOverrideLabel {
                ticket_id,
                field,
                label,
            } => write!(
                f,
                "override for ticket {ticket_id} has unknown label {label:?} in '{field}'; dropped"
            ),
            Self::KeepWithAdjustments { ticket_id } => write!(
                f,
                "override for ticket {ticket_id} combines 'keep' with 'remove'/'add'; only 'keep' applied"
            ),
            Self::DuplicateOverride { ticket_id } => write!(
                f,
                "ticket {ticket_id} has more than one override; the last one wins"
            ),
            Self::ExcludedTicketOutsideUniverse { ticket_id } => write!(
                f,
                "excluded seed ticket {ticket_id} is not in the universe"
            ),
            Self::OverrideOutsideUniverse { ticket_id } => write!(
                f,
                "override for ticket {ticket_id} is not in the universe; ignored"
            ),
            Self::OverrideForExcludedTicket { ticket_id } => write!(
                f,
                "override for ticket {ticket_id} targets an excluded ticket; ignored"
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverrideConfig {
    pub excluded: BTreeSet<TicketId>,
    pub rules: BTreeMap<TicketId, OverrideAction>,
    pub warnings: Vec<BuildWarning>,
}

impl OverrideConfig {
    pub fn load_optional(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "overrides file not found; continuing without overrides");
            return Ok(Self::default());
        }

        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&raw)
            .with_context(|| format!("failed to parse overrides {}", path.display()))?;

        info!(
            path = %path.display(),
            excluded = config.excluded.len(),
            overrides = config.rules.len(),
            "loaded ground-truth overrides"
        );
        Ok(config)
    }

    pub fn parse(raw: &[u8]) -> Result<Self> {
        let file: OverrideFile = serde_json::from_slice(raw).context("overrides are not valid JSON")?;

        let mut config = Self::default();
        for entry in &file.excluded_seed_tickets {
            let ticket_id = match entry {
                ExcludedSeedEntry::Bare(ticket_id) => ticket_id,
                ExcludedSeedEntry::Detailed { ticket_id } => ticket_id,
            };
            config.excluded.insert(ticket_id.resolve()?);
        }

        for rule in &file.overrides {
            let ticket_id = rule.ticket_id.resolve()?;
            let mut rule_warnings = Vec::new();
            let action = match &rule.keep {
                Some(keep) => {
                    if rule.remove.is_some() || rule.add.is_some() {
                        rule_warnings.push(BuildWarning::KeepWithAdjustments { ticket_id });
                    }
                    OverrideAction::Keep(validate_labels(
                        ticket_id,
                        "keep",
                        keep,
                        &mut rule_warnings,
                    ))
                }
                None => OverrideAction::Adjust {
                    remove: validate_labels(
                        ticket_id,
                        "remove",
                        rule.remove.as_deref().unwrap_or_default(),
                        &mut rule_warnings,
                    ),
                    add: validate_labels(
                        ticket_id,
                        "add",
                        rule.add.as_deref().unwrap_or_default(),
                        &mut rule_warnings,
                    ),
                },
            };

            if config.rules.insert(ticket_id, action).is_some() {
                config
                    .warnings
                    .retain(|warning| !warning.describes_rule_of(ticket_id));
                config
                    .warnings
                    .push(BuildWarning::DuplicateOverride { ticket_id });
            }
            config.warnings.append(&mut rule_warnings);
        }

        Ok(config)
    }
}

fn validate_labels(
    ticket_id: TicketId,
    field: &'static str,
    raw: &[String],
    warnings: &mut Vec<BuildWarning>,
) -> LabelSet {
    let mut labels = LabelSet::new();
    for value in raw {
        match PatternLabel::parse(value) {
            Some(label) => {
                labels.insert(label);
            }
            None => warnings.push(BuildWarning::UnknownOverrideLabel {
                ticket_id,
                field,
                label: value.clone(),
            }),
        }
    }
    labels
}
