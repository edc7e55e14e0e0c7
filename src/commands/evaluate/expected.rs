use super::*;

const TICKET_ID_HEADER: &str = "Ticket ID";
const EXPECTED_LABELS_HEADER: &str = "Expected Labels";

#[derive(Debug, Deserialize)]
struct GroundTruthDocument {
    expected_by_ticket: BTreeMap<String, Vec<String>>,
}

pub fn load_expected_labels(path: &Path) -> Result<ExpectedLabels> {
    if !path.is_file() {
        bail!("ground truth file not found: {}", path.display());
    }

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let expected = if is_json {
        parse_expected_json(&raw)
    } else {
        parse_expected_csv(&raw)
    }
    .with_context(|| format!("failed to load ground truth {}", path.display()))?;

    info!(
        path = %path.display(),
        tickets = expected.len(),
        with_labels = expected.values().filter(|labels| !labels.is_empty()).count(),
        "loaded ground truth"
    );
    Ok(expected)
}

pub(super) fn parse_expected_csv(raw: &[u8]) -> Result<ExpectedLabels> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(raw);
    let headers = reader
        .headers()
        .context("failed to read ground-truth header row")?
        .clone();
    if headers.is_empty() {
        bail!("ground truth csv is empty");
    }

    let find = |name: &str| headers.iter().position(|header| header.trim() == name);
    let Some(id_index) = find(TICKET_ID_HEADER) else {
        bail!("ground truth missing '{TICKET_ID_HEADER}' column");
    };
    let Some(labels_index) = find(EXPECTED_LABELS_HEADER) else {
        bail!("ground truth missing '{EXPECTED_LABELS_HEADER}' column");
    };

    let mut expected = ExpectedLabels::new();
    for (row_number, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("failed to read ground-truth row {}", row_number + 2))?;
        let raw_id = row.get(id_index).unwrap_or_default().trim();
        if raw_id.is_empty() {
            continue;
        }
        let Some(ticket_id) = parse_ticket_id(raw_id) else {
            bail!("invalid ticket id {raw_id:?} in ground truth row {}", row_number + 2);
        };

        let raw_labels = row
            .get(labels_index)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("[]");
        let labels: Vec<String> = serde_json::from_str(raw_labels).with_context(|| {
            format!("bad Expected Labels JSON for ticket {ticket_id}: {raw_labels}")
        })?;

        expected.insert(ticket_id, known_labels(ticket_id, &labels));
    }

    Ok(expected)
}

pub(super) fn parse_expected_json(raw: &[u8]) -> Result<ExpectedLabels> {
    let document: GroundTruthDocument =
        serde_json::from_slice(raw).context("ground truth json lacks 'expected_by_ticket'")?;

    let mut expected = ExpectedLabels::new();
    for (raw_id, labels) in &document.expected_by_ticket {
        let Some(ticket_id) = parse_ticket_id(raw_id) else {
            bail!("invalid ticket id {raw_id:?} in expected_by_ticket");
        };
        expected.insert(ticket_id, known_labels(ticket_id, labels));
    }

    Ok(expected)
}

fn known_labels(ticket_id: TicketId, raw: &[String]) -> LabelSet {
    let mut labels = LabelSet::new();
    for value in raw {
        match PatternLabel::parse(value) {
            Some(label) => {
                labels.insert(label);
            }
            None => warn!(ticket_id, label = %value, "ground truth label outside vocabulary; dropped"),
        }
    }
    labels
}
