use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPatternRow {
    pub description: String,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PatternMatrix {
    pub brands: Vec<String>,
    pub rows: Vec<RawPatternRow>,
}

impl PatternMatrix {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read(path).with_context(|| format!("failed to read pattern matrix {}", path.display()))?;
        let matrix = Self::parse(&raw)
            .with_context(|| format!("failed to parse pattern matrix {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = matrix.rows.len(),
            brands = matrix.brands.len(),
            "loaded pattern matrix"
        );
        Ok(matrix)
    }

    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(raw);

        let mut records = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("failed to read matrix record {}", idx + 1))?;
            records.push(lossy_record(&record));
        }

        if records.len() < 2 {
            bail!(
                "pattern matrix needs a two-row header, found {} record(s)",
                records.len()
            );
        }

        let width = records.iter().map(|record| record.len()).max().unwrap_or(0);
        if width < 2 {
            bail!("pattern matrix must have a description column and at least one brand column");
        }

        let group_header = &records[0];
        let brand_header = &records[1];
        let brands = (1..width)
            .map(|idx| {
                brand_header
                    .get(idx)
                    .and_then(clean_cell)
                    .or_else(|| group_header.get(idx).and_then(clean_cell))
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| format!("column_{idx}"))
            })
            .collect::<Vec<_>>();

        let rows = records[2..]
            .iter()
            .map(|record| RawPatternRow {
                description: record
                    .get(0)
                    .and_then(clean_cell)
                    .unwrap_or_default()
                    .to_string(),
                cells: (1..width)
                    .map(|idx| record.get(idx).unwrap_or_default().to_string())
                    .collect(),
            })
            .collect();

        Ok(Self { brands, rows })
    }
}

#[derive(Debug, Clone)]
pub struct TicketIdExtractor {
    pattern: Regex,
}

impl TicketIdExtractor {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .with_context(|| format!("failed to compile ticket id pattern {pattern:?}"))?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn extract(&self, cell: &str) -> Vec<TicketId> {
        let Some(text) = clean_cell(cell) else {
            return Vec::new();
        };

        self.pattern
            .captures_iter(text)
            .filter_map(|captures| captures.get(1).or_else(|| captures.get(0)))
            .filter_map(|matched| matched.as_str().parse::<TicketId>().ok())
            .collect()
    }
}
