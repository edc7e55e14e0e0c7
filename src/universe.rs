use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use csv::StringRecord;
use tracing::{debug, info};

use crate::model::TicketId;
use crate::util::{clean_cell, lossy_record};

pub const TICKET_ID_COLUMN: &str = "Ticket ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UniverseColumn {
    Brand,
    Product,
    Status,
    LevelSolved,
    CreatedAt,
    UpdatedAt,
    SolvedAt,
    ClosedAt,
    FirstL1AgentId,
    FirstL2AgentId,
    TimeOpenL1,
    TimeOpenL2,
    InitialResponse,
    Resolution,
}

impl UniverseColumn {
    pub const ALL: [UniverseColumn; 14] = [
        UniverseColumn::Brand,
        UniverseColumn::Product,
        UniverseColumn::Status,
        UniverseColumn::LevelSolved,
        UniverseColumn::CreatedAt,
        UniverseColumn::UpdatedAt,
        UniverseColumn::SolvedAt,
        UniverseColumn::ClosedAt,
        UniverseColumn::FirstL1AgentId,
        UniverseColumn::FirstL2AgentId,
        UniverseColumn::TimeOpenL1,
        UniverseColumn::TimeOpenL2,
        UniverseColumn::InitialResponse,
        UniverseColumn::Resolution,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Self::Brand => "Brand",
            Self::Product => "Product",
            Self::Status => "Status",
            Self::LevelSolved => "Level Solved",
            Self::CreatedAt => "Ticket Created",
            Self::UpdatedAt => "Ticket Updated",
            Self::SolvedAt => "Ticket Solved",
            Self::ClosedAt => "Ticket Closed",
            Self::FirstL1AgentId => "First_L1_Agent_ID",
            Self::FirstL2AgentId => "firstL2AgentId",
            Self::TimeOpenL1 => "timeSpentOpenL1",
            Self::TimeOpenL2 => "timeSpentOpenL2",
            Self::InitialResponse => "initialResponseTime",
            Self::Resolution => "resolutionTime",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketRecord {
    pub ticket_id: TicketId,
    pub brand: Option<String>,
    pub product: Option<String>,
    pub status: Option<String>,
    pub level_solved: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub solved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub first_l1_agent_id: Option<String>,
    pub first_l2_agent_id: Option<String>,
    pub time_open_l1_seconds: Option<f64>,
    pub time_open_l2_seconds: Option<f64>,
    pub initial_response_seconds: Option<f64>,
    pub resolution_seconds: Option<f64>,
}

impl TicketRecord {
    pub fn column_value(&self, column: UniverseColumn) -> Option<String> {
        match column {
            UniverseColumn::Brand => self.brand.clone(),
            UniverseColumn::Product => self.product.clone(),
            UniverseColumn::Status => self.status.clone(),
            UniverseColumn::LevelSolved => self.level_solved.clone(),
            UniverseColumn::CreatedAt => self.created_at.map(format_timestamp),
            UniverseColumn::UpdatedAt => self.updated_at.map(format_timestamp),
            UniverseColumn::SolvedAt => self.solved_at.map(format_timestamp),
            UniverseColumn::ClosedAt => self.closed_at.map(format_timestamp),
            UniverseColumn::FirstL1AgentId => self.first_l1_agent_id.clone(),
            UniverseColumn::FirstL2AgentId => self.first_l2_agent_id.clone(),
            UniverseColumn::TimeOpenL1 => self.time_open_l1_seconds.map(format_seconds),
            UniverseColumn::TimeOpenL2 => self.time_open_l2_seconds.map(format_seconds),
            UniverseColumn::InitialResponse => self.initial_response_seconds.map(format_seconds),
            UniverseColumn::Resolution => self.resolution_seconds.map(format_seconds),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TicketUniverse {
    records: BTreeMap<TicketId, TicketRecord>,
    present_columns: Vec<UniverseColumn>,
    skipped_rows: usize,
}

impl TicketUniverse {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open ticket universe {}", path.display()))?;
        let universe = Self::from_csv_reader(reader)
            .with_context(|| format!("failed to load ticket universe {}", path.display()))?;

        info!(
            path = %path.display(),
            tickets = universe.len(),
            skipped_rows = universe.skipped_rows(),
            context_columns = universe.present_columns().len(),
            "loaded ticket universe"
        );
        Ok(universe)
    }

    pub fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let headers = lossy_record(
            reader
                .byte_headers()
                .context("failed to read universe header row")?,
        );

        let Some(id_index) = column_index(&headers, TICKET_ID_COLUMN) else {
            bail!("ticket universe is missing required '{TICKET_ID_COLUMN}' column");
        };

        let column_indexes = UniverseColumn::ALL
            .into_iter()
            .filter_map(|column| column_index(&headers, column.header()).map(|idx| (column, idx)))
            .collect::<Vec<_>>();

        let mut universe = Self {
            present_columns: column_indexes.iter().map(|(column, _)| *column).collect(),
            ..Self::default()
        };

        for (row_number, row) in reader.byte_records().enumerate() {
            let row = row.with_context(|| format!("failed to read universe row {}", row_number + 2))?;
            let row = lossy_record(&row);
            let Some(ticket_id) = row.get(id_index).and_then(parse_ticket_id) else {
                universe.skipped_rows += 1;
                continue;
            };

            let mut record = TicketRecord {
                ticket_id,
                ..TicketRecord::default()
            };
            for (column, idx) in &column_indexes {
                let Some(value) = row.get(*idx).and_then(clean_cell) else {
                    continue;
                };
                apply_column(&mut record, *column, value);
            }

            if universe.records.insert(ticket_id, record).is_some() {
                debug!(ticket_id, "duplicate universe row; keeping the later one");
            }
        }

        Ok(universe)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, ticket_id: TicketId) -> bool {
        self.records.contains_key(&ticket_id)
    }

    pub fn get(&self, ticket_id: TicketId) -> Option<&TicketRecord> {
        self.records.get(&ticket_id)
    }

    pub fn present_columns(&self) -> &[UniverseColumn] {
        &self.present_columns
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

impl FromIterator<TicketRecord> for TicketUniverse {
    fn from_iter<I: IntoIterator<Item = TicketRecord>>(iter: I) -> Self {
        let records = iter
            .into_iter()
            .map(|record| (record.ticket_id, record))
            .collect();
        Self {
            records,
            present_columns: Vec::new(),
            skipped_rows: 0,
        }
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header.trim() == name)
}

fn apply_column(record: &mut TicketRecord, column: UniverseColumn, value: &str) {
    match column {
        UniverseColumn::Brand => record.brand = Some(value.to_string()),
        UniverseColumn::Product => record.product = Some(value.to_string()),
        UniverseColumn::Status => record.status = Some(value.to_string()),
        UniverseColumn::LevelSolved => record.level_solved = Some(value.to_string()),
        UniverseColumn::CreatedAt => record.created_at = parse_timestamp(value),
        UniverseColumn::UpdatedAt => record.updated_at = parse_timestamp(value),
        UniverseColumn::SolvedAt => record.solved_at = parse_timestamp(value),
        UniverseColumn::ClosedAt => record.closed_at = parse_timestamp(value),
        UniverseColumn::FirstL1AgentId => record.first_l1_agent_id = Some(value.to_string()),
        UniverseColumn::FirstL2AgentId => record.first_l2_agent_id = Some(value.to_string()),
        UniverseColumn::TimeOpenL1 => record.time_open_l1_seconds = parse_seconds(value),
        UniverseColumn::TimeOpenL2 => record.time_open_l2_seconds = parse_seconds(value),
        UniverseColumn::InitialResponse => record.initial_response_seconds = parse_seconds(value),
        UniverseColumn::Resolution => record.resolution_seconds = parse_seconds(value),
    }
}

pub fn parse_ticket_id(raw: &str) -> Option<TicketId> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse::<TicketId>().ok()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn parse_seconds(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn format_seconds(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as u64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe_from(data: &str) -> Result<TicketUniverse> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());
        TicketUniverse::from_csv_reader(reader)
    }

    #[test]
    fn rows_without_integer_ids_are_skipped() {
        let universe = universe_from(
            "Ticket ID,Brand,Status\n\
             123456,Khoros,closed\n\
             ,GFI,open\n\
             Total,,\n\
             234567.0,Ignite,solved\n",
        )
        .expect("universe should load");

        assert_eq!(universe.len(), 2);
        assert_eq!(universe.skipped_rows(), 2);
        assert!(universe.contains(123456));
        assert!(universe.contains(234567));
        assert_eq!(
            universe.get(234567).and_then(|record| record.brand.as_deref()),
            Some("Ignite")
        );
    }

    #[test]
    fn undecodable_bytes_do_not_drop_the_row_or_its_neighbours() {
        let mut data = b"Ticket ID,Brand,Product\n123456,Khoros,Aurea\n234567,GFI,".to_vec();
        data.extend_from_slice(&[0xFF, 0xFE]);
        data.extend_from_slice(b"Mail\n345678,Ignite,Crossover\n");
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_slice());

        let universe = TicketUniverse::from_csv_reader(reader).expect("universe should load");
        assert_eq!(universe.len(), 3);
        assert_eq!(universe.skipped_rows(), 0);
        assert!(universe.contains(123456));
        assert!(universe.contains(345678));
        let product = universe
            .get(234567)
            .and_then(|record| record.product.as_deref())
            .expect("product should be kept");
        assert!(product.ends_with("Mail"), "unexpected product: {product}");
        assert!(product.contains('\u{fffd}'));
    }

    #[test]
    fn missing_id_column_is_fatal() {
        let error = universe_from("Brand,Status\nKhoros,closed\n")
            .expect_err("missing id column should fail");
        assert!(
            error.to_string().contains(TICKET_ID_COLUMN),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn absent_columns_are_omitted_and_fields_are_typed() {
        let universe = universe_from(
            "Ticket ID,Brand,Ticket Created,timeSpentOpenL1,resolutionTime,Unrelated\n\
             345678,nan,2025-11-03 08:15:00,3600,-5,x\n\
             456789,GFI,not a date,12.5,abc,y\n",
        )
        .expect("universe should load");

        assert_eq!(
            universe.present_columns(),
            &[
                UniverseColumn::Brand,
                UniverseColumn::CreatedAt,
                UniverseColumn::TimeOpenL1,
                UniverseColumn::Resolution,
            ]
        );

        let first = universe.get(345678).expect("ticket should exist");
        assert_eq!(first.brand, None);
        assert_eq!(
            first.column_value(UniverseColumn::CreatedAt).as_deref(),
            Some("2025-11-03T08:15:00Z")
        );
        assert_eq!(first.time_open_l1_seconds, Some(3600.0));
        assert_eq!(first.resolution_seconds, None);
        assert_eq!(first.product, None);

        let second = universe.get(456789).expect("ticket should exist");
        assert_eq!(second.created_at, None);
        assert_eq!(
            second.column_value(UniverseColumn::TimeOpenL1).as_deref(),
            Some("12.5")
        );
    }

    #[test]
    fn parse_ticket_id_rejects_non_integral_values() {
        assert_eq!(parse_ticket_id(" 1234567 "), Some(1234567));
        assert_eq!(parse_ticket_id("1234567.0"), Some(1234567));
        assert_eq!(parse_ticket_id("1234567.5"), None);
        assert_eq!(parse_ticket_id("-12"), None);
        assert_eq!(parse_ticket_id(""), None);
    }

    #[test]
    fn parse_timestamp_accepts_common_export_formats() {
        assert!(parse_timestamp("2025-11-03T08:15:00Z").is_some());
        assert!(parse_timestamp("2025-11-03T08:15:00").is_some());
        assert!(parse_timestamp("2025-11-03").is_some());
        assert!(parse_timestamp("03/11/2025").is_none());
    }
}
