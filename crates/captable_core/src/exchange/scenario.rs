//! Multi-scenario tables.
//!
//! A document is a sequence of blocks, each introduced by a
//! `#scenario,<name>` marker row and followed by one complete table.

use crate::exchange::csv_table::{export_table, table_from_records, ExchangeError};
use crate::model::cap_table::CapTable;

const SCENARIO_MARKER: &str = "#scenario";

/// A named what-if cap table.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub cap_table: CapTable,
}

/// Concatenates scenario tables, each after its marker row.
pub fn export_scenarios(scenarios: &[Scenario]) -> Result<String, ExchangeError> {
    let mut output = String::new();
    for scenario in scenarios {
        let name = scenario.name.trim();
        if name.is_empty() || name.contains(['\n', '\r']) {
            return Err(ExchangeError::InvalidScenarioName(scenario.name.clone()));
        }
        output.push_str(&marker_row(name)?);
        output.push_str(&export_table(&scenario.cap_table)?);
    }
    Ok(output)
}

/// Splits a multi-scenario document and imports every block.
///
/// The whole document is parsed as one CSV stream, so marker rows are
/// recognized by their first field and never inside a quoted value. Each
/// imported table is named after `company_name`; blank lines between blocks
/// are ignored.
pub fn import_scenarios(company_name: &str, input: &str) -> Result<Vec<Scenario>, ExchangeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());
    let mut blocks: Vec<Block> = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        if record.get(0) == Some(SCENARIO_MARKER) {
            blocks.push(Block {
                name: marker_name(&record)?,
                header: None,
                rows: Vec::new(),
            });
            continue;
        }
        match blocks.last_mut() {
            Some(block) if block.header.is_none() => block.header = Some(record),
            Some(block) => block.rows.push(record),
            None if record.iter().all(str::is_empty) => {}
            None => return Err(ExchangeError::MissingScenarioMarker { line }),
        }
    }

    blocks
        .into_iter()
        .map(|block| {
            let header = block
                .header
                .ok_or(ExchangeError::MissingColumn("round_name"))?;
            let cap_table = table_from_records(company_name, &header, &block.rows)?;
            Ok(Scenario {
                name: block.name,
                cap_table,
            })
        })
        .collect()
}

struct Block {
    name: String,
    header: Option<csv::StringRecord>,
    rows: Vec<csv::StringRecord>,
}

fn marker_row(name: &str) -> Result<String, ExchangeError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record([SCENARIO_MARKER, name])?;
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn marker_name(record: &csv::StringRecord) -> Result<String, ExchangeError> {
    match record.get(1) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(ExchangeError::InvalidScenarioName(
            record.iter().collect::<Vec<_>>().join(","),
        )),
    }
}
