//! Single-table CSV codec.
//!
//! One row binds a round's shared fields to one allocation. A round without
//! allocations is written once with blank allocation fields.

use crate::model::allocation::{Allocation, AllocationType};
use crate::model::cap_table::CapTable;
use crate::model::holder::HolderId;
use crate::model::round::{default_round_color, Round, RoundKind, RoundTerms, SafeConversion};
use crate::model::validation::ValidationError;
use chrono::NaiveDate;
use log::info;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Column order written by `export_table`.
pub const TABLE_COLUMNS: &[&str] = &[
    "round_name",
    "round_kind",
    "price_per_share",
    "valuation_cap",
    "target_amount",
    "pool_size",
    "conversion_price",
    "conversion_discount",
    "round_date",
    "round_color",
    "holder",
    "shares",
    "investment",
    "allocation_type",
    "vesting",
    "notes",
];

const REQUIRED_COLUMNS: &[&str] = &["round_name", "round_kind"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Import/export failure. Line numbers are 1-based within the input text.
#[derive(Debug)]
pub enum ExchangeError {
    Csv(csv::Error),
    MissingColumn(&'static str),
    MissingField {
        line: u64,
        field: &'static str,
    },
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
    },
    Validation(ValidationError),
    /// Scenario names must be non-empty single-line text.
    InvalidScenarioName(String),
    /// Table rows found before the first scenario marker.
    MissingScenarioMarker {
        line: u64,
    },
}

impl Display for ExchangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv(err) => write!(f, "malformed table: {err}"),
            Self::MissingColumn(column) => write!(f, "table header lacks column `{column}`"),
            Self::MissingField { line, field } => {
                write!(f, "line {line}: field `{field}` is required")
            }
            Self::InvalidField { line, field, value } => {
                write!(f, "line {line}: invalid value `{value}` for `{field}`")
            }
            Self::Validation(err) => write!(f, "imported table is invalid: {err}"),
            Self::InvalidScenarioName(name) => write!(f, "invalid scenario name `{name}`"),
            Self::MissingScenarioMarker { line } => {
                write!(f, "line {line}: expected a `#scenario` marker row")
            }
        }
    }
}

impl Error for ExchangeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Csv(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<csv::Error> for ExchangeError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<ValidationError> for ExchangeError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Serializes `cap_table` into one CSV table with a header row.
pub fn export_table(cap_table: &CapTable) -> Result<String, ExchangeError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TABLE_COLUMNS)?;

    for round in &cap_table.rounds {
        let round_fields = round_fields(round);
        if round.allocations.is_empty() {
            let mut row = round_fields.clone();
            row.extend(std::iter::repeat(String::new()).take(6));
            writer.write_record(&row)?;
            continue;
        }
        for allocation in &round.allocations {
            let mut row = round_fields.clone();
            row.push(cap_table.holder_name(allocation.holder_id).to_string());
            row.push(allocation.shares.to_string());
            row.push(optional_number(allocation.investment));
            row.push(allocation.kind.as_str().to_string());
            row.push(allocation.vesting.clone().unwrap_or_default());
            row.push(allocation.notes.clone().unwrap_or_default());
            writer.write_record(&row)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Rebuilds a validated cap table from one CSV table.
///
/// Rows sharing a round name accumulate into one round, even when they are
/// not adjacent; the first row of a round fixes its round fields.
pub fn import_table(company_name: &str, input: &str) -> Result<CapTable, ExchangeError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());
    let headers = reader.headers()?.clone();
    let records = reader.records().collect::<Result<Vec<_>, _>>()?;
    table_from_records(company_name, &headers, &records)
}

/// Builds a cap table from an already parsed header and its data records.
///
/// Reported line numbers come from the records' own positions.
pub(crate) fn table_from_records(
    company_name: &str,
    headers: &csv::StringRecord,
    records: &[csv::StringRecord],
) -> Result<CapTable, ExchangeError> {
    let columns = column_positions(headers)?;

    let mut cap_table = CapTable::new(company_name);
    let mut round_index_by_name: HashMap<String, usize> = HashMap::new();

    for record in records {
        let line = record.position().map_or(0, |position| position.line());
        let row = RowReader {
            record,
            columns: &columns,
            line,
        };

        let round_name = row.required("round_name")?;
        let index = match round_index_by_name.get(round_name) {
            Some(index) => *index,
            None => {
                let index = cap_table.rounds.len();
                cap_table.rounds.push(row.round(index)?);
                round_index_by_name.insert(round_name.to_string(), index);
                index
            }
        };

        if let Some(holder_name) = row.text("holder") {
            let holder_id = cap_table.ensure_holder(holder_name)?;
            let kind = cap_table.rounds[index].kind();
            let allocation = row.allocation(holder_id, kind)?;
            cap_table.rounds[index].allocations.push(allocation);
        }
    }

    cap_table.validate()?;
    info!(
        "event=table_import module=exchange status=ok rounds={} holders={}",
        cap_table.rounds.len(),
        cap_table.holders.len()
    );
    Ok(cap_table)
}

fn column_positions(
    headers: &csv::StringRecord,
) -> Result<HashMap<&'static str, usize>, ExchangeError> {
    let mut positions = HashMap::new();
    for column in TABLE_COLUMNS {
        if let Some(index) = headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(column))
        {
            positions.insert(*column, index);
        }
    }
    for column in REQUIRED_COLUMNS {
        if !positions.contains_key(column) {
            return Err(ExchangeError::MissingColumn(*column));
        }
    }
    Ok(positions)
}

fn round_fields(round: &Round) -> Vec<String> {
    let mut price = None;
    let mut cap = None;
    let mut target = None;
    let mut pool_size = None;
    let mut conversion_price = None;
    let mut conversion_discount = None;

    match &round.terms {
        RoundTerms::Common => {}
        RoundTerms::Priced {
            price_per_share,
            money_raised,
        } => {
            price = Some(*price_per_share);
            target = *money_raised;
        }
        RoundTerms::Safe {
            valuation_cap,
            target_investment,
            conversion,
        } => {
            cap = Some(*valuation_cap);
            target = *target_investment;
            if let Some(conversion) = conversion {
                conversion_price = Some(conversion.conversion_price);
                conversion_discount = Some(conversion.discount_percent);
            }
        }
        RoundTerms::EquityPool { authorized_size } => pool_size = Some(*authorized_size),
    }

    vec![
        round.name.clone(),
        round.kind().as_str().to_string(),
        optional_number(price),
        optional_number(cap),
        optional_number(target),
        pool_size.map(|size| size.to_string()).unwrap_or_default(),
        optional_number(conversion_price),
        optional_number(conversion_discount),
        round
            .date
            .map(|date| date.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
        round.color.clone(),
    ]
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

struct RowReader<'a> {
    record: &'a csv::StringRecord,
    columns: &'a HashMap<&'static str, usize>,
    line: u64,
}

impl<'a> RowReader<'a> {
    fn text(&self, field: &'static str) -> Option<&'a str> {
        let index = *self.columns.get(field)?;
        self.record
            .get(index)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn required(&self, field: &'static str) -> Result<&'a str, ExchangeError> {
        self.text(field).ok_or(ExchangeError::MissingField {
            line: self.line,
            field,
        })
    }

    fn invalid(&self, field: &'static str, value: &str) -> ExchangeError {
        ExchangeError::InvalidField {
            line: self.line,
            field,
            value: value.to_string(),
        }
    }

    fn number(&self, field: &'static str) -> Result<Option<f64>, ExchangeError> {
        self.text(field)
            .map(|value| {
                value
                    .parse::<f64>()
                    .ok()
                    .filter(|parsed| parsed.is_finite())
                    .ok_or_else(|| self.invalid(field, value))
            })
            .transpose()
    }

    fn required_number(&self, field: &'static str) -> Result<f64, ExchangeError> {
        self.number(field)?.ok_or(ExchangeError::MissingField {
            line: self.line,
            field,
        })
    }

    fn count(&self, field: &'static str) -> Result<Option<u64>, ExchangeError> {
        self.text(field)
            .map(|value| value.parse::<u64>().map_err(|_| self.invalid(field, value)))
            .transpose()
    }

    fn date(&self, field: &'static str) -> Result<Option<NaiveDate>, ExchangeError> {
        self.text(field)
            .map(|value| {
                NaiveDate::parse_from_str(value, DATE_FORMAT)
                    .map_err(|_| self.invalid(field, value))
            })
            .transpose()
    }

    fn round(&self, index: usize) -> Result<Round, ExchangeError> {
        let kind_text = self.required("round_kind")?;
        let kind =
            RoundKind::parse(kind_text).ok_or_else(|| self.invalid("round_kind", kind_text))?;

        let terms = match kind {
            RoundKind::Common => RoundTerms::Common,
            RoundKind::Priced => RoundTerms::Priced {
                price_per_share: self.required_number("price_per_share")?,
                money_raised: self.number("target_amount")?,
            },
            RoundKind::Safe => {
                let conversion = match self.number("conversion_price")? {
                    Some(conversion_price) => {
                        let discount_percent =
                            self.number("conversion_discount")?.unwrap_or(0.0);
                        let new_round_price = if discount_percent < 100.0 {
                            conversion_price / (1.0 - discount_percent / 100.0)
                        } else {
                            conversion_price
                        };
                        Some(SafeConversion {
                            conversion_price,
                            new_round_price,
                            discount_percent,
                        })
                    }
                    None => None,
                };
                RoundTerms::Safe {
                    valuation_cap: self.required_number("valuation_cap")?,
                    target_investment: self.number("target_amount")?,
                    conversion,
                }
            }
            RoundKind::EquityPool => RoundTerms::EquityPool {
                authorized_size: self.count("pool_size")?.ok_or(ExchangeError::MissingField {
                    line: self.line,
                    field: "pool_size",
                })?,
            },
        };

        let mut round = Round::new(self.required("round_name")?, terms);
        round.date = self.date("round_date")?;
        round.color = self
            .text("round_color")
            .map(str::to_string)
            .unwrap_or_else(|| default_round_color(index).to_string());
        Ok(round)
    }

    fn allocation(
        &self,
        holder_id: HolderId,
        kind: RoundKind,
    ) -> Result<Allocation, ExchangeError> {
        let allocation_type = match self.text("allocation_type") {
            Some(value) => {
                AllocationType::parse(value).ok_or_else(|| self.invalid("allocation_type", value))?
            }
            None => default_allocation_type(kind),
        };

        let mut allocation = Allocation::new(
            holder_id,
            self.count("shares")?.unwrap_or(0),
            allocation_type,
        );
        allocation.investment = self.number("investment")?;
        allocation.vesting = self.text("vesting").map(str::to_string);
        allocation.notes = self.text("notes").map(str::to_string);
        Ok(allocation)
    }
}

fn default_allocation_type(kind: RoundKind) -> AllocationType {
    match kind {
        RoundKind::Common => AllocationType::Common,
        RoundKind::Priced | RoundKind::Safe => AllocationType::Preferred,
        RoundKind::EquityPool => AllocationType::Option,
    }
}
