use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::domain::{BillingRate, BillingRateId, BusinessId, ClientId, UnitType};

#[derive(Debug)]
pub enum RateSheetError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow {
        row: usize,
        field: &'static str,
        value: String,
    },
}

impl std::fmt::Display for RateSheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateSheetError::Io(err) => write!(f, "failed to read rate sheet: {}", err),
            RateSheetError::Csv(err) => write!(f, "invalid rate sheet CSV data: {}", err),
            RateSheetError::InvalidRow { row, field, value } => {
                write!(f, "rate sheet row {} has invalid {}: '{}'", row, field, value)
            }
        }
    }
}

impl std::error::Error for RateSheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RateSheetError::Io(err) => Some(err),
            RateSheetError::Csv(err) => Some(err),
            RateSheetError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for RateSheetError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RateSheetError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub fn load_rate_sheet<P: AsRef<Path>>(path: P) -> Result<Vec<BillingRate>, RateSheetError> {
    let file = std::fs::File::open(path)?;
    parse_rate_sheet(file)
}

/// Reads a headed CSV rate schedule. A blank `client_id` marks the business default rate.
pub fn parse_rate_sheet<R: Read>(reader: R) -> Result<Vec<BillingRate>, RateSheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rates = Vec::new();

    for (index, record) in csv_reader.deserialize::<RateRow>().enumerate() {
        let row = record?;
        rates.push(row.into_rate(index + 1)?);
    }

    Ok(rates)
}

#[derive(Debug, Deserialize)]
struct RateRow {
    id: String,
    business_id: String,
    service_type: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    client_id: Option<String>,
    billing_code: String,
    rate_per_unit: String,
    unit_type: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    active: Option<String>,
    effective_date: String,
}

impl RateRow {
    fn into_rate(self, row: usize) -> Result<BillingRate, RateSheetError> {
        let invalid = |field: &'static str, value: &str| RateSheetError::InvalidRow {
            row,
            field,
            value: value.to_string(),
        };

        if self.id.is_empty() {
            return Err(invalid("id", &self.id));
        }
        if self.service_type.is_empty() {
            return Err(invalid("service_type", &self.service_type));
        }
        let rate_per_unit = Decimal::from_str(&self.rate_per_unit)
            .ok()
            .filter(|rate| !rate.is_sign_negative())
            .ok_or_else(|| invalid("rate_per_unit", &self.rate_per_unit))?;
        let unit_type =
            UnitType::parse(&self.unit_type).ok_or_else(|| invalid("unit_type", &self.unit_type))?;
        let active = match self.active.as_deref() {
            None => true,
            Some(flag) => parse_flag(flag).ok_or_else(|| invalid("active", flag))?,
        };
        let effective_date = NaiveDate::parse_from_str(&self.effective_date, "%Y-%m-%d")
            .map_err(|_| invalid("effective_date", &self.effective_date))?;

        Ok(BillingRate {
            id: BillingRateId::new(self.id),
            business_id: BusinessId::new(self.business_id),
            service_type: self.service_type,
            client_id: self.client_id.map(ClientId::new),
            billing_code: self.billing_code,
            rate_per_unit,
            unit_type,
            active,
            effective_date,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()))
}
