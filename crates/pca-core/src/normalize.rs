use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("value is empty")]
    Empty,
    #[error("`{0}` is not a number")]
    Number(String),
    #[error("`{0}` is not a DD/MM/YYYY date")]
    Date(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}")]
pub struct DataQualityError {
    pub field: &'static str,
    #[source]
    pub reason: NormalizeError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityPolicy {
    /// Fail the row, which fails the whole run.
    #[default]
    Reject,
    /// Store SQL `NULL` in place of the value and keep going.
    PersistSentinel,
}

impl DataQualityPolicy {
    pub fn apply<T>(
        self,
        field: &'static str,
        parsed: Result<T, NormalizeError>,
    ) -> Result<Option<T>, DataQualityError> {
        match (parsed, self) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(reason), Self::Reject) => Err(DataQualityError { field, reason }),
            (Err(reason), Self::PersistSentinel) => {
                warn!(field, %reason, "persisting sentinel for unparseable value");
                Ok(None)
            }
        }
    }
}

impl FromStr for DataQualityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "strict" => Ok(Self::Reject),
            "sentinel" | "persist" | "persist-sentinel" | "persist_sentinel" => {
                Ok(Self::PersistSentinel)
            }
            other => Err(format!("unknown data quality policy `{other}`")),
        }
    }
}

/// Keeps only ASCII digits and parses them, so `"12.345"` becomes `12345`.
pub fn parse_digits(text: &str) -> Result<i64, NormalizeError> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(NormalizeError::Empty);
    }
    digits
        .parse()
        .map_err(|_| NormalizeError::Number(text.trim().to_string()))
}

pub fn strip_non_digits(text: &str) -> Option<i64> {
    parse_digits(text).ok()
}

/// `"R$ 1.234,56"` -> `1234.56`. The currency prefix is optional.
pub fn parse_brl_amount(text: &str) -> Result<f64, NormalizeError> {
    let trimmed = text.trim().replace('\u{a0}', " ");
    let unprefixed = trimmed.strip_prefix("R$").unwrap_or(&trimmed).trim();
    if unprefixed.is_empty() {
        return Err(NormalizeError::Empty);
    }
    let invalid = || NormalizeError::Number(text.trim().to_string());
    let (sign, unsigned) = match unprefixed.strip_prefix('-') {
        Some(rest) => ("-", rest.trim_start()),
        None => ("", unprefixed),
    };
    let (integer, fraction) = match unsigned.split_once(',') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    if !is_grouped_integer(integer) {
        return Err(invalid());
    }
    let mut canonical = format!("{sign}{}", integer.replace('.', ""));
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        canonical.push('.');
        canonical.push_str(fraction);
    }
    canonical.parse::<f64>().map_err(|_| invalid())
}

fn is_grouped_integer(text: &str) -> bool {
    let mut groups = text.split('.');
    let lead = groups.next().unwrap_or_default();
    let all_digits = |group: &str| !group.is_empty() && group.chars().all(|c| c.is_ascii_digit());
    if !all_digits(lead) {
        return false;
    }
    let rest: Vec<&str> = groups.collect();
    rest.is_empty() || (lead.len() <= 3 && rest.iter().all(|g| g.len() == 3 && all_digits(g)))
}

pub fn parse_br_date(text: &str) -> Result<NaiveDate, NormalizeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::Empty);
    }
    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
        .map_err(|_| NormalizeError::Date(trimmed.to_string()))
}

pub fn parse_year(text: &str) -> Result<i32, NormalizeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::Empty);
    }
    trimmed
        .parse()
        .map_err(|_| NormalizeError::Number(trimmed.to_string()))
}

/// Collapses runs of whitespace, line breaks included, into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
