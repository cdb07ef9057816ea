//! Month keys (`Mon-YY`) and month resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const SPANISH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Every accepted spelling, lowercase.
const MONTH_NAMES: &[(&str, u32)] = &[
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// A calendar month, displayed as `Mon-YY` (e.g. `Mar-24`).
///
/// Ordering is chronological, so a `BTreeMap` keyed by `MonthKey` iterates
/// matrix columns left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Creates a month key. Returns `None` unless `month` is in `1..=12`.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month containing `date`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Four-digit year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month number, 1 to 12.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// First day of the month.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month.
    #[must_use]
    pub fn last_day(self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    /// The following month.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month.
    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = usize::try_from(self.month - 1).unwrap_or_default();
        write!(
            f,
            "{}-{:02}",
            ABBREVIATIONS[index],
            self.year.rem_euclid(100)
        )
    }
}

/// Error parsing a `Mon-YY` token.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid month key '{0}', expected Mon-YY")]
pub struct MonthParseError(pub String);

impl FromStr for MonthKey {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MonthParseError(s.to_string());
        let (abbr, year) = s.trim().split_once('-').ok_or_else(err)?;

        let month = ABBREVIATIONS
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(abbr))
            .ok_or_else(err)?;
        if year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let year: i32 = year.parse().map_err(|_| err())?;

        Self::new(2000 + year, u32::try_from(month + 1).map_err(|_| err())?).ok_or_else(err)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything a row may say about its month.
///
/// Resolution priority is `number + year`, then `name + year`, then `date`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthSignals<'a> {
    /// Month number (1 to 12).
    pub number: Option<i64>,
    /// Month name (Spanish, English, English abbreviation or `Mon-YY`).
    pub name: Option<&'a str>,
    /// Year, four or two digits.
    pub year: Option<i32>,
    /// A date inside the month.
    pub date: Option<NaiveDate>,
}

impl<'a> MonthSignals<'a> {
    /// Signals from a month number and year.
    #[must_use]
    pub const fn number(number: i64, year: i32) -> Self {
        Self {
            number: Some(number),
            name: None,
            year: Some(year),
            date: None,
        }
    }

    /// Signals from a month name and optional year.
    #[must_use]
    pub const fn name(name: &'a str, year: Option<i32>) -> Self {
        Self {
            number: None,
            name: Some(name),
            year,
            date: None,
        }
    }

    /// Signals from an ISO-8601 date or timestamp string.
    #[must_use]
    pub fn iso(date: &str) -> Self {
        Self {
            date: parse_date(date),
            ..Self::default()
        }
    }
}

/// Resolves a month from the strongest available signal.
///
/// A signal that is present but unusable (month 13, unknown name) gives way
/// to the next one. Returns `None` when nothing resolves.
#[must_use]
pub fn normalize_month(signals: &MonthSignals<'_>) -> Option<MonthKey> {
    let year = signals.year.map(expand_year);

    let from_number = signals
        .number
        .zip(year)
        .and_then(|(number, year)| MonthKey::new(year, u32::try_from(number).ok()?));

    from_number
        .or_else(|| signals.name.and_then(|name| month_from_text(name, year)))
        .or_else(|| signals.date.map(MonthKey::from_date))
}

fn month_from_text(text: &str, year: Option<i32>) -> Option<MonthKey> {
    if let Ok(key) = text.parse::<MonthKey>() {
        return Some(key);
    }
    let year = year?;
    if let Ok(number) = text.trim().parse::<u32>() {
        return MonthKey::new(year, number);
    }
    MonthKey::new(year, month_from_name(text)?)
}

/// Month number for a Spanish name, English name or English abbreviation.
#[must_use]
pub fn month_from_name(name: &str) -> Option<u32> {
    let needle = name.trim().to_lowercase();
    MONTH_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == needle)
        .map(|(_, number)| *number)
}

/// Spanish month name as stored in `mes` columns (lowercase).
#[must_use]
pub fn spanish_month_name(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month.checked_sub(1)?).ok()?;
    SPANISH_NAMES.get(index).copied()
}

/// Parses the date part of an ISO-8601 date or timestamp.
///
/// Accepts `YYYY-MM-DD` optionally followed by `T` or a space and a time.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10)?;
    if let Some(rest) = raw.get(10..) {
        if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
            return None;
        }
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn expand_year(year: i32) -> i32 {
    if (0..100).contains(&year) {
        2000 + year
    } else {
        year
    }
}
