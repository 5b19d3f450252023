// Registry date codec
// The API sends either `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`, without timezone.
// Timestamps may carry a fractional second (`2023-11-22T03:30:18.000`).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_TIME_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const MAX_FRACTION_DIGITS: u8 = 9;

/// Which textual layout a date came in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePrecision {
    Day,
    Second,
    /// Sub-second timestamp, with the number of fraction digits it was written with
    Fraction(u8),
}

/// A registry date, re-encoded in the layout it was read from
///
/// Absent values are modelled as `Option<SireneDate>`, so `None` and
/// `0001-01-01` stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SireneDate {
    value: NaiveDateTime,
    precision: DatePrecision,
}

impl SireneDate {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            value: date.and_time(NaiveTime::MIN),
            precision: DatePrecision::Day,
        }
    }

    pub fn from_date_time(value: NaiveDateTime) -> Self {
        Self {
            value,
            precision: DatePrecision::Second,
        }
    }

    /// Timestamp written with `digits` fraction digits, extra precision is truncated
    pub fn from_date_time_fraction(value: NaiveDateTime, digits: u8) -> Self {
        let digits = digits.min(MAX_FRACTION_DIGITS);
        if digits == 0 {
            return Self::from_date_time(value.with_nanosecond(0).unwrap_or(value));
        }
        let step = 10u32.pow(u32::from(MAX_FRACTION_DIGITS - digits));
        let nanos = value.nanosecond() % 1_000_000_000;
        Self {
            value: value.with_nanosecond(nanos - nanos % step).unwrap_or(value),
            precision: DatePrecision::Fraction(digits),
        }
    }

    pub fn value(&self) -> NaiveDateTime {
        self.value
    }

    pub fn date(&self) -> NaiveDate {
        self.value.date()
    }

    pub fn precision(&self) -> DatePrecision {
        self.precision
    }
}

/// Error returned for text matching neither layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSireneDateError(String);

impl fmt::Display for ParseSireneDateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid date {:?}, expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS",
            self.0
        )
    }
}

impl std::error::Error for ParseSireneDateError {}

impl FromStr for SireneDate {
    type Err = ParseSireneDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
            return Ok(Self::from_date(date));
        }
        let value = NaiveDateTime::parse_from_str(s, DATE_TIME_PARSE_FORMAT)
            .map_err(|_| ParseSireneDateError(s.to_string()))?;

        let digits = match s.split_once('.') {
            Some((_, fraction)) => u8::try_from(fraction.len()).unwrap_or(MAX_FRACTION_DIGITS),
            None => 0,
        };
        Ok(Self::from_date_time_fraction(value, digits))
    }
}

impl fmt::Display for SireneDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            DatePrecision::Day => write!(f, "{}", self.value.format(DATE_FORMAT)),
            DatePrecision::Second => write!(f, "{}", self.value.format(DATE_TIME_FORMAT)),
            DatePrecision::Fraction(digits) => {
                let step = 10u32.pow(u32::from(MAX_FRACTION_DIGITS - digits));
                let nanos = self.value.nanosecond() % 1_000_000_000;
                write!(
                    f,
                    "{}.{:0width$}",
                    self.value.format(DATE_TIME_FORMAT),
                    nanos / step,
                    width = usize::from(digits)
                )
            }
        }
    }
}

impl Serialize for SireneDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SireneDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
