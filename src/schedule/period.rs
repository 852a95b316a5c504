use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// `DD.MM-DD.MM` with Roman-numeral months, e.g. `15.IV-31.V`.
const PERIOD_PATTERN: &str = r"^(0[1-9]|[12][0-9]|3[01])\.(I|II|III|IV|V|VI|VII|VIII|IX|X|XI|XII)-(0[1-9]|[12][0-9]|3[01])\.(I|II|III|IV|V|VI|VII|VIII|IX|X|XI|XII)$";

const ROMAN_MONTHS: [&str; 12] =
    ["I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII"];

lazy_static! {
    static ref PERIOD_RE: Regex = Regex::new(PERIOD_PATTERN).expect("period pattern is valid");
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error(
        "Invalid period '{0}': use 'DD.MM-DD.MM' where MM is a Roman-numeral month (I-XII)"
    )]
    InvalidFormat(String),
    #[error("Invalid period '{0}': day {1} does not exist in month {2}")]
    InvalidDay(String, u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DayOfYear {
    month: u32,
    day: u32,
}

impl DayOfYear {
    /// 29 February falls back to the 28th in common years.
    fn in_year(self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .or_else(|| NaiveDate::from_ymd_opt(year, self.month, self.day - 1))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// A yearly recurring date range from a plant catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlantingPeriod {
    start: DayOfYear,
    end: DayOfYear,
}

impl PlantingPeriod {
    /// Concrete dates of the period in `year`. A period that ends before it
    /// starts (e.g. `01.XI-28.II`) ends in the following year.
    pub fn resolve(&self, year: i32) -> (NaiveDate, NaiveDate) {
        let start = self.start.in_year(year);
        let end_year = if self.end < self.start { year + 1 } else { year };
        (start, self.end.in_year(end_year))
    }

    /// Resolves the period in the year of `today`. A period that started last
    /// year and has not ended yet resolves to that still open window.
    pub fn resolve_around(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let previous = self.resolve(today.year() - 1);
        if previous.1 >= today {
            return previous;
        }
        self.resolve(today.year())
    }
}

fn parse_roman_month(roman: &str) -> Option<u32> {
    ROMAN_MONTHS.iter().position(|m| *m == roman).map(|index| index as u32 + 1)
}

impl FromStr for PlantingPeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidFormat(s.to_string());
        let captures = PERIOD_RE.captures(s.trim()).ok_or_else(invalid)?;

        let day_of_year = |day_group: usize, month_group: usize| -> Result<DayOfYear, PeriodError> {
            let day: u32 = captures[day_group].parse().map_err(|_| invalid())?;
            let month = parse_roman_month(&captures[month_group]).ok_or_else(invalid)?;
            // 2000 is a leap year, so 29.II passes.
            if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
                return Err(PeriodError::InvalidDay(s.to_string(), day, month));
            }
            Ok(DayOfYear { month, day })
        };

        Ok(Self { start: day_of_year(1, 2)?, end: day_of_year(3, 4)? })
    }
}

impl fmt::Display for PlantingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roman = |month: u32| ROMAN_MONTHS[(month - 1) as usize];
        write!(
            f,
            "{:02}.{}-{:02}.{}",
            self.start.day,
            roman(self.start.month),
            self.end.day,
            roman(self.end.month)
        )
    }
}
