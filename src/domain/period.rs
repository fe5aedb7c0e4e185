use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Reporting period length used for income statements and comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Monthly,
    Quarterly,
    Yearly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Monthly => "monthly",
            PeriodType::Quarterly => "quarterly",
            PeriodType::Yearly => "yearly",
        }
    }

    fn months(&self) -> u32 {
        match self {
            PeriodType::Monthly => 1,
            PeriodType::Quarterly => 3,
            PeriodType::Yearly => 12,
        }
    }

    /// First and last day (inclusive) of the period containing `date`.
    pub fn bounds(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let months = self.months();
        let first_month = (date.month0() / months) * months + 1;
        let start = first_day(date.year(), first_month);
        let next_start = add_months(start, months);
        let end = next_start - Days::new(1);
        (start, end)
    }

    /// Bounds of the period immediately before the one containing `date`.
    pub fn previous(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let (start, _) = self.bounds(date);
        self.bounds(start - Days::new(1))
    }
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" | "month" => Ok(PeriodType::Monthly),
            "quarterly" | "quarter" => Ok(PeriodType::Quarterly),
            "yearly" | "year" | "annual" => Ok(PeriodType::Yearly),
            other => Err(format!("unknown period '{}'", other)),
        }
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

fn first_day(year: i32, month: u32) -> NaiveDate {
    // month is always 1..=12 here, and day 1 exists in every month
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn add_months(start: NaiveDate, months: u32) -> NaiveDate {
    let zero_based = start.month0() + months;
    first_day(start.year() + (zero_based / 12) as i32, zero_based % 12 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_period_type_roundtrip() {
        for pt in [PeriodType::Monthly, PeriodType::Quarterly, PeriodType::Yearly] {
            let parsed: PeriodType = pt.as_str().parse().unwrap();
            assert_eq!(pt, parsed);
        }
    }

    #[test]
    fn test_monthly_bounds() {
        let (start, end) = PeriodType::Monthly.bounds(date("2024-02-15"));
        assert_eq!(start, date("2024-02-01"));
        assert_eq!(end, date("2024-02-29"));

        let (start, end) = PeriodType::Monthly.bounds(date("2023-12-31"));
        assert_eq!(start, date("2023-12-01"));
        assert_eq!(end, date("2023-12-31"));
    }

    #[test]
    fn test_quarterly_bounds() {
        let (start, end) = PeriodType::Quarterly.bounds(date("2024-05-20"));
        assert_eq!(start, date("2024-04-01"));
        assert_eq!(end, date("2024-06-30"));

        let (start, end) = PeriodType::Quarterly.bounds(date("2024-11-02"));
        assert_eq!(start, date("2024-10-01"));
        assert_eq!(end, date("2024-12-31"));
    }

    #[test]
    fn test_yearly_bounds() {
        let (start, end) = PeriodType::Yearly.bounds(date("2024-06-15"));
        assert_eq!(start, date("2024-01-01"));
        assert_eq!(end, date("2024-12-31"));
    }

    #[test]
    fn test_previous_period_crosses_year() {
        let (start, end) = PeriodType::Monthly.previous(date("2024-01-10"));
        assert_eq!(start, date("2023-12-01"));
        assert_eq!(end, date("2023-12-31"));

        let (start, end) = PeriodType::Quarterly.previous(date("2024-02-10"));
        assert_eq!(start, date("2023-10-01"));
        assert_eq!(end, date("2023-12-31"));
    }
}
