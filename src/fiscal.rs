use crate::error::{CogsError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weeks per period in a 4-4-5 fiscal year.
pub const PERIOD_WEEK_PATTERN: [u32; 12] = [4, 4, 5, 4, 4, 5, 4, 4, 5, 4, 4, 5];

/// Business weeks run Wednesday through Tuesday.
pub const BUSINESS_WEEK_START: Weekday = Weekday::Wed;

/// Widest date range the accounting API accepts in one transaction query.
pub const MAX_UPSTREAM_RANGE_DAYS: i64 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FiscalPeriod {
    pub fiscal_year: i32,
    /// 1 through 12.
    pub number: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub weeks: u32,
}

impl FiscalPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn business_weeks(&self) -> Vec<BusinessWeek> {
        business_weeks_for_period(self)
    }

    /// Short label used for cache keys and log lines, e.g. `FY2026_P1`.
    pub fn key(&self) -> String {
        format!("FY{}_P{}", self.fiscal_year, self.number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BusinessWeek {
    /// 0-based position within the period.
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BusinessWeek {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Builds the twelve 4-4-5 periods of a fiscal year starting on `start`.
pub fn periods_for_fiscal_year(fiscal_year: i32, start: NaiveDate) -> Vec<FiscalPeriod> {
    let mut periods = Vec::with_capacity(PERIOD_WEEK_PATTERN.len());
    let mut current = start;

    for (i, weeks) in PERIOD_WEEK_PATTERN.iter().enumerate() {
        let end = current + Duration::days(i64::from(*weeks) * 7 - 1);
        periods.push(FiscalPeriod {
            fiscal_year,
            number: i as u32 + 1,
            start: current,
            end,
            weeks: *weeks,
        });
        current = end + Duration::days(1);
    }

    periods
}

/// Finds the period containing `date`, scanning the newest fiscal year first.
pub fn period_containing(
    date: NaiveDate,
    fiscal_year_starts: &BTreeMap<i32, NaiveDate>,
) -> Option<FiscalPeriod> {
    fiscal_year_starts
        .iter()
        .rev()
        .flat_map(|(year, start)| periods_for_fiscal_year(*year, *start))
        .find(|p| p.contains(date))
}

/// Splits a period into consecutive 7-day spans, truncating the last one at
/// the period end.
pub fn business_weeks_for_period(period: &FiscalPeriod) -> Vec<BusinessWeek> {
    let mut weeks = Vec::new();
    let mut current = period.start;

    while current <= period.end {
        let end = (current + Duration::days(6)).min(period.end);
        weeks.push(BusinessWeek {
            index: weeks.len(),
            start: current,
            end,
        });
        current = end + Duration::days(1);
    }

    weeks
}

/// The Wednesday on or before `date`.
pub fn week_start_containing(date: NaiveDate) -> NaiveDate {
    let weekday = i64::from(date.weekday().num_days_from_monday());
    let wednesday = i64::from(BUSINESS_WEEK_START.num_days_from_monday());
    date - Duration::days((weekday - wednesday).rem_euclid(7))
}

/// The period a run on `as_of` should report.
///
/// On the first day of a period nothing in it is complete yet, so the
/// previous period is reported instead.
pub fn reporting_period(
    as_of: NaiveDate,
    fiscal_year_starts: &BTreeMap<i32, NaiveDate>,
) -> Result<FiscalPeriod> {
    let current = period_containing(as_of, fiscal_year_starts)
        .ok_or_else(|| CogsError::PeriodNotFound(as_of.to_string()))?;

    if as_of != current.start {
        return Ok(current);
    }

    let previous_day = as_of - Duration::days(1);
    period_containing(previous_day, fiscal_year_starts)
        .ok_or_else(|| CogsError::PeriodNotFound(previous_day.to_string()))
}

/// Splits `[start, end]` into inclusive chunks of at most `max_days` days.
pub fn chunk_date_range(
    start: NaiveDate,
    end: NaiveDate,
    max_days: i64,
) -> Vec<(NaiveDate, NaiveDate)> {
    let mut chunks = Vec::new();
    if max_days < 1 {
        return chunks;
    }

    let mut current = start;
    while current <= end {
        let chunk_end = (current + Duration::days(max_days - 1)).min(end);
        chunks.push((current, chunk_end));
        current = chunk_end + Duration::days(1);
    }

    chunks
}

/// Reduces an upstream timestamp such as `2026-01-27T00:00:00Z` to the
/// calendar date as written. Zone suffixes are ignored, not converted.
pub fn parse_upstream_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let invalid = || CogsError::DateError(format!("Unparseable upstream date: '{}'", raw));

    let date_part = trimmed.get(..10).ok_or_else(invalid)?;
    let rest = &trimmed[10..];
    if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn starts() -> BTreeMap<i32, NaiveDate> {
        let mut starts = BTreeMap::new();
        starts.insert(2025, date(2025, 1, 1));
        starts.insert(2026, date(2025, 12, 31));
        starts
    }

    #[test]
    fn test_periods_partition_the_year() {
        let periods = periods_for_fiscal_year(2026, date(2025, 12, 31));
        assert_eq!(periods.len(), 12);
        assert_eq!(periods[0].start, date(2025, 12, 31));
        assert_eq!(periods[0].end, date(2026, 1, 27));
        assert_eq!(periods[2].weeks, 5);

        let total: i64 = periods.iter().map(|p| p.num_days()).sum();
        assert_eq!(total, 364);

        for pair in periods.windows(2) {
            assert_eq!(pair[0].end + Duration::days(1), pair[1].start);
        }
        assert_eq!(periods[11].end, date(2025, 12, 31) + Duration::days(363));
    }

    #[test]
    fn test_every_day_maps_to_exactly_one_period() {
        let fy_start = date(2025, 12, 31);
        let periods = periods_for_fiscal_year(2026, fy_start);
        let starts = starts();

        for offset in 0..364 {
            let day = fy_start + Duration::days(offset);
            let matching = periods.iter().filter(|p| p.contains(day)).count();
            assert_eq!(matching, 1, "day {} matched {} periods", day, matching);

            let found = period_containing(day, &starts).unwrap();
            assert_eq!(found.fiscal_year, 2026);
            assert!(found.contains(day));
        }
    }

    #[test]
    fn test_period_containing_unknown_date() {
        assert!(period_containing(date(2020, 6, 1), &starts()).is_none());
    }

    #[test]
    fn test_business_weeks_cover_period_once() {
        for period in periods_for_fiscal_year(2026, date(2025, 12, 31)) {
            let weeks = business_weeks_for_period(&period);
            assert_eq!(weeks.len() as u32, period.weeks);
            assert_eq!(weeks[0].start, period.start);
            assert_eq!(weeks[0].start.weekday(), Weekday::Wed);
            assert_eq!(weeks.last().unwrap().end, period.end);

            let mut expected = period.start;
            for week in &weeks {
                assert_eq!(week.start, expected);
                expected = week.end + Duration::days(1);
            }
            let days: i64 = weeks.iter().map(|w| w.num_days()).sum();
            assert_eq!(days, period.num_days());
        }
    }

    #[test]
    fn test_truncated_final_week() {
        let period = FiscalPeriod {
            fiscal_year: 2026,
            number: 1,
            start: date(2025, 12, 31),
            end: date(2026, 1, 10),
            weeks: 2,
        };
        let weeks = business_weeks_for_period(&period);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[1].start, date(2026, 1, 7));
        assert_eq!(weeks[1].end, date(2026, 1, 10));
        assert_eq!(weeks[1].num_days(), 4);
    }

    #[test]
    fn test_week_start_containing() {
        // 2026-01-27 is a Tuesday
        assert_eq!(week_start_containing(date(2026, 1, 27)), date(2026, 1, 21));
        assert_eq!(week_start_containing(date(2026, 1, 21)), date(2026, 1, 21));
        assert_eq!(week_start_containing(date(2026, 1, 22)), date(2026, 1, 21));
        assert_eq!(week_start_containing(date(2026, 1, 26)), date(2026, 1, 21));
    }

    #[test]
    fn test_reporting_period_falls_back_on_first_day() {
        let starts = starts();
        let p2_start = date(2026, 1, 28);

        let on_first_day = reporting_period(p2_start, &starts).unwrap();
        assert_eq!(on_first_day.number, 1);

        let next_day = reporting_period(p2_start + Duration::days(1), &starts).unwrap();
        assert_eq!(next_day.number, 2);

        // first day of FY2026 falls back into FY2025 P12
        let fy_boundary = reporting_period(date(2025, 12, 31), &starts).unwrap();
        assert_eq!(fy_boundary.fiscal_year, 2025);
        assert_eq!(fy_boundary.number, 12);
    }

    #[test]
    fn test_chunk_date_range() {
        let chunks = chunk_date_range(date(2026, 1, 1), date(2026, 3, 5), MAX_UPSTREAM_RANGE_DAYS);
        assert_eq!(chunks[0], (date(2026, 1, 1), date(2026, 1, 31)));
        assert_eq!(chunks[1], (date(2026, 2, 1), date(2026, 3, 3)));
        assert_eq!(chunks[2], (date(2026, 3, 4), date(2026, 3, 5)));
        for (start, end) in &chunks {
            assert!((*end - *start).num_days() + 1 <= MAX_UPSTREAM_RANGE_DAYS);
        }

        assert!(chunk_date_range(date(2026, 1, 2), date(2026, 1, 1), 31).is_empty());
    }

    #[test]
    fn test_parse_upstream_date() {
        assert_eq!(
            parse_upstream_date("2026-01-27T00:00:00Z").unwrap(),
            date(2026, 1, 27)
        );
        assert_eq!(
            parse_upstream_date("2026-01-27T23:59:59-06:00").unwrap(),
            date(2026, 1, 27)
        );
        assert_eq!(parse_upstream_date("2026-01-27").unwrap(), date(2026, 1, 27));
        assert!(parse_upstream_date("").is_err());
        assert!(parse_upstream_date("01/27/2026").is_err());
        assert!(parse_upstream_date("2026-01-27junk").is_err());
    }
}
