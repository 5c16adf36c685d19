//! Calendar arithmetic for obligation cadences
//!
//! Occurrences are computed from the starting date rather than chained from
//! the previous occurrence, so a bill due on the 31st lands on Feb 29 and
//! then back on Mar 31 instead of drifting to the 29th for good.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};

use crate::models::{Cadence, CadenceAnchor, Frequency, WeekOrdinal};

/// Number of days in a month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

/// The given day in a month, clamped to the month's length
pub fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, days_in_month(year, month)))
}

/// Find the ordinal occurrence of a weekday in a month
///
/// Scans every day of the month; `Last` is whichever occurrence comes last,
/// the 4th or the 5th.
pub fn weekday_in_month(
    year: i32,
    month: u32,
    ordinal: WeekOrdinal,
    weekday: Weekday,
) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let matching: Vec<NaiveDate> = first
        .iter_days()
        .take_while(|d| d.month() == month)
        .filter(|d| d.weekday() == weekday)
        .collect();

    let found = match ordinal {
        WeekOrdinal::First => matching.first(),
        WeekOrdinal::Second => matching.get(1),
        WeekOrdinal::Third => matching.get(2),
        WeekOrdinal::Fourth => matching.get(3),
        WeekOrdinal::Last => matching.last(),
    };
    found.copied()
}

/// Months per period for month-based frequencies
fn months_per_period(frequency: Frequency) -> Option<u32> {
    match frequency {
        Frequency::Monthly => Some(1),
        Frequency::Quarterly => Some(3),
        Frequency::Yearly => Some(12),
        Frequency::Weekly | Frequency::Biweekly => None,
    }
}

/// The date `periods` cadence periods after `start`
///
/// Period zero is `start` itself. Returns None only when the result falls
/// outside the supported calendar range.
pub fn advance(start: NaiveDate, cadence: &Cadence, periods: u32) -> Option<NaiveDate> {
    if periods == 0 {
        return Some(start);
    }

    let step_days = match cadence.frequency {
        Frequency::Weekly => Some(7),
        Frequency::Biweekly => Some(14),
        _ => None,
    };
    if let Some(step) = step_days {
        return start.checked_add_signed(Duration::days(i64::from(step) * i64::from(periods)));
    }

    let months = months_per_period(cadence.frequency)?.checked_mul(periods)?;

    // Yearly keeps its calendar date; Feb 29 clamps to Feb 28
    if cadence.frequency == Frequency::Yearly {
        return start.checked_add_months(Months::new(months));
    }

    let target = start.with_day(1)?.checked_add_months(Months::new(months))?;
    match cadence.anchor {
        Some(CadenceAnchor::DayOfMonth(day)) => clamped_day(target.year(), target.month(), day),
        Some(CadenceAnchor::Weekday { ordinal, weekday }) => {
            weekday_in_month(target.year(), target.month(), ordinal, weekday)
        }
        None => clamped_day(target.year(), target.month(), start.day()),
    }
}

/// Every occurrence date from `start` onward, in order
pub fn occurrence_dates(start: NaiveDate, cadence: Cadence) -> impl Iterator<Item = NaiveDate> {
    (0u32..).map_while(move |k| advance(start, &cadence, k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn take(start: NaiveDate, cadence: Cadence, n: usize) -> Vec<NaiveDate> {
        occurrence_dates(start, cadence).take(n).collect()
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 4), 30);
    }

    #[test]
    fn test_weekly_and_biweekly() {
        let start = date(2024, 1, 5);
        assert_eq!(
            take(start, Cadence::new(Frequency::Weekly), 3),
            vec![date(2024, 1, 5), date(2024, 1, 12), date(2024, 1, 19)]
        );
        assert_eq!(
            take(start, Cadence::new(Frequency::Biweekly), 3),
            vec![date(2024, 1, 5), date(2024, 1, 19), date(2024, 2, 2)]
        );
    }

    #[test]
    fn test_monthly_keeps_start_day() {
        assert_eq!(
            take(date(2024, 1, 31), Cadence::new(Frequency::Monthly), 4),
            vec![
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30)
            ]
        );
    }

    #[test]
    fn test_monthly_day_anchor_clamps() {
        let cadence = Cadence::monthly_on_day(31);
        assert_eq!(
            take(date(2023, 1, 31), cadence, 3),
            vec![date(2023, 1, 31), date(2023, 2, 28), date(2023, 3, 31)]
        );

        // The anchor wins over the start date's own day after the first period
        let cadence = Cadence::monthly_on_day(1);
        assert_eq!(advance(date(2024, 1, 15), &cadence, 1), Some(date(2024, 2, 1)));
    }

    #[test]
    fn test_quarterly() {
        assert_eq!(
            take(date(2024, 1, 15), Cadence::new(Frequency::Quarterly), 3),
            vec![date(2024, 1, 15), date(2024, 4, 15), date(2024, 7, 15)]
        );
    }

    #[test]
    fn test_yearly_leap_day_clamps() {
        let cadence = Cadence::new(Frequency::Yearly);
        assert_eq!(advance(date(2024, 2, 29), &cadence, 1), Some(date(2025, 2, 28)));
        assert_eq!(advance(date(2024, 2, 29), &cadence, 4), Some(date(2028, 2, 29)));
    }

    #[test]
    fn test_last_weekday_takes_fifth_when_present() {
        // March 2024 has five Fridays, February 2024 has four
        assert_eq!(
            weekday_in_month(2024, 3, WeekOrdinal::Last, Weekday::Fri),
            Some(date(2024, 3, 29))
        );
        assert_eq!(
            weekday_in_month(2024, 2, WeekOrdinal::Last, Weekday::Fri),
            Some(date(2024, 2, 23))
        );
        assert_eq!(
            weekday_in_month(2024, 3, WeekOrdinal::Fourth, Weekday::Fri),
            Some(date(2024, 3, 22))
        );
    }

    #[test]
    fn test_monthly_weekday_anchor() {
        let cadence = Cadence::monthly_on_weekday(WeekOrdinal::Second, Weekday::Tue);
        assert_eq!(
            take(date(2024, 1, 9), cadence, 3),
            vec![date(2024, 1, 9), date(2024, 2, 13), date(2024, 3, 12)]
        );
    }
}
