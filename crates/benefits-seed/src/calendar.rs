//! Month arithmetic on `time::Date`.

use time::util::days_in_year_month;
use time::{Date, Month};

/// Shifts a date by a signed number of months, clamping the day to the
/// length of the target month.
pub fn add_months(date: Date, months: i32) -> Date {
    let index = date.year() * 12 + (date.month() as i32 - 1) + months;
    let year = index.div_euclid(12);
    let month = month_from_index(index.rem_euclid(12));
    let day = date.day().min(days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

/// First day of the month containing `date`.
pub fn start_of_month(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
pub fn end_of_month(date: Date) -> Date {
    let last = days_in_year_month(date.year(), date.month());
    date.replace_day(last).unwrap_or(date)
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: Date) -> u8 {
    days_in_year_month(date.year(), date.month())
}

fn month_from_index(zero_based: i32) -> Month {
    match zero_based {
        0 => Month::January,
        1 => Month::February,
        2 => Month::March,
        3 => Month::April,
        4 => Month::May,
        5 => Month::June,
        6 => Month::July,
        7 => Month::August,
        8 => Month::September,
        9 => Month::October,
        10 => Month::November,
        _ => Month::December,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_add_months_clamps_day() {
        assert_eq!(add_months(date!(2024 - 01 - 31), 1), date!(2024 - 02 - 29));
        assert_eq!(add_months(date!(2024 - 03 - 15), -3), date!(2023 - 12 - 15));
        assert_eq!(add_months(date!(2024 - 11 - 30), 14), date!(2026 - 01 - 30));
    }

    #[test]
    fn test_month_bounds() {
        let d = date!(2023 - 02 - 11);
        assert_eq!(start_of_month(d), date!(2023 - 02 - 01));
        assert_eq!(end_of_month(d), date!(2023 - 02 - 28));
        assert_eq!(days_in_month(d), 28);
    }
}
