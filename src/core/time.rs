use chrono::{Datelike, NaiveDate};

/// Number of whole years between two dates
///
/// Counts calendar years and subtracts one if `second` falls before the
/// anniversary of `first` in its year. Negative if `second` precedes `first`.
pub fn nominal_year_diff(first: NaiveDate, second: NaiveDate) -> i32 {
    let mut years = second.year() - first.year();

    if (second.month(), second.day()) < (first.month(), first.day()) {
        years -= 1;
    }

    years
}

/// Age in full years at `date`
#[inline]
pub fn age_at(birthday: NaiveDate, date: NaiveDate) -> i32 {
    nominal_year_diff(birthday, date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_positive_differences() {
        assert_eq!(nominal_year_diff(date(2020, 1, 21), date(2023, 5, 4)), 3);
        assert_eq!(nominal_year_diff(date(2020, 6, 21), date(2023, 5, 4)), 2);
        assert_eq!(nominal_year_diff(date(2020, 5, 5), date(2023, 5, 4)), 2);
    }

    #[test]
    fn test_same_year() {
        assert_eq!(nominal_year_diff(date(2020, 5, 4), date(2020, 5, 4)), 0);
        assert_eq!(nominal_year_diff(date(2020, 5, 3), date(2020, 5, 4)), 0);
        assert_eq!(nominal_year_diff(date(2020, 4, 12), date(2020, 5, 4)), 0);
    }

    #[test]
    fn test_negative_differences() {
        assert_eq!(nominal_year_diff(date(2021, 5, 4), date(2020, 5, 4)), -1);
        assert_eq!(nominal_year_diff(date(2020, 6, 8), date(2020, 5, 4)), -1);
        assert_eq!(nominal_year_diff(date(2020, 5, 5), date(2020, 5, 4)), -1);
        assert_eq!(nominal_year_diff(date(2021, 11, 8), date(2020, 5, 4)), -2);
    }

    #[test]
    fn test_leap_day_birthday() {
        // Born on Feb 29th: not yet 1 on Feb 28th of the following year
        assert_eq!(age_at(date(2020, 2, 29), date(2021, 2, 28)), 0);
        assert_eq!(age_at(date(2020, 2, 29), date(2021, 3, 1)), 1);
    }
}
