use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Archived one-time fees are kept for this many days
pub const ARCHIVE_RETENTION_DAYS: i64 = 3 * 30;

/// Dates before which entries count as outdated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutdatedCutoffs {
    /// Participations that ended before this date
    pub participation_until: NaiveDate,
    /// Members that left before this date
    pub member_exit: NaiveDate,
    /// Archived one-time fees billed before this instant
    pub archived_billed: DateTime<Utc>,
}

pub fn outdated_cutoffs(today: NaiveDate) -> OutdatedCutoffs {
    let retention_start = today - Duration::days(ARCHIVE_RETENTION_DAYS);

    OutdatedCutoffs {
        participation_until: today,
        member_exit: today,
        archived_billed: retention_start
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoffs() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let cutoffs = outdated_cutoffs(today);

        assert_eq!(cutoffs.participation_until, today);
        assert_eq!(cutoffs.member_exit, today);
        assert_eq!(
            cutoffs.archived_billed.date_naive(),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
    }
}
