use chrono::NaiveDate;

use crate::models::{Member, Participation};

/// Whether `member` belongs to the club at `date`
///
/// The entry date counts as a membership day, the exit date does not.
#[inline]
pub fn is_active(member: &Member, date: NaiveDate) -> bool {
    if member.entry_date > date {
        return false;
    }

    match member.exit_date {
        None => true,
        Some(exit) => exit > date,
    }
}

/// Whether a session participation is running at `date`
#[inline]
pub fn participation_active(participation: &Participation, date: NaiveDate) -> bool {
    participation.since <= date && participation.until.map_or(true, |until| until > date)
}
