use chrono::{Duration, NaiveDate};

use crate::core::{
    active::{is_active, participation_active},
    time::age_at,
};
use crate::models::{ClubSnapshot, MemberCounts, RosterEntry, SessionRoster};

/// Active members currently taking part in a session
///
/// Sorted by last name, first name and id. Returns `None` for unknown
/// sessions.
pub fn session_roster(
    snapshot: &ClubSnapshot,
    session_id: i64,
    date: NaiveDate,
) -> Option<SessionRoster> {
    let session = snapshot.session(session_id)?;

    let mut members: Vec<RosterEntry> = snapshot
        .participants_of(session_id)
        .filter(|p| participation_active(p, date))
        .filter_map(|p| snapshot.member(p.member_id))
        .filter(|m| is_active(m, date))
        .map(|m| RosterEntry {
            member_id: m.id,
            last_name: m.last_name.clone(),
            first_name: m.first_name.clone(),
            age: age_at(m.birthday, date),
        })
        .collect();

    members.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then_with(|| a.first_name.cmp(&b.first_name))
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    members.dedup_by_key(|m| m.member_id);

    Some(SessionRoster {
        session_id,
        session_name: session.name.clone(),
        membership_fee: session.membership_fee,
        members,
    })
}

/// Active members at `date` and joins/leaves within `(date - window, date]`
///
/// Windows reaching past the earliest representable date count everything
/// up to `date`.
pub fn member_counts(snapshot: &ClubSnapshot, date: NaiveDate, window: Duration) -> MemberCounts {
    let window_start = date.checked_sub_signed(window).unwrap_or(NaiveDate::MIN);
    let in_window = |d: NaiveDate| d > window_start && d <= date;

    let mut counts = MemberCounts {
        date,
        active: 0,
        joins: 0,
        leaves: 0,
    };

    for member in snapshot.members() {
        if is_active(member, date) {
            counts.active += 1;
        }
        if in_window(member.entry_date) {
            counts.joins += 1;
        }
        if member.exit_date.is_some_and(in_window) {
            counts.leaves += 1;
        }
    }

    counts
}

/// Member counts sampled every `step` from `since` up to and including `until`
pub fn member_history(
    snapshot: &ClubSnapshot,
    since: NaiveDate,
    until: NaiveDate,
    step: Duration,
) -> Vec<MemberCounts> {
    let mut history = Vec::new();
    if step <= Duration::zero() {
        return history;
    }

    let mut current = since;
    while current <= until {
        history.push(member_counts(snapshot, current, step));
        match current.checked_add_signed(step) {
            Some(next) => current = next,
            None => break,
        }
    }

    history
}
