use chrono::NaiveDate;
use thiserror::Error;

use crate::core::{
    active::{is_active, participation_active},
    relations::RelationGraph,
    time::age_at,
};
use crate::models::{
    Amount, ClubSnapshot, FeeReport, Member, ADULT_AGE, BASIC_FEE_ADULTS_KEY,
    BASIC_FEE_YOUTHS_KEY,
};

/// Errors that can occur while computing fees
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    #[error("No fixed cost known with key '{0}'")]
    MissingFixedCost(String),

    #[error("Unknown member id {0}")]
    UnknownMember(i64),
}

/// Share of the second most expensive session that is charged
const SECOND_SESSION_SHARE: (i64, i64) = (3, 4);

/// Compute the monthly fee of a member at `target_date`
///
/// Fee rules:
/// 1. Members that are not active at the target date pay nothing.
/// 2. A fee override replaces the computed fee.
/// 3. Base fee depending on age (youths < 18 years).
/// 4. The most expensive active session is paid fully, the second one at
///    75 %, all further sessions are free.
/// 5. Among related youths the one with the highest fee pays fully, all
///    others pay half. Ties are broken by name, then by id.
pub fn compute_monthly_fee(
    snapshot: &ClubSnapshot,
    member_id: i64,
    target_date: NaiveDate,
    account_for_siblings: bool,
) -> Result<Amount, FeeError> {
    let member = snapshot
        .member(member_id)
        .ok_or(FeeError::UnknownMember(member_id))?;

    if !is_active(member, target_date) {
        return Ok(Amount::ZERO);
    }

    if let Some(amount) = snapshot.fee_override(member_id) {
        return Ok(amount);
    }

    let youth = is_youth(member, target_date);

    let mut fee = base_fee(snapshot, youth)?;
    fee += session_fees(snapshot, member_id, target_date);

    if account_for_siblings && youth {
        fee = apply_sibling_discount(snapshot, member, fee, target_date)?;
    }

    tracing::trace!("Monthly fee of member {} at {}: {}", member_id, target_date, fee);

    Ok(fee)
}

/// Monthly fee plus all outstanding one-time fees
///
/// One-time fees are due even if the member has already left the club.
pub fn compute_total_fee(
    snapshot: &ClubSnapshot,
    member_id: i64,
    target_date: NaiveDate,
) -> Result<Amount, FeeError> {
    Ok(fee_report(snapshot, member_id, target_date)?.total)
}

/// Fee breakdown of a member at `target_date`
pub fn fee_report(
    snapshot: &ClubSnapshot,
    member_id: i64,
    target_date: NaiveDate,
) -> Result<FeeReport, FeeError> {
    let member = snapshot
        .member(member_id)
        .ok_or(FeeError::UnknownMember(member_id))?;

    let monthly_fee = compute_monthly_fee(snapshot, member_id, target_date, true)?;
    let one_time_fees: Amount = snapshot
        .one_time_fees_of(member_id)
        .map(|f| f.amount)
        .sum();

    Ok(FeeReport {
        member_id,
        name: member.full_name(),
        target_date,
        monthly_fee,
        one_time_fees,
        total: monthly_fee + one_time_fees,
    })
}

#[inline]
fn is_youth(member: &Member, date: NaiveDate) -> bool {
    age_at(member.birthday, date) < ADULT_AGE
}

fn base_fee(snapshot: &ClubSnapshot, youth: bool) -> Result<Amount, FeeError> {
    let key = if youth {
        BASIC_FEE_YOUTHS_KEY
    } else {
        BASIC_FEE_ADULTS_KEY
    };

    snapshot
        .fixed_cost(key)
        .ok_or_else(|| FeeError::MissingFixedCost(key.to_string()))
}

fn session_fees(snapshot: &ClubSnapshot, member_id: i64, date: NaiveDate) -> Amount {
    let mut fees: Vec<Amount> = snapshot
        .participations_of(member_id)
        .filter(|p| participation_active(p, date))
        .filter_map(|p| snapshot.session(p.session_id))
        .map(|s| s.membership_fee)
        .collect();

    fees.sort_unstable_by(|a, b| b.cmp(a));

    let mut total = Amount::ZERO;
    if let Some(&most_expensive) = fees.first() {
        total += most_expensive;
    }
    if let Some(&second) = fees.get(1) {
        total += second.scale(SECOND_SESSION_SHARE.0, SECOND_SESSION_SHARE.1);
    }

    total
}

fn apply_sibling_discount(
    snapshot: &ClubSnapshot,
    member: &Member,
    fee: Amount,
    date: NaiveDate,
) -> Result<Amount, FeeError> {
    let graph = RelationGraph::new(snapshot.relations());

    let mut siblings: Vec<(&Member, Amount)> = Vec::new();
    for relative_id in graph.relatives(member.id) {
        let Some(relative) = snapshot.member(relative_id) else {
            continue;
        };
        if !is_active(relative, date) || !is_youth(relative, date) {
            continue;
        }

        let relative_fee = compute_monthly_fee(snapshot, relative_id, date, false)?;
        siblings.push((relative, relative_fee));
    }

    let Some(max_fee) = siblings.iter().map(|(_, f)| *f).max() else {
        return Ok(fee);
    };

    if max_fee > fee {
        return Ok(fee.half());
    }

    if max_fee == fee {
        // Tie: exactly one of the candidates has to pay the full fee
        let full_payer = siblings
            .iter()
            .filter(|(_, f)| *f == fee)
            .map(|(m, _)| *m)
            .chain(std::iter::once(member))
            .min_by(|a, b| {
                sort_name(a)
                    .cmp(&sort_name(b))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|m| m.id);

        if full_payer != Some(member.id) {
            return Ok(fee.half());
        }
    }

    Ok(fee)
}

fn sort_name(member: &Member) -> String {
    format!("{}{}", member.first_name, member.last_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, OneTimeFee, Participation, Relation, TrainingSession};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn member(id: i64, first_name: &str, birthday: NaiveDate) -> Member {
        Member {
            id,
            first_name: first_name.to_string(),
            last_name: "Smoldriski".to_string(),
            gender: Gender::Diverse,
            birthday,
            entry_date: date(2020, 1, 1),
            exit_date: None,
            street: "Main street".to_string(),
            street_number: "1".to_string(),
            postal_code: "12345".to_string(),
            city: "Smalltown".to_string(),
            phone_number: None,
            email_address: None,
            iban: "DE89370400440532013000".to_string(),
            bic: "COBADEFFXXX".to_string(),
            account_owner: "Parent".to_string(),
            sepa_mandate_date: Some(date(2020, 1, 1)),
        }
    }

    fn snapshot() -> ClubSnapshot {
        ClubSnapshot::new()
            .with_fixed_cost(BASIC_FEE_ADULTS_KEY, Amount::from_euros(5))
            .with_fixed_cost(BASIC_FEE_YOUTHS_KEY, Amount::from_euros(4))
            .with_session(TrainingSession {
                id: 1,
                name: "Expensive".to_string(),
                membership_fee: Amount::from_euros(20),
            })
            .with_session(TrainingSession {
                id: 2,
                name: "Medium".to_string(),
                membership_fee: Amount::from_euros(10),
            })
            .with_session(TrainingSession {
                id: 3,
                name: "Cheap".to_string(),
                membership_fee: Amount::from_euros(8),
            })
    }

    fn join(snapshot: &mut ClubSnapshot, member_id: i64, session_id: i64) {
        snapshot.add_participation(Participation {
            member_id,
            session_id,
            since: date(2020, 1, 1),
            until: None,
        });
    }

    const TODAY: (i32, u32, u32) = (2024, 6, 1);

    fn today() -> NaiveDate {
        date(TODAY.0, TODAY.1, TODAY.2)
    }

    #[test]
    fn test_adult_base_fee_only() {
        let snapshot = snapshot().with_member(member(1, "Adam", date(1980, 1, 1)));
        let fee = compute_monthly_fee(&snapshot, 1, today(), true).unwrap();
        assert_eq!(fee, Amount::from_euros(5));
    }

    #[test]
    fn test_youth_turns_adult_on_birthday() {
        let snapshot = snapshot().with_member(member(1, "Yara", date(2006, 6, 1)));
        assert_eq!(
            compute_monthly_fee(&snapshot, 1, date(2024, 5, 31), true).unwrap(),
            Amount::from_euros(4)
        );
        assert_eq!(
            compute_monthly_fee(&snapshot, 1, today(), true).unwrap(),
            Amount::from_euros(5)
        );
    }

    #[test]
    fn test_session_fee_tiers() {
        let mut snapshot = snapshot().with_member(member(1, "Adam", date(1980, 1, 1)));
        join(&mut snapshot, 1, 3);
        join(&mut snapshot, 1, 1);
        join(&mut snapshot, 1, 2);

        // 5 + 20 + 0.75 * 10, third session free
        let fee = compute_monthly_fee(&snapshot, 1, today(), true).unwrap();
        assert_eq!(fee, Amount::from_cents(3250));
    }

    #[test]
    fn test_ended_participation_is_not_charged() {
        let mut snapshot = snapshot().with_member(member(1, "Adam", date(1980, 1, 1)));
        snapshot.add_participation(Participation {
            member_id: 1,
            session_id: 1,
            since: date(2020, 1, 1),
            until: Some(date(2024, 1, 1)),
        });

        let fee = compute_monthly_fee(&snapshot, 1, today(), true).unwrap();
        assert_eq!(fee, Amount::from_euros(5));
    }

    #[test]
    fn test_inactive_member_pays_no_monthly_fee() {
        let mut former = member(1, "Adam", date(1980, 1, 1));
        former.exit_date = Some(date(2023, 12, 31));
        let mut snapshot = snapshot().with_member(former);
        snapshot.add_one_time_fee(OneTimeFee {
            id: 1,
            member_id: 1,
            reason: "Jersey".to_string(),
            amount: Amount::from_cents(2500),
        });

        assert_eq!(
            compute_monthly_fee(&snapshot, 1, today(), true).unwrap(),
            Amount::ZERO
        );
        // Outstanding one-time fees are still due
        assert_eq!(
            compute_total_fee(&snapshot, 1, today()).unwrap(),
            Amount::from_cents(2500)
        );
    }

    #[test]
    fn test_fee_override_replaces_computed_fee() {
        let mut snapshot = snapshot().with_member(member(1, "Adam", date(1980, 1, 1)));
        join(&mut snapshot, 1, 1);
        snapshot.add_fee_override(crate::models::FeeOverride {
            member_id: 1,
            amount: Amount::from_euros(1),
        });

        let fee = compute_monthly_fee(&snapshot, 1, today(), true).unwrap();
        assert_eq!(fee, Amount::from_euros(1));
    }

    #[test]
    fn test_sibling_with_lower_fee_pays_half() {
        let mut snapshot = snapshot()
            .with_member(member(1, "Sally", date(2012, 1, 1)))
            .with_member(member(2, "Sam", date(2014, 1, 1)));
        join(&mut snapshot, 1, 1);
        join(&mut snapshot, 2, 2);
        snapshot.add_relation(Relation::normalized(1, 2));

        // Sally: 4 + 20 = 24 (full), Sam: (4 + 10) / 2 = 7
        assert_eq!(
            compute_monthly_fee(&snapshot, 1, today(), true).unwrap(),
            Amount::from_euros(24)
        );
        assert_eq!(
            compute_monthly_fee(&snapshot, 2, today(), true).unwrap(),
            Amount::from_euros(7)
        );
    }

    #[test]
    fn test_sibling_tie_is_broken_by_name() {
        let mut snapshot = snapshot()
            .with_member(member(1, "Sam", date(2012, 1, 1)))
            .with_member(member(2, "Sally", date(2014, 1, 1)));
        join(&mut snapshot, 1, 2);
        join(&mut snapshot, 2, 2);
        snapshot.add_relation(Relation::normalized(1, 2));

        // Equal fees of 14: "SallySmoldriski" < "SamSmoldriski"
        assert_eq!(
            compute_monthly_fee(&snapshot, 2, today(), true).unwrap(),
            Amount::from_euros(14)
        );
        assert_eq!(
            compute_monthly_fee(&snapshot, 1, today(), true).unwrap(),
            Amount::from_euros(7)
        );
    }

    #[test]
    fn test_adult_relatives_do_not_reduce_fee() {
        let mut snapshot = snapshot()
            .with_member(member(1, "Kid", date(2012, 1, 1)))
            .with_member(member(2, "Parent", date(1980, 1, 1)));
        join(&mut snapshot, 2, 1);
        snapshot.add_relation(Relation::normalized(1, 2));

        assert_eq!(
            compute_monthly_fee(&snapshot, 1, today(), true).unwrap(),
            Amount::from_euros(4)
        );
    }

    #[test]
    fn test_missing_fixed_cost() {
        let snapshot = ClubSnapshot::new().with_member(member(1, "Adam", date(1980, 1, 1)));
        assert_eq!(
            compute_monthly_fee(&snapshot, 1, today(), true),
            Err(FeeError::MissingFixedCost(BASIC_FEE_ADULTS_KEY.to_string()))
        );
    }

    #[test]
    fn test_unknown_member() {
        assert_eq!(
            compute_total_fee(&snapshot(), 42, today()),
            Err(FeeError::UnknownMember(42))
        );
    }
}
