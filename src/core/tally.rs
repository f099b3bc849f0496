use chrono::{DateTime, NaiveDate, Utc};

use crate::core::{
    fees::{compute_total_fee, FeeError},
    sepa::{Asset, Debitor},
};
use crate::models::ClubSnapshot;

/// Assets of a regular monthly tally
#[derive(Debug, Clone, Default)]
pub struct MonthlyAssets {
    pub assets: Vec<Asset>,
    /// Members whose one-time fees are part of the tally and must be archived
    pub billed_members: Vec<i64>,
}

/// Collect the total fee of every member with a SEPA mandate
///
/// Members are visited by ascending id; members that owe nothing are
/// skipped.
pub fn assemble_monthly_fee_assets(
    snapshot: &ClubSnapshot,
    collection_date: NaiveDate,
    e2e_id_template: &str,
    purpose: &str,
) -> Result<MonthlyAssets, FeeError> {
    let mut result = MonthlyAssets::default();

    for member in snapshot.members().filter(|m| m.sepa_mandate_date.is_some()) {
        let fee = compute_total_fee(snapshot, member.id, collection_date)?;

        if fee.is_negative() || fee.is_zero() {
            continue;
        }

        if snapshot.one_time_fees_of(member.id).next().is_some() {
            result.billed_members.push(member.id);
        }

        result.assets.push(Asset {
            debitor: Debitor::from(member),
            purpose: purpose.to_string(),
            amount: fee,
            e2e_id: e2e_id_template.to_string(),
        });
    }

    tracing::debug!(
        "Assembled {} monthly assets for {}",
        result.assets.len(),
        collection_date
    );

    Ok(result)
}

/// Message id of a tally created at `now`
pub fn message_id(now: DateTime<Utc>) -> String {
    now.format("Memmer-%Y-%m-%d-%H-%M-%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_id() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 7, 8, 9).unwrap();
        assert_eq!(message_id(now), "Memmer-2024-01-05-07-08-09");
    }
}
