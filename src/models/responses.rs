use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Amount;

/// Fee of a single member at a given date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeReport {
    pub member_id: i64,
    pub name: String,
    pub target_date: NaiveDate,
    pub monthly_fee: Amount,
    pub one_time_fees: Amount,
    pub total: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub member_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub age: i32,
}

/// Active participants of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRoster {
    pub session_id: i64,
    pub session_name: String,
    pub membership_fee: Amount,
    pub members: Vec<RosterEntry>,
}

/// Membership numbers at a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCounts {
    pub date: NaiveDate,
    pub active: usize,
    pub joins: usize,
    pub leaves: usize,
}

/// Stored tally without its contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySummary {
    pub id: i64,
    pub creation_time: DateTime<Utc>,
    pub collection_date: NaiveDate,
    pub total_amount: Amount,
}
