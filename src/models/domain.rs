use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::Amount;

/// Fixed cost names used by the fee rules
pub const ADMISSION_FEE_KEY: &str = "admission_fee";
pub const BASIC_FEE_ADULTS_KEY: &str = "basic_fee_adults";
pub const BASIC_FEE_YOUTHS_KEY: &str = "basic_fee_youths";

/// Members below this age (in full years) pay the youth rates
pub const ADULT_AGE: i32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Diverse,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Diverse => "diverse",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "diverse" | "d" => Ok(Gender::Diverse),
            other => Err(format!("Unknown gender '{}'", other)),
        }
    }
}

/// Club member with personal, address and bank data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,

    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birthday: NaiveDate,

    pub entry_date: NaiveDate,
    pub exit_date: Option<NaiveDate>,

    pub street: String,
    pub street_number: String,
    pub postal_code: String,
    pub city: String,

    pub phone_number: Option<String>,
    pub email_address: Option<String>,

    pub iban: String,
    pub bic: String,
    pub account_owner: String,
    /// Date the SEPA direct-debit mandate was signed; members without one
    /// are never debited
    pub sepa_mandate_date: Option<NaiveDate>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A regular training session members can take part in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSession {
    pub id: i64,
    pub name: String,
    pub membership_fee: Amount,
}

impl fmt::Display for TrainingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub member_id: i64,
    pub session_id: i64,
    pub since: NaiveDate,
    pub until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trainer {
    pub member_id: i64,
    pub session_id: i64,
}

/// Undirected family relation between two members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub first_id: i64,
    pub second_id: i64,
}

impl Relation {
    /// Relation with the smaller id first
    pub fn normalized(a: i64, b: i64) -> Self {
        Self {
            first_id: a.min(b),
            second_id: a.max(b),
        }
    }

    pub fn involves(&self, member_id: i64) -> bool {
        self.first_id == member_id || self.second_id == member_id
    }

    /// The other end of the relation, if `member_id` is part of it
    pub fn other(&self, member_id: i64) -> Option<i64> {
        if self.first_id == member_id {
            Some(self.second_id)
        } else if self.second_id == member_id {
            Some(self.first_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedCost {
    pub id: i64,
    pub name: String,
    pub cost: Amount,
}

/// Outstanding charge that is collected with the next tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeFee {
    pub id: i64,
    pub member_id: i64,
    pub reason: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedOneTimeFee {
    pub id: i64,
    pub member_id: i64,
    pub reason: String,
    pub amount: Amount,
    pub billed: DateTime<Utc>,
}

/// Replaces the computed monthly fee of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOverride {
    pub member_id: i64,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub value: String,
}

impl Setting {
    pub const TALLY_E2E_ID_TEMPLATE: &'static str = "tally_end_to_end_template";
    pub const TALLY_PURPOSE: &'static str = "tally_purpose";
    pub const TALLY_CREDITOR_NAME: &'static str = "tally_creditor_name";
    pub const TALLY_CREDITOR_IBAN: &'static str = "tally_creditor_iban";
    pub const TALLY_CREDITOR_BIC: &'static str = "tally_creditor_bic";
    pub const TALLY_CREDITOR_ID: &'static str = "tally_creditor_identification";

    // Club data for association reports
    pub const CLUB_NUMBER: &'static str = "club_number";
    pub const CLUB_NAME: &'static str = "club_name";
    pub const CLUB_CONTACT_PERSON: &'static str = "club_contact_person";
    pub const CLUB_ASSOCIATION_NUMERIC: &'static str = "club_association_numeric";
}

/// A generated direct-debit message as stored in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub id: i64,
    pub creation_time: DateTime<Utc>,
    pub collection_date: NaiveDate,
    pub total_amount: Amount,
    pub compressed_contents: Vec<u8>,
}

impl Tally {
    /// zlib-compress the rendered message
    pub fn compress(contents: &str) -> std::io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents.as_bytes())?;
        encoder.finish()
    }

    /// Decompress the stored message
    pub fn contents(&self) -> std::io::Result<String> {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let mut decoder = ZlibDecoder::new(self.compressed_contents.as_slice());
        let mut contents = String::new();
        decoder.read_to_string(&mut contents)?;
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_normalized() {
        let relation = Relation::normalized(7, 3);
        assert_eq!(relation.first_id, 3);
        assert_eq!(relation.second_id, 7);
        assert_eq!(relation.other(3), Some(7));
        assert_eq!(relation.other(7), Some(3));
        assert_eq!(relation.other(5), None);
    }

    #[test]
    fn test_gender_parsing() {
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("m".parse::<Gender>().unwrap(), Gender::Male);
        assert!("unknown".parse::<Gender>().is_err());
    }

    #[test]
    fn test_tally_contents_compression() {
        let xml = "<Document>Größe</Document>";
        let tally = Tally {
            id: 1,
            creation_time: Utc::now(),
            collection_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            total_amount: Amount::from_cents(100),
            compressed_contents: Tally::compress(xml).unwrap(),
        };

        assert_ne!(tally.compressed_contents, xml.as_bytes());
        assert_eq!(tally.contents().unwrap(), xml);
    }
}
