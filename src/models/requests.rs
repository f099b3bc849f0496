use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Amount, Gender};

/// Member record as read from an import file
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewMember {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    pub gender: Gender,
    pub birthday: NaiveDate,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub exit_date: Option<NaiveDate>,

    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub street_number: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(min = 1))]
    pub city: String,

    #[serde(default)]
    pub phone_number: Option<String>,
    #[validate(email)]
    #[serde(default)]
    pub email_address: Option<String>,

    #[validate(length(min = 15, max = 34))]
    pub iban: String,
    #[validate(length(min = 8, max = 11))]
    pub bic: String,
    #[validate(length(min = 1))]
    pub account_owner: String,
    #[serde(default)]
    pub sepa_mandate_date: Option<NaiveDate>,

    /// Names of the sessions the member takes part in
    #[serde(default)]
    pub sessions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSession {
    #[validate(length(min = 1))]
    pub name: String,
    pub membership_fee: Amount,
}

/// Contents of a `memmer members import` file
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ImportRequest {
    #[serde(default)]
    #[validate(nested)]
    pub sessions: Vec<NewSession>,
    #[serde(default)]
    #[validate(nested)]
    pub members: Vec<NewMember>,
}
