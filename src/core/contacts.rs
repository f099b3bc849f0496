use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt::{self, Write as _};

use crate::core::{active::is_active, time::age_at};
use crate::models::{ClubSnapshot, Member};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostalAddress {
    pub street: String,
    pub street_number: String,
    pub postal_code: String,
    pub city: String,
}

impl From<&Member> for PostalAddress {
    fn from(member: &Member) -> Self {
        Self {
            street: member.street.clone(),
            street_number: member.street_number.clone(),
            postal_code: member.postal_code.clone(),
            city: member.city.clone(),
        }
    }
}

impl fmt::Display for PostalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}, {} {}",
            self.street, self.street_number, self.postal_code, self.city
        )
    }
}

/// Which members to collect contacts for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactFilter {
    pub target_date: NaiveDate,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
}

impl ContactFilter {
    fn accepts(&self, member: &Member) -> bool {
        if !is_active(member, self.target_date) {
            return false;
        }
        let age = age_at(member.birthday, self.target_date);
        self.min_age.map_or(true, |min| age >= min) && self.max_age.map_or(true, |max| age <= max)
    }
}

/// Members grouped by shared contact channels, in order of first appearance
#[derive(Debug, Default)]
pub struct ContactInformation<'a> {
    pub email: Vec<(String, Vec<&'a Member>)>,
    pub phone: Vec<(String, Vec<&'a Member>)>,
    pub mail: Vec<(PostalAddress, Vec<&'a Member>)>,
    members_with_email: BTreeSet<i64>,
}

impl<'a> ContactInformation<'a> {
    pub fn has_email(&self, member_id: i64) -> bool {
        self.members_with_email.contains(&member_id)
    }
}

/// Output sections of [`format_contacts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactFormat {
    pub include_email: bool,
    pub include_mail: bool,
    pub include_phone: bool,
    /// List addresses of all members, not only of those without email
    pub all_addresses: bool,
}

impl Default for ContactFormat {
    fn default() -> Self {
        Self {
            include_email: true,
            include_mail: true,
            include_phone: false,
            all_addresses: false,
        }
    }
}

/// Spaces removed, a leading `+` spelled as `00`
pub fn normalize_phone_number(number: &str) -> String {
    number.replace(' ', "").replace('+', "00")
}

fn push_grouped<'a, K: PartialEq>(groups: &mut Vec<(K, Vec<&'a Member>)>, key: K, member: &'a Member) {
    match groups.iter_mut().find(|(k, _)| *k == key) {
        Some((_, members)) => members.push(member),
        None => groups.push((key, vec![member])),
    }
}

pub fn collect_contacts<'a>(snapshot: &'a ClubSnapshot, filter: &ContactFilter) -> ContactInformation<'a> {
    let mut info = ContactInformation::default();

    for member in snapshot.members().filter(|m| filter.accepts(m)) {
        if let Some(email) = member.email_address.as_deref().filter(|e| !e.is_empty()) {
            push_grouped(&mut info.email, email.to_string(), member);
            info.members_with_email.insert(member.id);
        }

        if let Some(phone) = member.phone_number.as_deref().filter(|p| !p.is_empty()) {
            push_grouped(&mut info.phone, normalize_phone_number(phone), member);
        }

        push_grouped(&mut info.mail, PostalAddress::from(member), member);
    }

    info
}

fn member_list(members: &[&Member]) -> String {
    members
        .iter()
        .map(|m| format!("{} {}", m.first_name, m.last_name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_contacts(info: &ContactInformation<'_>, format: ContactFormat) -> String {
    let mut out = String::new();

    if format.include_email {
        out.push_str("Email\n");
        for (address, members) in &info.email {
            let _ = writeln!(out, "- {} -> {}", address, member_list(members));
        }
        out.push('\n');
    }

    if format.include_mail {
        out.push_str("Addresses\n");
        for (address, members) in &info.mail {
            let candidates: Vec<&Member> = members
                .iter()
                .copied()
                .filter(|m| format.all_addresses || !info.has_email(m.id))
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let _ = writeln!(out, "- {} -> {}", address, member_list(&candidates));
        }
        out.push('\n');
    }

    if format.include_phone {
        out.push_str("Phone numbers\n");
        for (number, members) in &info.phone {
            let _ = writeln!(out, "- {} -> {}", number, member_list(members));
        }
        out.push('\n');
    }

    out
}
