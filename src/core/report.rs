//! Membership reports for the sports associations
//!
//! Both reports count the active members per birth year and gender. The
//! WLSB report is an XML document; the DTV sheet only knows two genders.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::active::is_active;
use crate::core::xml::XmlWriter;
use crate::models::{ClubSnapshot, Gender};

/// Identifies the reporting software towards the WLSB
const SOFTWARE_KEY: &str = "Memmer";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("The DTV report only supports male and female members ({count} diverse born in {year})")]
    UnsupportedGender { year: i32, count: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Active members born in one year
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CohortCount {
    pub year: i32,
    pub male: usize,
    pub female: usize,
    pub diverse: usize,
}

impl CohortCount {
    pub fn total(&self) -> usize {
        self.male + self.female + self.diverse
    }
}

/// Club details printed in the WLSB report header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClubInfo {
    pub number: String,
    pub name: String,
    pub contact_person: String,
    /// Numeric id of the association all members are reported for
    pub association: String,
}

/// Active members at `date` grouped by birth year, youngest first
///
/// Years without active members are left out.
pub fn cohort_counts(snapshot: &ClubSnapshot, date: NaiveDate) -> Vec<CohortCount> {
    let mut by_year: BTreeMap<i32, CohortCount> = BTreeMap::new();

    for member in snapshot.members().filter(|m| is_active(m, date)) {
        let year = member.birthday.year();
        let entry = by_year.entry(year).or_insert(CohortCount {
            year,
            ..Default::default()
        });

        match member.gender {
            Gender::Male => entry.male += 1,
            Gender::Female => entry.female += 1,
            Gender::Diverse => entry.diverse += 1,
        }
    }

    by_year.into_values().rev().collect()
}

/// WLSB membership report
///
/// Every cohort is listed twice: type A without and type B with the
/// association number.
pub fn render_wlsb_report(club: &ClubInfo, cohorts: &[CohortCount]) -> String {
    let mut xml = XmlWriter::new();

    xml.declaration();
    xml.open("Mitglieder");

    xml.open("Software");
    xml.leaf("Schluessel", SOFTWARE_KEY);
    xml.close("Software");

    xml.open("Verein");
    xml.leaf("Nummer", &club.number);
    xml.leaf("Bezeichnung", &club.name);
    xml.leaf("Ansprechpartner", &club.contact_person);
    xml.close("Verein");

    for cohort in cohorts {
        for (kind, association) in [("A", ""), ("B", club.association.as_str())] {
            xml.open("Zahlen");
            xml.leaf("Typ", kind);
            xml.leaf("Fachverband", association);
            xml.leaf("Jahrgang", &cohort.year.to_string());
            xml.leaf("AnzahlM", &cohort.male.to_string());
            xml.leaf("AnzahlW", &cohort.female.to_string());
            xml.leaf("AnzahlD", &cohort.diverse.to_string());
            // Unspecified genders are not recorded
            xml.leaf("AnzahlO", "0");
            xml.close("Zahlen");
        }
    }

    xml.close("Mitglieder");
    xml.finish()
}

/// DTV membership sheet as CSV
pub fn render_dtv_report(cohorts: &[CohortCount]) -> Result<String, ReportError> {
    if let Some(cohort) = cohorts.iter().find(|c| c.diverse > 0) {
        return Err(ReportError::UnsupportedGender {
            year: cohort.year,
            count: cohort.diverse,
        });
    }

    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(["Jahrgang", "Männlich", "Weiblich"])?;
        for cohort in cohorts {
            writer.write_record([
                cohort.year.to_string(),
                cohort.male.to_string(),
                cohort.female.to_string(),
            ])?;
        }
        writer.flush()?;
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}
