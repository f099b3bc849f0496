use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;

use memmer::config::Settings;
use memmer::core::{
    cohort_counts, collect_contacts, format_contacts, render_dtv_report, render_wlsb_report,
    ClubInfo, ContactFilter, ContactFormat,
};
use memmer::models::Setting;
use memmer::services::PostgresClient;

use super::{connect, ReportKind};

async fn required_setting(client: &PostgresClient, name: &str) -> Result<String> {
    client
        .setting(name)
        .await?
        .with_context(|| format!("Setting '{}' is not configured", name))
}

pub async fn report(
    settings: &Settings,
    kind: ReportKind,
    output: &Path,
    target_date: NaiveDate,
) -> Result<()> {
    let connection = connect(settings).await?;
    let client = &connection.client;
    let snapshot = client.load_snapshot().await?;
    let cohorts = cohort_counts(&snapshot, target_date);

    let contents = match kind {
        ReportKind::Dtv => render_dtv_report(&cohorts)?,
        ReportKind::Wlsb => {
            let club = ClubInfo {
                number: required_setting(client, Setting::CLUB_NUMBER).await?,
                name: required_setting(client, Setting::CLUB_NAME).await?,
                contact_person: required_setting(client, Setting::CLUB_CONTACT_PERSON).await?,
                association: required_setting(client, Setting::CLUB_ASSOCIATION_NUMERIC).await?,
            };
            render_wlsb_report(&club, &cohorts)
        }
    };
    connection.close().await?;

    tokio::fs::write(output, contents)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let members: usize = cohorts.iter().map(|c| c.total()).sum();
    println!(
        "Report for {} members in {} birth years written to '{}'",
        members,
        cohorts.len(),
        output.display()
    );
    Ok(())
}

pub async fn contacts(settings: &Settings, filter: ContactFilter, format: ContactFormat) -> Result<()> {
    let connection = connect(settings).await?;
    let snapshot = connection.client.load_snapshot().await?;
    connection.close().await?;

    let info = collect_contacts(&snapshot, &filter);
    println!("{}", format_contacts(&info, format));
    Ok(())
}
