use anyhow::{Context, Result};
use std::path::Path;
use validator::Validate;

use memmer::config::Settings;
use memmer::core::outdated_cutoffs;
use memmer::models::ImportRequest;
use memmer::services::postgres::DEFAULT_FIXED_COSTS;

use super::{connect, today, MaintenanceCommand};

pub async fn init_db(settings: &Settings) -> Result<()> {
    let connection = connect(settings).await?;
    let added = connection.client.provision(&DEFAULT_FIXED_COSTS).await?;
    connection.close().await?;

    println!("Database initialized ({} default fixed costs added)", added);
    Ok(())
}

pub async fn maintenance(settings: &Settings, command: MaintenanceCommand) -> Result<()> {
    let connection = connect(settings).await?;

    match command {
        MaintenanceCommand::Clean => {
            let counts = connection
                .client
                .clear_outdated_entries(&outdated_cutoffs(today()))
                .await?;
            println!(
                "Removed {} participations, {} members and {} archived fees",
                counts.participations, counts.members, counts.archived_fees
            );
        }
        MaintenanceCommand::Archive { member } => {
            let archived = connection.client.archive_one_time_fees(member).await?;
            println!("Archived {} one-time fees", archived);
        }
    }

    connection.close().await?;
    Ok(())
}

pub async fn import_members(settings: &Settings, file: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let request: ImportRequest = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    request.validate().context("Invalid import file")?;

    let connection = connect(settings).await?;
    let counts = connection.client.import(&request).await?;
    connection.close().await?;

    println!(
        "Imported {} members and {} sessions ({} participations, {} admission fees)",
        counts.members, counts.sessions, counts.participations, counts.admission_fees
    );
    Ok(())
}
