use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};

use memmer::config::Settings;
use memmer::core::{fee_report, member_counts, member_history, session_roster, RelationGraph};
use memmer::models::{ClubSnapshot, TrainingSession};

use super::{connect, today, RelationsCommand};

/// Sessions sorted by name; the CLI indices refer to this order
fn sessions_by_name(snapshot: &ClubSnapshot) -> Vec<&TrainingSession> {
    let mut sessions: Vec<_> = snapshot.sessions().collect();
    sessions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    sessions
}

pub async fn sessions(settings: &Settings, ids: &[usize]) -> Result<()> {
    let connection = connect(settings).await?;
    let snapshot = connection.client.load_snapshot().await?;
    connection.close().await?;

    let sessions = sessions_by_name(&snapshot);

    if ids.is_empty() {
        println!("The following sessions exist:");
        for (i, session) in sessions.iter().enumerate() {
            println!("[{:3}] '{}'", i + 1, session.name);
        }
        return Ok(());
    }

    let date = today();
    for &id in ids {
        let Some(session) = id.checked_sub(1).and_then(|i| sessions.get(i)) else {
            println!(
                "Session ID {} is out of range (valid: 1 to {})",
                id,
                sessions.len()
            );
            continue;
        };

        let Some(roster) = session_roster(&snapshot, session.id, date) else {
            continue;
        };

        println!(
            "Session '{}' (total: {}, monthly fee: {}€)",
            roster.session_name,
            roster.members.len(),
            roster.membership_fee
        );
        for (i, member) in roster.members.iter().enumerate() {
            println!(
                "{:3} - {}, {} ({} y/o)",
                i + 1,
                member.last_name,
                member.first_name,
                member.age
            );
        }
        println!();
    }

    Ok(())
}

pub async fn stats(
    settings: &Settings,
    date: Option<NaiveDate>,
    window_days: i64,
    since: Option<NaiveDate>,
) -> Result<()> {
    if window_days <= 0 {
        bail!("The window must span at least one day");
    }
    let Some(window) = Duration::try_days(window_days) else {
        bail!("A window of {} days is too large", window_days);
    };

    let date = date.unwrap_or_else(today);
    let connection = connect(settings).await?;
    let snapshot = connection.client.load_snapshot().await?;
    connection.close().await?;

    let counts = member_counts(&snapshot, date, window);
    println!("Members at {}: {}", counts.date, counts.active);
    println!(
        "Within the last {} days: {} joined, {} left",
        window_days, counts.joins, counts.leaves
    );

    if let Some(since) = since {
        println!();
        println!("{:<12} {:>7} {:>6} {:>6}", "date", "active", "joins", "leaves");
        for entry in member_history(&snapshot, since, date, Duration::weeks(1)) {
            println!(
                "{:<12} {:>7} {:>6} {:>6}",
                entry.date.to_string(),
                entry.active,
                entry.joins,
                entry.leaves
            );
        }
    }

    Ok(())
}

pub async fn relations(settings: &Settings, command: RelationsCommand) -> Result<()> {
    let connection = connect(settings).await?;
    let client = &connection.client;

    match command {
        RelationsCommand::List { member_id: None } => {
            for relation in client.relations().await? {
                println!("{} <-> {}", relation.first_id, relation.second_id);
            }
        }
        RelationsCommand::List {
            member_id: Some(member_id),
        } => {
            let snapshot = client.load_snapshot().await?;
            let graph = RelationGraph::new(snapshot.relations());
            for relative in graph.relatives(member_id) {
                match snapshot.member(relative) {
                    Some(member) => println!("{:5} {}", relative, member.full_name()),
                    None => println!("{:5}", relative),
                }
            }
        }
        RelationsCommand::Add { first, second } => {
            let added = client.make_relation(first, second).await?;
            println!("Added {} relations", added.len());
        }
        RelationsCommand::Drop { first, second } => {
            if client.drop_relation(first, second).await? {
                println!("Removed relation {} <-> {}", first, second);
            } else {
                println!("Members {} and {} were not related", first, second);
            }
        }
        RelationsCommand::Clear { member_id } => {
            let removed = client.clear_relations(member_id).await?;
            println!("Removed {} relations of member {}", removed, member_id);
        }
        RelationsCommand::Set {
            member_id,
            relatives,
        } => {
            client.set_relatives(member_id, &relatives).await?;
            println!("Member {} is now related to {:?}", member_id, relatives);
        }
    }

    connection.close().await?;
    Ok(())
}

pub async fn fee(settings: &Settings, member_id: i64, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(today);
    let connection = connect(settings).await?;
    let snapshot = connection.client.load_snapshot().await?;
    connection.close().await?;

    let report = fee_report(&snapshot, member_id, date)?;

    println!("{} (member {}) at {}", report.name, report.member_id, report.target_date);
    println!("  monthly fee:    {:>8} EUR", report.monthly_fee.to_string());
    println!("  one-time fees:  {:>8} EUR", report.one_time_fees.to_string());
    println!("  total:          {:>8} EUR", report.total.to_string());

    Ok(())
}
