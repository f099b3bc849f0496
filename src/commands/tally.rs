use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use memmer::config::Settings;
use memmer::core::{compare_tallies, invoice_assets, parse_invoice};
use memmer::models::Amount;
use memmer::services::{TallyReport, TallyService};

use super::{connect, today, TallyCommand};

pub async fn run(command: TallyCommand, settings: &Settings) -> Result<()> {
    if let TallyCommand::Compare { first, second } = &command {
        return compare(first, second).await;
    }

    let connection = connect(settings).await?;
    let service = TallyService::new(&connection.client);

    match command {
        TallyCommand::Create {
            out_dir,
            collection_date,
            dry_run,
        } => {
            let out_dir = out_dir
                .or_else(|| settings.tally.out_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            let collection_date = collection_date.unwrap_or_else(today);

            let report = service
                .create_tally(&out_dir, collection_date, None, !dry_run)
                .await?;
            print_report(&report);
        }
        TallyCommand::List => {
            let tallies = service.list().await?;
            if tallies.is_empty() {
                println!("There are no tallies available");
            } else {
                println!("The following tallies are available:");
                for (i, tally) in tallies.iter().enumerate() {
                    println!(
                        "  [{:3}]: Tally from {} ({} EUR)",
                        i + 1,
                        tally.collection_date,
                        tally.total_amount
                    );
                }
            }
        }
        TallyCommand::Dump { index } => {
            println!("{}", service.dump(index).await?);
        }
        // Handled without a connection above
        TallyCommand::Compare { .. } => {}
    }

    connection.close().await?;
    Ok(())
}

async fn read_tally_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn compare(first: &Path, second: &Path) -> Result<()> {
    let first = read_tally_file(first).await?;
    let second = read_tally_file(second).await?;
    let comparison = compare_tallies(&first, &second)?;

    for diff in &comparison.differences {
        println!(
            "Different amount for {:25}: {:>8} EUR vs {:>8} EUR",
            diff.name,
            diff.first.to_string(),
            diff.second.to_string()
        );
    }
    println!();
    println!(
        "Diff due to different amounts for members first - second: {} EUR",
        comparison.amount_diff()
    );

    for (label, payments) in [
        ("first but not in second", &comparison.only_in_first),
        ("second but not in first", &comparison.only_in_second),
    ] {
        if payments.is_empty() {
            continue;
        }
        println!();
        println!("Payments contained in {} ({}):", label, payments.len());
        for payment in payments.iter() {
            println!(
                "  {:25} ({}): {:>8} EUR",
                payment.name,
                payment.end_to_end_id,
                payment.amount.to_string()
            );
        }
        let summed: Amount = payments.iter().map(|p| p.amount).sum();
        println!();
        println!("Total: {} EUR", summed);
    }

    println!();
    println!(
        "Total payment diff first - second: {} EUR",
        comparison.total_diff()
    );
    Ok(())
}

pub async fn invoice(
    settings: &Settings,
    invoice: &Path,
    out_dir: &Path,
    collection_date: Option<NaiveDate>,
    yes: bool,
) -> Result<()> {
    let file = std::fs::File::open(invoice)
        .with_context(|| format!("Failed to open {}", invoice.display()))?;
    let lines = parse_invoice(file)?;

    if lines.is_empty() {
        println!("The invoice contains no charges");
        return Ok(());
    }

    let connection = connect(settings).await?;
    let service = TallyService::new(&connection.client);

    let template = service.parameters().await?.e2e_id_template;
    let snapshot = connection.client.load_snapshot().await?;
    let assets = invoice_assets(&snapshot, &lines, &template)?;

    let prepared = service
        .prepare(out_dir, collection_date.unwrap_or_else(today), Some(assets))
        .await?;
    println!(
        "PAIN message generated successfully in directory '{}'",
        out_dir.display()
    );

    let persist = yes || confirm("Do you want to persist the generated tally in the database?").await?;
    let report = if persist {
        prepared.commit().await?
    } else {
        prepared.discard().await?
    };
    print_report(&report);

    connection.close().await?;
    Ok(())
}

fn print_report(report: &TallyReport) {
    println!(
        "Tally {}: {} transactions, total {} EUR, collected on {}",
        report.message_id, report.transactions, report.total, report.collection_date
    );
    println!("Written to '{}'", report.file.display());
    if report.persisted {
        println!("Stored in the database");
    } else {
        println!("Not stored in the database");
    }
}

/// Ask on the terminal without blocking the runtime
async fn confirm(question: &str) -> Result<bool> {
    let question = question.to_string();
    let answer = tokio::task::spawn_blocking(move || {
        ask_yes_no(io::stdin().lock(), io::stdout(), &question)
    })
    .await??;
    Ok(answer)
}

/// Ask a yes/no question until one of them is answered
///
/// End of input counts as "no".
fn ask_yes_no(mut input: impl BufRead, mut output: impl Write, question: &str) -> io::Result<bool> {
    write!(output, "{} [y|n] ", question)?;
    output.flush()?;

    loop {
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }

        match answer.trim().to_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => {
                write!(output, "Please input either 'y' for 'yes' or 'n' for 'no' ")?;
                output.flush()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ask_yes_no_repeats_until_answered() {
        let mut output = Vec::new();
        let answer = ask_yes_no(Cursor::new("maybe\nY\n"), &mut output, "Persist?").unwrap();

        assert!(answer);
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Persist? [y|n] "));
        assert_eq!(output.matches("Please input either").count(), 1);
    }

    #[test]
    fn test_ask_yes_no_end_of_input_is_no() {
        assert!(!ask_yes_no(Cursor::new(""), Vec::new(), "Persist?").unwrap());
    }

    #[tokio::test]
    async fn test_blocking_question_leaves_runtime_free() {
        let answer = tokio::task::spawn_blocking(|| {
            ask_yes_no(Cursor::new("n\n"), Vec::new(), "Persist?")
        });
        // The runtime keeps serving other tasks meanwhile
        let other = tokio::spawn(async { 42 });

        assert_eq!(other.await.unwrap(), 42);
        assert!(!answer.await.unwrap().unwrap());
    }
}
