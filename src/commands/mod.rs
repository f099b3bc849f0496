// Command line interface of the memmer binary
mod club;
mod configure;
mod database;
mod forms;
mod report;
mod tally;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use memmer::config::Settings;
use memmer::core::{ContactFilter, ContactFormat};
use memmer::services::{
    interactive_connect, CliPrompter, Connection, ConnectionParameter,
};

#[derive(Debug, Parser)]
#[command(name = "memmer")]
#[command(about = "Membership and fee management for sports clubs", version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file to use instead of the user configuration
    #[arg(long, global = true, env = "MEMMER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile the UI form files into source modules
    CompileForms {
        /// Directory containing the form files
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory receiving the generated modules
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Create the database schema and default fixed costs
    InitDb,
    /// Show or edit the user configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Create, list and dump SEPA direct-debit tallies
    #[command(subcommand)]
    Tally(TallyCommand),
    /// Collect one-off charges listed in a CSV invoice
    Invoice {
        /// Path to the CSV representing the invoice
        #[arg(long, value_name = "PATH")]
        invoice: PathBuf,
        /// Directory into which to write the generated file
        #[arg(long, value_name = "PATH", default_value = ".")]
        out_dir: PathBuf,
        /// Date at which the due amounts shall be collected
        #[arg(long)]
        collection_date: Option<NaiveDate>,
        /// Persist without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// List sessions or print the members of selected sessions
    Sessions {
        /// 1-based indices into the session list (sorted by name)
        ids: Vec<usize>,
    },
    /// Member numbers at a date
    Stats {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Joins and leaves are counted within this many days
        #[arg(long, default_value_t = 30)]
        window_days: i64,
        /// Also print weekly numbers from this date on
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// Family relations between members
    #[command(subcommand)]
    Relations(RelationsCommand),
    /// Fee of a member at a date
    Fee {
        member_id: i64,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Clean up and archive database entries
    #[command(subcommand)]
    Maintenance(MaintenanceCommand),
    /// Manage members
    #[command(subcommand)]
    Members(MembersCommand),
    /// Membership report for the sports associations
    Report {
        /// The kind of report to create
        #[arg(long, value_enum)]
        kind: ReportKind,
        /// Path to which to write the report
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
        /// Date to create the report for
        #[arg(long)]
        target_date: NaiveDate,
    },
    /// Group the contact information of active members
    Contacts {
        /// Only members that have not left before this date are considered
        #[arg(long)]
        target_date: Option<NaiveDate>,
        #[arg(long)]
        min_age: Option<i32>,
        #[arg(long)]
        max_age: Option<i32>,
        /// List the addresses of all members, not only of those without email
        #[arg(long)]
        all_addresses: bool,
        /// Also print phone numbers
        #[arg(long)]
        include_phone: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Members per birth year as a CSV sheet
    Dtv,
    /// XML report for the WLSB
    Wlsb,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Set a value in the user configuration; an empty value clears it
    Set { key: String, value: String },
}

#[derive(Debug, Subcommand)]
pub enum TallyCommand {
    /// Create the regular monthly tally
    Create {
        /// Directory into which to write the generated file
        #[arg(long, value_name = "PATH")]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        collection_date: Option<NaiveDate>,
        /// Write the file but leave the database untouched
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored tallies
    List,
    /// Print the contents of a stored tally
    Dump {
        /// 1-based index as shown by `tally list`
        index: usize,
    },
    /// Compare the transactions of two tally files
    Compare { first: PathBuf, second: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum RelationsCommand {
    /// Print the relatives of a member, or all relations
    List { member_id: Option<i64> },
    /// Relate two members (and their families)
    Add { first: i64, second: i64 },
    /// Remove the relation between two members
    Drop { first: i64, second: i64 },
    /// Remove all relations of a member
    Clear { member_id: i64 },
    /// Replace the relatives of a member
    Set {
        member_id: i64,
        #[arg(required = true)]
        relatives: Vec<i64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum MaintenanceCommand {
    /// Delete ended participations, former members and old archive entries
    Clean,
    /// Move outstanding one-time fees into the archive
    Archive {
        #[arg(long)]
        member: Option<i64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum MembersCommand {
    /// Import sessions and members from a JSON file
    Import { file: PathBuf },
}

/// Run the selected command
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::CompileForms { input, output } => {
            forms::compile_forms(&settings, input, output).await
        }
        Commands::Config(command) => configure::run(command, settings, config_path),
        Commands::InitDb => database::init_db(&settings).await,
        Commands::Tally(command) => tally::run(command, &settings).await,
        Commands::Invoice {
            invoice,
            out_dir,
            collection_date,
            yes,
        } => tally::invoice(&settings, &invoice, &out_dir, collection_date, yes).await,
        Commands::Sessions { ids } => club::sessions(&settings, &ids).await,
        Commands::Stats {
            date,
            window_days,
            since,
        } => club::stats(&settings, date, window_days, since).await,
        Commands::Relations(command) => club::relations(&settings, command).await,
        Commands::Fee { member_id, date } => club::fee(&settings, member_id, date).await,
        Commands::Maintenance(command) => database::maintenance(&settings, command).await,
        Commands::Members(MembersCommand::Import { file }) => {
            database::import_members(&settings, &file).await
        }
        Commands::Report {
            kind,
            output,
            target_date,
        } => report::report(&settings, kind, &output, target_date).await,
        Commands::Contacts {
            target_date,
            min_age,
            max_age,
            all_addresses,
            include_phone,
        } => {
            let filter = ContactFilter {
                target_date: target_date.unwrap_or_else(today),
                min_age,
                max_age,
            };
            let format = ContactFormat {
                include_phone,
                all_addresses,
                ..ContactFormat::default()
            };
            report::contacts(&settings, filter, format).await
        }
    }
}

/// Open the configured database connection, asking for what is missing
pub(crate) async fn connect(settings: &Settings) -> Result<Connection> {
    let params = ConnectionParameter::from_settings(settings)?;
    let max_connections = settings.connection.max_connections.unwrap_or(5);
    let mut prompter = CliPrompter;

    Ok(interactive_connect(params, &mut prompter, max_connections).await?)
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
