use chrono::{NaiveDate, SubsecRound, Utc};
use sqlx::{Postgres, Transaction};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::{
    assemble_monthly_fee_assets, message_id, Asset, CreditorInfo, FeeError, PaymentInitiation,
    SepaError,
};
use crate::models::{Amount, Setting, Tally, TallySummary};
use crate::services::postgres::{archive_fees_of, insert_tally, PostgresClient, PostgresError};

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Setting '{0}' is not configured in the database")]
    MissingSetting(&'static str),

    #[error("Tally index {index} is out of range (only have {count} tallies)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Database error: {0}")]
    Database(#[from] PostgresError),

    #[error("Fee computation failed: {0}")]
    Fee(#[from] FeeError),

    #[error("Invalid direct debit: {0}")]
    Sepa(#[from] SepaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for TallyError {
    fn from(err: sqlx::Error) -> Self {
        TallyError::Database(PostgresError::from(err))
    }
}

/// Tally-related values stored in the settings table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyParameters {
    pub creditor: CreditorInfo,
    pub e2e_id_template: String,
    pub purpose: String,
}

/// Outcome of creating a tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyReport {
    pub message_id: String,
    pub file: PathBuf,
    pub collection_date: NaiveDate,
    pub total: Amount,
    pub transactions: usize,
    /// Members whose one-time fees were archived
    pub archived_members: Vec<i64>,
    pub persisted: bool,
}

/// A written tally whose database changes are not committed yet
pub struct PreparedTally {
    tx: Transaction<'static, Postgres>,
    pub report: TallyReport,
}

impl PreparedTally {
    pub async fn commit(self) -> Result<TallyReport, TallyError> {
        self.tx.commit().await?;
        tracing::info!("Persisted tally {}", self.report.message_id);

        Ok(TallyReport {
            persisted: true,
            ..self.report
        })
    }

    /// Roll back; the written file is kept
    pub async fn discard(self) -> Result<TallyReport, TallyError> {
        self.tx.rollback().await?;
        tracing::info!("Tally {} not persisted", self.report.message_id);

        Ok(self.report)
    }
}

/// Creates, lists and dumps tallies
pub struct TallyService<'a> {
    client: &'a PostgresClient,
}

impl<'a> TallyService<'a> {
    pub fn new(client: &'a PostgresClient) -> Self {
        Self { client }
    }

    async fn required_setting(&self, name: &'static str) -> Result<String, TallyError> {
        self.client
            .setting(name)
            .await?
            .ok_or(TallyError::MissingSetting(name))
    }

    pub async fn parameters(&self) -> Result<TallyParameters, TallyError> {
        Ok(TallyParameters {
            creditor: CreditorInfo {
                name: self.required_setting(Setting::TALLY_CREDITOR_NAME).await?,
                iban: self.required_setting(Setting::TALLY_CREDITOR_IBAN).await?,
                bic: self.required_setting(Setting::TALLY_CREDITOR_BIC).await?,
                identification: self.required_setting(Setting::TALLY_CREDITOR_ID).await?,
            },
            e2e_id_template: self.required_setting(Setting::TALLY_E2E_ID_TEMPLATE).await?,
            purpose: self.required_setting(Setting::TALLY_PURPOSE).await?,
        })
    }

    /// Render and write a tally, staging its database changes
    ///
    /// Without explicit `assets` the regular monthly fees are collected and
    /// the one-time fees of the debited members are archived.
    pub async fn prepare(
        &self,
        out_dir: &Path,
        collection_date: NaiveDate,
        assets: Option<Vec<Asset>>,
    ) -> Result<PreparedTally, TallyError> {
        let params = self.parameters().await?;
        let now = Utc::now().trunc_subsecs(0);
        let message_id = message_id(now);

        let (assets, archived_members) = match assets {
            Some(assets) => (assets, Vec::new()),
            None => {
                let snapshot = self.client.load_snapshot().await?;
                let monthly = assemble_monthly_fee_assets(
                    &snapshot,
                    collection_date,
                    &params.e2e_id_template,
                    &params.purpose,
                )?;
                (monthly.assets, monthly.billed_members)
            }
        };

        let message = PaymentInitiation::new(
            message_id.clone(),
            now,
            collection_date,
            params.creditor,
            &assets,
        )?;
        if message.transactions.is_empty() {
            tracing::warn!("Tally {} contains no transactions", message_id);
        }
        let contents = message.render();

        let mut tx = self.client.begin().await?;
        if !archived_members.is_empty() {
            archive_fees_of(&mut tx, &archived_members).await?;
        }
        insert_tally(
            &mut tx,
            now,
            collection_date,
            message.control_sum,
            &Tally::compress(&contents)?,
        )
        .await?;

        tokio::fs::create_dir_all(out_dir).await?;
        let file = out_dir.join(format!("{}.xml", message_id));
        tokio::fs::write(&file, contents.as_bytes()).await?;

        tracing::info!(
            "Wrote tally {} ({} transactions, {} EUR) to {}",
            message_id,
            message.transactions.len(),
            message.control_sum,
            file.display()
        );

        Ok(PreparedTally {
            tx,
            report: TallyReport {
                message_id,
                file,
                collection_date,
                total: message.control_sum,
                transactions: message.transactions.len(),
                archived_members,
                persisted: false,
            },
        })
    }

    /// Create a tally and commit it only if `persist` is set
    pub async fn create_tally(
        &self,
        out_dir: &Path,
        collection_date: NaiveDate,
        assets: Option<Vec<Asset>>,
        persist: bool,
    ) -> Result<TallyReport, TallyError> {
        let prepared = self.prepare(out_dir, collection_date, assets).await?;

        if persist {
            prepared.commit().await
        } else {
            prepared.discard().await
        }
    }

    pub async fn list(&self) -> Result<Vec<TallySummary>, TallyError> {
        Ok(self.client.list_tallies().await?)
    }

    /// Contents of the tally at a 1-based index of `list`
    pub async fn dump(&self, index: usize) -> Result<String, TallyError> {
        let tallies = self.list().await?;
        let summary = index
            .checked_sub(1)
            .and_then(|i| tallies.get(i))
            .ok_or(TallyError::IndexOutOfRange {
                index,
                count: tallies.len(),
            })?;

        let tally = self.client.tally(summary.id).await?;
        Ok(tally.contents()?)
    }
}
