use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use thiserror::Error;

use crate::core::relations::RelationGraph;
use crate::core::OutdatedCutoffs;
use crate::models::{
    Amount, ClubSnapshot, FeeOverride, FixedCost, Gender, ImportRequest, Member, OneTimeFee,
    Participation, Relation, Tally, TallySummary, Trainer, TrainingSession, ADMISSION_FEE_KEY,
    BASIC_FEE_ADULTS_KEY, BASIC_FEE_YOUTHS_KEY,
};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Fixed costs inserted by `provision` when absent
pub const DEFAULT_FIXED_COSTS: [(&str, Amount); 3] = [
    (ADMISSION_FEE_KEY, Amount::from_cents(1500)),
    (BASIC_FEE_ADULTS_KEY, Amount::from_cents(500)),
    (BASIC_FEE_YOUTHS_KEY, Amount::from_cents(400)),
];

/// Number of rows removed by `clear_outdated_entries`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutdatedCounts {
    pub participations: u64,
    pub members: u64,
    pub archived_fees: u64,
}

/// Rows created by `import`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub sessions: u64,
    pub members: u64,
    pub participations: u64,
    pub admission_fees: u64,
}

/// PostgreSQL client holding the club database
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, PostgresError> {
        Ok(self.pool.begin().await?)
    }

    /// Create the schema and insert `default_costs` where absent
    ///
    /// Safe to run repeatedly; existing costs are kept.
    pub async fn provision(&self, default_costs: &[(&str, Amount)]) -> Result<u64, PostgresError> {
        check_default_costs(default_costs)?;
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        let mut inserted = 0;
        for &(name, cost) in default_costs {
            let result = sqlx::query(
                "INSERT INTO fixed_costs (name, cost) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(name)
            .bind(cost.cents())
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();
        }

        tracing::info!("Database provisioned ({} default fixed costs added)", inserted);

        Ok(inserted)
    }

    /// Load everything the business rules need
    pub async fn load_snapshot(&self) -> Result<ClubSnapshot, PostgresError> {
        let mut snapshot = ClubSnapshot::new();

        let rows = sqlx::query("SELECT * FROM members ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            snapshot.add_member(member_from_row(row)?);
        }

        let rows = sqlx::query("SELECT id, name, membership_fee FROM sessions")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            snapshot.add_session(TrainingSession {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                membership_fee: Amount::from_cents(row.try_get("membership_fee")?),
            });
        }

        let rows = sqlx::query("SELECT member_id, session_id, since, until FROM participations")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            snapshot.add_participation(Participation {
                member_id: row.try_get("member_id")?,
                session_id: row.try_get("session_id")?,
                since: row.try_get("since")?,
                until: row.try_get("until")?,
            });
        }

        let rows = sqlx::query("SELECT member_id, session_id FROM trainers")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            snapshot.add_trainer(Trainer {
                member_id: row.try_get("member_id")?,
                session_id: row.try_get("session_id")?,
            });
        }

        for relation in self.relations().await? {
            snapshot.add_relation(relation);
        }

        let rows = sqlx::query("SELECT id, name, cost FROM fixed_costs")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            snapshot.add_fixed_cost(FixedCost {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                cost: Amount::from_cents(row.try_get("cost")?),
            });
        }

        let rows = sqlx::query("SELECT id, member_id, reason, amount FROM one_time_fees ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            snapshot.add_one_time_fee(OneTimeFee {
                id: row.try_get("id")?,
                member_id: row.try_get("member_id")?,
                reason: row.try_get("reason")?,
                amount: Amount::from_cents(row.try_get("amount")?),
            });
        }

        let rows = sqlx::query("SELECT member_id, amount FROM fee_overrides")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            snapshot.add_fee_override(FeeOverride {
                member_id: row.try_get("member_id")?,
                amount: Amount::from_cents(row.try_get("amount")?),
            });
        }

        tracing::debug!("Loaded snapshot with {} members", snapshot.members().count());

        Ok(snapshot)
    }

    pub async fn relations(&self) -> Result<Vec<Relation>, PostgresError> {
        let rows = sqlx::query("SELECT first_id, second_id FROM relations ORDER BY first_id, second_id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<Relation, PostgresError> {
                Ok(Relation {
                    first_id: row.try_get("first_id")?,
                    second_id: row.try_get("second_id")?,
                })
            })
            .collect()
    }

    /// Relate two members and their families with each other
    ///
    /// Returns the pairs that were added.
    pub async fn make_relation(&self, first: i64, second: i64) -> Result<Vec<Relation>, PostgresError> {
        let mut tx = self.pool.begin().await?;
        let existing = fetch_relations(&mut tx).await?;
        let added = RelationGraph::new(&existing).plan_make_relation(first, second);

        for relation in &added {
            insert_relation(&mut tx, *relation).await?;
        }
        tx.commit().await?;

        tracing::info!("Related members {} and {} ({} pairs added)", first, second, added.len());

        Ok(added)
    }

    /// Remove a single relation pair; other relations stay untouched
    pub async fn drop_relation(&self, first: i64, second: i64) -> Result<bool, PostgresError> {
        let relation = Relation::normalized(first, second);
        let result = sqlx::query("DELETE FROM relations WHERE first_id = $1 AND second_id = $2")
            .bind(relation.first_id)
            .bind(relation.second_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_relations(&self, member_id: i64) -> Result<u64, PostgresError> {
        let result = sqlx::query("DELETE FROM relations WHERE first_id = $1 OR second_id = $1")
            .bind(member_id)
            .execute(&self.pool)
            .await?;

        tracing::info!("Cleared {} relations of member {}", result.rows_affected(), member_id);

        Ok(result.rows_affected())
    }

    /// Replace the relatives of a member
    pub async fn set_relatives(&self, member_id: i64, relatives: &[i64]) -> Result<(), PostgresError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM relations WHERE first_id = $1 OR second_id = $1")
            .bind(member_id)
            .execute(&mut *tx)
            .await?;

        let mut current = fetch_relations(&mut tx).await?;
        for &relative in relatives {
            let added = RelationGraph::new(&current).plan_make_relation(member_id, relative);
            for relation in added {
                insert_relation(&mut tx, relation).await?;
                current.push(relation);
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Move one-time fees into the archive, either of one member or all
    pub async fn archive_one_time_fees(&self, member_id: Option<i64>) -> Result<u64, PostgresError> {
        let moved = match member_id {
            Some(id) => {
                let mut conn = self.pool.acquire().await?;
                archive_fees_of(&mut conn, &[id]).await?
            }
            None => {
                let query = r#"
                    WITH moved AS (
                        DELETE FROM one_time_fees
                        RETURNING member_id, reason, amount
                    )
                    INSERT INTO archived_one_time_fees (member_id, reason, amount, billed)
                    SELECT member_id, reason, amount, NOW() FROM moved
                "#;
                sqlx::query(query).execute(&self.pool).await?.rows_affected()
            }
        };

        tracing::info!("Archived {} one-time fees", moved);

        Ok(moved)
    }

    /// Delete ended participations, former members and old archive entries
    pub async fn clear_outdated_entries(
        &self,
        cutoffs: &OutdatedCutoffs,
    ) -> Result<OutdatedCounts, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let participations = sqlx::query("DELETE FROM participations WHERE until < $1")
            .bind(cutoffs.participation_until)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let members = sqlx::query("DELETE FROM members WHERE exit_date < $1")
            .bind(cutoffs.member_exit)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let archived_fees = sqlx::query("DELETE FROM archived_one_time_fees WHERE billed < $1")
            .bind(cutoffs.archived_billed)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let counts = OutdatedCounts {
            participations,
            members,
            archived_fees,
        };
        tracing::info!("Removed outdated entries: {:?}", counts);

        Ok(counts)
    }

    pub async fn setting(&self, name: &str) -> Result<Option<String>, PostgresError> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    pub async fn set_setting(&self, name: &str, value: &str) -> Result<(), PostgresError> {
        let query = r#"
            INSERT INTO settings (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name)
            DO UPDATE SET value = EXCLUDED.value
        "#;

        sqlx::query(query)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Stored tallies ordered by collection date
    pub async fn list_tallies(&self) -> Result<Vec<TallySummary>, PostgresError> {
        let query = r#"
            SELECT id, creation_time, collection_date, total_amount
            FROM tallies
            ORDER BY collection_date, id
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<TallySummary, PostgresError> {
                Ok(TallySummary {
                    id: row.try_get("id")?,
                    creation_time: row.try_get("creation_time")?,
                    collection_date: row.try_get("collection_date")?,
                    total_amount: Amount::from_cents(row.try_get("total_amount")?),
                })
            })
            .collect()
    }

    pub async fn tally(&self, id: i64) -> Result<Tally, PostgresError> {
        let row = sqlx::query("SELECT * FROM tallies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("tally {}", id)))?;

        Ok(Tally {
            id: row.try_get("id")?,
            creation_time: row.try_get("creation_time")?,
            collection_date: row.try_get("collection_date")?,
            total_amount: Amount::from_cents(row.try_get("total_amount")?),
            compressed_contents: row.try_get("compressed_contents")?,
        })
    }

    /// Add sessions and members from an import file in one transaction
    ///
    /// Sessions that already exist (by name) are reused. Every new member
    /// owes the admission fee, if one is configured.
    pub async fn import(&self, request: &ImportRequest) -> Result<ImportCounts, PostgresError> {
        let mut tx = self.pool.begin().await?;
        let mut counts = ImportCounts::default();

        for session in &request.sessions {
            let result = sqlx::query(
                "INSERT INTO sessions (name, membership_fee) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(&session.name)
            .bind(session.membership_fee.cents())
            .execute(&mut *tx)
            .await?;
            counts.sessions += result.rows_affected();
        }

        let admission_fee: Option<i64> = sqlx::query_scalar("SELECT cost FROM fixed_costs WHERE name = $1")
            .bind(ADMISSION_FEE_KEY)
            .fetch_optional(&mut *tx)
            .await?;

        for member in &request.members {
            let query = r#"
                INSERT INTO members (
                    first_name, last_name, gender, birthday, entry_date, exit_date,
                    street, street_number, postal_code, city, phone_number, email_address,
                    iban, bic, account_owner, sepa_mandate_date
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                RETURNING id
            "#;

            let member_id: i64 = sqlx::query_scalar(query)
                .bind(&member.first_name)
                .bind(&member.last_name)
                .bind(member.gender.as_str())
                .bind(member.birthday)
                .bind(member.entry_date)
                .bind(member.exit_date)
                .bind(&member.street)
                .bind(&member.street_number)
                .bind(&member.postal_code)
                .bind(&member.city)
                .bind(&member.phone_number)
                .bind(&member.email_address)
                .bind(&member.iban)
                .bind(&member.bic)
                .bind(&member.account_owner)
                .bind(member.sepa_mandate_date)
                .fetch_one(&mut *tx)
                .await?;
            counts.members += 1;

            for name in &member.sessions {
                let session_id: i64 = sqlx::query_scalar("SELECT id FROM sessions WHERE name = $1")
                    .bind(name)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| PostgresError::InvalidInput(format!("unknown session '{}'", name)))?;

                sqlx::query(
                    "INSERT INTO participations (member_id, session_id, since) VALUES ($1, $2, $3)",
                )
                .bind(member_id)
                .bind(session_id)
                .bind(member.entry_date)
                .execute(&mut *tx)
                .await?;
                counts.participations += 1;
            }

            if let Some(fee) = admission_fee.filter(|&cents| cents > 0) {
                sqlx::query("INSERT INTO one_time_fees (member_id, reason, amount) VALUES ($1, $2, $3)")
                    .bind(member_id)
                    .bind("Aufnahmegebuehr")
                    .bind(fee)
                    .execute(&mut *tx)
                    .await?;
                counts.admission_fees += 1;
            }
        }

        tx.commit().await?;
        tracing::info!("Imported {:?}", counts);

        Ok(counts)
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Archive the one-time fees of the given members with `billed = now`
pub async fn archive_fees_of(conn: &mut PgConnection, member_ids: &[i64]) -> Result<u64, PostgresError> {
    let query = r#"
        WITH moved AS (
            DELETE FROM one_time_fees
            WHERE member_id = ANY($1)
            RETURNING member_id, reason, amount
        )
        INSERT INTO archived_one_time_fees (member_id, reason, amount, billed)
        SELECT member_id, reason, amount, NOW() FROM moved
    "#;

    let result = sqlx::query(query).bind(member_ids).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Store a rendered tally and return its id
pub async fn insert_tally(
    conn: &mut PgConnection,
    creation_time: DateTime<Utc>,
    collection_date: NaiveDate,
    total_amount: Amount,
    compressed_contents: &[u8],
) -> Result<i64, PostgresError> {
    let query = r#"
        INSERT INTO tallies (creation_time, collection_date, total_amount, compressed_contents)
        VALUES ($1, $2, $3, $4)
        RETURNING id
    "#;

    let id: i64 = sqlx::query_scalar(query)
        .bind(creation_time)
        .bind(collection_date)
        .bind(total_amount.cents())
        .bind(compressed_contents)
        .fetch_one(conn)
        .await?;

    Ok(id)
}

async fn fetch_relations(conn: &mut PgConnection) -> Result<Vec<Relation>, PostgresError> {
    let rows = sqlx::query("SELECT first_id, second_id FROM relations")
        .fetch_all(conn)
        .await?;

    rows.iter()
        .map(|row| -> Result<Relation, PostgresError> {
            Ok(Relation {
                first_id: row.try_get("first_id")?,
                second_id: row.try_get("second_id")?,
            })
        })
        .collect()
}

async fn insert_relation(conn: &mut PgConnection, relation: Relation) -> Result<(), PostgresError> {
    let relation = Relation::normalized(relation.first_id, relation.second_id);
    sqlx::query("INSERT INTO relations (first_id, second_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(relation.first_id)
        .bind(relation.second_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Names must be unique and non-empty, costs non-negative
fn check_default_costs(costs: &[(&str, Amount)]) -> Result<(), PostgresError> {
    for (i, &(name, cost)) in costs.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(PostgresError::InvalidInput("Fixed cost without name".to_string()));
        }
        if cost.is_negative() {
            return Err(PostgresError::InvalidInput(format!(
                "Fixed cost '{}' is negative",
                name
            )));
        }
        if costs[..i].iter().any(|&(other, _)| other == name) {
            return Err(PostgresError::InvalidInput(format!(
                "Fixed cost '{}' given twice",
                name
            )));
        }
    }
    Ok(())
}

fn member_from_row(row: &PgRow) -> Result<Member, PostgresError> {
    let gender: String = row.try_get("gender")?;

    Ok(Member {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        gender: gender.parse::<Gender>().map_err(PostgresError::InvalidInput)?,
        birthday: row.try_get("birthday")?,
        entry_date: row.try_get("entry_date")?,
        exit_date: row.try_get("exit_date")?,
        street: row.try_get("street")?,
        street_number: row.try_get("street_number")?,
        postal_code: row.try_get("postal_code")?,
        city: row.try_get("city")?,
        phone_number: row.try_get("phone_number")?,
        email_address: row.try_get("email_address")?,
        iban: row.try_get("iban")?,
        bic: row.try_get("bic")?,
        account_owner: row.try_get("account_owner")?,
        sepa_mandate_date: row.try_get("sepa_mandate_date")?,
    })
}
