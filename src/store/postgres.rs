//! PostgreSQL store implementation.
//!
//! Records are persisted as JSONB documents alongside the columns the
//! engine filters and guards on (`tournament_id`, `version`). A
//! [`WriteBatch`] maps onto one database transaction; any version-guard
//! miss rolls the whole transaction back.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::env;
use std::time::Duration;

use super::{MatchStore, WriteBatch};
use crate::errors::{EngineError, EngineResult};
use crate::models::{MatchId, MatchRecord, Team, TournamentConfig, TournamentId};

/// Connection configuration for the Postgres store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
}

impl StoreConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 20)
    /// - `DB_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 10)
    ///
    /// # Panics
    ///
    /// Panics if `DATABASE_URL` is not set
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("DB_MAX_CONNECTIONS must be a valid u32"),
            connection_timeout_secs: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DB_CONNECTION_TIMEOUT must be a valid u64"),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/tourney_db".to_string(),
            max_connections: 20,
            connection_timeout_secs: 10,
        }
    }
}

/// A `MatchStore` backed by PostgreSQL
#[derive(Clone)]
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    /// Connect a new store
    pub async fn connect(config: &StoreConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing tables if they do not exist
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournaments (
                id UUID PRIMARY KEY,
                doc JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id UUID PRIMARY KEY,
                tournament_id UUID NOT NULL,
                doc JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS matches (
                id UUID PRIMARY KEY,
                tournament_id UUID NOT NULL,
                version BIGINT NOT NULL,
                doc JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS matches_tournament_idx ON matches (tournament_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert or replace a tournament configuration record
    pub async fn put_tournament(
        &self,
        id: TournamentId,
        config: &TournamentConfig,
    ) -> EngineResult<()> {
        let doc = serde_json::to_value(config)?;
        sqlx::query(
            "INSERT INTO tournaments (id, doc) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Register a team under a tournament
    pub async fn put_team(&self, tournament_id: TournamentId, team: &Team) -> EngineResult<()> {
        let doc = serde_json::to_value(team)?;
        sqlx::query(
            "INSERT INTO teams (id, tournament_id, doc) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(team.id)
        .bind(tournament_id)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn tournament_config(&self, id: TournamentId) -> EngineResult<TournamentConfig> {
        let row = sqlx::query("SELECT doc FROM tournaments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(EngineError::TournamentNotFound(id))?;

        let config: TournamentConfig = serde_json::from_value(row.get("doc"))?;
        Ok(config)
    }

    async fn teams(&self, id: TournamentId) -> EngineResult<Vec<Team>> {
        let rows = sqlx::query("SELECT doc FROM teams WHERE tournament_id = $1 ORDER BY id")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let mut teams = Vec::with_capacity(rows.len());
        for row in rows {
            teams.push(serde_json::from_value(row.get("doc"))?);
        }
        Ok(teams)
    }

    async fn get_match(&self, id: MatchId) -> EngineResult<MatchRecord> {
        let row = sqlx::query("SELECT doc FROM matches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(EngineError::MatchNotFound(id))?;

        let record: MatchRecord = serde_json::from_value(row.get("doc"))?;
        Ok(record)
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> EngineResult<Vec<MatchRecord>> {
        let rows = sqlx::query("SELECT doc FROM matches WHERE tournament_id = $1")
            .bind(tournament_id)
            .fetch_all(&self.pool)
            .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            matches.push(serde_json::from_value(row.get("doc"))?);
        }
        Ok(matches)
    }

    async fn commit(&self, batch: WriteBatch) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        for record in &batch.inserts {
            let doc = serde_json::to_value(record)?;
            sqlx::query(
                "INSERT INTO matches (id, tournament_id, version, doc) VALUES ($1, $2, $3, $4)",
            )
            .bind(record.id)
            .bind(record.tournament_id)
            .bind(record.version)
            .bind(doc)
            .execute(&mut *tx)
            .await?;
        }

        for update in &batch.updates {
            let doc = serde_json::to_value(&update.record)?;
            let result = sqlx::query(
                "UPDATE matches SET version = $1, doc = $2 WHERE id = $3 AND version = $4",
            )
            .bind(update.record.version)
            .bind(doc)
            .bind(update.record.id)
            .bind(update.expected_version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Distinguish a missing row from a stale guard; the
                // transaction is dropped unconditionally either way.
                let stored = sqlx::query("SELECT version FROM matches WHERE id = $1")
                    .bind(update.record.id)
                    .fetch_optional(&mut *tx)
                    .await?;
                return Err(match stored {
                    Some(row) => EngineError::ConcurrentModification {
                        match_id: update.record.id,
                        expected: update.expected_version,
                        stored: row.get("version"),
                    },
                    None => EngineError::MatchNotFound(update.record.id),
                });
            }
        }

        for (id, expected) in &batch.deletes {
            let result = sqlx::query("DELETE FROM matches WHERE id = $1 AND version = $2")
                .bind(id)
                .bind(expected)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                let stored = sqlx::query("SELECT version FROM matches WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
                return Err(match stored {
                    Some(row) => EngineError::ConcurrentModification {
                        match_id: *id,
                        expected: *expected,
                        stored: row.get("version"),
                    },
                    None => EngineError::MatchNotFound(*id),
                });
            }
        }

        if let Some((tid, config)) = &batch.config_update {
            let doc = serde_json::to_value(config)?;
            let result = sqlx::query("UPDATE tournaments SET doc = $1 WHERE id = $2")
                .bind(doc)
                .bind(tid)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(EngineError::TournamentNotFound(*tid));
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
