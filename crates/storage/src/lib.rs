mod applications;
mod offers;
mod profiles;
mod saved_offers;
mod users;

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Sqlite, SqlitePool, Transaction,
};
use thiserror::Error;
use uuid::Uuid;

pub use applications::{ApplicationError, ApplicationRepository, NewApplication};
pub use offers::{NewOffer, OfferError, OfferQuery, OfferRepository};
pub use profiles::{
    CandidateRepository, CandidateUpdate, CompanyRepository, CompanyUpdate, ProfileError,
};
pub use saved_offers::{SavedOfferError, SavedOfferRepository};
pub use users::{NewUser, UserCredentials, UserError, UserRepository};

const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// The database file is created when missing. Every pooled connection
    /// enforces foreign keys and runs in WAL mode.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Options)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Begins a transaction spanning several repositories.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Returns a handle for user accounts.
    pub fn users(&self) -> UserRepository {
        UserRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for candidate profiles.
    pub fn candidates(&self) -> CandidateRepository {
        CandidateRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for company profiles.
    pub fn companies(&self) -> CompanyRepository {
        CompanyRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for job offers.
    pub fn offers(&self) -> OfferRepository {
        OfferRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for applications.
    pub fn applications(&self) -> ApplicationRepository {
        ApplicationRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for saved offer bookmarks.
    pub fn saved_offers(&self) -> SavedOfferRepository {
        SavedOfferRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid database url: {0}")]
    Options(sqlx::Error),
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Generates a fresh identifier for new rows.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_iso_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn constraint_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        constraint_code(err).as_deref(),
        Some(SQLITE_CONSTRAINT_UNIQUE) | Some(SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    constraint_code(err).as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY)
}
