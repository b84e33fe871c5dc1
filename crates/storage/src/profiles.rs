use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;

use empleaworks_core::types::{CandidateProfile, CompanyProfile};

use crate::to_rfc3339;

/// Repository for candidate profiles.
#[derive(Clone)]
pub struct CandidateRepository {
    pub(crate) pool: SqlitePool,
}

/// Repository for company profiles.
#[derive(Clone)]
pub struct CompanyRepository {
    pub(crate) pool: SqlitePool,
}

/// Editable candidate fields.
pub struct CandidateUpdate<'a> {
    pub surname: &'a str,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Editable company fields.
pub struct CompanyUpdate<'a> {
    pub address: Option<&'a str>,
    pub web_link: Option<&'a str>,
    pub description: Option<&'a str>,
    pub phone: Option<&'a str>,
}

#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    user_id: String,
    surname: String,
    phone: Option<String>,
    address: Option<String>,
    description: Option<String>,
    cv_path: Option<String>,
}

impl From<CandidateRow> for CandidateProfile {
    fn from(row: CandidateRow) -> Self {
        Self {
            user_id: row.user_id,
            surname: row.surname,
            phone: row.phone,
            address: row.address,
            description: row.description,
            cv_path: row.cv_path,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    user_id: String,
    address: Option<String>,
    web_link: Option<String>,
    description: Option<String>,
    phone: Option<String>,
}

impl From<CompanyRow> for CompanyProfile {
    fn from(row: CompanyRow) -> Self {
        Self {
            user_id: row.user_id,
            address: row.address,
            web_link: row.web_link,
            description: row.description,
            phone: row.phone,
        }
    }
}

impl CandidateRepository {
    pub async fn fetch(&self, user_id: &str) -> Result<Option<CandidateProfile>, ProfileError> {
        let row = sqlx::query_as::<_, CandidateRow>(
            "SELECT user_id, surname, phone, address, description, cv_path \
             FROM candidates WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CandidateProfile::from))
    }

    /// Writes the editable fields inside a caller-owned transaction.
    pub async fn update(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        user_id: &str,
        update: &CandidateUpdate<'_>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ProfileError> {
        let result = sqlx::query(
            "UPDATE candidates SET surname = ?, phone = ?, address = ?, description = ?, updated_at = ? \
             WHERE user_id = ?",
        )
        .bind(update.surname)
        .bind(update.phone)
        .bind(update.address)
        .bind(update.description)
        .bind(to_rfc3339(updated_at))
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ProfileError::NotFound);
        }
        Ok(())
    }

    /// Stores the new CV file name and returns the one it replaced.
    pub async fn set_cv(
        &self,
        user_id: &str,
        cv_path: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<String>, ProfileError> {
        let mut tx = self.pool.begin().await?;
        let previous =
            sqlx::query_scalar::<_, Option<String>>("SELECT cv_path FROM candidates WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(ProfileError::NotFound)?;

        sqlx::query("UPDATE candidates SET cv_path = ?, updated_at = ? WHERE user_id = ?")
            .bind(cv_path)
            .bind(to_rfc3339(updated_at))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(previous)
    }
}

impl CompanyRepository {
    pub async fn fetch(&self, user_id: &str) -> Result<Option<CompanyProfile>, ProfileError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT user_id, address, web_link, description, phone FROM companies WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CompanyProfile::from))
    }

    pub async fn update(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        user_id: &str,
        update: &CompanyUpdate<'_>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ProfileError> {
        let result = sqlx::query(
            "UPDATE companies SET address = ?, web_link = ?, description = ?, phone = ?, updated_at = ? \
             WHERE user_id = ?",
        )
        .bind(update.address)
        .bind(update.web_link)
        .bind(update.description)
        .bind(update.phone)
        .bind(to_rfc3339(updated_at))
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ProfileError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
