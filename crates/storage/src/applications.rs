use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use empleaworks_core::types::{
    Applicant, Application, ApplicationStatus, ApplicationSummary, UnknownVariant,
};

use crate::{is_foreign_key_violation, is_unique_violation, to_rfc3339};

/// Repository for candidate applications.
#[derive(Clone)]
pub struct ApplicationRepository {
    pub(crate) pool: SqlitePool,
}

pub struct NewApplication<'a> {
    pub id: String,
    pub offer_id: &'a str,
    pub user_id: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
    pub cv_path: Option<&'a str>,
    pub cover_letter: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: String,
    offer_id: String,
    user_id: String,
    phone: String,
    email: String,
    cv_path: Option<String>,
    cover_letter: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_domain(self) -> Result<Application, UnknownVariant> {
        Ok(Application {
            id: self.id,
            offer_id: self.offer_id,
            user_id: self.user_id,
            phone: self.phone,
            email: self.email,
            cv_path: self.cv_path,
            cover_letter: self.cover_letter,
            status: self.status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    application: ApplicationRow,
    offer_title: String,
    company_id: String,
    company_name: String,
    offer_closing_date: NaiveDate,
}

#[derive(Debug, sqlx::FromRow)]
struct ApplicantRow {
    #[sqlx(flatten)]
    application: ApplicationRow,
    offer_title: String,
    candidate_name: String,
    candidate_surname: String,
    candidate_avatar: Option<String>,
}

impl ApplicantRow {
    fn into_domain(self) -> Result<Applicant, UnknownVariant> {
        Ok(Applicant {
            application: self.application.into_domain()?,
            offer_title: self.offer_title,
            candidate_name: self.candidate_name,
            candidate_surname: self.candidate_surname,
            candidate_avatar: self.candidate_avatar,
        })
    }
}

const APPLICATION_COLUMNS: &str = "a.id, a.offer_id, a.user_id, a.phone, a.email, a.cv_path, \
     a.cover_letter, a.status, a.created_at, a.updated_at";

const APPLICANT_SELECT: &str = "SELECT a.id, a.offer_id, a.user_id, a.phone, a.email, a.cv_path, \
     a.cover_letter, a.status, a.created_at, a.updated_at, \
     o.title AS offer_title, u.name AS candidate_name, \
     COALESCE(c.surname, '') AS candidate_surname, u.avatar_path AS candidate_avatar \
     FROM applications a \
     JOIN offers o ON o.id = a.offer_id \
     JOIN users u ON u.id = a.user_id \
     LEFT JOIN candidates c ON c.user_id = a.user_id";

fn map_applicants(rows: Vec<ApplicantRow>) -> Result<Vec<Applicant>, ApplicationError> {
    rows.into_iter()
        .map(|row| row.into_domain().map_err(ApplicationError::from))
        .collect()
}

impl ApplicationRepository {
    /// Records a new pending application.
    pub async fn create(&self, application: &NewApplication<'_>) -> Result<Application, ApplicationError> {
        let created_at = to_rfc3339(application.created_at);
        sqlx::query(
            "INSERT INTO applications (id, offer_id, user_id, phone, email, cv_path, cover_letter, \
             status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&application.id)
        .bind(application.offer_id)
        .bind(application.user_id)
        .bind(application.phone)
        .bind(application.email)
        .bind(application.cv_path)
        .bind(application.cover_letter)
        .bind(ApplicationStatus::Pending.as_str())
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApplicationError::AlreadyApplied
            } else if is_foreign_key_violation(&err) {
                ApplicationError::MissingOffer
            } else {
                ApplicationError::Database(err)
            }
        })?;

        Ok(Application {
            id: application.id.clone(),
            offer_id: application.offer_id.to_string(),
            user_id: application.user_id.to_string(),
            phone: application.phone.to_string(),
            email: application.email.to_string(),
            cv_path: application.cv_path.map(str::to_string),
            cover_letter: application.cover_letter.map(str::to_string),
            status: ApplicationStatus::Pending,
            created_at: application.created_at,
            updated_at: application.created_at,
        })
    }

    pub async fn exists(&self, offer_id: &str, user_id: &str) -> Result<bool, ApplicationError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE offer_id = ? AND user_id = ?)",
        )
        .bind(offer_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<Application>, ApplicationError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications a WHERE a.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ApplicationRow::into_domain)
            .transpose()
            .map_err(ApplicationError::from)
    }

    pub async fn count_for_offer(&self, offer_id: &str) -> Result<i64, ApplicationError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM applications WHERE offer_id = ?")
            .bind(offer_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_for_candidate(&self, user_id: &str) -> Result<i64, ApplicationError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM applications WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Applications sent by a candidate, newest first, with offer context.
    pub async fn list_for_candidate(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ApplicationSummary>, ApplicationError> {
        let rows = sqlx::query_as::<_, SummaryRow>(&format!(
            "SELECT {APPLICATION_COLUMNS}, o.title AS offer_title, o.company_id AS company_id, \
             u.name AS company_name, o.closing_date AS offer_closing_date \
             FROM applications a \
             JOIN offers o ON o.id = a.offer_id \
             JOIN users u ON u.id = o.company_id \
             WHERE a.user_id = ? \
             ORDER BY a.created_at DESC, a.id \
             LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ApplicationSummary {
                    application: row.application.into_domain()?,
                    offer_title: row.offer_title,
                    company_id: row.company_id,
                    company_name: row.company_name,
                    offer_closing_date: row.offer_closing_date,
                })
            })
            .collect()
    }

    /// Applicants for one offer, restricted to the owning company.
    pub async fn list_for_offer(
        &self,
        offer_id: &str,
        company_id: &str,
    ) -> Result<Vec<Applicant>, ApplicationError> {
        let rows = sqlx::query_as::<_, ApplicantRow>(&format!(
            "{APPLICANT_SELECT} WHERE a.offer_id = ? AND o.company_id = ? \
             ORDER BY a.created_at DESC, a.id"
        ))
        .bind(offer_id)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        map_applicants(rows)
    }

    /// Applicants across every offer owned by the company.
    pub async fn list_for_company(&self, company_id: &str) -> Result<Vec<Applicant>, ApplicationError> {
        let rows = sqlx::query_as::<_, ApplicantRow>(&format!(
            "{APPLICANT_SELECT} WHERE o.company_id = ? ORDER BY a.created_at DESC, a.id"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        map_applicants(rows)
    }

    /// Loads an application only when it targets an offer of `company_id`.
    pub async fn fetch_for_company(
        &self,
        id: &str,
        company_id: &str,
    ) -> Result<Option<Applicant>, ApplicationError> {
        let row = sqlx::query_as::<_, ApplicantRow>(&format!(
            "{APPLICANT_SELECT} WHERE a.id = ? AND o.company_id = ?"
        ))
        .bind(id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ApplicantRow::into_domain)
            .transpose()
            .map_err(ApplicationError::from)
    }

    /// Changes the status of an application on an offer owned by `company_id`.
    pub async fn update_status(
        &self,
        id: &str,
        company_id: &str,
        status: ApplicationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        let result = sqlx::query(
            "UPDATE applications SET status = ?, updated_at = ? \
             WHERE id = ? AND offer_id IN (SELECT id FROM offers WHERE company_id = ?)",
        )
        .bind(status.as_str())
        .bind(to_rfc3339(updated_at))
        .bind(id)
        .bind(company_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApplicationError::NotFound);
        }
        Ok(())
    }

    /// Withdraws an application sent by `user_id`.
    pub async fn delete_for_candidate(&self, id: &str, user_id: &str) -> Result<(), ApplicationError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApplicationError::NotFound);
        }
        Ok(())
    }

    /// Whether the candidate has applied to any offer of the company.
    pub async fn candidate_applied_to_company(
        &self,
        candidate_id: &str,
        company_id: &str,
    ) -> Result<bool, ApplicationError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM applications a JOIN offers o ON o.id = a.offer_id \
             WHERE a.user_id = ? AND o.company_id = ?)",
        )
        .bind(candidate_id)
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("candidate already applied to this offer")]
    AlreadyApplied,
    #[error("offer does not exist")]
    MissingOffer,
    #[error("application not found")]
    NotFound,
    #[error("stored application row is invalid: {0}")]
    Corrupt(#[from] UnknownVariant),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
