use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use empleaworks_core::types::{CompanyOffer, ContractType, Offer, UnknownVariant};
use empleaworks_core::validation::ValidOffer;

use crate::{is_foreign_key_violation, to_iso_date, to_rfc3339};

/// Repository for job offers.
#[derive(Clone)]
pub struct OfferRepository {
    pub(crate) pool: SqlitePool,
}

pub struct NewOffer<'a> {
    pub id: String,
    pub company_id: &'a str,
    pub fields: &'a ValidOffer,
    pub created_at: DateTime<Utc>,
}

/// Filters and paging for the public offer listing.
#[derive(Debug, Clone, Default)]
pub struct OfferQuery<'a> {
    pub q: Option<&'a str>,
    pub category: Option<&'a str>,
    pub contract_type: Option<ContractType>,
    pub location: Option<&'a str>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, sqlx::FromRow)]
struct OfferRow {
    id: String,
    company_id: String,
    company_name: String,
    title: String,
    description: String,
    category: String,
    degree: String,
    email: String,
    contract_type: String,
    job_location: String,
    closing_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OfferRow {
    fn into_domain(self) -> Result<Offer, UnknownVariant> {
        Ok(Offer {
            id: self.id,
            company_id: self.company_id,
            company_name: self.company_name,
            title: self.title,
            description: self.description,
            category: self.category,
            degree: self.degree,
            email: self.email,
            contract_type: self.contract_type.parse()?,
            job_location: self.job_location,
            closing_date: self.closing_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyOfferRow {
    #[sqlx(flatten)]
    offer: OfferRow,
    applicants_count: i64,
}

const OFFER_SELECT: &str = "SELECT o.id, o.company_id, u.name AS company_name, o.title, \
     o.description, o.category, o.degree, o.email, o.contract_type, o.job_location, \
     o.closing_date, o.created_at, o.updated_at \
     FROM offers o JOIN users u ON u.id = o.company_id";

// Each optional filter is bound twice: once for the NULL check, once for the comparison.
const FILTER_CLAUSE: &str = "(?1 IS NULL OR o.title LIKE ?1 ESCAPE '\\' OR o.description LIKE ?1 ESCAPE '\\') \
     AND (?2 IS NULL OR o.category = ?2) \
     AND (?3 IS NULL OR o.contract_type = ?3) \
     AND (?4 IS NULL OR o.job_location LIKE ?4 ESCAPE '\\')";

fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn map_rows(rows: Vec<OfferRow>) -> Result<Vec<Offer>, OfferError> {
    rows.into_iter()
        .map(|row| row.into_domain().map_err(OfferError::from))
        .collect()
}

impl OfferRepository {
    pub async fn create(&self, offer: &NewOffer<'_>) -> Result<(), OfferError> {
        let created_at = to_rfc3339(offer.created_at);
        let fields = offer.fields;
        sqlx::query(
            "INSERT INTO offers (id, company_id, title, description, category, degree, email, \
             contract_type, job_location, closing_date, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&offer.id)
        .bind(offer.company_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.category)
        .bind(&fields.degree)
        .bind(&fields.email)
        .bind(fields.contract_type.as_str())
        .bind(&fields.job_location)
        .bind(to_iso_date(fields.closing_date))
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                OfferError::MissingCompany
            } else {
                OfferError::Database(err)
            }
        })?;
        Ok(())
    }

    /// Loads one offer together with the owning company's name.
    pub async fn fetch(&self, id: &str) -> Result<Option<Offer>, OfferError> {
        let row = sqlx::query_as::<_, OfferRow>(&format!("{OFFER_SELECT} WHERE o.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(OfferRow::into_domain)
            .transpose()
            .map_err(OfferError::from)
    }

    /// Filtered page of offers. Open offers come first, newest first within each group.
    pub async fn list(&self, query: &OfferQuery<'_>, today: NaiveDate) -> Result<Vec<Offer>, OfferError> {
        let sql = format!(
            "{OFFER_SELECT} WHERE {FILTER_CLAUSE} \
             ORDER BY CASE WHEN o.closing_date < ?5 THEN 1 ELSE 0 END, o.created_at DESC, o.id \
             LIMIT ?6 OFFSET ?7"
        );
        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(query.q.map(like_pattern))
            .bind(query.category)
            .bind(query.contract_type.map(ContractType::as_str))
            .bind(query.location.map(like_pattern))
            .bind(to_iso_date(today))
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(&self.pool)
            .await?;
        map_rows(rows)
    }

    /// Number of offers matching the filters, ignoring paging.
    pub async fn count(&self, query: &OfferQuery<'_>) -> Result<i64, OfferError> {
        let sql = format!("SELECT COUNT(*) FROM offers o WHERE {FILTER_CLAUSE}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(query.q.map(like_pattern))
            .bind(query.category)
            .bind(query.contract_type.map(ContractType::as_str))
            .bind(query.location.map(like_pattern))
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Most recent offers still accepting applications.
    pub async fn latest(&self, limit: u32, today: NaiveDate) -> Result<Vec<Offer>, OfferError> {
        let rows = sqlx::query_as::<_, OfferRow>(&format!(
            "{OFFER_SELECT} WHERE o.closing_date >= ? ORDER BY o.created_at DESC, o.id LIMIT ?"
        ))
        .bind(to_iso_date(today))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }

    /// Distinct categories, for the listing filter.
    pub async fn categories(&self) -> Result<Vec<String>, OfferError> {
        let categories =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT category FROM offers ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    /// Every offer owned by the company with its application count.
    pub async fn list_for_company(&self, company_id: &str) -> Result<Vec<CompanyOffer>, OfferError> {
        let rows = sqlx::query_as::<_, CompanyOfferRow>(&format!(
            "SELECT sub.*, (SELECT COUNT(*) FROM applications a WHERE a.offer_id = sub.id) AS applicants_count \
             FROM ({OFFER_SELECT} WHERE o.company_id = ?) sub \
             ORDER BY sub.created_at DESC, sub.id"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CompanyOffer {
                    offer: row.offer.into_domain()?,
                    applicants_count: row.applicants_count,
                })
            })
            .collect()
    }

    /// Open offers of one company, for its public page.
    pub async fn list_open_for_company(
        &self,
        company_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<Offer>, OfferError> {
        let rows = sqlx::query_as::<_, OfferRow>(&format!(
            "{OFFER_SELECT} WHERE o.company_id = ? AND o.closing_date >= ? \
             ORDER BY o.created_at DESC, o.id"
        ))
        .bind(company_id)
        .bind(to_iso_date(today))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }

    /// Updates an offer owned by `company_id`.
    pub async fn update(
        &self,
        id: &str,
        company_id: &str,
        fields: &ValidOffer,
        updated_at: DateTime<Utc>,
    ) -> Result<(), OfferError> {
        let result = sqlx::query(
            "UPDATE offers SET title = ?, description = ?, category = ?, degree = ?, email = ?, \
             contract_type = ?, job_location = ?, closing_date = ?, updated_at = ? \
             WHERE id = ? AND company_id = ?",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.category)
        .bind(&fields.degree)
        .bind(&fields.email)
        .bind(fields.contract_type.as_str())
        .bind(&fields.job_location)
        .bind(to_iso_date(fields.closing_date))
        .bind(to_rfc3339(updated_at))
        .bind(id)
        .bind(company_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OfferError::NotFound);
        }
        Ok(())
    }

    /// Deletes an offer owned by `company_id`; applications and bookmarks cascade.
    pub async fn delete(&self, id: &str, company_id: &str) -> Result<(), OfferError> {
        let result = sqlx::query("DELETE FROM offers WHERE id = ? AND company_id = ?")
            .bind(id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(OfferError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum OfferError {
    #[error("offer not found")]
    NotFound,
    #[error("offer company does not exist")]
    MissingCompany,
    #[error("stored offer row is invalid: {0}")]
    Corrupt(#[from] UnknownVariant),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
