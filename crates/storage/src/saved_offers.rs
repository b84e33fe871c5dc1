use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use empleaworks_core::types::{Offer, SavedState, UnknownVariant};

use crate::offers::OfferError;
use crate::{is_foreign_key_violation, to_rfc3339};

/// Repository for candidate bookmarks.
#[derive(Clone)]
pub struct SavedOfferRepository {
    pub(crate) pool: SqlitePool,
}

impl SavedOfferRepository {
    /// Flips the bookmark for the pair and reports the resulting state.
    pub async fn toggle(
        &self,
        user_id: &str,
        offer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SavedState, SavedOfferError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM saved_offers WHERE user_id = ? AND offer_id = ?")
            .bind(user_id)
            .bind(offer_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let state = if removed > 0 {
            SavedState::Removed
        } else {
            sqlx::query("INSERT INTO saved_offers (user_id, offer_id, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(offer_id)
                .bind(to_rfc3339(now))
                .execute(&mut *tx)
                .await
                .map_err(|err| {
                    if is_foreign_key_violation(&err) {
                        SavedOfferError::MissingOffer
                    } else {
                        SavedOfferError::Database(err)
                    }
                })?;
            SavedState::Saved
        };

        tx.commit().await?;
        Ok(state)
    }

    pub async fn is_saved(&self, user_id: &str, offer_id: &str) -> Result<bool, SavedOfferError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM saved_offers WHERE user_id = ? AND offer_id = ?)",
        )
        .bind(user_id)
        .bind(offer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    /// Offer ids bookmarked by the candidate, for marking listing cards.
    pub async fn saved_ids(&self, user_id: &str) -> Result<HashSet<String>, SavedOfferError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT offer_id FROM saved_offers WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Bookmarked offers, most recently saved first.
    pub async fn list_for_candidate(&self, user_id: &str) -> Result<Vec<Offer>, SavedOfferError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT offer_id FROM saved_offers WHERE user_id = ? ORDER BY created_at DESC, offer_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let offers = crate::OfferRepository {
            pool: self.pool.clone(),
        };
        let mut saved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(offer) = offers.fetch(&id).await? {
                saved.push(offer);
            }
        }
        Ok(saved)
    }

    pub async fn count_for_candidate(&self, user_id: &str) -> Result<i64, SavedOfferError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM saved_offers WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[derive(Debug, Error)]
pub enum SavedOfferError {
    #[error("offer does not exist")]
    MissingOffer,
    #[error("stored offer row is invalid: {0}")]
    Corrupt(#[from] UnknownVariant),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<OfferError> for SavedOfferError {
    fn from(err: OfferError) -> Self {
        match err {
            OfferError::Corrupt(inner) => Self::Corrupt(inner),
            OfferError::Database(inner) => Self::Database(inner),
            OfferError::NotFound | OfferError::MissingCompany => Self::MissingOffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use empleaworks_core::types::Role;

    use super::*;
    use crate::test_support::{create_offer, create_user, now, setup_db, today, valid_offer};

    #[tokio::test]
    async fn toggle_twice_restores_state() {
        let test = setup_db().await;
        let company = create_user(&test.db, "Acme", "hr@acme.test", Role::Company).await;
        let candidate = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;
        let offer = create_offer(&test.db, &company.id, &valid_offer("Rust", today()), now()).await;
        let repo = test.db.saved_offers();

        assert!(!repo.is_saved(&candidate.id, &offer).await.expect("check"));
        assert_eq!(
            repo.toggle(&candidate.id, &offer, now()).await.expect("toggle"),
            SavedState::Saved
        );
        assert!(repo.is_saved(&candidate.id, &offer).await.expect("check"));
        assert_eq!(
            repo.toggle(&candidate.id, &offer, now()).await.expect("toggle"),
            SavedState::Removed
        );
        assert!(!repo.is_saved(&candidate.id, &offer).await.expect("check"));
        assert_eq!(repo.count_for_candidate(&candidate.id).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn toggle_unknown_offer_fails() {
        let test = setup_db().await;
        let candidate = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;
        let err = test
            .db
            .saved_offers()
            .toggle(&candidate.id, "missing", now())
            .await
            .unwrap_err();
        assert!(matches!(err, SavedOfferError::MissingOffer));
    }

    #[tokio::test]
    async fn listing_orders_by_save_time() {
        let test = setup_db().await;
        let company = create_user(&test.db, "Acme", "hr@acme.test", Role::Company).await;
        let candidate = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;
        let first = create_offer(&test.db, &company.id, &valid_offer("First", today()), now()).await;
        let second = create_offer(&test.db, &company.id, &valid_offer("Second", today()), now()).await;
        let repo = test.db.saved_offers();

        repo.toggle(&candidate.id, &first, now()).await.expect("save");
        repo.toggle(&candidate.id, &second, now() + Duration::minutes(1))
            .await
            .expect("save");

        let saved = repo.list_for_candidate(&candidate.id).await.expect("list");
        let titles: Vec<&str> = saved.iter().map(|offer| offer.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);

        let ids = repo.saved_ids(&candidate.id).await.expect("ids");
        assert!(ids.contains(&first) && ids.contains(&second));

        test.db.offers().delete(&first, &company.id).await.expect("delete");
        assert_eq!(repo.count_for_candidate(&candidate.id).await.expect("count"), 1);
    }
}
