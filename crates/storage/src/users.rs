use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;

use empleaworks_core::types::{Locale, Role, UnknownVariant, User};

use crate::{is_unique_violation, to_rfc3339};

/// Repository for user accounts.
#[derive(Clone)]
pub struct UserRepository {
    pub(crate) pool: SqlitePool,
}

/// Data required to register an account.
pub struct NewUser<'a> {
    pub id: String,
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub locale: Locale,
    /// Only stored for candidates.
    pub surname: &'a str,
    pub created_at: DateTime<Utc>,
}

/// User row together with the stored password hash, used for sign-in.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    role: String,
    locale: String,
    avatar_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> Result<User, UnknownVariant> {
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role.parse()?,
            locale: self.locale.parse().unwrap_or_default(),
            avatar_path: self.avatar_path,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

const USER_COLUMNS: &str =
    "id, name, email, role, locale, avatar_path, created_at, updated_at";

impl UserRepository {
    /// Inserts the account and its empty role profile in one transaction.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<User, UserError> {
        let created_at = to_rfc3339(user.created_at);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, locale, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role.as_str())
        .bind(user.locale.as_str())
        .bind(&created_at)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                UserError::DuplicateEmail
            } else {
                UserError::Database(err)
            }
        })?;

        match user.role {
            Role::Candidate => {
                sqlx::query(
                    "INSERT INTO candidates (user_id, surname, updated_at) VALUES (?, ?, ?)",
                )
                .bind(&user.id)
                .bind(user.surname)
                .bind(&created_at)
                .execute(&mut *tx)
                .await?;
            }
            Role::Company => {
                sqlx::query("INSERT INTO companies (user_id, updated_at) VALUES (?, ?)")
                    .bind(&user.id)
                    .bind(&created_at)
                    .execute(&mut *tx)
                    .await?;
            }
            Role::Admin => {}
        }

        tx.commit().await?;

        Ok(User {
            id: user.id.clone(),
            name: user.name.to_string(),
            email: user.email.to_string(),
            role: user.role,
            locale: user.locale,
            avatar_path: None,
            created_at: user.created_at,
            updated_at: user.created_at,
        })
    }

    /// Loads a user by primary key.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_domain).transpose().map_err(UserError::from)
    }

    /// Loads a user and password hash by (lower-cased) email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, UserError> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(UserCredentials {
                user: row.user.into_domain()?,
                password_hash: row.password_hash,
            })
        })
        .transpose()
    }

    /// Returns the stored password hash for the account.
    pub async fn password_hash(&self, id: &str) -> Result<String, UserError> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(UserError::NotFound)
    }

    /// Updates display name and email inside a caller-owned transaction.
    pub async fn update_account(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        name: &str,
        email: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), UserError> {
        let result = sqlx::query("UPDATE users SET name = ?, email = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(email)
            .bind(to_rfc3339(updated_at))
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    UserError::DuplicateEmail
                } else {
                    UserError::Database(err)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    pub async fn update_password(
        &self,
        id: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), UserError> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(to_rfc3339(updated_at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    pub async fn update_locale(
        &self,
        id: &str,
        locale: Locale,
        updated_at: DateTime<Utc>,
    ) -> Result<(), UserError> {
        sqlx::query("UPDATE users SET locale = ?, updated_at = ? WHERE id = ?")
            .bind(locale.as_str())
            .bind(to_rfc3339(updated_at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replaces the avatar file name, returning the previous one so the caller can remove it.
    pub async fn set_avatar(
        &self,
        id: &str,
        avatar_path: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<String>, UserError> {
        let mut tx = self.pool.begin().await?;
        let previous = sqlx::query_scalar::<_, Option<String>>(
            "SELECT avatar_path FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(UserError::NotFound)?;

        sqlx::query("UPDATE users SET avatar_path = ?, updated_at = ? WHERE id = ?")
            .bind(avatar_path)
            .bind(to_rfc3339(updated_at))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(previous)
    }

    /// Deletes the account; profiles, offers, applications and bookmarks cascade.
    pub async fn delete(&self, id: &str) -> Result<(), UserError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }
}

/// Errors raised by the user repository.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error("stored user row is invalid: {0}")]
    Corrupt(#[from] UnknownVariant),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_user, now, setup_db};
    use crate::new_id;

    #[tokio::test]
    async fn create_inserts_role_profile() {
        let test = setup_db().await;
        let candidate = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;
        let company = create_user(&test.db, "Acme", "hr@acme.test", Role::Company).await;

        let profile = test
            .db
            .candidates()
            .fetch(&candidate.id)
            .await
            .expect("fetch")
            .expect("candidate profile");
        assert_eq!(profile.user_id, candidate.id);
        assert!(test
            .db
            .companies()
            .fetch(&company.id)
            .await
            .expect("fetch")
            .is_some());
        assert!(test
            .db
            .companies()
            .fetch(&candidate.id)
            .await
            .expect("fetch")
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let test = setup_db().await;
        create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;

        let err = test
            .db
            .users()
            .create(&NewUser {
                id: new_id(),
                name: "Other",
                email: "ana@example.com",
                password_hash: "hash",
                role: Role::Company,
                locale: Locale::En,
                surname: "",
                created_at: now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(test.db.pool())
            .await
            .expect("count");
        assert_eq!(count, 0, "profile insert must roll back with the user");
    }

    #[tokio::test]
    async fn find_by_email_returns_hash() {
        let test = setup_db().await;
        let user = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;

        let found = test
            .db
            .users()
            .find_by_email("ana@example.com")
            .await
            .expect("query")
            .expect("user");
        assert_eq!(found.user, user);
        assert_eq!(found.password_hash, "hash");
        assert!(test
            .db
            .users()
            .find_by_email("missing@example.com")
            .await
            .expect("query")
            .is_none());
    }

    #[tokio::test]
    async fn update_account_detects_email_conflicts() {
        let test = setup_db().await;
        let ana = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;
        create_user(&test.db, "Bea", "bea@example.com", Role::Candidate).await;

        let repo = test.db.users();
        let mut tx = test.db.begin().await.expect("begin");
        let err = repo
            .update_account(&mut tx, &ana.id, "Ana", "bea@example.com", now())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail));
        tx.rollback().await.expect("rollback");

        let mut tx = test.db.begin().await.expect("begin");
        repo.update_account(&mut tx, &ana.id, "Ana María", "ana.maria@example.com", now())
            .await
            .expect("update");
        tx.commit().await.expect("commit");

        let user = repo.find_by_id(&ana.id).await.expect("query").expect("user");
        assert_eq!(user.name, "Ana María");
        assert_eq!(user.email, "ana.maria@example.com");
    }

    #[tokio::test]
    async fn set_avatar_returns_previous_file() {
        let test = setup_db().await;
        let user = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;
        let repo = test.db.users();

        let previous = repo.set_avatar(&user.id, Some("a.png"), now()).await.expect("set");
        assert_eq!(previous, None);
        let previous = repo.set_avatar(&user.id, Some("b.png"), now()).await.expect("set");
        assert_eq!(previous.as_deref(), Some("a.png"));
        let previous = repo.set_avatar(&user.id, None, now()).await.expect("clear");
        assert_eq!(previous.as_deref(), Some("b.png"));

        let err = repo.set_avatar("missing", None, now()).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }

    #[tokio::test]
    async fn delete_cascades_to_profile() {
        let test = setup_db().await;
        let user = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;
        test.db.users().delete(&user.id).await.expect("delete");

        assert!(test.db.candidates().fetch(&user.id).await.expect("fetch").is_none());
        let err = test.db.users().delete(&user.id).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }

    #[tokio::test]
    async fn locale_and_password_updates_persist() {
        let test = setup_db().await;
        let user = create_user(&test.db, "Ana", "ana@example.com", Role::Candidate).await;
        let repo = test.db.users();

        repo.update_locale(&user.id, Locale::En, now()).await.expect("locale");
        repo.update_password(&user.id, "new-hash", now()).await.expect("password");

        let reloaded = repo.find_by_id(&user.id).await.expect("query").expect("user");
        assert_eq!(reloaded.locale, Locale::En);
        assert_eq!(repo.password_hash(&user.id).await.expect("hash"), "new-hash");
    }
}
