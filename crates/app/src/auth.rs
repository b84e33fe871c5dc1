use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use metrics::counter;
use rand::{rngs::OsRng, RngCore};
use serde_json::json;
use thiserror::Error;
use tokio::task::{self, JoinError};
use tracing::{info, warn};

use empleaworks_core::locale::MessageKey;
use empleaworks_core::types::{LoginForm, RegisterForm};
use empleaworks_core::validation::ValidationErrors;
use empleaworks_mail::{templates, Recipient};
use empleaworks_storage::{new_id, NewUser, UserError};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::{AuthView, Flash, Visitor, SESSION_COOKIE};

const BAD_CREDENTIALS: &str = "These credentials do not match our records.";

/// Hashes a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)?;
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Checks a password against a stored PHC hash. Unparseable hashes never match.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!(stage = "auth", error = %err, "stored password hash is invalid");
            false
        }
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("password task failed: {0}")]
    Task(#[from] JoinError),
}

/// [`hash_password`] on the blocking pool.
pub async fn spawn_hash(password: String) -> Result<String, PasswordError> {
    task::spawn_blocking(move || hash_password(&password))
        .await?
        .map_err(PasswordError::Hash)
}

/// [`verify_password`] on the blocking pool.
pub async fn spawn_verify(hash: String, password: String) -> Result<bool, PasswordError> {
    Ok(task::spawn_blocking(move || verify_password(&hash, &password)).await?)
}

fn signed_in(state: &AppState, visitor: Visitor, user_id: &str, flash: Flash) -> Result<Response, ProblemResponse> {
    let token = state
        .sessions()
        .issue(user_id, state.now())
        .map_err(|err| ProblemResponse::internal("auth", err))?;
    Ok(visitor
        .with_cookie(state.sessions().cookie(token))
        .redirect("/dashboard", flash))
}

pub async fn register(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ProblemResponse> {
    if visitor.user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    let valid = form.validate()?;
    let password_hash = spawn_hash(form.password.clone())
        .await
        .map_err(|err| ProblemResponse::internal("auth", err))?;

    let user = state
        .storage()
        .users()
        .create(&NewUser {
            id: new_id(),
            name: &valid.name,
            email: &valid.email,
            password_hash: &password_hash,
            role: valid.role,
            locale: visitor.locale,
            surname: &valid.surname,
            created_at: state.now(),
        })
        .await
        .map_err(|err| match err {
            UserError::DuplicateEmail => ProblemResponse::validation(ValidationErrors::single(
                "email",
                "The email has already been taken.",
            )),
            other => ProblemResponse::internal("auth", other),
        })?;

    counter!("auth_attempts_total", "action" => "register", "result" => "success").increment(1);
    info!(stage = "auth", user_id = %user.id, role = %user.role, "account registered");

    state
        .mailer()
        .notify(
            "welcome",
            templates::welcome(
                Recipient::new(user.email.clone(), Some(user.name.clone())),
                user.role,
                state.app_url(),
                user.locale,
            ),
        )
        .await;

    signed_in(&state, visitor, &user.id, Flash::success(MessageKey::Registered))
}

pub async fn login(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<LoginForm>,
) -> Result<Response, ProblemResponse> {
    form.validate()?;
    let email = form.email.trim().to_lowercase();

    let credentials = state
        .storage()
        .users()
        .find_by_email(&email)
        .await
        .map_err(|err| ProblemResponse::internal("auth", err))?;

    let verified = match &credentials {
        Some(credentials) => spawn_verify(credentials.password_hash.clone(), form.password.clone())
            .await
            .map_err(|err| ProblemResponse::internal("auth", err))?,
        None => false,
    };

    let user = match credentials {
        Some(credentials) if verified => credentials.user,
        _ => {
            counter!("auth_attempts_total", "action" => "login", "result" => "failure").increment(1);
            info!(stage = "auth", "login rejected");
            return Err(ValidationErrors::single("email", BAD_CREDENTIALS).into());
        }
    };

    counter!("auth_attempts_total", "action" => "login", "result" => "success").increment(1);
    info!(stage = "auth", user_id = %user.id, "signed in");
    signed_in(&state, visitor, &user.id, Flash::success(MessageKey::LoggedIn))
}

pub async fn logout(visitor: Visitor) -> Response {
    visitor
        .without_cookie(SESSION_COOKIE)
        .redirect("/", Flash::success(MessageKey::LoggedOut))
}

pub async fn me(visitor: Visitor) -> Result<Response, ProblemResponse> {
    let user = AuthView::from(visitor.user()?);
    Ok(visitor.render("Auth/Me", json!({ "user": user })))
}
