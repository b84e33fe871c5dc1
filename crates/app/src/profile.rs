use axum::{extract::State, response::Response, Form};
use serde_json::json;
use tracing::info;

use empleaworks_core::locale::MessageKey;
use empleaworks_core::types::{
    CandidateProfile, CompanyProfile, DeleteAccountForm, PasswordForm, ProfileForm, Role, User,
};
use empleaworks_core::validation::ValidationErrors;
use empleaworks_storage::{CandidateUpdate, CompanyUpdate, UserError};

use crate::auth::{spawn_hash, spawn_verify};
use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::{AuthView, Flash, Visitor, SESSION_COOKIE};
use crate::uploads;

fn internal(err: impl std::fmt::Display) -> ProblemResponse {
    ProblemResponse::internal("profile", err)
}

async fn check_password(
    state: &AppState,
    user: &User,
    field: &str,
    password: &str,
) -> Result<(), ProblemResponse> {
    let hash = state
        .storage()
        .users()
        .password_hash(&user.id)
        .await
        .map_err(internal)?;
    if spawn_verify(hash, password.to_string()).await.map_err(internal)? {
        Ok(())
    } else {
        Err(ValidationErrors::single(field, "The provided password is incorrect.").into())
    }
}

pub async fn edit(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, ProblemResponse> {
    let user = visitor.user()?.clone();
    let presenter = visitor.presenter(&state);

    let profile = match user.role {
        Role::Candidate => {
            let profile = state
                .storage()
                .candidates()
                .fetch(&user.id)
                .await
                .map_err(internal)?
                .unwrap_or_else(|| CandidateProfile {
                    user_id: user.id.clone(),
                    ..CandidateProfile::default()
                });
            json!(presenter.candidate_summary(&user, &profile))
        }
        Role::Company => {
            let profile = state
                .storage()
                .companies()
                .fetch(&user.id)
                .await
                .map_err(internal)?
                .unwrap_or_else(|| CompanyProfile {
                    user_id: user.id.clone(),
                    ..CompanyProfile::default()
                });
            json!(presenter.company_summary(&user, &profile))
        }
        Role::Admin => serde_json::Value::Null,
    };

    Ok(visitor.render(
        "Profile/Edit",
        json!({ "user": AuthView::from(&user), "profile": profile }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<ProfileForm>,
) -> Result<Response, ProblemResponse> {
    let user = visitor.user()?.clone();
    let valid = form.validate(user.role)?;
    let now = state.now();

    let mut tx = state.storage().begin().await.map_err(internal)?;
    state
        .storage()
        .users()
        .update_account(&mut tx, &user.id, &valid.name, &valid.email, now)
        .await
        .map_err(|err| match err {
            UserError::DuplicateEmail => ProblemResponse::validation(ValidationErrors::single(
                "email",
                "The email has already been taken.",
            )),
            other => internal(other),
        })?;

    match user.role {
        Role::Candidate => {
            let update = CandidateUpdate {
                surname: &valid.surname,
                phone: valid.phone.as_deref(),
                address: valid.address.as_deref(),
                description: valid.description.as_deref(),
            };
            state
                .storage()
                .candidates()
                .update(&mut tx, &user.id, &update, now)
                .await
                .map_err(internal)?;
        }
        Role::Company => {
            let update = CompanyUpdate {
                address: valid.address.as_deref(),
                web_link: valid.web_link.as_deref(),
                description: valid.description.as_deref(),
                phone: valid.phone.as_deref(),
            };
            state
                .storage()
                .companies()
                .update(&mut tx, &user.id, &update, now)
                .await
                .map_err(internal)?;
        }
        Role::Admin => {}
    }
    tx.commit().await.map_err(internal)?;

    info!(stage = "profile", user_id = %user.id, "profile updated");
    Ok(visitor.redirect("/profile", Flash::success(MessageKey::ProfileUpdated)))
}

pub async fn update_password(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<PasswordForm>,
) -> Result<Response, ProblemResponse> {
    let user = visitor.user()?.clone();
    form.validate()?;
    check_password(&state, &user, "current_password", &form.current_password).await?;

    let hash = spawn_hash(form.password.clone()).await.map_err(internal)?;
    state
        .storage()
        .users()
        .update_password(&user.id, &hash, state.now())
        .await
        .map_err(internal)?;

    info!(stage = "profile", user_id = %user.id, "password changed");
    Ok(visitor.redirect("/profile", Flash::success(MessageKey::PasswordUpdated)))
}

pub async fn destroy(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<DeleteAccountForm>,
) -> Result<Response, ProblemResponse> {
    let user = visitor.user()?.clone();
    check_password(&state, &user, "password", &form.password).await?;

    let cv_path = match user.role {
        Role::Candidate => state
            .storage()
            .candidates()
            .fetch(&user.id)
            .await
            .map_err(internal)?
            .and_then(|profile| profile.cv_path),
        _ => None,
    };
    state
        .storage()
        .users()
        .delete(&user.id)
        .await
        .map_err(internal)?;
    uploads::remove_all(&state, user.avatar_path.as_deref(), cv_path.as_deref()).await;

    info!(stage = "profile", user_id = %user.id, "account deleted");
    Ok(visitor
        .without_cookie(SESSION_COOKIE)
        .redirect("/", Flash::success(MessageKey::AccountDeleted)))
}
