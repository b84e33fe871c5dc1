//! Public company pages, candidate profiles and CV downloads.

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use empleaworks_core::types::{CandidateProfile, CompanyProfile, Role, User};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::Visitor;
use crate::uploads::cv_attachment;

fn internal(err: impl std::fmt::Display) -> ProblemResponse {
    ProblemResponse::internal("directory", err)
}

async fn user_with_role(state: &AppState, id: &str, role: Role) -> Result<User, ProblemResponse> {
    state
        .storage()
        .users()
        .find_by_id(id)
        .await
        .map_err(internal)?
        .filter(|user| user.role == role)
        .ok_or_else(|| ProblemResponse::not_found(role.as_str()))
}

async fn candidate_profile(state: &AppState, user: &User) -> Result<CandidateProfile, ProblemResponse> {
    Ok(state
        .storage()
        .candidates()
        .fetch(&user.id)
        .await
        .map_err(internal)?
        .unwrap_or_else(|| CandidateProfile {
            user_id: user.id.clone(),
            ..CandidateProfile::default()
        }))
}

/// Resolves the candidate (404 when missing), then allows the candidate themself
/// or a company that received an application from them.
async fn accessible_candidate(
    state: &AppState,
    visitor: &Visitor,
    candidate_id: &str,
) -> Result<User, ProblemResponse> {
    let viewer = visitor.user()?;
    let candidate = user_with_role(state, candidate_id, Role::Candidate).await?;
    if viewer.id == candidate.id {
        return Ok(candidate);
    }
    if viewer.role == Role::Company {
        let applied = state
            .storage()
            .applications()
            .candidate_applied_to_company(&candidate.id, &viewer.id)
            .await
            .map_err(internal)?;
        if applied {
            return Ok(candidate);
        }
    }
    Err(ProblemResponse::forbidden())
}

pub async fn company(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let company = user_with_role(&state, &id, Role::Company).await?;
    let profile = state
        .storage()
        .companies()
        .fetch(&company.id)
        .await
        .map_err(internal)?
        .unwrap_or_else(|| CompanyProfile {
            user_id: company.id.clone(),
            ..CompanyProfile::default()
        });
    let offers = state
        .storage()
        .offers()
        .list_open_for_company(&company.id, state.today())
        .await
        .map_err(internal)?;

    let saved = match visitor.user.as_ref().filter(|user| user.role == Role::Candidate) {
        Some(user) => state
            .storage()
            .saved_offers()
            .saved_ids(&user.id)
            .await
            .map_err(internal)?,
        None => Default::default(),
    };

    let presenter = visitor.presenter(&state);
    let cards: Vec<_> = offers
        .iter()
        .map(|offer| presenter.offer_card(offer, saved.contains(&offer.id)))
        .collect();
    Ok(visitor.render(
        "Companies/Show",
        json!({
            "company": presenter.company_summary(&company, &profile),
            "offers": cards,
        }),
    ))
}

pub async fn candidate(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let candidate = accessible_candidate(&state, &visitor, &id).await?;
    let profile = candidate_profile(&state, &candidate).await?;

    let presenter = visitor.presenter(&state);
    Ok(visitor.render(
        "Candidates/Show",
        json!({ "candidate": presenter.candidate_summary(&candidate, &profile) }),
    ))
}

async fn send_cv(state: &AppState, candidate: &User) -> Result<Response, ProblemResponse> {
    let profile = candidate_profile(state, candidate).await?;
    let file = profile
        .cv_path
        .ok_or_else(|| ProblemResponse::not_found("CV"))?;
    cv_attachment(state, &candidate.id, &file).await
}

pub async fn download_cv(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let candidate = accessible_candidate(&state, &visitor, &id).await?;
    send_cv(&state, &candidate).await
}

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    expires: i64,
    signature: String,
}

pub async fn signed_cv(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, ProblemResponse> {
    state
        .links()
        .verify(&id, query.expires, &query.signature, state.now())
        .map_err(|err| {
            info!(stage = "directory", candidate_id = %id, error = %err, "signed link rejected");
            ProblemResponse::new(
                axum::http::StatusCode::FORBIDDEN,
                "invalid_signature",
                err.to_string(),
            )
        })?;
    let candidate = user_with_role(&state, &id, Role::Candidate).await?;
    send_cv(&state, &candidate).await
}
