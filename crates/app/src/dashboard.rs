use axum::{extract::State, response::Response};

use empleaworks_core::presenter::{CandidateDashboard, DASHBOARD_RECENT};
use empleaworks_core::types::{Role, User};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::Visitor;

pub async fn show(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, ProblemResponse> {
    let user = visitor.user()?.clone();
    match user.role {
        Role::Candidate => candidate(&state, visitor, &user).await,
        Role::Company => company(&state, visitor, &user).await,
        Role::Admin => Err(ProblemResponse::forbidden()),
    }
}

fn internal(err: impl std::fmt::Display) -> ProblemResponse {
    ProblemResponse::internal("dashboard", err)
}

async fn candidate(
    state: &AppState,
    visitor: Visitor,
    user: &User,
) -> Result<Response, ProblemResponse> {
    let storage = state.storage();

    let applications_count = storage
        .applications()
        .count_for_candidate(&user.id)
        .await
        .map_err(internal)?;
    let recent = storage
        .applications()
        .list_for_candidate(&user.id, Some(DASHBOARD_RECENT as u32))
        .await
        .map_err(internal)?;
    let saved_count = storage
        .saved_offers()
        .count_for_candidate(&user.id)
        .await
        .map_err(internal)?;
    let saved_ids = storage
        .saved_offers()
        .saved_ids(&user.id)
        .await
        .map_err(internal)?;
    let latest = storage
        .offers()
        .latest(DASHBOARD_RECENT as u32, state.today())
        .await
        .map_err(internal)?;

    let presenter = visitor.presenter(state);
    let dashboard = CandidateDashboard {
        applications_count,
        saved_count,
        recent_applications: recent.iter().map(|summary| presenter.application(summary)).collect(),
        latest_offers: latest
            .iter()
            .map(|offer| presenter.offer_card(offer, saved_ids.contains(&offer.id)))
            .collect(),
    };
    Ok(visitor.render("Dashboard/Candidate", dashboard))
}

async fn company(state: &AppState, visitor: Visitor, user: &User) -> Result<Response, ProblemResponse> {
    let offers = state
        .storage()
        .offers()
        .list_for_company(&user.id)
        .await
        .map_err(internal)?;
    let applicants = state
        .storage()
        .applications()
        .list_for_company(&user.id)
        .await
        .map_err(internal)?;

    let presenter = visitor.presenter(state);
    let recent_applicants: Vec<_> = applicants
        .iter()
        .take(DASHBOARD_RECENT)
        .map(|applicant| presenter.applicant(applicant))
        .collect();
    Ok(visitor.render(
        "Dashboard/Company",
        serde_json::json!({
            "stats": presenter.company_dashboard(&offers),
            "recent_applicants": recent_applicants,
        }),
    ))
}
