use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use metrics::counter;
use serde_json::json;

use empleaworks_core::locale::MessageKey;
use empleaworks_core::types::{Role, SavedState};
use empleaworks_storage::SavedOfferError;

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::{back, Flash, Visitor};

pub async fn toggle(
    State(state): State<AppState>,
    visitor: Visitor,
    headers: HeaderMap,
    Path(offer_id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let candidate_id = visitor.require(Role::Candidate)?.id.clone();
    let saved = state
        .storage()
        .saved_offers()
        .toggle(&candidate_id, &offer_id, state.now())
        .await
        .map_err(|err| match err {
            SavedOfferError::MissingOffer => ProblemResponse::not_found("offer"),
            other => ProblemResponse::internal("saved_offers", other),
        })?;

    let (label, key) = match saved {
        SavedState::Saved => ("saved", MessageKey::OfferSaved),
        SavedState::Removed => ("removed", MessageKey::OfferUnsaved),
    };
    counter!("saved_offer_toggles_total", "state" => label).increment(1);

    let location = back(&headers, state.app_url(), &format!("/offers/{offer_id}"));
    Ok(visitor.redirect(&location, Flash::success(key)))
}

pub async fn index(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, ProblemResponse> {
    let candidate_id = visitor.require(Role::Candidate)?.id.clone();
    let offers = state
        .storage()
        .saved_offers()
        .list_for_candidate(&candidate_id)
        .await
        .map_err(|err| ProblemResponse::internal("saved_offers", err))?;

    let presenter = visitor.presenter(&state);
    let cards: Vec<_> = offers.iter().map(|offer| presenter.offer_card(offer, true)).collect();
    Ok(visitor.render("SavedOffers/Index", json!({ "offers": cards })))
}
