use axum::{
    extract::{Path, Query, State},
    response::Response,
    Form,
};
use metrics::counter;
use serde::Serialize;
use tracing::info;

use empleaworks_core::locale::MessageKey;
use empleaworks_core::presenter::{OfferCard, OfferViewer, Paginated};
use empleaworks_core::types::{CompanyProfile, ContractType, Offer, OfferFilters, OfferForm, Role};
use empleaworks_storage::{new_id, NewOffer, OfferError, OfferQuery};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::{Flash, Visitor};

#[derive(Debug, Serialize)]
struct IndexProps<'a> {
    offers: Paginated<OfferCard>,
    filters: FilterValues<'a>,
    categories: Vec<String>,
    contract_types: [ContractType; 5],
}

#[derive(Debug, Serialize)]
struct FilterValues<'a> {
    q: Option<&'a str>,
    category: Option<&'a str>,
    contract_type: Option<&'a str>,
    location: Option<&'a str>,
}

fn storage_problem(err: OfferError) -> ProblemResponse {
    match err {
        OfferError::NotFound => ProblemResponse::not_found("offer"),
        other => ProblemResponse::internal("offers", other),
    }
}

/// Loads an offer and checks it belongs to `company_id`: 404 when missing, 403 when foreign.
pub async fn owned_offer(
    state: &AppState,
    id: &str,
    company_id: &str,
) -> Result<Offer, ProblemResponse> {
    let offer = state
        .storage()
        .offers()
        .fetch(id)
        .await
        .map_err(storage_problem)?
        .ok_or_else(|| ProblemResponse::not_found("offer"))?;
    if offer.company_id != company_id {
        return Err(ProblemResponse::forbidden());
    }
    Ok(offer)
}

pub async fn index(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(filters): Query<OfferFilters>,
) -> Result<Response, ProblemResponse> {
    let contract_type = OfferFilters::normalized(&filters.contract_type);
    let query = OfferQuery {
        q: OfferFilters::normalized(&filters.q),
        category: OfferFilters::normalized(&filters.category),
        contract_type: contract_type.and_then(|value| value.parse().ok()),
        location: OfferFilters::normalized(&filters.location),
        limit: OfferFilters::PER_PAGE,
        offset: filters.offset(),
    };

    let repo = state.storage().offers();
    let total = repo.count(&query).await.map_err(storage_problem)?;
    let offers = repo
        .list(&query, state.today())
        .await
        .map_err(storage_problem)?;
    let categories = repo.categories().await.map_err(storage_problem)?;

    let saved = match visitor.user.as_ref().filter(|user| user.role == Role::Candidate) {
        Some(user) => state
            .storage()
            .saved_offers()
            .saved_ids(&user.id)
            .await
            .map_err(|err| ProblemResponse::internal("offers", err))?,
        None => Default::default(),
    };

    let presenter = visitor.presenter(&state);
    let cards = offers
        .iter()
        .map(|offer| presenter.offer_card(offer, saved.contains(&offer.id)))
        .collect();

    let props = IndexProps {
        offers: Paginated::new(cards, filters.page(), OfferFilters::PER_PAGE, total),
        filters: FilterValues {
            q: query.q,
            category: query.category,
            contract_type: query.contract_type.map(ContractType::as_str),
            location: query.location,
        },
        categories,
        contract_types: ContractType::ALL,
    };
    Ok(visitor.render("Offers/Index", props))
}

pub async fn show(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let offer = state
        .storage()
        .offers()
        .fetch(&id)
        .await
        .map_err(storage_problem)?
        .ok_or_else(|| ProblemResponse::not_found("offer"))?;

    let company = state
        .storage()
        .users()
        .find_by_id(&offer.company_id)
        .await
        .map_err(|err| ProblemResponse::internal("offers", err))?
        .ok_or_else(|| ProblemResponse::not_found("company"))?;
    let profile = state
        .storage()
        .companies()
        .fetch(&company.id)
        .await
        .map_err(|err| ProblemResponse::internal("offers", err))?
        .unwrap_or_else(|| CompanyProfile {
            user_id: company.id.clone(),
            ..CompanyProfile::default()
        });

    let mut viewer = OfferViewer {
        role: visitor.user.as_ref().map(|user| user.role),
        ..OfferViewer::default()
    };
    if let Some(user) = &visitor.user {
        match user.role {
            Role::Candidate => {
                viewer.is_saved = state
                    .storage()
                    .saved_offers()
                    .is_saved(&user.id, &offer.id)
                    .await
                    .map_err(|err| ProblemResponse::internal("offers", err))?;
                viewer.has_applied = state
                    .storage()
                    .applications()
                    .exists(&offer.id, &user.id)
                    .await
                    .map_err(|err| ProblemResponse::internal("offers", err))?;
            }
            Role::Company if user.id == offer.company_id => {
                viewer.is_owner = true;
                viewer.applicants_count = Some(
                    state
                        .storage()
                        .applications()
                        .count_for_offer(&offer.id)
                        .await
                        .map_err(|err| ProblemResponse::internal("offers", err))?,
                );
            }
            _ => {}
        }
    }

    let presenter = visitor.presenter(&state);
    let detail = presenter.offer_detail(&offer, presenter.company_summary(&company, &profile), viewer);
    Ok(visitor.render("Offers/Show", serde_json::json!({ "offer": detail })))
}

pub async fn create(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<OfferForm>,
) -> Result<Response, ProblemResponse> {
    let company_id = visitor.require(Role::Company)?.id.clone();
    let fields = form.validate(state.today())?;

    let id = new_id();
    state
        .storage()
        .offers()
        .create(&NewOffer {
            id: id.clone(),
            company_id: &company_id,
            fields: &fields,
            created_at: state.now(),
        })
        .await
        .map_err(storage_problem)?;

    counter!("offers_mutations_total", "action" => "create").increment(1);
    info!(stage = "offers", offer_id = %id, %company_id, "offer created");
    Ok(visitor.redirect(&format!("/offers/{id}"), Flash::success(MessageKey::OfferCreated)))
}

pub async fn update(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
    Form(form): Form<OfferForm>,
) -> Result<Response, ProblemResponse> {
    let company_id = visitor.require(Role::Company)?.id.clone();
    owned_offer(&state, &id, &company_id).await?;
    let fields = form.validate(state.today())?;

    state
        .storage()
        .offers()
        .update(&id, &company_id, &fields, state.now())
        .await
        .map_err(storage_problem)?;

    counter!("offers_mutations_total", "action" => "update").increment(1);
    info!(stage = "offers", offer_id = %id, "offer updated");
    Ok(visitor.redirect(&format!("/offers/{id}"), Flash::success(MessageKey::OfferUpdated)))
}

pub async fn destroy(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let company_id = visitor.require(Role::Company)?.id.clone();
    owned_offer(&state, &id, &company_id).await?;

    state
        .storage()
        .offers()
        .delete(&id, &company_id)
        .await
        .map_err(storage_problem)?;

    counter!("offers_mutations_total", "action" => "delete").increment(1);
    info!(stage = "offers", offer_id = %id, "offer deleted");
    Ok(visitor.redirect("/company/offers", Flash::success(MessageKey::OfferDeleted)))
}

pub async fn company_index(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, ProblemResponse> {
    let company_id = visitor.require(Role::Company)?.id.clone();
    let offers = state
        .storage()
        .offers()
        .list_for_company(&company_id)
        .await
        .map_err(storage_problem)?;

    let presenter = visitor.presenter(&state);
    let rows: Vec<_> = offers.iter().map(|entry| presenter.company_offer(entry)).collect();
    Ok(visitor.render("Company/Offers", serde_json::json!({ "offers": rows })))
}
