use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use chrono::Duration;
use metrics::counter;
use serde_json::json;
use tracing::{info, warn};

use empleaworks_core::locale::MessageKey;
use empleaworks_core::types::{ApplicationStatusForm, ApplyForm, Role};
use empleaworks_core::validation::ValidationErrors;
use empleaworks_mail::{templates, Recipient};
use empleaworks_storage::{new_id, ApplicationError, NewApplication};

use crate::offers::owned_offer;
use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::{Flash, Visitor};

/// Lifetime of the CV link embedded in the notification to the company.
const CV_LINK_TTL_DAYS: i64 = 7;

fn storage_problem(err: ApplicationError) -> ProblemResponse {
    match err {
        ApplicationError::NotFound => ProblemResponse::not_found("application"),
        ApplicationError::MissingOffer => ProblemResponse::not_found("offer"),
        other => ProblemResponse::internal("applications", other),
    }
}

pub async fn apply(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(offer_id): Path<String>,
    Form(form): Form<ApplyForm>,
) -> Result<Response, ProblemResponse> {
    let candidate = visitor.require(Role::Candidate)?.clone();
    let offer = state
        .storage()
        .offers()
        .fetch(&offer_id)
        .await
        .map_err(|err| ProblemResponse::internal("applications", err))?
        .ok_or_else(|| ProblemResponse::not_found("offer"))?;

    if offer.is_closed(state.today()) {
        return Err(ValidationErrors::single(
            "offer",
            "This offer is no longer accepting applications.",
        )
        .into());
    }
    let valid = form.validate()?;

    let offer_url = format!("/offers/{}", offer.id);
    let already_applied = state
        .storage()
        .applications()
        .exists(&offer.id, &candidate.id)
        .await
        .map_err(storage_problem)?;
    if already_applied {
        return Ok(visitor.redirect(&offer_url, Flash::error(MessageKey::AlreadyApplied)));
    }

    let profile = state
        .storage()
        .candidates()
        .fetch(&candidate.id)
        .await
        .map_err(|err| ProblemResponse::internal("applications", err))?
        .unwrap_or_default();

    let created = state
        .storage()
        .applications()
        .create(&NewApplication {
            id: new_id(),
            offer_id: &offer.id,
            user_id: &candidate.id,
            phone: &valid.phone,
            email: &valid.email,
            cv_path: profile.cv_path.as_deref(),
            cover_letter: valid.cover_letter.as_deref(),
            created_at: state.now(),
        })
        .await;
    let application = match created {
        Ok(application) => application,
        Err(ApplicationError::AlreadyApplied) => {
            return Ok(visitor.redirect(&offer_url, Flash::error(MessageKey::AlreadyApplied)));
        }
        Err(err) => return Err(storage_problem(err)),
    };

    counter!("applications_submitted_total").increment(1);
    info!(stage = "applications", application_id = %application.id, offer_id = %offer.id, "application submitted");

    let cv_link = match &profile.cv_path {
        Some(_) => {
            let expires_at = state.now() + Duration::days(CV_LINK_TTL_DAYS);
            match state.links().cv_url(&candidate.id, expires_at) {
                Ok(link) => Some(link),
                Err(err) => {
                    warn!(stage = "applications", error = %err, "failed to sign cv link");
                    None
                }
            }
        }
        None => None,
    };
    let candidate_name = if profile.surname.is_empty() {
        candidate.name.clone()
    } else {
        format!("{} {}", candidate.name, profile.surname)
    };
    state
        .mailer()
        .notify(
            "application_received",
            templates::application_received(&templates::ApplicationReceived {
                offer_title: &offer.title,
                offer_email: &offer.email,
                candidate_name: &candidate_name,
                candidate_email: &application.email,
                phone: &application.phone,
                cover_letter: application.cover_letter.as_deref(),
                cv_link: cv_link.as_deref(),
                locale: state.default_locale(),
            }),
        )
        .await;

    Ok(visitor.redirect("/applications", Flash::success(MessageKey::ApplicationSent)))
}

pub async fn index(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, ProblemResponse> {
    let candidate_id = visitor.require(Role::Candidate)?.id.clone();
    let applications = state
        .storage()
        .applications()
        .list_for_candidate(&candidate_id, None)
        .await
        .map_err(storage_problem)?;

    let presenter = visitor.presenter(&state);
    let views: Vec<_> = applications
        .iter()
        .map(|summary| presenter.application(summary))
        .collect();
    Ok(visitor.render("Applications/Index", json!({ "applications": views })))
}

pub async fn withdraw(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let candidate_id = visitor.require(Role::Candidate)?.id.clone();
    let repo = state.storage().applications();

    match repo.delete_for_candidate(&id, &candidate_id).await {
        Ok(()) => {}
        Err(ApplicationError::NotFound) => {
            let exists = repo.fetch(&id).await.map_err(storage_problem)?.is_some();
            return Err(if exists {
                ProblemResponse::forbidden()
            } else {
                ProblemResponse::not_found("application")
            });
        }
        Err(err) => return Err(storage_problem(err)),
    }

    info!(stage = "applications", application_id = %id, "application withdrawn");
    Ok(visitor.redirect(
        "/applications",
        Flash::success(MessageKey::ApplicationWithdrawn),
    ))
}

pub async fn offer_applicants(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(offer_id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let company_id = visitor.require(Role::Company)?.id.clone();
    let offer = owned_offer(&state, &offer_id, &company_id).await?;
    let applicants = state
        .storage()
        .applications()
        .list_for_offer(&offer.id, &company_id)
        .await
        .map_err(storage_problem)?;

    let presenter = visitor.presenter(&state);
    let views: Vec<_> = applicants.iter().map(|applicant| presenter.applicant(applicant)).collect();
    Ok(visitor.render(
        "Company/Applicants",
        json!({
            "offer": { "id": offer.id, "title": offer.title },
            "applicants": views,
        }),
    ))
}

pub async fn company_applicants(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, ProblemResponse> {
    let company_id = visitor.require(Role::Company)?.id.clone();
    let applicants = state
        .storage()
        .applications()
        .list_for_company(&company_id)
        .await
        .map_err(storage_problem)?;

    let presenter = visitor.presenter(&state);
    let views: Vec<_> = applicants.iter().map(|applicant| presenter.applicant(applicant)).collect();
    Ok(visitor.render(
        "Company/Applicants",
        json!({ "offer": null, "applicants": views }),
    ))
}

pub async fn update_status(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
    Form(form): Form<ApplicationStatusForm>,
) -> Result<Response, ProblemResponse> {
    let company = visitor.require(Role::Company)?.clone();
    let repo = state.storage().applications();

    let Some(applicant) = repo
        .fetch_for_company(&id, &company.id)
        .await
        .map_err(storage_problem)?
    else {
        let exists = repo.fetch(&id).await.map_err(storage_problem)?.is_some();
        return Err(if exists {
            ProblemResponse::forbidden()
        } else {
            ProblemResponse::not_found("application")
        });
    };
    let status = form.validate()?;

    repo.update_status(&id, &company.id, status, state.now())
        .await
        .map_err(storage_problem)?;
    info!(stage = "applications", application_id = %id, status = status.as_str(), "application status changed");

    let application = &applicant.application;
    let candidate = state
        .storage()
        .users()
        .find_by_id(&application.user_id)
        .await
        .map_err(|err| ProblemResponse::internal("applications", err))?;
    if let Some(candidate) = candidate {
        state
            .mailer()
            .notify(
                "status_changed",
                templates::status_changed(
                    Recipient::new(application.email.clone(), Some(candidate.name.clone())),
                    &applicant.offer_title,
                    &company.name,
                    status,
                    candidate.locale,
                ),
            )
            .await;
    }

    Ok(visitor.redirect(
        &format!("/company/offers/{}/applicants", application.offer_id),
        Flash::success(MessageKey::ApplicationStatusUpdated),
    ))
}
