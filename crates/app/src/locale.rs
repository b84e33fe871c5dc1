use axum::{extract::State, http::HeaderMap, response::Response, Form};
use axum_extra::extract::cookie::{Cookie, SameSite};

use empleaworks_core::locale::MessageKey;
use empleaworks_core::types::LocaleForm;

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::{back, Flash, Visitor, LOCALE_COOKIE};

/// Switches the interface language; signed-in users keep it on their account.
pub async fn switch(
    State(state): State<AppState>,
    visitor: Visitor,
    headers: HeaderMap,
    Form(form): Form<LocaleForm>,
) -> Result<Response, ProblemResponse> {
    let locale = form.validate()?;

    if let Some(user) = &visitor.user {
        state
            .storage()
            .users()
            .update_locale(&user.id, locale, state.now())
            .await
            .map_err(|err| ProblemResponse::internal("locale", err))?;
    }

    let cookie = Cookie::build((LOCALE_COOKIE, locale.as_str()))
        .path("/")
        .same_site(SameSite::Lax)
        .build();
    let location = back(&headers, state.app_url(), "/");
    Ok(visitor
        .with_cookie(cookie)
        .redirect(&location, Flash::success(MessageKey::LocaleChanged)))
}
