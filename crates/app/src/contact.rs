use axum::{extract::State, http::HeaderMap, response::Response, Form};
use metrics::counter;

use empleaworks_core::locale::MessageKey;
use empleaworks_core::types::ContactForm;
use empleaworks_mail::templates;

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::{back, Flash, Visitor};

pub async fn send(
    State(state): State<AppState>,
    visitor: Visitor,
    headers: HeaderMap,
    Form(form): Form<ContactForm>,
) -> Result<Response, ProblemResponse> {
    form.validate()?;
    let mail = templates::contact(state.mailer().inbox(), &form);

    let flash = match state.mailer().send("contact", &mail).await {
        Ok(_) => {
            counter!("contact_messages_total", "result" => "sent").increment(1);
            Flash::success(MessageKey::ContactSent)
        }
        Err(_) => {
            counter!("contact_messages_total", "result" => "failed").increment(1);
            Flash::error(MessageKey::ContactFailed)
        }
    };

    let location = back(&headers, state.app_url(), "/");
    Ok(visitor.redirect(&location, flash))
}
