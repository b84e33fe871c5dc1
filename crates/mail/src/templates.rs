//! Rendered bodies for the notifications the service sends.
//!
//! Every builder returns an [`OutgoingMail`] with matching HTML and plain-text
//! parts. User supplied text is escaped before it is placed in HTML.

use empleaworks_core::types::{ApplicationStatus, ContactForm, Locale, Role};

use crate::client::{OutgoingMail, Recipient};

/// Escapes text for inclusion in an HTML body.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn paragraphs(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

/// Message from the public contact form, delivered to the site inbox.
pub fn contact(inbox: Recipient, form: &ContactForm) -> OutgoingMail {
    let name = form.name.trim();
    let email = form.email.trim();
    let subject = form.subject.trim();
    let message = form.message.trim();

    OutgoingMail {
        to: vec![inbox],
        reply_to: Some(Recipient::new(email, Some(name.to_string()))),
        subject: format!("[Contact] {subject}"),
        html: format!(
            "<p><strong>{}</strong> &lt;{}&gt;</p><p>{}</p>",
            escape_html(name),
            escape_html(email),
            paragraphs(message)
        ),
        text: format!("{name} <{email}>\n\n{message}"),
    }
}

/// Details of a new application, for the offer's contact address.
pub struct ApplicationReceived<'a> {
    pub offer_title: &'a str,
    pub offer_email: &'a str,
    pub candidate_name: &'a str,
    pub candidate_email: &'a str,
    pub phone: &'a str,
    pub cover_letter: Option<&'a str>,
    /// Time-limited link to the candidate CV, when one is attached.
    pub cv_link: Option<&'a str>,
    pub locale: Locale,
}

pub fn application_received(details: &ApplicationReceived<'_>) -> OutgoingMail {
    let (subject, intro, cv_label, letter_label) = match details.locale {
        Locale::Es => (
            format!("Nueva candidatura: {}", details.offer_title),
            "ha enviado su candidatura a la oferta",
            "Descargar currículum",
            "Carta de presentación",
        ),
        Locale::En => (
            format!("New application: {}", details.offer_title),
            "has applied to the offer",
            "Download CV",
            "Cover letter",
        ),
    };

    let mut html = format!(
        "<p><strong>{}</strong> {intro} <strong>{}</strong>.</p><p>{} · {}</p>",
        escape_html(details.candidate_name),
        escape_html(details.offer_title),
        escape_html(details.candidate_email),
        escape_html(details.phone),
    );
    let mut text = format!(
        "{} {intro} {}.\n{} / {}\n",
        details.candidate_name, details.offer_title, details.candidate_email, details.phone
    );

    if let Some(letter) = details.cover_letter {
        html.push_str(&format!("<h3>{letter_label}</h3><p>{}</p>", paragraphs(letter)));
        text.push_str(&format!("\n{letter_label}:\n{letter}\n"));
    }
    if let Some(link) = details.cv_link {
        html.push_str(&format!(
            "<p><a href=\"{}\">{cv_label}</a></p>",
            escape_html(link)
        ));
        text.push_str(&format!("\n{cv_label}: {link}\n"));
    }

    OutgoingMail {
        to: vec![Recipient::new(details.offer_email, None)],
        reply_to: Some(Recipient::new(
            details.candidate_email,
            Some(details.candidate_name.to_string()),
        )),
        subject,
        html,
        text,
    }
}

/// Tells the candidate the company reviewed their application.
pub fn status_changed(
    candidate: Recipient,
    offer_title: &str,
    company_name: &str,
    status: ApplicationStatus,
    locale: Locale,
) -> OutgoingMail {
    let label = match (locale, status) {
        (Locale::Es, ApplicationStatus::Pending) => "pendiente",
        (Locale::Es, ApplicationStatus::Accepted) => "aceptada",
        (Locale::Es, ApplicationStatus::Rejected) => "rechazada",
        (Locale::En, ApplicationStatus::Pending) => "pending",
        (Locale::En, ApplicationStatus::Accepted) => "accepted",
        (Locale::En, ApplicationStatus::Rejected) => "rejected",
    };
    let (subject, body) = match locale {
        Locale::Es => (
            format!("Tu candidatura a {offer_title}"),
            format!("{company_name} ha marcado tu candidatura a «{offer_title}» como {label}."),
        ),
        Locale::En => (
            format!("Your application to {offer_title}"),
            format!("{company_name} marked your application to \"{offer_title}\" as {label}."),
        ),
    };

    OutgoingMail {
        to: vec![candidate],
        reply_to: None,
        subject,
        html: format!("<p>{}</p>", escape_html(&body)),
        text: body,
    }
}

/// Greeting sent right after registration.
pub fn welcome(user: Recipient, role: Role, app_url: &str, locale: Locale) -> OutgoingMail {
    let name = user.name.clone().unwrap_or_default();
    let (subject, greeting, next) = match (locale, role) {
        (Locale::Es, Role::Company) => (
            "Bienvenido a EmpleaWorks",
            format!("Hola {name}, tu cuenta de empresa está lista."),
            "Publica tu primera oferta desde el panel.",
        ),
        (Locale::Es, _) => (
            "Bienvenido a EmpleaWorks",
            format!("Hola {name}, tu cuenta está lista."),
            "Completa tu perfil y sube tu currículum para empezar a inscribirte.",
        ),
        (Locale::En, Role::Company) => (
            "Welcome to EmpleaWorks",
            format!("Hi {name}, your company account is ready."),
            "Publish your first offer from the dashboard.",
        ),
        (Locale::En, _) => (
            "Welcome to EmpleaWorks",
            format!("Hi {name}, your account is ready."),
            "Complete your profile and upload your CV to start applying.",
        ),
    };
    let dashboard = format!("{app_url}/dashboard");

    OutgoingMail {
        to: vec![user],
        reply_to: None,
        subject: subject.to_string(),
        html: format!(
            "<p>{}</p><p>{next}</p><p><a href=\"{}\">{}</a></p>",
            escape_html(&greeting),
            escape_html(&dashboard),
            escape_html(&dashboard)
        ),
        text: format!("{greeting}\n{next}\n{dashboard}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_mail_escapes_and_sets_reply_to() {
        let form = ContactForm {
            name: " Ana ".into(),
            email: "ana@example.com".into(),
            subject: "Hi".into(),
            message: "<script>x</script>\nline two".into(),
        };
        let mail = contact(Recipient::new("inbox@empleaworks.test", None), &form);

        assert_eq!(mail.subject, "[Contact] Hi");
        assert_eq!(
            mail.reply_to,
            Some(Recipient::new("ana@example.com", Some("Ana".into())))
        );
        assert!(mail.html.contains("&lt;script&gt;x&lt;/script&gt;<br>line two"));
        assert!(!mail.html.contains("<script>"));
        assert!(mail.text.contains("<script>x</script>"));
    }

    #[test]
    fn application_mail_includes_optional_parts() {
        let mut details = ApplicationReceived {
            offer_title: "Rust developer",
            offer_email: "jobs@acme.test",
            candidate_name: "Ana",
            candidate_email: "ana@example.com",
            phone: "600000000",
            cover_letter: None,
            cv_link: None,
            locale: Locale::En,
        };
        let bare = application_received(&details);
        assert_eq!(bare.subject, "New application: Rust developer");
        assert_eq!(bare.to[0].email, "jobs@acme.test");
        assert!(!bare.html.contains("Download CV"));

        details.cover_letter = Some("I love <Rust> & SQL");
        details.cv_link = Some("https://app.test/cv/signed/u1?expires=1&signature=ab");
        let full = application_received(&details);
        assert!(full.html.contains("I love &lt;Rust&gt; &amp; SQL"));
        assert!(full
            .html
            .contains("href=\"https://app.test/cv/signed/u1?expires=1&amp;signature=ab\""));
        assert!(full
            .text
            .contains("Download CV: https://app.test/cv/signed/u1?expires=1&signature=ab"));
    }

    #[test]
    fn status_mail_is_localized() {
        let candidate = Recipient::new("ana@example.com", Some("Ana".into()));
        let mail = status_changed(
            candidate.clone(),
            "Rust developer",
            "Acme",
            ApplicationStatus::Accepted,
            Locale::Es,
        );
        assert_eq!(mail.subject, "Tu candidatura a Rust developer");
        assert!(mail.text.contains("aceptada"));

        let mail = status_changed(
            candidate,
            "Rust developer",
            "Acme",
            ApplicationStatus::Rejected,
            Locale::En,
        );
        assert!(mail.text.ends_with("as rejected."));
    }

    #[test]
    fn welcome_mail_links_dashboard() {
        let mail = welcome(
            Recipient::new("hr@acme.test", Some("Acme".into())),
            Role::Company,
            "https://app.test",
            Locale::En,
        );
        assert_eq!(mail.subject, "Welcome to EmpleaWorks");
        assert!(mail.text.contains("company account"));
        assert!(mail.text.contains("https://app.test/dashboard"));
    }
}
