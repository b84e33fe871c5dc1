use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::types::{Locale, UnknownVariant};

/// Flash message keys. The wire form is the snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKey {
    Registered,
    LoggedIn,
    LoggedOut,
    LocaleChanged,
    OfferCreated,
    OfferUpdated,
    OfferDeleted,
    ApplicationSent,
    AlreadyApplied,
    ApplicationWithdrawn,
    ApplicationStatusUpdated,
    OfferSaved,
    OfferUnsaved,
    ProfileUpdated,
    PasswordUpdated,
    AccountDeleted,
    AvatarUpdated,
    AvatarRemoved,
    CvUploaded,
    ContactSent,
    ContactFailed,
}

impl MessageKey {
    const ALL: [MessageKey; 21] = [
        Self::Registered,
        Self::LoggedIn,
        Self::LoggedOut,
        Self::LocaleChanged,
        Self::OfferCreated,
        Self::OfferUpdated,
        Self::OfferDeleted,
        Self::ApplicationSent,
        Self::AlreadyApplied,
        Self::ApplicationWithdrawn,
        Self::ApplicationStatusUpdated,
        Self::OfferSaved,
        Self::OfferUnsaved,
        Self::ProfileUpdated,
        Self::PasswordUpdated,
        Self::AccountDeleted,
        Self::AvatarUpdated,
        Self::AvatarRemoved,
        Self::CvUploaded,
        Self::ContactSent,
        Self::ContactFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::LoggedIn => "logged_in",
            Self::LoggedOut => "logged_out",
            Self::LocaleChanged => "locale_changed",
            Self::OfferCreated => "offer_created",
            Self::OfferUpdated => "offer_updated",
            Self::OfferDeleted => "offer_deleted",
            Self::ApplicationSent => "application_sent",
            Self::AlreadyApplied => "already_applied",
            Self::ApplicationWithdrawn => "application_withdrawn",
            Self::ApplicationStatusUpdated => "application_status_updated",
            Self::OfferSaved => "offer_saved",
            Self::OfferUnsaved => "offer_unsaved",
            Self::ProfileUpdated => "profile_updated",
            Self::PasswordUpdated => "password_updated",
            Self::AccountDeleted => "account_deleted",
            Self::AvatarUpdated => "avatar_updated",
            Self::AvatarRemoved => "avatar_removed",
            Self::CvUploaded => "cv_uploaded",
            Self::ContactSent => "contact_sent",
            Self::ContactFailed => "contact_failed",
        }
    }
}

impl FromStr for MessageKey {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "message key",
                value: value.to_string(),
            })
    }
}

/// Returns the user-facing text for a flash message.
pub fn translate(key: MessageKey, locale: Locale) -> &'static str {
    use MessageKey::*;
    match locale {
        Locale::Es => match key {
            Registered => "Tu cuenta se ha creado correctamente.",
            LoggedIn => "Has iniciado sesión.",
            LoggedOut => "Has cerrado sesión.",
            LocaleChanged => "Idioma actualizado.",
            OfferCreated => "Oferta creada correctamente.",
            OfferUpdated => "Oferta actualizada correctamente.",
            OfferDeleted => "Oferta eliminada correctamente.",
            ApplicationSent => "Tu candidatura se ha enviado correctamente.",
            AlreadyApplied => "Ya te has inscrito en esta oferta.",
            ApplicationWithdrawn => "Has retirado tu candidatura.",
            ApplicationStatusUpdated => "Estado de la candidatura actualizado.",
            OfferSaved => "Oferta guardada.",
            OfferUnsaved => "Oferta eliminada de guardadas.",
            ProfileUpdated => "Perfil actualizado correctamente.",
            PasswordUpdated => "Contraseña actualizada correctamente.",
            AccountDeleted => "Tu cuenta ha sido eliminada.",
            AvatarUpdated => "Foto de perfil actualizada.",
            AvatarRemoved => "Foto de perfil eliminada.",
            CvUploaded => "Currículum subido correctamente.",
            ContactSent => "Tu mensaje se ha enviado. Te responderemos pronto.",
            ContactFailed => "No se ha podido enviar tu mensaje. Inténtalo más tarde.",
        },
        Locale::En => match key {
            Registered => "Your account has been created.",
            LoggedIn => "You are now logged in.",
            LoggedOut => "You have been logged out.",
            LocaleChanged => "Language updated.",
            OfferCreated => "Offer created successfully.",
            OfferUpdated => "Offer updated successfully.",
            OfferDeleted => "Offer deleted successfully.",
            ApplicationSent => "Your application has been sent.",
            AlreadyApplied => "You have already applied to this offer.",
            ApplicationWithdrawn => "Your application has been withdrawn.",
            ApplicationStatusUpdated => "Application status updated.",
            OfferSaved => "Offer saved.",
            OfferUnsaved => "Offer removed from saved offers.",
            ProfileUpdated => "Profile updated successfully.",
            PasswordUpdated => "Password updated successfully.",
            AccountDeleted => "Your account has been deleted.",
            AvatarUpdated => "Profile photo updated.",
            AvatarRemoved => "Profile photo removed.",
            CvUploaded => "CV uploaded successfully.",
            ContactSent => "Your message has been sent. We will get back to you soon.",
            ContactFailed => "Your message could not be sent. Please try again later.",
        },
    }
}

const MONTHS_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Formats a calendar date the way each locale displays it.
pub fn format_date(date: NaiveDate, locale: Locale) -> String {
    match locale {
        Locale::Es => date.format("%d/%m/%Y").to_string(),
        Locale::En => format!(
            "{} {}, {}",
            MONTHS_EN[date.month0() as usize],
            date.day(),
            date.year()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_parse_from_their_wire_names() {
        for key in MessageKey::ALL {
            assert_eq!(key.as_str().parse::<MessageKey>().unwrap(), key);
        }
        assert!("nonsense".parse::<MessageKey>().is_err());
    }

    #[test]
    fn every_key_has_distinct_translations() {
        for key in MessageKey::ALL {
            assert_ne!(translate(key, Locale::Es), translate(key, Locale::En));
        }
    }

    #[test]
    fn dates_follow_locale_conventions() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(format_date(date, Locale::Es), "07/03/2024");
        assert_eq!(format_date(date, Locale::En), "Mar 7, 2024");
    }
}
