use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{
    ApplicationStatus, ApplicationStatusForm, ApplyForm, ContactForm, ContractType, LocaleForm,
    Locale, LoginForm, OfferForm, PasswordForm, ProfileForm, RegisterForm, Role,
};

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_LETTER_LEN: usize = 2000;
pub const MIN_PASSWORD_LEN: usize = 8;
const MIN_PHONE_DIGITS: usize = 6;
const MAX_PHONE_DIGITS: usize = 20;

/// Field errors collected while validating a form, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an error set holding a single message.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, format!("The {} field is required.", label(field)));
            false
        } else {
            true
        }
    }

    fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(
                field,
                format!(
                    "The {} field must not be greater than {max} characters.",
                    label(field)
                ),
            );
        }
    }

    fn email(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.max_len(field, value, MAX_NAME_LEN);
            if !is_valid_email(value.trim()) {
                self.add(
                    field,
                    format!("The {} field must be a valid email address.", label(field)),
                );
            }
        }
    }

    fn phone(&mut self, field: &str, value: &str) {
        if !is_valid_phone(value) {
            self.add(
                field,
                format!("The {} field must be a valid phone number.", label(field)),
            );
        }
    }

    fn password(&mut self, field: &str, password: &str, confirmation: &str) {
        if !self.required(field, password) {
            return;
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            self.add(
                field,
                format!("The {} field must be at least {MIN_PASSWORD_LEN} characters.", label(field)),
            );
        }
        if password != confirmation {
            self.add(
                field,
                format!("The {} field confirmation does not match.", label(field)),
            );
        }
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

/// Accepts `local@domain.tld` shaped addresses without whitespace.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !host.starts_with('.') && tld.len() >= 2
}

/// Digits, spaces and `+-()` only, with a bounded number of digits.
pub fn is_valid_phone(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, ' ' | '+' | '-' | '(' | ')'))
    {
        return false;
    }
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

fn optional(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Validated registration data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub surname: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<ValidRegistration, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if errors.required("name", &self.name) {
            errors.max_len("name", &self.name, MAX_NAME_LEN);
        }
        errors.email("email", &self.email);
        errors.password("password", &self.password, &self.password_confirmation);

        let role = match self.role.trim().parse::<Role>() {
            Ok(role @ (Role::Candidate | Role::Company)) => Some(role),
            _ => {
                errors.add("role", "The selected role is invalid.");
                None
            }
        };
        let surname = optional(&self.surname).unwrap_or_default().to_string();
        errors.max_len("surname", &surname, MAX_NAME_LEN);

        errors.into_result()?;
        Ok(ValidRegistration {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            role: role.unwrap_or(Role::Candidate),
            surname,
        })
    }
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.email("email", &self.email);
        errors.required("password", &self.password);
        errors.into_result()
    }
}

/// Offer fields after validation, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidOffer {
    pub title: String,
    pub description: String,
    pub category: String,
    pub degree: String,
    pub email: String,
    pub contract_type: ContractType,
    pub job_location: String,
    pub closing_date: NaiveDate,
}

impl OfferForm {
    /// Validates the form; `today` bounds the earliest accepted closing date.
    pub fn validate(&self, today: NaiveDate) -> Result<ValidOffer, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("title", &self.title),
            ("category", &self.category),
            ("degree", &self.degree),
            ("job_location", &self.job_location),
        ] {
            if errors.required(field, value) {
                errors.max_len(field, value, MAX_NAME_LEN);
            }
        }
        if errors.required("description", &self.description) {
            errors.max_len("description", &self.description, MAX_DESCRIPTION_LEN);
        }
        errors.email("email", &self.email);

        let contract_type = match self.contract_type.trim().parse::<ContractType>() {
            Ok(value) => Some(value),
            Err(_) => {
                errors.add("contract_type", "The selected contract type is invalid.");
                None
            }
        };

        let closing_date = if errors.required("closing_date", &self.closing_date) {
            match NaiveDate::parse_from_str(self.closing_date.trim(), "%Y-%m-%d") {
                Ok(date) if date < today => {
                    errors.add(
                        "closing_date",
                        "The closing date field must be a date after or equal to today.",
                    );
                    None
                }
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("closing_date", "The closing date field must be a valid date.");
                    None
                }
            }
        } else {
            None
        };

        errors.into_result()?;
        match (contract_type, closing_date) {
            (Some(contract_type), Some(closing_date)) => Ok(ValidOffer {
                title: self.title.trim().to_string(),
                description: self.description.trim().to_string(),
                category: self.category.trim().to_string(),
                degree: self.degree.trim().to_string(),
                email: self.email.trim().to_lowercase(),
                contract_type,
                job_location: self.job_location.trim().to_string(),
                closing_date,
            }),
            _ => Err(ValidationErrors::single("closing_date", "The closing date field is required.")),
        }
    }
}

/// Application fields after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidApplication {
    pub phone: String,
    pub email: String,
    pub cover_letter: Option<String>,
}

impl ApplyForm {
    pub fn validate(&self) -> Result<ValidApplication, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if errors.required("phone", &self.phone) {
            errors.phone("phone", &self.phone);
        }
        errors.email("email", &self.email);
        let cover_letter = optional(&self.cover_letter);
        if let Some(letter) = cover_letter {
            errors.max_len("cover_letter", letter, MAX_LETTER_LEN);
        }
        errors.into_result()?;
        Ok(ValidApplication {
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            cover_letter: cover_letter.map(str::to_string),
        })
    }
}

/// Profile fields after validation; blank optional fields become `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidProfile {
    pub name: String,
    pub email: String,
    pub surname: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub web_link: Option<String>,
}

impl ProfileForm {
    pub fn validate(&self, role: Role) -> Result<ValidProfile, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if errors.required("name", &self.name) {
            errors.max_len("name", &self.name, MAX_NAME_LEN);
        }
        errors.email("email", &self.email);

        let surname = optional(&self.surname).unwrap_or_default();
        if role == Role::Candidate {
            errors.max_len("surname", surname, MAX_NAME_LEN);
        }
        let phone = optional(&self.phone);
        if let Some(phone) = phone {
            errors.phone("phone", phone);
        }
        let address = optional(&self.address);
        if let Some(address) = address {
            errors.max_len("address", address, MAX_NAME_LEN);
        }
        let description = optional(&self.description);
        if let Some(description) = description {
            errors.max_len("description", description, MAX_DESCRIPTION_LEN);
        }
        let web_link = optional(&self.web_link).filter(|_| role == Role::Company);
        if let Some(link) = web_link {
            errors.max_len("web_link", link, MAX_NAME_LEN);
            if !(link.starts_with("http://") || link.starts_with("https://")) {
                errors.add("web_link", "The web link field must be a valid URL.");
            }
        }

        errors.into_result()?;
        Ok(ValidProfile {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            surname: surname.to_string(),
            phone: phone.map(str::to_string),
            address: address.map(str::to_string),
            description: description.map(str::to_string),
            web_link: web_link.map(str::to_string),
        })
    }
}

impl PasswordForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required("current_password", &self.current_password);
        errors.password("password", &self.password, &self.password_confirmation);
        errors.into_result()
    }
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [("name", &self.name), ("subject", &self.subject)] {
            if errors.required(field, value) {
                errors.max_len(field, value, MAX_NAME_LEN);
            }
        }
        errors.email("email", &self.email);
        if errors.required("message", &self.message) {
            errors.max_len("message", &self.message, MAX_LETTER_LEN);
        }
        errors.into_result()
    }
}

impl ApplicationStatusForm {
    pub fn validate(&self) -> Result<ApplicationStatus, ValidationErrors> {
        self.status
            .trim()
            .parse()
            .map_err(|_| ValidationErrors::single("status", "The selected status is invalid."))
    }
}

impl LocaleForm {
    pub fn validate(&self) -> Result<Locale, ValidationErrors> {
        self.locale
            .trim()
            .parse()
            .map_err(|_| ValidationErrors::single("locale", "The selected locale is invalid."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn offer_form() -> OfferForm {
        OfferForm {
            title: " Backend developer ".into(),
            description: "Build APIs".into(),
            category: "IT".into(),
            degree: "Computer Science".into(),
            email: "Jobs@Acme.test".into(),
            contract_type: "full_time".into(),
            job_location: "Madrid".into(),
            closing_date: "2024-06-01".into(),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.es"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana@@example.com"));
        assert!(!is_valid_email("ana @example.com"));
        assert!(!is_valid_email("ana@.com"));
    }

    #[test]
    fn phone_shapes() {
        assert!(is_valid_phone("+34 600 123 456"));
        assert!(is_valid_phone("(91) 555-0101"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call me"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn registration_normalizes_fields() {
        let form = RegisterForm {
            name: " Ana ".into(),
            email: "Ana@Example.com".into(),
            password: "secret-pass".into(),
            password_confirmation: "secret-pass".into(),
            role: "company".into(),
            surname: None,
        };
        let valid = form.validate().expect("valid registration");
        assert_eq!(valid.name, "Ana");
        assert_eq!(valid.email, "ana@example.com");
        assert_eq!(valid.role, Role::Company);
    }

    #[test]
    fn registration_rejects_admin_and_weak_passwords() {
        let form = RegisterForm {
            name: "".into(),
            email: "nope".into(),
            password: "short".into(),
            password_confirmation: "other".into(),
            role: "admin".into(),
            surname: None,
        };
        let errors = form.validate().unwrap_err();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["email", "name", "password", "role"]);
        assert_eq!(errors.get("password").map(<[String]>::len), Some(2));
    }

    #[test]
    fn offer_form_accepts_today_and_trims() {
        let mut form = offer_form();
        form.closing_date = "2024-05-10".into();
        let valid = form.validate(today()).expect("valid offer");
        assert_eq!(valid.title, "Backend developer");
        assert_eq!(valid.email, "jobs@acme.test");
        assert_eq!(valid.contract_type, ContractType::FullTime);
        assert_eq!(valid.closing_date, today());
    }

    #[test]
    fn offer_form_rejects_past_dates_and_unknown_contracts() {
        let mut form = offer_form();
        form.closing_date = "2024-05-09".into();
        form.contract_type = "forever".into();
        let errors = form.validate(today()).unwrap_err();
        assert!(errors.contains("closing_date"));
        assert!(errors.contains("contract_type"));

        form.closing_date = "10/05/2024".into();
        let errors = form.validate(today()).unwrap_err();
        assert_eq!(
            errors.get("closing_date").unwrap()[0],
            "The closing date field must be a valid date."
        );
    }

    #[test]
    fn offer_description_has_upper_bound() {
        let mut form = offer_form();
        form.description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        let errors = form.validate(today()).unwrap_err();
        assert!(errors.contains("description"));
    }

    #[test]
    fn apply_form_drops_blank_cover_letter() {
        let form = ApplyForm {
            phone: "600123456".into(),
            email: "ana@example.com".into(),
            cover_letter: Some("   ".into()),
        };
        let valid = form.validate().expect("valid");
        assert_eq!(valid.cover_letter, None);

        let form = ApplyForm {
            phone: "abc".into(),
            email: "ana@example.com".into(),
            cover_letter: None,
        };
        assert!(form.validate().unwrap_err().contains("phone"));
    }

    #[test]
    fn profile_web_link_only_checked_for_companies() {
        let form = ProfileForm {
            name: "Acme".into(),
            email: "hr@acme.test".into(),
            web_link: Some("acme.test".into()),
            ..ProfileForm::default()
        };
        assert!(form.validate(Role::Company).unwrap_err().contains("web_link"));
        let valid = form.validate(Role::Candidate).expect("ignored for candidates");
        assert_eq!(valid.web_link, None);
    }

    #[test]
    fn password_change_requires_matching_confirmation() {
        let form = PasswordForm {
            current_password: "old-password".into(),
            password: "new-password".into(),
            password_confirmation: "new-passw0rd".into(),
        };
        assert!(form.validate().unwrap_err().contains("password"));
    }

    #[test]
    fn contact_form_requires_everything() {
        let form = ContactForm {
            name: "".into(),
            email: "".into(),
            subject: "".into(),
            message: "".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.fields().count(), 4);
    }

    #[test]
    fn status_and_locale_forms_parse_enums() {
        let form = ApplicationStatusForm {
            status: "rejected".into(),
        };
        assert_eq!(form.validate().unwrap(), ApplicationStatus::Rejected);
        let form = LocaleForm { locale: "de".into() };
        assert!(form.validate().unwrap_err().contains("locale"));
    }

    #[test]
    fn errors_serialize_as_field_map() {
        let errors = ValidationErrors::single("email", "bad");
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value, serde_json::json!({ "email": ["bad"] }));
    }
}
