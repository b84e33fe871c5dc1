use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known enumeration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Account role. Each non-admin role owns a 1:1 profile record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Candidate,
    Company,
    Admin,
}

impl Role {
    /// Returns the canonical database representation for the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Company => "company",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "candidate" => Ok(Self::Candidate),
            "company" => Ok(Self::Company),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Es => "es",
            Self::En => "en",
        }
    }
}

impl FromStr for Locale {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "es" => Ok(Self::Es),
            "en" => Ok(Self::En),
            other => Err(UnknownVariant::new("locale", other)),
        }
    }
}

/// Employment contract offered by a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    FullTime,
    PartTime,
    Internship,
    Freelance,
    Temporary,
}

impl ContractType {
    pub const ALL: [ContractType; 5] = [
        Self::FullTime,
        Self::PartTime,
        Self::Internship,
        Self::Freelance,
        Self::Temporary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullTime => "full_time",
            Self::PartTime => "part_time",
            Self::Internship => "internship",
            Self::Freelance => "freelance",
            Self::Temporary => "temporary",
        }
    }
}

impl FromStr for ContractType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == value)
            .ok_or_else(|| UnknownVariant::new("contract type", value))
    }
}

/// Review state of an application, set by the company that owns the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownVariant::new("application status", other)),
        }
    }
}

/// User account shared by every role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub locale: Locale,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Candidate-specific profile attached to a user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub user_id: String,
    pub surname: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub cv_path: Option<String>,
}

/// Company-specific profile attached to a user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub user_id: String,
    pub address: Option<String>,
    pub web_link: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
}

/// Job posting owned by a company user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub company_id: String,
    pub company_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub degree: String,
    pub email: String,
    pub contract_type: ContractType,
    pub job_location: String,
    pub closing_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// An offer stops accepting applications after its closing date.
    pub fn is_closed(&self, today: NaiveDate) -> bool {
        self.closing_date < today
    }
}

/// Application from a candidate to an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub offer_id: String,
    pub user_id: String,
    pub phone: String,
    pub email: String,
    pub cv_path: Option<String>,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application joined with the offer it targets, as seen by the candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSummary {
    pub application: Application,
    pub offer_title: String,
    pub company_id: String,
    pub company_name: String,
    pub offer_closing_date: NaiveDate,
}

/// Application joined with the applying candidate, as seen by the company.
#[derive(Debug, Clone, PartialEq)]
pub struct Applicant {
    pub application: Application,
    pub offer_title: String,
    pub candidate_name: String,
    pub candidate_surname: String,
    pub candidate_avatar: Option<String>,
}

/// Offer owned by a company with its number of applications.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyOffer {
    pub offer: Offer,
    pub applicants_count: i64,
}

/// Result of toggling a saved offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedState {
    Saved,
    Removed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub role: String,
    #[serde(default)]
    pub surname: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferForm {
    pub title: String,
    pub description: String,
    pub category: String,
    pub degree: String,
    pub email: String,
    pub contract_type: String,
    pub job_location: String,
    pub closing_date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyForm {
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

/// Account and role profile fields edited together on the profile page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub web_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteAccountForm {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationStatusForm {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocaleForm {
    pub locale: String,
}

/// Query parameters accepted by the public offer listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferFilters {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl OfferFilters {
    pub const PER_PAGE: u32 = 12;

    /// One-based page number, clamped to at least 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Rows to skip; saturates for page numbers past the addressable range.
    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(Self::PER_PAGE)
    }

    /// Trimmed, non-empty filter value.
    pub fn normalized(value: &Option<String>) -> Option<&str> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}
