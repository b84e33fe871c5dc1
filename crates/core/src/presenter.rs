//! Shapes domain records into the plain views page components render.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::locale::format_date;
use crate::types::{
    Applicant, ApplicationStatus, ApplicationSummary, CandidateProfile, CompanyOffer,
    CompanyProfile, ContractType, Locale, Offer, Role, User,
};

pub const EXCERPT_LEN: usize = 150;
pub const AVATAR_URL_PREFIX: &str = "/uploads/avatars/";

/// Inputs shared by every presenter call within one request.
#[derive(Debug, Clone, Copy)]
pub struct Presenter {
    pub locale: Locale,
    pub today: NaiveDate,
}

impl Presenter {
    pub fn new(locale: Locale, today: NaiveDate) -> Self {
        Self { locale, today }
    }

    pub fn date(&self, date: NaiveDate) -> String {
        format_date(date, self.locale)
    }

    pub fn datetime(&self, value: DateTime<Utc>) -> String {
        format_date(value.date_naive(), self.locale)
    }

    fn days_left(&self, closing_date: NaiveDate) -> i64 {
        (closing_date - self.today).num_days().max(0)
    }

    pub fn offer_card(&self, offer: &Offer, is_saved: bool) -> OfferCard {
        OfferCard {
            id: offer.id.clone(),
            title: offer.title.clone(),
            company_id: offer.company_id.clone(),
            company_name: offer.company_name.clone(),
            job_location: offer.job_location.clone(),
            contract_type: offer.contract_type,
            category: offer.category.clone(),
            excerpt: excerpt(&offer.description, EXCERPT_LEN),
            closing_date: self.date(offer.closing_date),
            is_closed: offer.is_closed(self.today),
            days_left: self.days_left(offer.closing_date),
            is_saved,
            published_at: self.datetime(offer.created_at),
        }
    }

    pub fn offer_detail(
        &self,
        offer: &Offer,
        company: CompanySummary,
        viewer: OfferViewer,
    ) -> OfferDetail {
        let is_closed = offer.is_closed(self.today);
        OfferDetail {
            id: offer.id.clone(),
            title: offer.title.clone(),
            description: offer.description.clone(),
            category: offer.category.clone(),
            degree: offer.degree.clone(),
            email: offer.email.clone(),
            contract_type: offer.contract_type,
            job_location: offer.job_location.clone(),
            closing_date: self.date(offer.closing_date),
            closing_date_iso: offer.closing_date,
            published_at: self.datetime(offer.created_at),
            is_closed,
            days_left: self.days_left(offer.closing_date),
            company,
            is_saved: viewer.is_saved,
            has_applied: viewer.has_applied,
            can_apply: viewer.role == Some(Role::Candidate) && !viewer.has_applied && !is_closed,
            is_owner: viewer.is_owner,
            applicants_count: viewer.applicants_count.filter(|_| viewer.is_owner),
        }
    }

    pub fn company_summary(&self, user: &User, profile: &CompanyProfile) -> CompanySummary {
        CompanySummary {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar_url: avatar_url(user.avatar_path.as_deref()),
            address: profile.address.clone(),
            web_link: profile.web_link.clone(),
            description: profile.description.clone(),
            phone: profile.phone.clone(),
        }
    }

    pub fn candidate_summary(&self, user: &User, profile: &CandidateProfile) -> CandidateSummary {
        CandidateSummary {
            id: user.id.clone(),
            name: user.name.clone(),
            surname: profile.surname.clone(),
            full_name: full_name(&user.name, &profile.surname),
            email: user.email.clone(),
            avatar_url: avatar_url(user.avatar_path.as_deref()),
            phone: profile.phone.clone(),
            address: profile.address.clone(),
            description: profile.description.clone(),
            has_cv: profile.cv_path.is_some(),
        }
    }

    pub fn application(&self, summary: &ApplicationSummary) -> ApplicationView {
        let application = &summary.application;
        ApplicationView {
            id: application.id.clone(),
            offer_id: application.offer_id.clone(),
            offer_title: summary.offer_title.clone(),
            company_id: summary.company_id.clone(),
            company_name: summary.company_name.clone(),
            status: application.status,
            applied_at: self.datetime(application.created_at),
            cover_letter: application.cover_letter.clone(),
            offer_closed: summary.offer_closing_date < self.today,
        }
    }

    pub fn applicant(&self, applicant: &Applicant) -> ApplicantView {
        let application = &applicant.application;
        ApplicantView {
            application_id: application.id.clone(),
            offer_id: application.offer_id.clone(),
            offer_title: applicant.offer_title.clone(),
            candidate_id: application.user_id.clone(),
            full_name: full_name(&applicant.candidate_name, &applicant.candidate_surname),
            avatar_url: avatar_url(applicant.candidate_avatar.as_deref()),
            email: application.email.clone(),
            phone: application.phone.clone(),
            cover_letter: application.cover_letter.clone(),
            status: application.status,
            applied_at: self.datetime(application.created_at),
            has_cv: application.cv_path.is_some(),
        }
    }

    pub fn company_offer(&self, entry: &CompanyOffer) -> CompanyOfferRow {
        CompanyOfferRow {
            id: entry.offer.id.clone(),
            title: entry.offer.title.clone(),
            job_location: entry.offer.job_location.clone(),
            contract_type: entry.offer.contract_type,
            closing_date: self.date(entry.offer.closing_date),
            is_closed: entry.offer.is_closed(self.today),
            applicants_count: entry.applicants_count,
        }
    }

    pub fn company_dashboard(&self, offers: &[CompanyOffer]) -> CompanyDashboard {
        let rows: Vec<CompanyOfferRow> = offers.iter().map(|entry| self.company_offer(entry)).collect();
        CompanyDashboard {
            offers_count: rows.len(),
            open_offers_count: rows.iter().filter(|row| !row.is_closed).count(),
            applicants_count: rows.iter().map(|row| row.applicants_count).sum(),
            recent_offers: rows.into_iter().take(DASHBOARD_RECENT).collect(),
        }
    }
}

pub const DASHBOARD_RECENT: usize = 5;

/// Per-viewer flags that change how an offer detail renders.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfferViewer {
    pub role: Option<Role>,
    pub is_saved: bool,
    pub has_applied: bool,
    pub is_owner: bool,
    pub applicants_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferCard {
    pub id: String,
    pub title: String,
    pub company_id: String,
    pub company_name: String,
    pub job_location: String,
    pub contract_type: ContractType,
    pub category: String,
    pub excerpt: String,
    pub closing_date: String,
    pub is_closed: bool,
    pub days_left: i64,
    pub is_saved: bool,
    pub published_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub degree: String,
    pub email: String,
    pub contract_type: ContractType,
    pub job_location: String,
    pub closing_date: String,
    pub closing_date_iso: NaiveDate,
    pub published_at: String,
    pub is_closed: bool,
    pub days_left: i64,
    pub company: CompanySummary,
    pub is_saved: bool,
    pub has_applied: bool,
    pub can_apply: bool,
    pub is_owner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicants_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanySummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub address: Option<String>,
    pub web_link: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSummary {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub has_cv: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationView {
    pub id: String,
    pub offer_id: String,
    pub offer_title: String,
    pub company_id: String,
    pub company_name: String,
    pub status: ApplicationStatus,
    pub applied_at: String,
    pub cover_letter: Option<String>,
    pub offer_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicantView {
    pub application_id: String,
    pub offer_id: String,
    pub offer_title: String,
    pub candidate_id: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub email: String,
    pub phone: String,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub applied_at: String,
    pub has_cv: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyOfferRow {
    pub id: String,
    pub title: String,
    pub job_location: String,
    pub contract_type: ContractType,
    pub closing_date: String,
    pub is_closed: bool,
    pub applicants_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyDashboard {
    pub offers_count: usize,
    pub open_offers_count: usize,
    pub applicants_count: i64,
    pub recent_offers: Vec<CompanyOfferRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateDashboard {
    pub applications_count: i64,
    pub saved_count: i64,
    pub recent_applications: Vec<ApplicationView>,
    pub latest_offers: Vec<OfferCard>,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub last_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: i64) -> Self {
        let per_page = per_page.max(1);
        let pages = (total.max(0) as u64).div_ceil(u64::from(per_page));
        Self {
            data,
            page,
            per_page,
            total,
            last_page: pages.max(1) as u32,
        }
    }
}

/// Shortens text to at most `max` characters, marking truncation with `…`.
pub fn excerpt(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max.saturating_sub(1)).collect();
    let trimmed_len = shortened.trim_end().len();
    shortened.truncate(trimmed_len);
    shortened.push('…');
    shortened
}

pub fn avatar_url(path: Option<&str>) -> Option<String> {
    path.map(|file| format!("{AVATAR_URL_PREFIX}{file}"))
}

fn full_name(name: &str, surname: &str) -> String {
    let surname = surname.trim();
    if surname.is_empty() {
        name.to_string()
    } else {
        format!("{name} {surname}")
    }
}
