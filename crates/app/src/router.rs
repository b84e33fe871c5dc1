use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::header,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use empleaworks_core::types::Locale;
use empleaworks_storage::Database;
use empleaworks_util::AppConfig;

use crate::mailer::Mailer;
use crate::session::SessionKeys;
use crate::signing::LinkSigner;
use crate::uploads::{self, FileStore};
use crate::{
    applications, auth, contact, dashboard, directory, locale, offers, profile, saved, telemetry,
};

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    sessions: SessionKeys,
    links: LinkSigner,
    files: FileStore,
    mailer: Mailer,
    app_url: Arc<str>,
    default_locale: Locale,
    upload_max_bytes: usize,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        config: &AppConfig,
        mailer: Mailer,
    ) -> Self {
        Self {
            metrics,
            storage,
            clock: Arc::new(Utc::now),
            sessions: SessionKeys::new(
                &config.session.secret,
                config.session.ttl_secs,
                config.environment.is_production(),
            ),
            links: LinkSigner::new(&config.session.secret, config.app_url.clone()),
            files: FileStore::new(config.storage_dir.clone()),
            mailer,
            app_url: Arc::from(config.app_url.as_str()),
            default_locale: config.default_locale.parse().unwrap_or_default(),
            upload_max_bytes: config.upload_max_bytes,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn sessions(&self) -> &SessionKeys {
        &self.sessions
    }

    pub fn links(&self) -> &LinkSigner {
        &self.links
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    pub fn upload_max_bytes(&self) -> usize {
        self.upload_max_bytes
    }
}

pub fn app_router(state: AppState) -> Router {
    let body_limit = state.upload_max_bytes() + MULTIPART_OVERHEAD;
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/locale", post(locale::switch))
        .route("/offers", get(offers::index).post(offers::create))
        .route(
            "/offers/:id",
            get(offers::show)
                .put(offers::update)
                .delete(offers::destroy),
        )
        .route("/offers/:id/apply", post(applications::apply))
        .route("/offers/:id/save", post(saved::toggle))
        .route("/company/offers", get(offers::company_index))
        .route(
            "/company/offers/:id/applicants",
            get(applications::offer_applicants),
        )
        .route("/company/applicants", get(applications::company_applicants))
        .route(
            "/company/applications/:id/status",
            put(applications::update_status),
        )
        .route("/applications", get(applications::index))
        .route(
            "/applications/:id",
            axum::routing::delete(applications::withdraw),
        )
        .route("/saved-offers", get(saved::index))
        .route("/dashboard", get(dashboard::show))
        .route(
            "/profile",
            get(profile::edit)
                .put(profile::update)
                .delete(profile::destroy),
        )
        .route("/profile/password", put(profile::update_password))
        .route(
            "/profile/avatar",
            post(uploads::upload_avatar).delete(uploads::remove_avatar),
        )
        .route("/profile/cv", post(uploads::upload_cv))
        .route("/uploads/avatars/:file", get(uploads::serve_avatar))
        .route("/companies/:id", get(directory::company))
        .route("/candidates/:id", get(directory::candidate))
        .route("/candidates/:id/cv", get(directory::download_cv))
        .route("/cv/signed/:id", get(directory::signed_cv))
        .route("/contact", post(contact::send))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn healthz() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
