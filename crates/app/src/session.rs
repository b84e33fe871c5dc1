use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use empleaworks_core::locale::{translate, MessageKey};
use empleaworks_core::presenter::{avatar_url, Presenter};
use empleaworks_core::types::{Locale, Role, User};

use crate::problem::ProblemResponse;
use crate::router::AppState;

pub const SESSION_COOKIE: &str = "empleaworks_session";
pub const FLASH_COOKIE: &str = "empleaworks_flash";
pub const LOCALE_COOKIE: &str = "empleaworks_locale";

/// Signs and checks the session cookie.
#[derive(Clone)]
pub struct SessionKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    secure: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    Invalid(String),
    #[error("session expired")]
    Expired,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_secs: u64, secure: bool) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
            secure,
        }
    }

    pub fn issue(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl_secs as i64,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| SessionError::Invalid(format!("{err}")))
    }

    /// Returns the user id carried by a valid, unexpired token.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| SessionError::Invalid(format!("{err}")))?;
        if now.timestamp() >= data.claims.exp {
            return Err(SessionError::Expired);
        }
        Ok(data.claims.sub)
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot message stored between a redirect and the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub key: MessageKey,
}

impl Flash {
    pub fn success(key: MessageKey) -> Self {
        Self {
            kind: FlashKind::Success,
            key,
        }
    }

    pub fn error(key: MessageKey) -> Self {
        Self {
            kind: FlashKind::Error,
            key,
        }
    }

    fn encode(self) -> String {
        let kind = match self.kind {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        };
        format!("{kind}:{}", self.key.as_str())
    }

    fn parse(raw: &str) -> Option<Self> {
        let (kind, key) = raw.split_once(':')?;
        let kind = match kind {
            "success" => FlashKind::Success,
            "error" => FlashKind::Error,
            _ => return None,
        };
        Some(Self {
            kind,
            key: key.parse().ok()?,
        })
    }
}

#[derive(Debug, Serialize)]
struct FlashView {
    kind: FlashKind,
    key: MessageKey,
    message: &'static str,
}

/// Signed-in user summary included in every page document.
#[derive(Debug, Clone, Serialize)]
pub struct AuthView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl From<&User> for AuthView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            avatar_url: avatar_url(user.avatar_path.as_deref()),
        }
    }
}

#[derive(Debug, Serialize)]
struct PageDocument<P> {
    component: &'static str,
    props: P,
    auth: Option<AuthView>,
    flash: Option<FlashView>,
    locale: Locale,
}

/// Request context: the signed-in user (if any), the active locale and pending flash.
pub struct Visitor {
    pub user: Option<User>,
    pub locale: Locale,
    flash: Option<Flash>,
    jar: CookieJar,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Visitor {
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let user = match jar.get(SESSION_COOKIE) {
            Some(cookie) => match state.sessions().verify(cookie.value(), state.now()) {
                Ok(user_id) => state
                    .storage()
                    .users()
                    .find_by_id(&user_id)
                    .await
                    .map_err(|err| ProblemResponse::internal("session", err))?,
                Err(err) => {
                    debug!(stage = "session", error = %err, "ignoring session cookie");
                    None
                }
            },
            None => None,
        };

        let locale = jar
            .get(LOCALE_COOKIE)
            .and_then(|cookie| cookie.value().parse().ok())
            .or_else(|| user.as_ref().map(|user| user.locale))
            .unwrap_or(state.default_locale());
        let flash = jar
            .get(FLASH_COOKIE)
            .and_then(|cookie| Flash::parse(cookie.value()));

        Ok(Self {
            user,
            locale,
            flash,
            jar,
        })
    }
}

impl Visitor {
    /// The signed-in user, or 401.
    pub fn user(&self) -> Result<&User, ProblemResponse> {
        self.user.as_ref().ok_or_else(ProblemResponse::unauthenticated)
    }

    /// The signed-in user when it has `role`; 401 when signed out, 403 otherwise.
    pub fn require(&self, role: Role) -> Result<&User, ProblemResponse> {
        let user = self.user()?;
        if user.role != role {
            return Err(ProblemResponse::forbidden());
        }
        Ok(user)
    }

    pub fn presenter(&self, state: &AppState) -> Presenter {
        Presenter::new(self.locale, state.today())
    }

    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.jar = self.jar.add(cookie);
        self
    }

    pub fn without_cookie(mut self, name: &'static str) -> Self {
        self.jar = self.jar.remove(removal(name));
        self
    }

    /// Renders a page document and consumes the pending flash.
    pub fn render<P: Serialize>(self, component: &'static str, props: P) -> Response {
        let flash = self.flash.map(|flash| FlashView {
            kind: flash.kind,
            key: flash.key,
            message: translate(flash.key, self.locale),
        });
        let jar = if flash.is_some() {
            self.jar.remove(removal(FLASH_COOKIE))
        } else {
            self.jar
        };
        let document = PageDocument {
            component,
            props,
            auth: self.user.as_ref().map(AuthView::from),
            flash,
            locale: self.locale,
        };
        (jar, Json(document)).into_response()
    }

    /// 303 to `location` carrying a flash for the next page.
    pub fn redirect(self, location: &str, flash: Flash) -> Response {
        let cookie = Cookie::build((FLASH_COOKIE, flash.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        (self.jar.add(cookie), Redirect::to(location)).into_response()
    }
}

/// Local path of the `Referer`, falling back when absent or foreign.
pub fn back(headers: &HeaderMap, app_url: &str, fallback: &str) -> String {
    let Some(referer) = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
    else {
        return fallback.to_string();
    };

    if referer.starts_with('/') && !referer.starts_with("//") {
        return referer.to_string();
    }
    match (url::Url::parse(referer), url::Url::parse(app_url)) {
        (Ok(target), Ok(base)) if target.origin() == base.origin() => match target.query() {
            Some(query) => format!("{}?{query}", target.path()),
            None => target.path().to_string(),
        },
        _ => fallback.to_string(),
    }
}
