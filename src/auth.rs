use std::future::{ready, Ready};

use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    dev::Payload,
    http::{header, StatusCode},
    FromRequest, HttpRequest, HttpResponse, ResponseError,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use crate::models::Role;

pub const STATION_COOKIE: &str = "estacao";
pub const TOKEN_COOKIE: &str = "sessao";

pub const LOGIN_PATH: &str = "/login";
pub const PROFILE_SELECTION_PATH: &str = "/painel/selecao-perfil";
pub const PANEL_HOME_PATH: &str = "/painel";

/// Payload of the backend's bearer token. Read for display and routing only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp.map_or(false, |exp| exp <= now)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unreadable session token: {0}")]
pub struct TokenError(#[from] jsonwebtoken::errors::Error);

/// Decodes the token payload without checking its signature. The backend
/// stays the authority on every call the token is attached to.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

/// Why a panel page was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denied {
    NoStation,
    NoToken,
    InvalidToken,
    WrongRole,
}

impl Denied {
    pub fn location(&self) -> &'static str {
        match self {
            Denied::NoStation => LOGIN_PATH,
            Denied::NoToken | Denied::InvalidToken => PROFILE_SELECTION_PATH,
            Denied::WrongRole => PANEL_HOME_PATH,
        }
    }

    fn clears_token(&self) -> bool {
        matches!(self, Denied::InvalidToken)
    }
}

impl std::fmt::Display for Denied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "panel access denied, redirecting to {}", self.location())
    }
}

impl ResponseError for Denied {
    fn status_code(&self) -> StatusCode {
        StatusCode::SEE_OTHER
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::SeeOther();
        response
            .insert_header((header::LOCATION, self.location()))
            .insert_header((header::CACHE_CONTROL, "no-store"));
        if self.clears_token() {
            response.cookie(expired_cookie(TOKEN_COOKIE));
        }
        response.finish()
    }
}

/// Pure access decision for a panel page.
pub fn authorize(token: Option<&str>, required: Option<Role>, now: i64) -> Result<Claims, Denied> {
    let token = token.map(str::trim).filter(|token| !token.is_empty());
    let Some(token) = token else {
        return Err(Denied::NoToken);
    };
    let claims = match decode_claims(token) {
        Ok(claims) if !claims.is_expired(now) => claims,
        Ok(_) => return Err(Denied::InvalidToken),
        Err(err) => {
            log::debug!("{err}");
            return Err(Denied::InvalidToken);
        }
    };
    match required {
        Some(role) if role != claims.role => Err(Denied::WrongRole),
        _ => Ok(claims),
    }
}

/// The logged-in staff member for the current request.
#[derive(Debug, Clone)]
pub struct PanelSession {
    pub token: String,
    pub claims: Claims,
}

impl PanelSession {
    fn extract(req: &HttpRequest, required: Option<Role>) -> Result<Self, Denied> {
        let token = req.cookie(TOKEN_COOKIE).map(|cookie| cookie.value().to_string());
        let now = chrono::Utc::now().timestamp();
        let claims = authorize(token.as_deref(), required, now)?;
        Ok(Self {
            token: token.unwrap_or_default(),
            claims,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.claims.role == Role::Admin
    }
}

impl FromRequest for PanelSession {
    type Error = Denied;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(PanelSession::extract(req, None))
    }
}

pub struct AdminSession(pub PanelSession);

impl FromRequest for AdminSession {
    type Error = Denied;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(PanelSession::extract(req, Some(Role::Admin)).map(AdminSession))
    }
}

pub struct BarberSession(pub PanelSession);

impl FromRequest for BarberSession {
    type Error = Denied;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(PanelSession::extract(req, Some(Role::Barber)).map(BarberSession))
    }
}

/// Present when this device passed the station login.
pub struct Station;

impl FromRequest for Station {
    type Error = Denied;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(if has_station(req) {
            Ok(Station)
        } else {
            Err(Denied::NoStation)
        })
    }
}

pub fn has_station(req: &HttpRequest) -> bool {
    req.cookie(STATION_COOKIE)
        .map_or(false, |cookie| cookie.value() == "1")
}

pub fn station_cookie(req: &HttpRequest, remember: bool) -> Cookie<'static> {
    let mut builder = Cookie::build(STATION_COOKIE, "1")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    if remember {
        builder = builder.max_age(Duration::days(365));
    }
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

/// Session-scoped: dropped when the browser closes, like per-tab storage.
pub fn token_cookie(req: &HttpRequest, token: &str) -> Cookie<'static> {
    let mut builder = Cookie::build(TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict);
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .max_age(Duration::seconds(0))
        .finish()
}
