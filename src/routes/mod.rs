pub mod admin;
pub mod barber;
pub mod booking;
pub mod panel;
pub mod public;
pub mod station;

use actix_web::{
    http::{header, StatusCode},
    web, HttpResponse, ResponseError,
};

use crate::{
    api::ApiError,
    auth::{expired_cookie, PanelSession, PROFILE_SELECTION_PATH, TOKEN_COOKIE},
    flash::{self, Flash},
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    public::configure(cfg);
    booking::configure(cfg);
    station::configure(cfg);
    panel::configure(cfg);
    admin::configure(cfg);
    barber::configure(cfg);
}

pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

pub fn see_other_with(location: &str, message: Flash) -> HttpResponse {
    let mut builder = HttpResponse::SeeOther();
    builder
        .append_header((header::LOCATION, location))
        .insert_header((header::CACHE_CONTROL, "no-store"));
    flash::queue(&mut builder, message);
    builder.finish()
}

/// A panel request the backend refused to serve for this session.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("backend rejected the session token")]
    SessionRejected,
}

impl ResponseError for PanelError {
    fn status_code(&self) -> StatusCode {
        StatusCode::SEE_OTHER
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::SeeOther()
            .append_header((header::LOCATION, PROFILE_SELECTION_PATH))
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .cookie(expired_cookie(TOKEN_COOKIE))
            .finish()
    }
}

/// Turns a backend failure into the message shown on the page, unless the
/// backend refused the session, which ends the request.
pub fn inline_error(err: ApiError, fallback: &str) -> Result<String, PanelError> {
    if err.is_auth() {
        log::info!("panel session rejected by backend: {err}");
        return Err(PanelError::SessionRejected);
    }
    log::warn!("{fallback} ({err})");
    Ok(err.user_message(fallback))
}

/// Like [`inline_error`] for lists: an empty list plus the message.
pub fn list_or_error<T>(
    result: Result<Vec<T>, ApiError>,
    fallback: &str,
) -> Result<(Vec<T>, Option<String>), PanelError> {
    match result {
        Ok(items) => Ok((items, None)),
        Err(err) => Ok((Vec::new(), Some(inline_error(err, fallback)?))),
    }
}

pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// Sidebar contents for the logged-in staff member.
pub struct PanelNav {
    pub user_name: String,
    pub role_label: &'static str,
    pub links: Vec<NavLink>,
}

const ADMIN_LINKS: [(&str, &str); 5] = [
    ("/painel", "Dashboard"),
    ("/painel/servicos", "Serviços"),
    ("/painel/equipa", "Equipe"),
    ("/painel/agenda-completa", "Agenda Completa"),
    ("/painel/relatorios", "Relatórios"),
];

const BARBER_LINKS: [(&str, &str); 3] = [
    ("/painel", "Minha Agenda"),
    ("/painel/meus-horarios", "Meus Horários"),
    ("/painel/meu-historico", "Meu Histórico"),
];

impl PanelNav {
    pub fn new(session: &PanelSession, current: &str) -> Self {
        let links = if session.is_admin() {
            &ADMIN_LINKS[..]
        } else {
            &BARBER_LINKS[..]
        };
        Self {
            user_name: session.claims.name.clone(),
            role_label: session.claims.role.label(),
            links: links
                .iter()
                .map(|&(href, label)| NavLink {
                    href,
                    label,
                    active: href == current,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support;
