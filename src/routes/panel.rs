//! Panel entry point and the bits shared by the admin and barber screens.

use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use chrono::FixedOffset;
use serde::Deserialize;

use crate::{
    auth::{PanelSession, PANEL_HOME_PATH},
    flash::Flash,
    models::{Appointment, STATUS_CANCELLED, STATUS_DONE, STATUS_PENDING},
    routes::{admin, barber, inline_error, see_other, see_other_with, PanelError, PanelNav},
    state::AppState,
};

const STATUS_ERROR: &str = "Não foi possível atualizar o status.";

/// One appointment as shown in lists and cards.
pub struct AppointmentCard {
    pub id: i64,
    pub time: String,
    pub date: String,
    pub client_name: String,
    pub client_phone: String,
    pub service: String,
    pub barber: String,
    pub status: String,
    pub status_class: &'static str,
    pub is_pending: bool,
}

impl AppointmentCard {
    pub fn new(appointment: &Appointment, offset: FixedOffset) -> Self {
        let local = appointment.local_time(offset);
        Self {
            id: appointment.id,
            time: local.format("%H:%M").to_string(),
            date: local.format("%d/%m/%Y").to_string(),
            client_name: appointment.client_name.clone(),
            client_phone: appointment.phone_label().to_string(),
            service: appointment.service_label().to_string(),
            barber: appointment.barber_label().to_string(),
            status: appointment.status.clone(),
            status_class: appointment.status_class(),
            is_pending: appointment.status == STATUS_PENDING,
        }
    }
}

/// "Are you sure?" step in front of every delete.
#[derive(Template)]
#[template(path = "confirm.html")]
pub struct ConfirmPage {
    pub flash: Option<Flash>,
    pub nav: PanelNav,
    pub title: String,
    pub message: String,
    pub action: String,
    pub cancel: String,
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub periodo: Option<String>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
struct StatusForm {
    status: String,
    #[serde(default)]
    return_to: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(PANEL_HOME_PATH).route(web::get().to(dashboard)))
        .service(
            web::resource("/painel/agendamentos/{id}/status").route(web::post().to(update_status)),
        );
}

/// `/painel` shows the dashboard matching the session's role.
async fn dashboard(
    session: PanelSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse, PanelError> {
    let query = query.into_inner();
    if session.is_admin() {
        admin::dashboard(&session, &state, &req, query.periodo.as_deref()).await
    } else {
        barber::dashboard(&session, &state, &req, query.q.as_deref().unwrap_or_default()).await
    }
}

/// Only panel paths are accepted as a post-action destination.
pub fn safe_return(target: &str) -> &str {
    if target.starts_with(PANEL_HOME_PATH) && !target.starts_with("//") {
        target
    } else {
        PANEL_HOME_PATH
    }
}

async fn update_status(
    session: PanelSession,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    form: web::Form<StatusForm>,
) -> Result<HttpResponse, PanelError> {
    let id = path.into_inner();
    let form = form.into_inner();
    let back = safe_return(&form.return_to);

    let status = form.status.trim();
    if ![STATUS_PENDING, STATUS_DONE, STATUS_CANCELLED].contains(&status) {
        return Ok(see_other(back));
    }

    let staff = state.backend.staff(&session.token);
    match staff.update_appointment_status(id, status).await {
        Ok(()) => {
            log::info!("{} set appointment {id} to {status}", session.claims.name);
            let message = format!("Agendamento {} com sucesso!", status.to_lowercase());
            Ok(see_other_with(back, Flash::success(message)))
        }
        Err(err) => {
            let message = inline_error(err, STATUS_ERROR)?;
            Ok(see_other_with(back, Flash::error(message)))
        }
    }
}
