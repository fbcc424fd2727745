use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use chrono::{Duration, FixedOffset, NaiveDate};
use serde::Deserialize;

use crate::{
    auth::{BarberSession, PanelSession},
    filters::{self, capitalize, long_date_pt, parse_iso_date},
    flash::Flash,
    models::{Absence, Appointment},
    routes::{
        inline_error, list_or_error,
        panel::{AppointmentCard, ConfirmPage},
        see_other, see_other_with, PanelError, PanelNav,
    },
    schedule::{absence_range, DayBoard, ToggleOutcome, TOGGLE_FAILED_MESSAGE},
    state::AppState,
    templates::render_with_flash,
};

const DASHBOARD_PATH: &str = "/painel";
const SCHEDULE_PATH: &str = "/painel/meus-horarios";
const HISTORY_PATH: &str = "/painel/meu-historico";

const APPOINTMENTS_ERROR: &str = "Não foi possível carregar os seus agendamentos.";
const SCHEDULE_ERROR: &str = "Não foi possível carregar a agenda para este dia.";
const ABSENCES_ERROR: &str = "Não foi possível carregar suas ausências.";
const ABSENCE_CREATED: &str = "Ausência registada com sucesso!";
const ABSENCE_CREATE_ERROR: &str = "Não foi possível registar a ausência.";
const ABSENCE_REMOVED: &str = "Ausência removida com sucesso!";
const ABSENCE_REMOVE_ERROR: &str = "Não foi possível remover a ausência.";
const HISTORY_ERROR: &str = "Não foi possível carregar o seu histórico.";

const NO_UPCOMING: &str = "Nenhum agendamento futuro.";
const NO_MATCHES: &str = "Nenhum agendamento encontrado para a sua pesquisa.";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(SCHEDULE_PATH).route(web::get().to(schedule)))
        .service(
            web::resource("/painel/meus-horarios/alternar").route(web::post().to(toggle_slot)),
        )
        .service(
            web::resource("/painel/meus-horarios/ausencias").route(web::post().to(create_absence)),
        )
        .service(
            web::resource("/painel/meus-horarios/ausencias/{id}/apagar")
                .route(web::get().to(confirm_absence_delete))
                .route(web::post().to(delete_absence)),
        )
        .service(web::resource(HISTORY_PATH).route(web::get().to(history)));
}

// Dashboard

pub struct DayGroup {
    pub heading: String,
    pub appointments: Vec<AppointmentCard>,
}

/// Case-insensitive match on client or service name. A blank search matches all.
pub fn matches_search(appointment: &Appointment, search: &str) -> bool {
    let search = search.trim().to_lowercase();
    search.is_empty()
        || appointment.client_name.to_lowercase().contains(&search)
        || appointment.service_label().to_lowercase().contains(&search)
}

/// Chronological groups, one per shop-local day.
pub fn group_by_day(appointments: &[&Appointment], offset: FixedOffset) -> Vec<DayGroup> {
    let mut sorted = appointments.to_vec();
    sorted.sort_by_key(|appointment| appointment.appointment_time);

    let mut groups: Vec<(NaiveDate, DayGroup)> = Vec::new();
    for appointment in sorted {
        let day = appointment.local_time(offset).date_naive();
        let card = AppointmentCard::new(appointment, offset);
        if let Some((current, group)) = groups.last_mut() {
            if *current == day {
                group.appointments.push(card);
                continue;
            }
        }
        groups.push((
            day,
            DayGroup {
                heading: capitalize(&long_date_pt(day)),
                appointments: vec![card],
            },
        ));
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

#[derive(Template)]
#[template(path = "barber_dashboard.html")]
struct BarberDashboardTemplate {
    flash: Option<Flash>,
    nav: PanelNav,
    q: String,
    return_to: String,
    groups: Vec<DayGroup>,
    error: Option<String>,
    empty_message: Option<&'static str>,
}

pub async fn dashboard(
    session: &PanelSession,
    state: &AppState,
    req: &HttpRequest,
    search: &str,
) -> Result<HttpResponse, PanelError> {
    let staff = state.backend.staff(&session.token);
    let (appointments, error) = list_or_error(staff.my_appointments().await, APPOINTMENTS_ERROR)?;

    let visible: Vec<&Appointment> = appointments
        .iter()
        .filter(|appointment| matches_search(appointment, search))
        .collect();
    let empty_message = match (error.is_some(), appointments.is_empty(), visible.is_empty()) {
        (true, _, _) | (false, false, false) => None,
        (false, true, _) => Some(NO_UPCOMING),
        (false, false, true) => Some(NO_MATCHES),
    };

    let search = search.trim();
    let return_to = if search.is_empty() {
        DASHBOARD_PATH.to_string()
    } else {
        let query = serde_urlencoded::to_string([("q", search)]).unwrap_or_default();
        format!("{DASHBOARD_PATH}?{query}")
    };

    let flash = Flash::from_request(req);
    let page = BarberDashboardTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(session, DASHBOARD_PATH),
        q: search.to_string(),
        return_to,
        groups: group_by_day(&visible, state.config.shop_offset),
        error,
        empty_message,
    };
    Ok(render_with_flash(page, &flash))
}

// Schedule

pub struct SlotView {
    pub time: String,
    pub label: String,
    pub status: &'static str,
    pub css: &'static str,
    pub clickable: bool,
}

pub struct AbsenceRow {
    pub id: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AbsenceRow {
    fn new(absence: &Absence) -> Self {
        Self {
            id: absence.id,
            start: absence.start_date,
            end: absence.end_date,
        }
    }
}

#[derive(Template)]
#[template(path = "barber_schedule.html")]
struct BarberScheduleTemplate {
    flash: Option<Flash>,
    nav: PanelNav,
    date: String,
    heading: String,
    prev: String,
    next: String,
    slots: Vec<SlotView>,
    schedule_error: Option<String>,
    absences: Vec<AbsenceRow>,
    absence_error: Option<String>,
    form_error: Option<String>,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Default, Deserialize)]
struct DayQuery {
    data: Option<String>,
}

#[derive(Deserialize)]
struct ToggleForm {
    #[serde(default)]
    data: String,
    slot_time: String,
}

#[derive(Debug, Default, Deserialize)]
struct AbsenceForm {
    #[serde(default)]
    data: String,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
}

fn day_or_today(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    raw.and_then(parse_iso_date).unwrap_or(today)
}

pub fn schedule_url(date: NaiveDate) -> String {
    format!("{SCHEDULE_PATH}?data={}", date.format("%Y-%m-%d"))
}

async fn render_schedule(
    session: &PanelSession,
    state: &AppState,
    req: &HttpRequest,
    date: NaiveDate,
    form: Option<(&AbsenceForm, &str)>,
) -> Result<HttpResponse, PanelError> {
    let staff = state.backend.staff(&session.token);
    let (board, absences) = tokio::join!(DayBoard::load(&staff, date), staff.absences());

    let (slots, schedule_error) = match board {
        Ok(board) => (board.slots, None),
        Err(err) => (Vec::new(), Some(inline_error(err, SCHEDULE_ERROR)?)),
    };
    let (absences, absence_error) = list_or_error(absences, ABSENCES_ERROR)?;

    let offset = state.config.shop_offset;
    let slots = slots
        .iter()
        .map(|slot| SlotView {
            time: slot.time.clone(),
            label: slot.label(offset),
            status: slot.status.label(),
            css: slot.status.css(),
            clickable: slot.status.is_clickable(),
        })
        .collect();

    let (form_error, start_date, end_date) = match form {
        Some((form, message)) => (
            Some(message.to_string()),
            form.start_date.clone(),
            form.end_date.clone(),
        ),
        None => (None, String::new(), String::new()),
    };

    let flash = Flash::from_request(req);
    let page = BarberScheduleTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(session, SCHEDULE_PATH),
        date: date.format("%Y-%m-%d").to_string(),
        heading: capitalize(&long_date_pt(date)),
        prev: schedule_url(date - Duration::days(1)),
        next: schedule_url(date + Duration::days(1)),
        slots,
        schedule_error,
        absences: absences.iter().map(AbsenceRow::new).collect(),
        absence_error,
        form_error,
        start_date,
        end_date,
    };
    Ok(render_with_flash(page, &flash))
}

async fn schedule(
    BarberSession(session): BarberSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<DayQuery>,
) -> Result<HttpResponse, PanelError> {
    let date = day_or_today(query.data.as_deref(), state.today());
    render_schedule(&session, &state, &req, date, None).await
}

async fn toggle_slot(
    BarberSession(session): BarberSession,
    state: web::Data<AppState>,
    form: web::Form<ToggleForm>,
) -> Result<HttpResponse, PanelError> {
    let date = day_or_today(Some(form.data.as_str()), state.today());
    let back = schedule_url(date);
    let staff = state.backend.staff(&session.token);

    let mut board = match DayBoard::load(&staff, date).await {
        Ok(board) => board,
        Err(err) => {
            let message = inline_error(err, SCHEDULE_ERROR)?;
            return Ok(see_other_with(&back, Flash::error(message)));
        }
    };

    match board.toggle(&staff, &form.slot_time).await {
        Ok(ToggleOutcome::Toggled(toggle)) => {
            log::info!("{} {:?} slot {} on {date}", session.claims.name, toggle, form.slot_time);
            Ok(see_other_with(&back, Flash::success(toggle.message())))
        }
        Ok(ToggleOutcome::Ignored) => Ok(see_other(&back)),
        Err(err) => {
            inline_error(err, TOGGLE_FAILED_MESSAGE)?;
            Ok(see_other_with(&back, Flash::error(TOGGLE_FAILED_MESSAGE)))
        }
    }
}

async fn create_absence(
    BarberSession(session): BarberSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<AbsenceForm>,
) -> Result<HttpResponse, PanelError> {
    let date = day_or_today(Some(form.data.as_str()), state.today());
    let (start, end) = match absence_range(&form.start_date, &form.end_date) {
        Ok(range) => range,
        Err(message) => {
            return render_schedule(&session, &state, &req, date, Some((&*form, message))).await;
        }
    };

    let staff = state.backend.staff(&session.token);
    match staff.create_absence(start, end).await {
        Ok(()) => {
            log::info!("{} registered an absence {start}..={end}", session.claims.name);
            Ok(see_other_with(&schedule_url(date), Flash::success(ABSENCE_CREATED)))
        }
        Err(err) => {
            inline_error(err, ABSENCE_CREATE_ERROR)?;
            Ok(see_other_with(&schedule_url(date), Flash::error(ABSENCE_CREATE_ERROR)))
        }
    }
}

async fn confirm_absence_delete(
    BarberSession(session): BarberSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<DayQuery>,
) -> Result<HttpResponse, PanelError> {
    let id = path.into_inner();
    let date = day_or_today(query.data.as_deref(), state.today());
    let back = schedule_url(date);

    let absences = match state.backend.staff(&session.token).absences().await {
        Ok(absences) => absences,
        Err(err) => {
            let message = inline_error(err, ABSENCES_ERROR)?;
            return Ok(see_other_with(&back, Flash::error(message)));
        }
    };
    let Some(absence) = absences.iter().find(|absence| absence.id == id) else {
        return Ok(see_other(&back));
    };

    let flash = Flash::from_request(&req);
    let page = ConfirmPage {
        flash: flash.clone(),
        nav: PanelNav::new(&session, SCHEDULE_PATH),
        title: "Tem a certeza?".to_string(),
        message: format!(
            "A ausência de {} a {} será removida.",
            absence.start_date.format("%d/%m/%Y"),
            absence.end_date.format("%d/%m/%Y")
        ),
        action: format!("{SCHEDULE_PATH}/ausencias/{id}/apagar?data={}", date.format("%Y-%m-%d")),
        cancel: back,
    };
    Ok(render_with_flash(page, &flash))
}

async fn delete_absence(
    BarberSession(session): BarberSession,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<DayQuery>,
) -> Result<HttpResponse, PanelError> {
    let id = path.into_inner();
    let back = schedule_url(day_or_today(query.data.as_deref(), state.today()));
    match state.backend.staff(&session.token).delete_absence(id).await {
        Ok(()) => {
            log::info!("{} removed absence {id}", session.claims.name);
            Ok(see_other_with(&back, Flash::success(ABSENCE_REMOVED)))
        }
        Err(err) => {
            inline_error(err, ABSENCE_REMOVE_ERROR)?;
            Ok(see_other_with(&back, Flash::error(ABSENCE_REMOVE_ERROR)))
        }
    }
}

// History

#[derive(Template)]
#[template(path = "barber_history.html")]
struct BarberHistoryTemplate {
    flash: Option<Flash>,
    nav: PanelNav,
    appointments: Vec<AppointmentCard>,
    error: Option<String>,
}

async fn history(
    BarberSession(session): BarberSession,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, PanelError> {
    let staff = state.backend.staff(&session.token);
    let (appointments, error) = list_or_error(staff.history().await, HISTORY_ERROR)?;
    let offset = state.config.shop_offset;

    let flash = Flash::from_request(&req);
    let page = BarberHistoryTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(&session, HISTORY_PATH),
        appointments: appointments
            .iter()
            .map(|appointment| AppointmentCard::new(appointment, offset))
            .collect(),
        error,
    };
    Ok(render_with_flash(page, &flash))
}
