use actix_web::{web, HttpResponse};
use askama::Template;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    api::ApiError,
    booking::{Wizard, WizardAction, WizardForm, STEP_LABELS},
    filters,
    flash::Flash,
    models::{Role, Service, SlotTime},
    routes::see_other,
    state::AppState,
    templates::render,
    validation::contact_errors,
};

const LOAD_ERROR: &str = "Não foi possível carregar os dados para o agendamento.";
const SUBMIT_ERROR: &str = "Não foi possível realizar o agendamento.";
const AVAILABILITY_ERROR: &str = "Erro ao buscar horários para este dia.";
const SLOT_GONE: &str = "Este horário já não está disponível. Escolha outro.";

pub struct BarberOption {
    pub id: i64,
    pub name: String,
    pub avatar: String,
}

#[derive(Template)]
#[template(path = "booking.html")]
struct BookingTemplate {
    flash: Option<Flash>,
    step: u8,
    step_labels: [&'static str; 3],
    services: Vec<Service>,
    barbers: Vec<BarberOption>,
    service_id: String,
    barber_id: String,
    date: String,
    time: String,
    min_date: String,
    max_date: String,
    slots: Vec<String>,
    summary: Summary,
    client_name: String,
    client_phone: String,
    errors: Vec<String>,
}

impl BookingTemplate {
    fn is_current_step(&self, position: &usize) -> bool {
        *position == usize::from(self.step)
    }
}

#[derive(Default)]
struct Summary {
    service: String,
    price: String,
    duration_minutes: i64,
    barber: String,
    long_date: String,
}

#[derive(Template)]
#[template(path = "booking_confirmed.html")]
struct ConfirmedTemplate {
    flash: Option<Flash>,
    service: String,
    barber: String,
    date: String,
    time: String,
}

#[derive(Deserialize)]
struct StartQuery {
    servico: Option<String>,
}

#[derive(Deserialize)]
struct ConfirmedQuery {
    servico: Option<String>,
    barbeiro: Option<String>,
    data: Option<String>,
    hora: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/agendamento")
            .route(web::get().to(start))
            .route(web::post().to(advance)),
    )
    .service(web::resource("/agendamento/confirmado").route(web::get().to(confirmed)));
}

/// Times offered for the wizard's (barber, date).
type Offered = Result<Vec<SlotTime>, ApiError>;

struct Catalog {
    services: Vec<Service>,
    barbers: Vec<crate::models::Profile>,
}

async fn load_catalog(state: &AppState) -> Option<Catalog> {
    let (services, profiles) = tokio::join!(state.backend.services(), state.backend.profiles());
    match (services, profiles) {
        (Ok(services), Ok(profiles)) => Some(Catalog {
            services,
            barbers: profiles
                .into_iter()
                .filter(|profile| profile.role == Role::Barber)
                .collect(),
        }),
        (Err(err), _) | (_, Err(err)) => {
            log::error!("booking catalogue unavailable: {err}");
            None
        }
    }
}

async fn start(state: web::Data<AppState>, query: web::Query<StartQuery>) -> HttpResponse {
    let Some(catalog) = load_catalog(&state).await else {
        return render_page(&state, Wizard::start(None), &Catalog::empty(), vec![LOAD_ERROR.to_string()])
            .await;
    };
    let preselected = query
        .servico
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|id| catalog.services.iter().find(|service| service.id == id).cloned());
    render_page(&state, Wizard::start(preselected), &catalog, Vec::new()).await
}

async fn advance(state: web::Data<AppState>, form: web::Form<WizardForm>) -> HttpResponse {
    let form = form.into_inner();
    let Some(catalog) = load_catalog(&state).await else {
        return render_page(&state, Wizard::start(None), &Catalog::empty(), vec![LOAD_ERROR.to_string()])
            .await;
    };
    let window = state.booking_window();
    let wizard = Wizard::from_form(&form, &catalog.services, &catalog.barbers, &window);
    let action = match form.action() {
        Ok(action) => action,
        Err(err) => {
            log::debug!("{err}");
            return render_page(&state, wizard, &catalog, Vec::new()).await;
        }
    };

    if action == WizardAction::Submit {
        return submit(&state, wizard, &catalog, &form).await;
    }

    // A time is only taken when the current availability still lists it.
    let offered = match (&action, wizard.availability_key()) {
        (WizardAction::SelectTime(_), Some((barber_id, date))) => {
            Some(fetch_availability(&state, barber_id, date).await)
        }
        _ => None,
    };
    let refusal = match (&action, &offered) {
        (WizardAction::SelectTime(_), Some(Err(_))) => Some(Vec::new()),
        (WizardAction::SelectTime(time), Some(Ok(times))) if !times.contains(time) => {
            Some(vec![SLOT_GONE.to_string()])
        }
        _ => None,
    };
    if let Some(errors) = refusal {
        return render_with_availability(&state, wizard, &catalog, errors, offered);
    }

    let (wizard, errors) = match wizard.apply(action, &catalog.services, &catalog.barbers, &window) {
        Ok(wizard) => (wizard, Vec::new()),
        Err((wizard, err)) => (wizard, vec![err.to_string()]),
    };
    match offered {
        Some(offered) => render_with_availability(&state, wizard, &catalog, errors, Some(offered)),
        None => render_page(&state, wizard, &catalog, errors).await,
    }
}

async fn submit(state: &AppState, wizard: Wizard, catalog: &Catalog, form: &WizardForm) -> HttpResponse {
    let window = state.booking_window();
    let wizard = wizard.with_contact(&form.client_name, &form.client_phone);
    let payload = match wizard.submission(state.config.shop_offset, &window) {
        Ok(payload) => payload,
        Err(err) => {
            let err = form.date_error(&window).unwrap_or(err);
            return render_page(state, wizard, catalog, vec![err.to_string()]).await;
        }
    };
    let errors = contact_errors(&payload.client_name, &payload.client_phone);
    if !errors.is_empty() {
        return render_page(state, wizard, catalog, errors).await;
    }

    if let Err(err) = state.backend.create_appointment(&payload).await {
        log::warn!("appointment creation failed: {err}");
        let message = err.user_message(SUBMIT_ERROR);
        return render_page(state, wizard, catalog, vec![message]).await;
    }

    log::info!(
        "appointment booked for barber {} at {}",
        payload.barber_id,
        payload.appointment_time
    );
    see_other(&confirmation_url(&wizard))
}

fn confirmation_url(wizard: &Wizard) -> String {
    let params = [
        ("servico", wizard.service().map(|s| s.name.clone()).unwrap_or_default()),
        ("barbeiro", wizard.barber().map(|b| b.name.clone()).unwrap_or_default()),
        ("data", wizard.date().map(format_date).unwrap_or_default()),
        ("hora", wizard.time().map(|t| t.to_string()).unwrap_or_default()),
    ];
    match serde_urlencoded::to_string(params) {
        Ok(query) => format!("/agendamento/confirmado?{query}"),
        Err(err) => {
            log::warn!("could not encode confirmation query: {err}");
            "/agendamento/confirmado".to_string()
        }
    }
}

async fn fetch_availability(state: &AppState, barber_id: i64, date: NaiveDate) -> Offered {
    let offered = state.backend.availability(barber_id, date).await;
    if let Err(err) = &offered {
        log::warn!("availability for barber {barber_id} on {date} failed: {err}");
    }
    offered
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl Catalog {
    fn empty() -> Self {
        Self {
            services: Vec::new(),
            barbers: Vec::new(),
        }
    }
}

async fn render_page(
    state: &AppState,
    wizard: Wizard,
    catalog: &Catalog,
    errors: Vec<String>,
) -> HttpResponse {
    let offered = match wizard.availability_key() {
        Some((barber_id, date)) => Some(fetch_availability(state, barber_id, date).await),
        None => None,
    };
    render_with_availability(state, wizard, catalog, errors, offered)
}

/// A failed lookup leaves the slot list empty and raises a toast.
fn render_with_availability(
    state: &AppState,
    mut wizard: Wizard,
    catalog: &Catalog,
    errors: Vec<String>,
    offered: Option<Offered>,
) -> HttpResponse {
    let mut flash = None;
    let mut slots = Vec::new();
    match offered {
        Some(Ok(offered)) => {
            wizard = wizard.keep_time_if_offered(&offered);
            slots = offered.iter().map(SlotTime::to_string).collect();
        }
        Some(Err(_)) => flash = Some(Flash::error(AVAILABILITY_ERROR)),
        None => {}
    }

    let window = state.booking_window();
    let summary = match (wizard.service(), wizard.barber()) {
        (Some(service), Some(barber)) => Summary {
            service: service.name.clone(),
            price: filters::format_brl(&service.price.to_string()),
            duration_minutes: service.duration_minutes,
            barber: barber.name.clone(),
            long_date: wizard
                .date()
                .map(filters::long_date_pt)
                .map(|text| filters::capitalize(&text))
                .unwrap_or_default(),
        },
        _ => Summary::default(),
    };

    let page = BookingTemplate {
        flash,
        step: wizard.step(),
        step_labels: STEP_LABELS,
        services: catalog.services.clone(),
        barbers: catalog
            .barbers
            .iter()
            .map(|barber| BarberOption {
                id: barber.id,
                name: barber.name.clone(),
                avatar: state.avatar_src(barber.avatar_url.as_deref()),
            })
            .collect(),
        service_id: wizard.service().map(|s| s.id.to_string()).unwrap_or_default(),
        barber_id: wizard.barber().map(|b| b.id.to_string()).unwrap_or_default(),
        date: wizard.date().map(format_date).unwrap_or_default(),
        time: wizard.time().map(|t| t.to_string()).unwrap_or_default(),
        min_date: format_date(window.first),
        max_date: format_date(window.last),
        slots,
        summary,
        client_name: wizard.contact().client_name.clone(),
        client_phone: wizard.contact().client_phone.clone(),
        errors,
    };
    render(page)
}

async fn confirmed(query: web::Query<ConfirmedQuery>) -> HttpResponse {
    let query = query.into_inner();
    render(ConfirmedTemplate {
        flash: None,
        service: query.servico.unwrap_or_default(),
        barber: query.barbeiro.unwrap_or_default(),
        date: query.data.unwrap_or_default(),
        time: query.hora.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use actix_web::{
        http::StatusCode,
        test::{call_service, TestRequest},
    };
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::{AVAILABILITY_ERROR, SLOT_GONE};
    use crate::routes::test_support::{
        barber_json, body_text, location, service_json, spawn_app, FakeBackend,
    };

    fn days_ahead(days: i64) -> String {
        let offset = chrono::FixedOffset::west_opt(3 * 3600).unwrap();
        (Utc::now().with_timezone(&offset).date_naive() + Duration::days(days))
            .format("%Y-%m-%d")
            .to_string()
    }

    fn tomorrow() -> String {
        days_ahead(1)
    }

    fn catalog() -> FakeBackend {
        FakeBackend::new()
            .on("GET", "/api/services", 200, json!([service_json(1, "Corte Clássico")]))
            .on("GET", "/api/users/profiles", 200, json!([
                barber_json(10, "Diego Souza"),
                {"id": 1, "name": "Rui Duarte", "role": "admin"}
            ]))
    }

    #[actix_web::test]
    async fn preselects_service_from_query() {
        let backend = catalog().start().await;
        let app = spawn_app(&backend).await;

        let response = call_service(
            &app,
            TestRequest::get().uri("/agendamento?servico=1").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(r#"name="service_id" value="1""#));
        assert!(body.contains("Diego Souza"));
        assert!(!body.contains("Rui Duarte"));
    }

    #[actix_web::test]
    async fn choosing_a_date_fetches_availability() {
        let backend = catalog()
            .on("GET", "/api/public/availability", 200, json!(["09:00", "09:30"]))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "2"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("pick_date", date.as_str()),
                ("action", "date"),
            ])
            .to_request();
        let body = body_text(call_service(&app, request).await).await;

        assert!(body.contains("09:30"));
        let lookups = backend.requests_to("GET", "/api/public/availability");
        assert_eq!(lookups.len(), 1);
        assert!(lookups[0].query.contains("barberId=10"));
        assert!(lookups[0].query.contains(&format!("date={date}")));
    }

    #[actix_web::test]
    async fn empty_availability_renders_the_empty_state() {
        let backend = catalog()
            .on("GET", "/api/public/availability", 200, json!([]))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "2"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("pick_date", date.as_str()),
                ("action", "date"),
            ])
            .to_request();
        let body = body_text(call_service(&app, request).await).await;
        assert!(body.contains("Nenhum horário disponível para este dia."));
    }

    #[actix_web::test]
    async fn time_not_offered_is_refused() {
        let backend = catalog()
            .on("GET", "/api/public/availability", 200, json!(["09:00"]))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "2"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("date", date.as_str()),
                ("action", "time:15:00"),
            ])
            .to_request();
        let body = body_text(call_service(&app, request).await).await;
        assert!(body.contains("Este horário já não está disponível"));
        assert!(body.contains(r#"name="time" value="""#));
        assert_eq!(backend.requests_to("GET", "/api/public/availability").len(), 1);
    }

    #[actix_web::test]
    async fn offered_time_is_checked_with_a_single_lookup() {
        let backend = catalog()
            .on("GET", "/api/public/availability", 200, json!(["09:00", "09:30"]))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "2"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("date", date.as_str()),
                ("action", "time:09:30"),
            ])
            .to_request();
        let body = body_text(call_service(&app, request).await).await;
        assert!(body.contains(r#"name="time" value="09:30""#));
        assert!(!body.contains("Este horário já não está disponível"));
        assert_eq!(backend.requests_to("GET", "/api/public/availability").len(), 1);
    }

    #[actix_web::test]
    async fn failed_time_check_reports_the_lookup_failure() {
        let backend = catalog()
            .on("GET", "/api/public/availability", 500, json!({"error": "boom"}))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "2"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("date", date.as_str()),
                ("action", "time:09:00"),
            ])
            .to_request();
        let body = body_text(call_service(&app, request).await).await;
        assert!(body.contains(AVAILABILITY_ERROR));
        assert!(!body.contains(SLOT_GONE));
        assert!(body.contains(r#"name="time" value="""#));
        assert_eq!(backend.requests_to("GET", "/api/public/availability").len(), 1);
    }

    #[actix_web::test]
    async fn failed_availability_shows_toast_and_empty_state() {
        let backend = catalog()
            .on("GET", "/api/public/availability", 500, json!({"error": "boom"}))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "2"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("pick_date", date.as_str()),
                ("action", "date"),
            ])
            .to_request();
        let response = call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(AVAILABILITY_ERROR));
        assert!(body.contains("Nenhum horário disponível para este dia."));
    }

    #[actix_web::test]
    async fn invalid_contact_blocks_submission() {
        let backend = catalog()
            .on("GET", "/api/public/availability", 200, json!(["09:00"]))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "3"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("date", date.as_str()),
                ("time", "09:00"),
                ("client_name", "Diego"),
                ("client_phone", "123"),
                ("action", "submit"),
            ])
            .to_request();
        let body = body_text(call_service(&app, request).await).await;
        assert!(body.contains("nome completo"));
        assert!(body.contains("10 ou 11 dígitos"));
        assert!(backend.requests_to("POST", "/api/appointments").is_empty());
    }

    #[actix_web::test]
    async fn successful_submission_redirects_to_confirmation() {
        let backend = catalog()
            .on("POST", "/api/appointments", 201, json!({"id": 99}))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "3"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("date", date.as_str()),
                ("time", "10:00"),
                ("client_name", "Diego Souza"),
                ("client_phone", "(11) 98765-4321"),
                ("action", "submit"),
            ])
            .to_request();
        let response = call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert!(target.starts_with("/agendamento/confirmado?"));
        assert!(target.contains(&format!("data={date}")));
        assert!(target.contains("hora=10%3A00"));

        let posted = backend.requests_to("POST", "/api/appointments");
        assert_eq!(posted.len(), 1);
        let body = posted[0].json();
        assert_eq!(body["serviceId"], 1);
        assert_eq!(body["barberId"], 10);
        assert_eq!(body["clientName"], "Diego Souza");
        assert_eq!(body["appointmentTime"], format!("{date}T13:00:00.000Z"));
    }

    #[actix_web::test]
    async fn submission_beyond_the_horizon_is_refused() {
        let backend = catalog()
            .on("POST", "/api/appointments", 201, json!({"id": 99}))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = days_ahead(3650);

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "3"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("date", date.as_str()),
                ("time", "10:00"),
                ("client_name", "Diego Souza"),
                ("client_phone", "11987654321"),
                ("action", "submit"),
            ])
            .to_request();
        let response = call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Escolha uma data dentro dos próximos 60 dias."));
        assert!(body.contains(r#"name="step" value="2""#));
        assert!(backend.requests_to("POST", "/api/appointments").is_empty());
    }

    #[actix_web::test]
    async fn submission_without_a_time_says_what_is_missing() {
        let backend = catalog()
            .on("GET", "/api/public/availability", 200, json!(["09:00"]))
            .on("POST", "/api/appointments", 201, json!({"id": 99}))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "3"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("date", date.as_str()),
                ("time", ""),
                ("client_name", "Diego Souza"),
                ("client_phone", "11987654321"),
                ("action", "submit"),
            ])
            .to_request();
        let body = body_text(call_service(&app, request).await).await;
        assert!(body.contains("Escolha uma data e um horário para avançar."));
        assert!(body.contains(r#"name="step" value="2""#));
        assert!(backend.requests_to("POST", "/api/appointments").is_empty());
    }

    #[actix_web::test]
    async fn backend_refusal_keeps_the_contact_step() {
        let backend = catalog()
            .on("POST", "/api/appointments", 409, json!({"error": "Horário já ocupado."}))
            .start()
            .await;
        let app = spawn_app(&backend).await;
        let date = tomorrow();

        let request = TestRequest::post()
            .uri("/agendamento")
            .set_form([
                ("step", "3"),
                ("service_id", "1"),
                ("barber_id", "10"),
                ("date", date.as_str()),
                ("time", "10:00"),
                ("client_name", "Diego Souza"),
                ("client_phone", "11987654321"),
                ("action", "submit"),
            ])
            .to_request();
        let response = call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Horário já ocupado."));
        assert!(body.contains(r#"name="step" value="3""#));
    }

    #[actix_web::test]
    async fn confirmation_page_formats_the_date() {
        let backend = FakeBackend::new().start().await;
        let app = spawn_app(&backend).await;

        let response = call_service(
            &app,
            TestRequest::get()
                .uri("/agendamento/confirmado?servico=Corte&barbeiro=Diego&data=2025-01-10&hora=10:00")
                .to_request(),
        )
        .await;
        let body = body_text(response).await;
        assert!(body.contains("sexta-feira, 10 de janeiro de 2025"));

        let response = call_service(
            &app,
            TestRequest::get().uri("/agendamento/confirmado").to_request(),
        )
        .await;
        assert!(body_text(response).await.contains("Data não informada"));
    }
}
