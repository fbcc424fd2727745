use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;

use crate::{
    filters,
    flash::Flash,
    models::{Profile, Role, Service},
    state::AppState,
    templates::render_with_flash,
};

const FEATURED_SERVICES: usize = 3;

pub struct BarberCard {
    pub name: String,
    pub avatar: String,
    pub specialty: &'static str,
}

impl BarberCard {
    pub fn new(state: &AppState, profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            avatar: state.avatar_src(profile.avatar_url.as_deref()),
            specialty: match profile.role {
                Role::Admin => "Fundador",
                Role::Barber => "Barbeiro Especialista",
            },
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    flash: Option<Flash>,
    services: Vec<Service>,
    has_more_services: bool,
    barbers: Vec<BarberCard>,
}

#[derive(Template)]
#[template(path = "services.html")]
struct ServicesTemplate {
    flash: Option<Flash>,
    services: Vec<Service>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/servicos").route(web::get().to(services)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn home(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let (services, profiles) = tokio::join!(state.backend.services(), state.backend.profiles());

    let mut services = services.unwrap_or_else(|err| {
        log::error!("could not load services for the home page: {err}");
        Vec::new()
    });
    let profiles = profiles.unwrap_or_else(|err| {
        log::error!("could not load featured barbers: {err}");
        Vec::new()
    });

    let has_more_services = services.len() > FEATURED_SERVICES;
    services.truncate(FEATURED_SERVICES);
    let barbers = profiles
        .iter()
        .filter(|profile| profile.role == Role::Barber && profile.is_featured)
        .map(|profile| BarberCard::new(&state, profile))
        .collect();

    let flash = Flash::from_request(&req);
    let page = HomeTemplate {
        flash: flash.clone(),
        services,
        has_more_services,
        barbers,
    };
    render_with_flash(page, &flash)
}

async fn services(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let services = state.backend.services().await.unwrap_or_else(|err| {
        log::error!("could not load services: {err}");
        Vec::new()
    });
    let flash = Flash::from_request(&req);
    render_with_flash(
        ServicesTemplate {
            flash: flash.clone(),
            services,
        },
        &flash,
    )
}
