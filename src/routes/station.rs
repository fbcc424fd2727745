//! Station login, profile selection and the two logouts.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{
        expired_cookie, has_station, station_cookie, token_cookie, Station, LOGIN_PATH,
        PANEL_HOME_PATH, PROFILE_SELECTION_PATH, STATION_COOKIE, TOKEN_COOKIE,
    },
    flash::Flash,
    models::{Profile, Role},
    routes::see_other,
    state::AppState,
    templates::{render, render_with_flash},
};

const STATION_ERROR: &str = "Utilizador ou senha da estação inválidos.";
const PROFILES_ERROR: &str =
    "Não foi possível carregar os perfis. Verifique se o servidor backend está a correr.";
const ADMIN_PASSWORD_ERROR: &str = "Senha de administrador inválida.";

#[derive(Template)]
#[template(path = "station_login.html")]
struct StationLoginTemplate {
    flash: Option<Flash>,
    username: String,
    remember: bool,
    error: Option<String>,
}

pub struct ProfileTile {
    pub id: i64,
    pub name: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
}

#[derive(Template)]
#[template(path = "profile_select.html")]
struct ProfileSelectTemplate {
    flash: Option<Flash>,
    profiles: Vec<ProfileTile>,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "profile_password.html")]
struct ProfilePasswordTemplate {
    flash: Option<Flash>,
    profile: ProfileTile,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StationLoginForm {
    username: String,
    password: String,
    remember: Option<String>,
}

#[derive(Deserialize)]
struct ProfileLoginForm {
    #[serde(default)]
    password: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(LOGIN_PATH)
            .route(web::get().to(login_page))
            .route(web::post().to(login)),
    )
    .service(web::resource(PROFILE_SELECTION_PATH).route(web::get().to(profiles)))
    .service(
        web::resource("/painel/selecao-perfil/encerrar").route(web::post().to(close_station)),
    )
    .service(
        web::resource("/painel/selecao-perfil/{id}")
            .route(web::get().to(password_prompt))
            .route(web::post().to(profile_login)),
    )
    .service(web::resource("/painel/sair").route(web::post().to(switch_user)));
}

async fn login_page(req: HttpRequest) -> HttpResponse {
    if has_station(&req) {
        return see_other(PROFILE_SELECTION_PATH);
    }
    let flash = Flash::from_request(&req);
    render_with_flash(
        StationLoginTemplate {
            flash: flash.clone(),
            username: String::new(),
            remember: true,
            error: None,
        },
        &flash,
    )
}

async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<StationLoginForm>,
) -> HttpResponse {
    let form = form.into_inner();
    let remember = form.remember.is_some();
    if let Err(err) = state
        .backend
        .station_login(form.username.trim(), &form.password)
        .await
    {
        log::warn!("station login for {:?} failed: {err}", form.username.trim());
        return render(StationLoginTemplate {
            flash: None,
            username: form.username,
            remember,
            error: Some(STATION_ERROR.to_string()),
        });
    }

    log::info!("station opened by {:?}", form.username.trim());
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, PROFILE_SELECTION_PATH))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .cookie(station_cookie(&req, remember))
        .finish()
}

fn tile(state: &AppState, profile: &Profile) -> ProfileTile {
    ProfileTile {
        id: profile.id,
        name: profile.name.clone(),
        avatar: profile
            .avatar_url
            .as_deref()
            .map(|path| state.backend.asset_url(path))
            .filter(|url| !url.is_empty()),
        is_admin: profile.is_admin(),
    }
}

async fn profiles(_station: Station, state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let flash = Flash::from_request(&req);
    let (profiles, error) = match state.backend.profiles().await {
        Ok(profiles) => (profiles, None),
        Err(err) => {
            log::error!("profile list unavailable: {err}");
            (Vec::new(), Some(PROFILES_ERROR.to_string()))
        }
    };
    render_with_flash(
        ProfileSelectTemplate {
            flash: flash.clone(),
            profiles: profiles.iter().map(|profile| tile(&state, profile)).collect(),
            error,
        },
        &flash,
    )
}

async fn find_profile(state: &AppState, id: i64) -> Result<Option<Profile>, HttpResponse> {
    match state.backend.profiles().await {
        Ok(profiles) => Ok(profiles.into_iter().find(|profile| profile.id == id)),
        Err(err) => {
            log::error!("profile list unavailable: {err}");
            Err(render(ProfileSelectTemplate {
                flash: None,
                profiles: Vec::new(),
                error: Some(PROFILES_ERROR.to_string()),
            }))
        }
    }
}

async fn password_prompt(
    _station: Station,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> HttpResponse {
    let profile = match find_profile(&state, path.into_inner()).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return see_other(PROFILE_SELECTION_PATH),
        Err(page) => return page,
    };
    if profile.role != Role::Admin {
        return see_other(PROFILE_SELECTION_PATH);
    }
    render(ProfilePasswordTemplate {
        flash: None,
        profile: tile(&state, &profile),
        error: None,
    })
}

async fn profile_login(
    _station: Station,
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    form: web::Form<ProfileLoginForm>,
) -> HttpResponse {
    let profile = match find_profile(&state, path.into_inner()).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return see_other(PROFILE_SELECTION_PATH),
        Err(page) => return page,
    };

    let token = match profile.role {
        Role::Admin => {
            let username = profile.username.as_deref().unwrap_or_default();
            match state.backend.password_login(username, &form.password).await {
                Ok(token) => token,
                Err(err) => {
                    log::warn!("admin login for profile {} failed: {err}", profile.id);
                    return render(ProfilePasswordTemplate {
                        flash: None,
                        profile: tile(&state, &profile),
                        error: Some(ADMIN_PASSWORD_ERROR.to_string()),
                    });
                }
            }
        }
        Role::Barber => match state.backend.profile_login(profile.id).await {
            Ok(token) => token,
            Err(err) => {
                log::warn!("profile login for {} failed: {err}", profile.id);
                let profiles = state.backend.profiles().await.unwrap_or_default();
                return render(ProfileSelectTemplate {
                    flash: None,
                    profiles: profiles.iter().map(|p| tile(&state, p)).collect(),
                    error: Some(format!(
                        "Não foi possível fazer o login no perfil de {}.",
                        profile.name
                    )),
                });
            }
        },
    };

    log::info!("{} logged in as {}", profile.name, profile.role.as_str());
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, PANEL_HOME_PATH))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .cookie(token_cookie(&req, &token))
        .finish()
}

/// "Mudar de Utilizador": drops the staff token, keeps the station.
async fn switch_user() -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, PROFILE_SELECTION_PATH))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .cookie(expired_cookie(TOKEN_COOKIE))
        .finish()
}

/// "Encerrar Estação de Trabalho".
async fn close_station() -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, LOGIN_PATH))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .cookie(expired_cookie(TOKEN_COOKIE))
        .cookie(expired_cookie(STATION_COOKIE))
        .finish()
}
