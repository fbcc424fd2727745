use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use chrono::NaiveDate;
use futures_util::TryStreamExt;
use serde::Deserialize;

use crate::{
    api::{AppointmentFilter, AvatarUpload, ServicePayload, TeamMemberPayload},
    auth::{AdminSession, PanelSession},
    filters::{self, format_brl, parse_iso_date},
    flash::Flash,
    models::{
        icon_or_default, AdminStats, Profile, RevenuePoint, Role, Service, ICONS, STATUS_CANCELLED,
        STATUS_DONE, STATUS_PENDING,
    },
    routes::{
        inline_error, list_or_error,
        panel::{AppointmentCard, ConfirmPage},
        see_other, see_other_with, PanelError, PanelNav,
    },
    state::AppState,
    templates::render_with_flash,
    validation::{parse_duration, parse_price},
};

const SERVICES_PATH: &str = "/painel/servicos";
const TEAM_PATH: &str = "/painel/equipa";
const AGENDA_PATH: &str = "/painel/agenda-completa";
const REPORTS_PATH: &str = "/painel/relatorios";
const DASHBOARD_PATH: &str = "/painel";

const STATS_ERROR: &str = "Não foi possível carregar as estatísticas.";
const CHART_ERROR: &str = "Não foi possível carregar os dados do gráfico.";
const SERVICES_ERROR: &str = "Não foi possível carregar os serviços.";
const SERVICE_SAVE_ERROR: &str = "Não foi possível salvar o serviço.";
const SERVICE_DELETE_ERROR: &str = "Não foi possível apagar o serviço.";
const TEAM_ERROR: &str = "Não foi possível carregar a equipe.";
const TEAM_SAVE_ERROR: &str = "Não foi possível salvar.";
const TEAM_DELETE_ERROR: &str = "Não foi possível apagar.";
const AGENDA_ERROR: &str = "Não foi possível carregar os agendamentos.";
const REPORTS_ERROR: &str = "Não foi possível carregar o relatório de desempenho.";
const FORM_READ_ERROR: &str = "Não foi possível ler o formulário enviado.";

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;
const MAX_TEXT_FIELD_BYTES: usize = 16 * 1024;
const AVATAR_SIZE_ERROR: &str = "A imagem deve ter no máximo 5 MB.";
const AVATAR_TYPE_ERROR: &str = "O ficheiro escolhido não é uma imagem.";

pub const PERIODS: [(&str, &str); 3] = [
    ("7days", "Últimos 7 dias"),
    ("thisWeek", "Esta Semana"),
    ("thisMonth", "Este Mês"),
];

pub struct StatCard {
    pub label: &'static str,
    pub value: String,
}

pub struct PeriodOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

pub struct RevenueBar {
    pub label: String,
    pub value: String,
    pub height: u32,
}

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "admin_dashboard.html")]
struct AdminDashboardTemplate {
    flash: Option<Flash>,
    nav: PanelNav,
    stats: Vec<StatCard>,
    stats_error: Option<String>,
    periods: Vec<PeriodOption>,
    bars: Vec<RevenueBar>,
    chart_error: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(SERVICES_PATH)
            .route(web::get().to(services_page))
            .route(web::post().to(create_service)),
    )
    .service(web::resource("/painel/servicos/{id}").route(web::post().to(update_service)))
    .service(
        web::resource("/painel/servicos/{id}/apagar")
            .route(web::get().to(confirm_service_delete))
            .route(web::post().to(delete_service)),
    )
    .service(
        web::resource(TEAM_PATH)
            .route(web::get().to(team_page))
            .route(web::post().to(create_member)),
    )
    .service(web::resource("/painel/equipa/{id}").route(web::post().to(update_member)))
    .service(
        web::resource("/painel/equipa/{id}/apagar")
            .route(web::get().to(confirm_member_delete))
            .route(web::post().to(delete_member)),
    )
    .service(web::resource(AGENDA_PATH).route(web::get().to(agenda)))
    .service(web::resource(REPORTS_PATH).route(web::get().to(reports)));
}

// Dashboard

/// Unknown periods fall back to the last seven days.
pub fn period_or_default(raw: Option<&str>) -> &'static str {
    PERIODS
        .iter()
        .map(|(value, _)| *value)
        .find(|value| Some(*value) == raw)
        .unwrap_or(PERIODS[0].0)
}

fn stat_cards(stats: &AdminStats) -> Vec<StatCard> {
    let revenue = stats
        .revenue_this_month
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "0".to_string());
    vec![
        StatCard {
            label: "Faturação (Este Mês)",
            value: format_brl(&revenue),
        },
        StatCard {
            label: "Atendimentos Concluídos",
            value: stats.appointments_done_this_month.to_string(),
        },
        StatCard {
            label: "Agendamentos Pendentes",
            value: stats.pending_appointments_this_month.to_string(),
        },
    ]
}

/// Bar heights are percentages of the best day in the series.
pub fn revenue_bars(points: &[RevenuePoint]) -> Vec<RevenueBar> {
    let amounts: Vec<f64> = points
        .iter()
        .map(|point| point.revenue.to_string().parse::<f64>().unwrap_or(0.0))
        .collect();
    let max = amounts.iter().copied().fold(0.0_f64, f64::max);

    points
        .iter()
        .zip(amounts)
        .map(|(point, amount)| RevenueBar {
            label: parse_iso_date(&point.date)
                .map(|date| date.format("%d/%m").to_string())
                .unwrap_or_else(|| point.date.clone()),
            value: format_brl(&point.revenue.to_string()),
            height: if max > 0.0 {
                (amount.max(0.0) / max * 100.0).round() as u32
            } else {
                0
            },
        })
        .collect()
}

pub async fn dashboard(
    session: &PanelSession,
    state: &AppState,
    req: &HttpRequest,
    period: Option<&str>,
) -> Result<HttpResponse, PanelError> {
    let period = period_or_default(period);
    let staff = state.backend.staff(&session.token);
    let (stats, revenue) = tokio::join!(staff.stats(), staff.revenue(period));

    let (stats, stats_error) = match stats {
        Ok(stats) => (stat_cards(&stats), None),
        Err(err) => (Vec::new(), Some(inline_error(err, STATS_ERROR)?)),
    };
    let (points, chart_error) = list_or_error(revenue, CHART_ERROR)?;

    let flash = Flash::from_request(req);
    let page = AdminDashboardTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(session, DASHBOARD_PATH),
        stats,
        stats_error,
        periods: PERIODS
            .iter()
            .map(|&(value, label)| PeriodOption {
                value,
                label,
                selected: value == period,
            })
            .collect(),
        bars: revenue_bars(&points),
        chart_error,
    };
    Ok(render_with_flash(page, &flash))
}

// Services

pub struct IconOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

pub struct ServiceFormView {
    pub action: String,
    pub title: &'static str,
    pub name: String,
    pub description: String,
    pub price: String,
    pub duration_minutes: String,
    pub icon_name: String,
    pub is_edit: bool,
}

impl ServiceFormView {
    fn blank() -> Self {
        Self {
            action: SERVICES_PATH.to_string(),
            title: "Adicionar Serviço",
            name: String::new(),
            description: String::new(),
            price: String::new(),
            duration_minutes: String::new(),
            icon_name: icon_or_default(None).to_string(),
            is_edit: false,
        }
    }

    fn editing(service: &Service) -> Self {
        Self {
            action: format!("{SERVICES_PATH}/{}", service.id),
            title: "Editar Serviço",
            name: service.name.clone(),
            description: service.description.clone().unwrap_or_default(),
            price: service.price.with_scale(2).to_string(),
            duration_minutes: service.duration_minutes.to_string(),
            icon_name: service.icon().to_string(),
            is_edit: true,
        }
    }

    fn from_form(form: &ServiceForm, id: Option<i64>) -> Self {
        let base = match id {
            Some(id) => Self {
                action: format!("{SERVICES_PATH}/{id}"),
                title: "Editar Serviço",
                is_edit: true,
                ..Self::blank()
            },
            None => Self::blank(),
        };
        Self {
            name: form.name.clone(),
            description: form.description.clone(),
            price: form.price.clone(),
            duration_minutes: form.duration_minutes.clone(),
            icon_name: icon_or_default(Some(form.icon_name.as_str())).to_string(),
            ..base
        }
    }
}

#[derive(Template)]
#[template(path = "admin_services.html")]
struct AdminServicesTemplate {
    flash: Option<Flash>,
    nav: PanelNav,
    services: Vec<Service>,
    list_error: Option<String>,
    form: ServiceFormView,
    icons: Vec<IconOption>,
    errors: Vec<String>,
}

#[derive(Deserialize)]
struct EditQuery {
    editar: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub duration_minutes: String,
    #[serde(default)]
    pub icon_name: String,
}

impl ServiceForm {
    /// Local checks before anything is sent to the backend.
    pub fn validate(&self) -> Result<ServicePayload, Vec<String>> {
        let mut errors = Vec::new();
        let name = self.name.trim();
        if name.is_empty() {
            errors.push("O nome do serviço é obrigatório.".to_string());
        }
        let price = parse_price(&self.price);
        if price.is_none() {
            errors.push("Informe um preço válido (ex.: 45,00).".to_string());
        }
        let duration = parse_duration(&self.duration_minutes);
        if duration.is_none() {
            errors.push("A duração deve ser um número inteiro de minutos.".to_string());
        }
        match (price, duration) {
            (Some(price), Some(duration_minutes)) if errors.is_empty() => Ok(ServicePayload {
                name: name.to_string(),
                description: self.description.trim().to_string(),
                price: price.with_scale(2).to_string(),
                duration_minutes,
                icon_name: icon_or_default(Some(self.icon_name.trim())).to_string(),
            }),
            _ => Err(errors),
        }
    }
}

fn icon_options(selected: &str) -> Vec<IconOption> {
    ICONS
        .iter()
        .map(|&(value, label)| IconOption {
            value,
            label,
            selected: value == selected,
        })
        .collect()
}

fn services_view(
    session: &PanelSession,
    req: &HttpRequest,
    services: Vec<Service>,
    list_error: Option<String>,
    form: Option<ServiceFormView>,
    errors: Vec<String>,
) -> HttpResponse {
    let form = form.unwrap_or_else(ServiceFormView::blank);
    let flash = Flash::from_request(req);
    let page = AdminServicesTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(session, SERVICES_PATH),
        icons: icon_options(&form.icon_name),
        services,
        list_error,
        form,
        errors,
    };
    render_with_flash(page, &flash)
}

async fn render_services(
    session: &PanelSession,
    state: &AppState,
    req: &HttpRequest,
    form: ServiceFormView,
    errors: Vec<String>,
) -> Result<HttpResponse, PanelError> {
    let (services, list_error) = list_or_error(state.backend.services().await, SERVICES_ERROR)?;
    Ok(services_view(session, req, services, list_error, Some(form), errors))
}

async fn services_page(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<EditQuery>,
) -> Result<HttpResponse, PanelError> {
    let (services, list_error) = list_or_error(state.backend.services().await, SERVICES_ERROR)?;
    let form = query
        .editar
        .and_then(|id| services.iter().find(|service| service.id == id))
        .map(ServiceFormView::editing);
    Ok(services_view(&session, &req, services, list_error, form, Vec::new()))
}

async fn save_service(
    session: PanelSession,
    state: &AppState,
    req: &HttpRequest,
    id: Option<i64>,
    form: ServiceForm,
) -> Result<HttpResponse, PanelError> {
    let payload = match form.validate() {
        Ok(payload) => payload,
        Err(errors) => {
            let view = ServiceFormView::from_form(&form, id);
            return render_services(&session, state, req, view, errors).await;
        }
    };

    let staff = state.backend.staff(&session.token);
    let saved = match id {
        Some(id) => staff.update_service(id, &payload).await,
        None => staff.create_service(&payload).await,
    };
    match saved {
        Ok(()) => {
            log::info!("{} saved service {:?}", session.claims.name, payload.name);
            Ok(see_other_with(SERVICES_PATH, Flash::success("Serviço salvo com sucesso!")))
        }
        Err(err) => {
            let message = inline_error(err, SERVICE_SAVE_ERROR)?;
            let view = ServiceFormView::from_form(&form, id);
            render_services(&session, state, req, view, vec![message]).await
        }
    }
}

async fn create_service(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<ServiceForm>,
) -> Result<HttpResponse, PanelError> {
    save_service(session, &state, &req, None, form.into_inner()).await
}

async fn update_service(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    form: web::Form<ServiceForm>,
) -> Result<HttpResponse, PanelError> {
    save_service(session, &state, &req, Some(path.into_inner()), form.into_inner()).await
}

async fn confirm_service_delete(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, PanelError> {
    let id = path.into_inner();
    let services = match state.backend.services().await {
        Ok(services) => services,
        Err(err) => {
            let message = inline_error(err, SERVICES_ERROR)?;
            return Ok(see_other_with(SERVICES_PATH, Flash::error(message)));
        }
    };
    let Some(service) = services.into_iter().find(|service| service.id == id) else {
        return Ok(see_other(SERVICES_PATH));
    };

    let flash = Flash::from_request(&req);
    let page = ConfirmPage {
        flash: flash.clone(),
        nav: PanelNav::new(&session, SERVICES_PATH),
        title: "Tem a certeza?".to_string(),
        message: format!(
            "O serviço \"{}\" será apagado. Esta ação não pode ser desfeita.",
            service.name
        ),
        action: format!("{SERVICES_PATH}/{id}/apagar"),
        cancel: SERVICES_PATH.to_string(),
    };
    Ok(render_with_flash(page, &flash))
}

async fn delete_service(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, PanelError> {
    let id = path.into_inner();
    match state.backend.staff(&session.token).delete_service(id).await {
        Ok(()) => {
            log::info!("{} deleted service {id}", session.claims.name);
            Ok(see_other_with(SERVICES_PATH, Flash::success("Serviço apagado com sucesso!")))
        }
        Err(err) => {
            let message = inline_error(err, SERVICE_DELETE_ERROR)?;
            Ok(see_other_with(SERVICES_PATH, Flash::error(message)))
        }
    }
}

// Team

pub struct MemberRow {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub role_label: &'static str,
    pub avatar: String,
    pub initials: String,
    pub is_featured: bool,
}

impl MemberRow {
    fn new(state: &AppState, profile: &Profile) -> Self {
        Self {
            id: profile.id,
            name: profile.name.clone(),
            username: profile.username.clone().unwrap_or_default(),
            role_label: profile.role.label(),
            avatar: state.avatar_src(profile.avatar_url.as_deref()),
            initials: profile.initials(),
            is_featured: profile.is_featured,
        }
    }
}

pub struct TeamFormView {
    pub action: String,
    pub title: &'static str,
    pub name: String,
    pub username: String,
    pub role: String,
    pub avatar_url: String,
    pub avatar_preview: Option<String>,
    pub is_featured: bool,
    pub is_edit: bool,
}

impl TeamFormView {
    fn blank() -> Self {
        Self {
            action: TEAM_PATH.to_string(),
            title: "Adicionar Membro",
            name: String::new(),
            username: String::new(),
            role: Role::Barber.as_str().to_string(),
            avatar_url: String::new(),
            avatar_preview: None,
            is_featured: false,
            is_edit: false,
        }
    }

    fn editing(state: &AppState, profile: &Profile) -> Self {
        let avatar_url = profile.avatar_url.clone().unwrap_or_default();
        Self {
            action: format!("{TEAM_PATH}/{}", profile.id),
            title: "Editar Membro",
            name: profile.name.clone(),
            username: profile.username.clone().unwrap_or_default(),
            role: profile.role.as_str().to_string(),
            avatar_preview: (!avatar_url.is_empty()).then(|| state.avatar_src(Some(avatar_url.as_str()))),
            avatar_url,
            is_featured: profile.is_featured,
            is_edit: true,
        }
    }

    fn from_form(state: &AppState, form: &TeamForm, id: Option<i64>) -> Self {
        let base = match id {
            Some(id) => Self {
                action: format!("{TEAM_PATH}/{id}"),
                title: "Editar Membro",
                is_edit: true,
                ..Self::blank()
            },
            None => Self::blank(),
        };
        let avatar_url = form.avatar_url.trim().to_string();
        Self {
            name: form.name.clone(),
            username: form.username.clone(),
            role: form.role.clone(),
            avatar_preview: (!avatar_url.is_empty()).then(|| state.avatar_src(Some(avatar_url.as_str()))),
            avatar_url,
            is_featured: form.is_featured,
            ..base
        }
    }

    pub fn is_admin_role(&self) -> bool {
        self.role == Role::Admin.as_str()
    }
}

#[derive(Template)]
#[template(path = "admin_team.html")]
struct AdminTeamTemplate {
    flash: Option<Flash>,
    nav: PanelNav,
    members: Vec<MemberRow>,
    list_error: Option<String>,
    form: TeamFormView,
    errors: Vec<String>,
}

/// The team form as read from the multipart body.
#[derive(Debug, Default)]
pub struct TeamForm {
    pub name: String,
    pub username: String,
    pub role: String,
    pub avatar_url: String,
    pub password: String,
    pub is_featured: bool,
    pub avatar: Option<AvatarUpload>,
    pub avatar_error: Option<&'static str>,
}

impl TeamForm {
    /// The password only travels for admins and only when typed; a new
    /// admin must get one.
    pub fn validate(self, creating: bool) -> Result<TeamMemberPayload, Vec<String>> {
        let mut errors = Vec::new();
        let name = self.name.trim().to_string();
        let username = self.username.trim().to_string();
        if name.is_empty() {
            errors.push("O nome é obrigatório.".to_string());
        }
        if username.is_empty() {
            errors.push("O nome de utilizador é obrigatório.".to_string());
        }
        let role = self.role.parse::<Role>().ok();
        if role.is_none() {
            errors.push("Escolha uma função válida.".to_string());
        }
        let password = self.password.trim();
        let is_admin = role == Some(Role::Admin);
        if is_admin && creating && password.is_empty() {
            errors.push("Defina uma senha para o administrador.".to_string());
        }
        if let Some(message) = self.avatar_error {
            errors.push(message.to_string());
        }

        match role {
            Some(role) if errors.is_empty() => Ok(TeamMemberPayload {
                name,
                username,
                role: role.as_str().to_string(),
                avatar_url: self.avatar_url.trim().to_string(),
                is_featured: self.is_featured,
                password: (is_admin && !password.is_empty()).then(|| password.to_string()),
                avatar: self.avatar,
            }),
            _ => Err(errors),
        }
    }
}

/// Reads a field to the end; `None` once it grows past `limit`.
async fn read_limited(field: &mut Field, limit: usize) -> Result<Option<Vec<u8>>, MultipartError> {
    let mut bytes = Vec::new();
    let mut too_big = false;
    while let Some(chunk) = field.try_next().await? {
        if too_big {
            continue;
        }
        if bytes.len() + chunk.len() > limit {
            too_big = true;
            bytes = Vec::new();
            continue;
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok((!too_big).then_some(bytes))
}

pub async fn read_team_form(mut payload: Multipart) -> Result<TeamForm, MultipartError> {
    let mut form = TeamForm::default();
    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let file_name = disposition.get_filename().unwrap_or_default().to_string();

        if name == "avatar" {
            let content_type = field
                .content_type()
                .map(|mime| mime.essence_str().to_string())
                .unwrap_or_default();
            match read_limited(&mut field, MAX_AVATAR_BYTES).await? {
                None => form.avatar_error = Some(AVATAR_SIZE_ERROR),
                Some(bytes) if bytes.is_empty() => {}
                Some(_) if !content_type.starts_with("image/") => {
                    form.avatar_error = Some(AVATAR_TYPE_ERROR)
                }
                Some(bytes) => {
                    form.avatar = Some(AvatarUpload {
                        file_name: if file_name.is_empty() {
                            "avatar".to_string()
                        } else {
                            file_name
                        },
                        content_type,
                        bytes,
                    })
                }
            }
            continue;
        }

        let value = read_limited(&mut field, MAX_TEXT_FIELD_BYTES)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        match name.as_str() {
            "name" => form.name = value,
            "username" => form.username = value,
            "role" => form.role = value,
            "avatar_url" => form.avatar_url = value,
            "password" => form.password = value,
            "is_featured" => form.is_featured = matches!(value.trim(), "on" | "true" | "1"),
            _ => {}
        }
    }
    Ok(form)
}

async fn render_team(
    session: &PanelSession,
    state: &AppState,
    req: &HttpRequest,
    form: Option<TeamFormView>,
    errors: Vec<String>,
) -> Result<HttpResponse, PanelError> {
    let staff = state.backend.staff(&session.token);
    let (profiles, list_error) = list_or_error(staff.team().await, TEAM_ERROR)?;
    let flash = Flash::from_request(req);
    let page = AdminTeamTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(session, TEAM_PATH),
        members: profiles
            .iter()
            .map(|profile| MemberRow::new(state, profile))
            .collect(),
        list_error,
        form: form.unwrap_or_else(TeamFormView::blank),
        errors,
    };
    Ok(render_with_flash(page, &flash))
}

async fn team_page(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<EditQuery>,
) -> Result<HttpResponse, PanelError> {
    let staff = state.backend.staff(&session.token);
    let (profiles, list_error) = list_or_error(staff.team().await, TEAM_ERROR)?;
    let form = query
        .editar
        .and_then(|id| profiles.iter().find(|profile| profile.id == id))
        .map(|profile| TeamFormView::editing(&state, profile))
        .unwrap_or_else(TeamFormView::blank);

    let flash = Flash::from_request(&req);
    let page = AdminTeamTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(&session, TEAM_PATH),
        members: profiles
            .iter()
            .map(|profile| MemberRow::new(&state, profile))
            .collect(),
        list_error,
        form,
        errors: Vec::new(),
    };
    Ok(render_with_flash(page, &flash))
}

async fn save_member(
    session: PanelSession,
    state: &AppState,
    req: &HttpRequest,
    id: Option<i64>,
    payload: Multipart,
) -> Result<HttpResponse, PanelError> {
    let form = match read_team_form(payload).await {
        Ok(form) => form,
        Err(err) => {
            log::warn!("unreadable team form: {err}");
            return render_team(&session, state, req, None, vec![FORM_READ_ERROR.to_string()]).await;
        }
    };
    let view = TeamFormView::from_form(state, &form, id);
    let member = match form.validate(id.is_none()) {
        Ok(member) => member,
        Err(errors) => return render_team(&session, state, req, Some(view), errors).await,
    };

    let staff = state.backend.staff(&session.token);
    let member_name = member.name.clone();
    let saved = match id {
        Some(id) => staff.update_team_member(id, member).await,
        None => staff.create_team_member(member).await,
    };
    match saved {
        Ok(()) => {
            log::info!("{} saved team member {member_name:?}", session.claims.name);
            Ok(see_other_with(TEAM_PATH, Flash::success("Membro da equipe salvo com sucesso!")))
        }
        Err(err) => {
            let message = inline_error(err, TEAM_SAVE_ERROR)?;
            render_team(&session, state, req, Some(view), vec![message]).await
        }
    }
}

async fn create_member(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, PanelError> {
    save_member(session, &state, &req, None, payload).await
}

async fn update_member(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: Multipart,
) -> Result<HttpResponse, PanelError> {
    save_member(session, &state, &req, Some(path.into_inner()), payload).await
}

async fn confirm_member_delete(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, PanelError> {
    let id = path.into_inner();
    let team = match state.backend.staff(&session.token).team().await {
        Ok(team) => team,
        Err(err) => {
            let message = inline_error(err, TEAM_ERROR)?;
            return Ok(see_other_with(TEAM_PATH, Flash::error(message)));
        }
    };
    let Some(member) = team.into_iter().find(|profile| profile.id == id) else {
        return Ok(see_other(TEAM_PATH));
    };

    let flash = Flash::from_request(&req);
    let page = ConfirmPage {
        flash: flash.clone(),
        nav: PanelNav::new(&session, TEAM_PATH),
        title: "Tem a certeza?".to_string(),
        message: format!(
            "{} será removido da equipe. Esta ação não pode ser desfeita.",
            member.name
        ),
        action: format!("{TEAM_PATH}/{id}/apagar"),
        cancel: TEAM_PATH.to_string(),
    };
    Ok(render_with_flash(page, &flash))
}

async fn delete_member(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, PanelError> {
    let id = path.into_inner();
    match state.backend.staff(&session.token).delete_team_member(id).await {
        Ok(()) => {
            log::info!("{} removed team member {id}", session.claims.name);
            Ok(see_other_with(TEAM_PATH, Flash::success("Membro removido com sucesso!")))
        }
        Err(err) => {
            let message = inline_error(err, TEAM_DELETE_ERROR)?;
            Ok(see_other_with(TEAM_PATH, Flash::error(message)))
        }
    }
}

// Full agenda

#[derive(Debug, Default, Deserialize)]
pub struct AgendaQuery {
    pub data: Option<String>,
    pub barbeiro: Option<String>,
    pub status: Option<String>,
}

impl AgendaQuery {
    /// Blank or malformed dates mean today; unknown statuses mean all.
    pub fn filter(&self, today: NaiveDate) -> AppointmentFilter {
        let date = self
            .data
            .as_deref()
            .and_then(parse_iso_date)
            .unwrap_or(today);
        let barber_id = self
            .barbeiro
            .as_deref()
            .map(str::trim)
            .filter(|id| id.parse::<i64>().is_ok())
            .unwrap_or_default();
        let status = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|status| [STATUS_PENDING, STATUS_DONE, STATUS_CANCELLED].contains(status))
            .unwrap_or_default();
        AppointmentFilter {
            date: date.format("%Y-%m-%d").to_string(),
            barber_id: barber_id.to_string(),
            status: status.to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin_agenda.html")]
struct AdminAgendaTemplate {
    flash: Option<Flash>,
    nav: PanelNav,
    date: String,
    barbers: Vec<SelectOption>,
    statuses: Vec<SelectOption>,
    appointments: Vec<AppointmentCard>,
    error: Option<String>,
}

async fn agenda(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<AgendaQuery>,
) -> Result<HttpResponse, PanelError> {
    let filter = query.filter(state.today());
    let staff = state.backend.staff(&session.token);
    let (appointments, team) = tokio::join!(staff.all_appointments(&filter), staff.team());

    let (appointments, error) = list_or_error(appointments, AGENDA_ERROR)?;
    let team = match team {
        Ok(team) => team,
        Err(err) => {
            inline_error(err, TEAM_ERROR)?;
            Vec::new()
        }
    };

    let barbers = team
        .iter()
        .filter(|profile| profile.role == Role::Barber)
        .map(|profile| SelectOption {
            value: profile.id.to_string(),
            label: profile.name.clone(),
            selected: profile.id.to_string() == filter.barber_id,
        })
        .collect();
    let statuses = [STATUS_PENDING, STATUS_DONE, STATUS_CANCELLED]
        .iter()
        .map(|status| SelectOption {
            value: status.to_string(),
            label: status.to_string(),
            selected: *status == filter.status,
        })
        .collect();

    let offset = state.config.shop_offset;
    let flash = Flash::from_request(&req);
    let page = AdminAgendaTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(&session, AGENDA_PATH),
        date: filter.date.clone(),
        barbers,
        statuses,
        appointments: appointments
            .iter()
            .map(|appointment| AppointmentCard::new(appointment, offset))
            .collect(),
        error,
    };
    Ok(render_with_flash(page, &flash))
}

// Reports

pub struct PerformanceRow {
    pub name: String,
    pub total: i64,
    pub completed: i64,
    pub revenue: String,
}

#[derive(Template)]
#[template(path = "admin_reports.html")]
struct AdminReportsTemplate {
    flash: Option<Flash>,
    nav: PanelNav,
    rows: Vec<PerformanceRow>,
    error: Option<String>,
}

async fn reports(
    AdminSession(session): AdminSession,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, PanelError> {
    let staff = state.backend.staff(&session.token);
    let (performance, error) = list_or_error(staff.performance().await, REPORTS_ERROR)?;
    let rows = performance
        .into_iter()
        .map(|entry| PerformanceRow {
            revenue: format_brl(
                &entry
                    .revenue
                    .map(|revenue| revenue.to_string())
                    .unwrap_or_else(|| "0".to_string()),
            ),
            name: entry.barber_name,
            total: entry.total_appointments,
            completed: entry.completed_appointments,
        })
        .collect();

    let flash = Flash::from_request(&req);
    let page = AdminReportsTemplate {
        flash: flash.clone(),
        nav: PanelNav::new(&session, REPORTS_PATH),
        rows,
        error,
    };
    Ok(render_with_flash(page, &flash))
}

#[cfg(test)]
mod tests {
    use actix_web::{
        cookie::Cookie,
        http::{header, StatusCode},
        test::{call_service, TestRequest},
    };
    use bigdecimal::BigDecimal;
    use serde_json::json;

    use super::*;
    use crate::auth::{tests::token_for, TOKEN_COOKIE};
    use crate::routes::test_support::{
        barber_json, body_text, location, service_json, spawn_app, FakeBackend,
    };

    fn admin_cookie() -> Cookie<'static> {
        Cookie::new(TOKEN_COOKIE, token_for("admin", "Rui Duarte"))
    }

    const BOUNDARY: &str = "----duarte-boundary";

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> TestRequest {
        TestRequest::post()
            .uri(uri)
            .cookie(admin_cookie())
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    #[test]
    fn unknown_period_falls_back_to_last_seven_days() {
        assert_eq!(period_or_default(Some("thisMonth")), "thisMonth");
        assert_eq!(period_or_default(Some("forever")), "7days");
        assert_eq!(period_or_default(None), "7days");
    }

    #[test]
    fn bars_scale_against_the_best_day() {
        let points = vec![
            RevenuePoint {
                date: "2025-01-09".to_string(),
                revenue: BigDecimal::from(50i64),
            },
            RevenuePoint {
                date: "2025-01-10T00:00:00.000Z".to_string(),
                revenue: BigDecimal::from(200i64),
            },
        ];
        let bars = revenue_bars(&points);
        assert_eq!(bars[0].height, 25);
        assert_eq!(bars[1].height, 100);
        assert_eq!(bars[1].label, "10/01");
        assert_eq!(bars[1].value, "R$ 200,00");
    }

    #[test]
    fn service_form_checks_every_field() {
        let form = ServiceForm {
            name: "  ".to_string(),
            price: "-1".to_string(),
            duration_minutes: "0".to_string(),
            ..ServiceForm::default()
        };
        assert_eq!(form.validate().unwrap_err().len(), 3);

        let form = ServiceForm {
            name: " Corte Clássico ".to_string(),
            price: "45,5".to_string(),
            duration_minutes: "40".to_string(),
            icon_name: "lightning".to_string(),
            ..ServiceForm::default()
        };
        let payload = form.validate().unwrap();
        assert_eq!(payload.name, "Corte Clássico");
        assert_eq!(payload.price, "45.50");
        assert_eq!(payload.icon_name, "scissors");
    }

    #[test]
    fn password_only_travels_for_admins() {
        let barber = TeamForm {
            name: "Diego Souza".to_string(),
            username: "diego".to_string(),
            role: "barber".to_string(),
            password: "segredo".to_string(),
            ..TeamForm::default()
        };
        assert_eq!(barber.validate(true).unwrap().password, None);

        let admin = TeamForm {
            name: "Rui Duarte".to_string(),
            username: "rui".to_string(),
            role: "admin".to_string(),
            ..TeamForm::default()
        };
        let errors = admin.validate(true).unwrap_err();
        assert!(errors[0].contains("senha"));

        let admin_edit = TeamForm {
            name: "Rui Duarte".to_string(),
            username: "rui".to_string(),
            role: "admin".to_string(),
            ..TeamForm::default()
        };
        assert_eq!(admin_edit.validate(false).unwrap().password, None);
    }

    #[test]
    fn agenda_filter_defaults_to_today() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let filter = AgendaQuery::default().filter(today);
        assert_eq!(filter.date, "2025-01-10");
        assert_eq!(filter.barber_id, "");
        assert_eq!(filter.status, "");

        let query = AgendaQuery {
            data: Some("2025-02-01".to_string()),
            barbeiro: Some("2".to_string()),
            status: Some("Todos".to_string()),
        };
        let filter = query.filter(today);
        assert_eq!(filter.date, "2025-02-01");
        assert_eq!(filter.barber_id, "2");
        assert_eq!(filter.status, "");
    }

    #[actix_web::test]
    async fn barbers_are_sent_back_to_their_dashboard() {
        let backend = FakeBackend::new().start().await;
        let app = spawn_app(&backend).await;

        let response = call_service(
            &app,
            TestRequest::get()
                .uri("/painel/servicos")
                .cookie(Cookie::new(TOKEN_COOKIE, token_for("barber", "Diego Souza")))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/painel");
        assert!(backend.requests().is_empty());
    }

    #[actix_web::test]
    async fn dashboard_parts_fail_independently() {
        let backend = FakeBackend::new()
            .on("GET", "/api/admin/stats", 200, json!({
                "revenueThisMonth": "1250.50",
                "appointmentsDoneThisMonth": 31,
                "pendingAppointmentsThisMonth": 4
            }))
            .on("GET", "/api/admin/charts/revenue", 500, json!({}))
            .start()
            .await;
        let app = spawn_app(&backend).await;

        let response = call_service(
            &app,
            TestRequest::get()
                .uri("/painel?periodo=thisWeek")
                .cookie(admin_cookie())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("R$ 1.250,50"));
        assert!(body.contains("Agendamentos Pendentes"));
        assert!(body.contains(CHART_ERROR));
        assert!(!body.contains(STATS_ERROR));

        let chart = backend.requests_to("GET", "/api/admin/charts/revenue");
        assert_eq!(chart[0].query, "period=thisWeek");
    }

    #[actix_web::test]
    async fn invalid_service_never_reaches_the_backend() {
        let backend = FakeBackend::new()
            .on("GET", "/api/services", 200, json!([service_json(1, "Corte Clássico")]))
            .start()
            .await;
        let app = spawn_app(&backend).await;

        let response = call_service(
            &app,
            TestRequest::post()
                .uri("/painel/servicos")
                .cookie(admin_cookie())
                .set_form([("name", "Pezinho"), ("price", "abc"), ("duration_minutes", "15")])
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Informe um preço válido"));
        assert!(backend.requests_to("POST", "/api/services").is_empty());
    }

    #[actix_web::test]
    async fn backend_error_text_is_shown_on_save() {
        let backend = FakeBackend::new()
            .on("GET", "/api/services", 200, json!([]))
            .on("PUT", "/api/services/3", 409, json!({"error": "Já existe um serviço com esse nome."}))
            .start()
            .await;
        let app = spawn_app(&backend).await;

        let response = call_service(
            &app,
            TestRequest::post()
                .uri("/painel/servicos/3")
                .cookie(admin_cookie())
                .set_form([
                    ("name", "Pezinho"),
                    ("price", "20"),
                    ("duration_minutes", "15"),
                    ("icon_name", "brush"),
                ])
                .to_request(),
        )
        .await;
        let body = body_text(response).await;
        assert!(body.contains("Já existe um serviço com esse nome."));
        let sent = backend.requests_to("PUT", "/api/services/3");
        assert_eq!(sent[0].json()["price"], "20.00");
        assert_eq!(sent[0].json()["icon_name"], "brush");
    }

    #[actix_web::test]
    async fn service_delete_asks_before_acting() {
        let backend = FakeBackend::new()
            .on("GET", "/api/services", 200, json!([service_json(4, "Coloração")]))
            .on("DELETE", "/api/services/4", 200, json!({}))
            .start()
            .await;
        let app = spawn_app(&backend).await;

        let confirm = call_service(
            &app,
            TestRequest::get()
                .uri("/painel/servicos/4/apagar")
                .cookie(admin_cookie())
                .to_request(),
        )
        .await;
        let body = body_text(confirm).await;
        assert!(body.contains("Tem a certeza?"));
        assert!(body.contains("Coloração"));
        assert!(backend.requests_to("DELETE", "/api/services/4").is_empty());

        let response = call_service(
            &app,
            TestRequest::post()
                .uri("/painel/servicos/4/apagar")
                .cookie(admin_cookie())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/painel/servicos");
        assert_eq!(backend.requests_to("DELETE", "/api/services/4").len(), 1);
    }

    #[actix_web::test]
    async fn team_member_is_forwarded_as_multipart() {
        let backend = FakeBackend::new()
            .on("POST", "/api/users", 201, json!({"id": 9}))
            .start()
            .await;
        let app = spawn_app(&backend).await;

        let body = multipart_body(
            &[
                ("name", "Tiago Lima"),
                ("username", "tiago"),
                ("role", "barber"),
                ("password", "nao-enviar"),
                ("is_featured", "on"),
            ],
            Some(("tiago.png", "image/png", b"\x89PNG fake")),
        );
        let response = call_service(&app, multipart_request("/painel/equipa", body).to_request()).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/painel/equipa");

        let sent = backend.requests_to("POST", "/api/users");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content_type.starts_with("multipart/form-data"));
        assert!(sent[0].body.contains("Tiago Lima"));
        assert!(sent[0].body.contains("tiago.png"));
        assert!(!sent[0].body.contains("nao-enviar"));
    }

    #[actix_web::test]
    async fn non_image_avatar_is_refused() {
        let backend = FakeBackend::new()
            .on("GET", "/api/users/profiles", 200, json!([barber_json(2, "Diego Souza")]))
            .start()
            .await;
        let app = spawn_app(&backend).await;

        let body = multipart_body(
            &[("name", "Tiago Lima"), ("username", "tiago"), ("role", "barber")],
            Some(("notas.txt", "text/plain", b"ola")),
        );
        let response = call_service(&app, multipart_request("/painel/equipa", body).to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(AVATAR_TYPE_ERROR));
        assert!(backend.requests_to("POST", "/api/users").is_empty());
    }

    #[actix_web::test]
    async fn agenda_forwards_the_filters() {
        let backend = FakeBackend::new()
            .on("GET", "/api/admin/appointments", 200, json!([{
                "id": 1,
                "client_name": "Ana Maria",
                "client_phone": "11987654321",
                "service_name": "Corte Clássico",
                "barber_name": "Diego Souza",
                "appointment_time": "2025-01-10T13:00:00.000Z",
                "status": "Pendente"
            }]))
            .on("GET", "/api/users/profiles", 200, json!([barber_json(2, "Diego Souza")]))
            .start()
            .await;
        let app = spawn_app(&backend).await;

        let response = call_service(
            &app,
            TestRequest::get()
                .uri("/painel/agenda-completa?data=2025-01-10&barbeiro=2&status=Pendente")
                .cookie(admin_cookie())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Ana Maria"));
        assert!(body.contains("10:00"));

        let sent = backend.requests_to("GET", "/api/admin/appointments");
        assert_eq!(sent[0].query, "date=2025-01-10&barberId=2&status=Pendente");
    }

    #[actix_web::test]
    async fn reports_list_each_barber() {
        let backend = FakeBackend::new()
            .on("GET", "/api/admin/reports/performance", 200, json!([
                {"barber_name": "Diego Souza", "total_appointments": "12",
                 "completed_appointments": 10, "revenue": "450.00"}
            ]))
            .start()
            .await;
        let app = spawn_app(&backend).await;

        let response = call_service(
            &app,
            TestRequest::get()
                .uri("/painel/relatorios")
                .cookie(admin_cookie())
                .to_request(),
        )
        .await;
        let body = body_text(response).await;
        assert!(body.contains("Diego Souza"));
        assert!(body.contains("R$ 450,00"));
    }
}
