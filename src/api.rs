//! Typed client for the barbershop REST backend.
//!
//! Public endpoints hang off [`BackendClient`]; staff endpoints need a bearer
//! token and hang off [`StaffApi`], obtained with [`BackendClient::staff`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{multipart, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::{
    Absence, AdminStats, Appointment, BarberPerformance, Profile, RevenuePoint, Service, Slot,
    SlotTime,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend rejected the credentials")]
    Unauthorized,
    #[error("backend refused access")]
    Forbidden,
    #[error("backend answered {status}: {}", message.as_deref().unwrap_or("no details"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("unexpected payload from backend: {0}")]
    Decode(String),
}

impl ApiError {
    /// The backend's own message when it sent one, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::Forbidden)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub service_id: i64,
    pub barber_id: i64,
    pub client_name: String,
    pub client_phone: String,
    pub appointment_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicePayload {
    pub name: String,
    pub description: String,
    pub price: String,
    pub duration_minutes: i64,
    pub icon_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamMemberPayload {
    pub name: String,
    pub username: String,
    pub role: String,
    pub avatar_url: String,
    pub is_featured: bool,
    pub password: Option<String>,
    pub avatar: Option<AvatarUpload>,
}

impl TeamMemberPayload {
    fn into_form(self) -> Result<multipart::Form, ApiError> {
        let mut form = multipart::Form::new()
            .text("name", self.name)
            .text("username", self.username)
            .text("role", self.role)
            .text("avatar_url", self.avatar_url)
            .text("is_featured", self.is_featured.to_string());
        if let Some(password) = self.password {
            form = form.text("password", password);
        }
        if let Some(avatar) = self.avatar {
            let part = multipart::Part::bytes(avatar.bytes)
                .file_name(avatar.file_name)
                .mime_str(&avatar.content_type)
                .map_err(|err| ApiError::Decode(format!("invalid avatar content type: {err}")))?;
            form = form.part("avatar", part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentFilter {
    pub date: String,
    #[serde(rename = "barberId")]
    pub barber_id: String,
    pub status: String,
}

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Arc<str>,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    /// Absolute URL for a backend asset path such as `/uploads/a.png`.
    pub fn asset_url(&self, path: &str) -> String {
        asset_url(&self.base_url, path)
    }

    pub fn staff<'a>(&'a self, token: &'a str) -> StaffApi<'a> {
        StaffApi {
            backend: self,
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    pub async fn services(&self) -> Result<Vec<Service>, ApiError> {
        read_json(self.request(Method::GET, "/api/services").send().await?).await
    }

    pub async fn profiles(&self) -> Result<Vec<Profile>, ApiError> {
        read_json(self.request(Method::GET, "/api/users/profiles").send().await?).await
    }

    pub async fn availability(
        &self,
        barber_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<SlotTime>, ApiError> {
        let date = date.format("%Y-%m-%d").to_string();
        let response = self
            .request(Method::GET, "/api/public/availability")
            .query(&[("barberId", barber_id.to_string()), ("date", date)])
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn create_appointment(&self, appointment: &NewAppointment) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, "/api/appointments")
            .json(appointment)
            .send()
            .await?;
        ensure_success(response).await.map(drop)
    }

    pub async fn station_login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, "/api/store/login")
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;
        ensure_success(response).await.map(drop)
    }

    pub async fn profile_login(&self, user_id: i64) -> Result<String, ApiError> {
        let response = self
            .request(Method::POST, "/api/auth/profile-login")
            .json(&serde_json::json!({ "userId": user_id }))
            .send()
            .await?;
        read_json::<TokenResponse>(response).await.map(|body| body.token)
    }

    pub async fn password_login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .request(Method::POST, "/api/auth/login")
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;
        read_json::<TokenResponse>(response).await.map(|body| body.token)
    }
}

/// Calls made on behalf of a logged-in staff member.
#[derive(Clone, Copy)]
pub struct StaffApi<'a> {
    backend: &'a BackendClient,
    token: &'a str,
}

impl<'a> StaffApi<'a> {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.backend.request(method, path).bearer_auth(self.token)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        read_json(self.request(Method::GET, path).send().await?).await
    }

    async fn send_ok(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        ensure_success(builder.send().await?).await.map(drop)
    }

    pub async fn team(&self) -> Result<Vec<Profile>, ApiError> {
        self.get("/api/users/profiles").await
    }

    pub async fn create_service(&self, payload: &ServicePayload) -> Result<(), ApiError> {
        self.send_ok(self.request(Method::POST, "/api/services").json(payload))
            .await
    }

    pub async fn update_service(&self, id: i64, payload: &ServicePayload) -> Result<(), ApiError> {
        self.send_ok(
            self.request(Method::PUT, &format!("/api/services/{id}"))
                .json(payload),
        )
        .await
    }

    pub async fn delete_service(&self, id: i64) -> Result<(), ApiError> {
        self.send_ok(self.request(Method::DELETE, &format!("/api/services/{id}")))
            .await
    }

    pub async fn create_team_member(&self, payload: TeamMemberPayload) -> Result<(), ApiError> {
        let form = payload.into_form()?;
        self.send_ok(self.request(Method::POST, "/api/users").multipart(form))
            .await
    }

    pub async fn update_team_member(
        &self,
        id: i64,
        payload: TeamMemberPayload,
    ) -> Result<(), ApiError> {
        let form = payload.into_form()?;
        self.send_ok(
            self.request(Method::PUT, &format!("/api/users/{id}"))
                .multipart(form),
        )
        .await
    }

    pub async fn delete_team_member(&self, id: i64) -> Result<(), ApiError> {
        self.send_ok(self.request(Method::DELETE, &format!("/api/users/{id}")))
            .await
    }

    pub async fn update_appointment_status(&self, id: i64, status: &str) -> Result<(), ApiError> {
        self.send_ok(
            self.request(Method::PUT, &format!("/api/appointments/{id}/status"))
                .json(&serde_json::json!({ "status": status })),
        )
        .await
    }

    pub async fn all_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, ApiError> {
        let response = self
            .request(Method::GET, "/api/admin/appointments")
            .query(filter)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn stats(&self) -> Result<AdminStats, ApiError> {
        self.get("/api/admin/stats").await
    }

    pub async fn revenue(&self, period: &str) -> Result<Vec<RevenuePoint>, ApiError> {
        let response = self
            .request(Method::GET, "/api/admin/charts/revenue")
            .query(&[("period", period)])
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn performance(&self) -> Result<Vec<BarberPerformance>, ApiError> {
        self.get("/api/admin/reports/performance").await
    }

    pub async fn my_appointments(&self) -> Result<Vec<Appointment>, ApiError> {
        self.get("/api/barber/my-appointments").await
    }

    pub async fn history(&self) -> Result<Vec<Appointment>, ApiError> {
        self.get("/api/barber/history").await
    }

    pub async fn absences(&self) -> Result<Vec<Absence>, ApiError> {
        self.get("/api/barber/absences").await
    }

    pub async fn create_absence(&self, start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "start_date": start.format("%Y-%m-%d").to_string(),
            "end_date": end.format("%Y-%m-%d").to_string(),
        });
        self.send_ok(self.request(Method::POST, "/api/barber/absences").json(&body))
            .await
    }

    pub async fn delete_absence(&self, id: i64) -> Result<(), ApiError> {
        self.send_ok(self.request(Method::DELETE, &format!("/api/barber/absences/{id}")))
            .await
    }
}

/// The slice of the backend the schedule board talks to.
#[async_trait(?Send)]
pub trait ScheduleApi {
    async fn day_schedule(&self, date: NaiveDate) -> Result<Vec<Slot>, ApiError>;
    async fn block_slot(&self, slot_time: &str) -> Result<(), ApiError>;
    async fn unblock_slot(&self, slot_time: &str) -> Result<(), ApiError>;
}

#[async_trait(?Send)]
impl<'a> ScheduleApi for StaffApi<'a> {
    async fn day_schedule(&self, date: NaiveDate) -> Result<Vec<Slot>, ApiError> {
        let response = self
            .request(Method::GET, "/api/barber/schedule")
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await?;
        read_json(response).await
    }

    async fn block_slot(&self, slot_time: &str) -> Result<(), ApiError> {
        self.send_ok(
            self.request(Method::POST, "/api/barber/block-slot")
                .json(&serde_json::json!({ "slot_time": slot_time })),
        )
        .await
    }

    async fn unblock_slot(&self, slot_time: &str) -> Result<(), ApiError> {
        self.send_ok(
            self.request(Method::DELETE, "/api/barber/unblock-slot")
                .json(&serde_json::json!({ "slot_time": slot_time })),
        )
        .await
    }
}

/// Joins `base` and `path` without doubling slashes; absolute URLs pass
/// through untouched and an empty path yields an empty string.
pub fn asset_url(base: &str, path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return String::new();
    }
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.error.or(body.message));
            log::warn!("backend answered {status}: {body}");
            Err(ApiError::Status { status, message })
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
}
