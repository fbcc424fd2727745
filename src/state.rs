use chrono::{NaiveDate, Utc};

use crate::{api::BackendClient, booking::BookingWindow, config::Config};

#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, crate::api::ApiError> {
        let backend = BackendClient::new(&config.api_url, config.api_timeout)?;
        Ok(Self { backend, config })
    }

    /// The calendar day at the shop right now.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.config.shop_offset).date_naive()
    }

    pub fn booking_window(&self) -> BookingWindow {
        BookingWindow::new(self.today(), self.config.booking_horizon_days)
    }

    /// Avatar source for a profile: the backend asset or the bundled silhouette.
    pub fn avatar_src(&self, avatar_url: Option<&str>) -> String {
        match avatar_url.map(|path| self.backend.asset_url(path)) {
            Some(url) if !url.is_empty() => url,
            _ => DEFAULT_AVATAR.to_string(),
        }
    }
}

pub const DEFAULT_AVATAR: &str = "/static/default-avatar.svg";
