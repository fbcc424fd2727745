//! One-shot toast messages carried across a redirect in a cookie.

use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    HttpRequest, HttpResponse, HttpResponseBuilder,
};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "aviso";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }

    pub fn css(&self) -> &'static str {
        match self.level {
            Level::Success => "toast toast-success",
            Level::Error => "toast toast-error",
        }
    }

    fn cookie(&self) -> Option<Cookie<'static>> {
        let value = serde_urlencoded::to_string(self).ok()?;
        Some(
            Cookie::build(FLASH_COOKIE, value)
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .finish(),
        )
    }

    /// Reads the pending toast, if any.
    pub fn from_request(req: &HttpRequest) -> Option<Self> {
        let cookie = req.cookie(FLASH_COOKIE)?;
        serde_urlencoded::from_str(cookie.value()).ok()
    }
}

/// Queues `flash` on a redirect response.
pub fn queue(builder: &mut HttpResponseBuilder, flash: Flash) {
    if let Some(cookie) = flash.cookie() {
        builder.cookie(cookie);
    }
}

/// Expires the toast once the page showing it has been rendered.
pub fn consume(response: &mut HttpResponse, shown: &Option<Flash>) {
    if shown.is_none() {
        return;
    }
    let removal = Cookie::build(FLASH_COOKIE, "")
        .path("/")
        .max_age(Duration::seconds(0))
        .finish();
    if let Err(err) = response.add_cookie(&removal) {
        log::warn!("could not clear flash cookie: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn survives_the_cookie_round_trip() {
        let flash = Flash::success("Horário bloqueado!");
        let cookie = flash.cookie().unwrap();
        assert!(!cookie.value().contains(' '));
        assert!(!cookie.value().contains(';'));

        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert_eq!(Flash::from_request(&req), Some(flash));
    }

    #[test]
    fn tampered_cookie_is_ignored() {
        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, "level=boom"))
            .to_http_request();
        assert_eq!(Flash::from_request(&req), None);
    }
}
