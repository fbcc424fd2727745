//! An in-process stand-in for the REST backend plus helpers to drive the app.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web, App, HttpRequest, HttpResponse, HttpServer,
};
use chrono::FixedOffset;
use serde_json::{json, Value};

use crate::{config::Config, routes, state::AppState};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub body: String,
    pub content_type: String,
    pub authorization: Option<String>,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Clone)]
struct Canned {
    method: &'static str,
    path: &'static str,
    status: u16,
    body: Value,
}

#[derive(Default)]
struct Shared {
    canned: Vec<Canned>,
    requests: Mutex<Vec<Recorded>>,
}

#[derive(Default)]
pub struct FakeBackend {
    canned: Vec<Canned>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `method path` (query ignored) with `status` and a JSON body.
    /// Unlisted routes answer 404.
    pub fn on(mut self, method: &'static str, path: &'static str, status: u16, body: Value) -> Self {
        self.canned.push(Canned {
            method,
            path,
            status,
            body,
        });
        self
    }

    pub async fn start(self) -> RunningBackend {
        let shared = web::Data::new(Shared {
            canned: self.canned,
            requests: Mutex::new(Vec::new()),
        });
        let data = shared.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .default_service(web::to(answer))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind fake backend");
        let addr = server.addrs()[0];
        let server = server.run();
        actix_web::rt::spawn(server);

        RunningBackend {
            url: format!("http://{addr}"),
            shared: shared.into_inner(),
        }
    }
}

async fn answer(req: HttpRequest, body: web::Bytes, shared: web::Data<Shared>) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let recorded = Recorded {
        method: req.method().to_string(),
        path: req.path().to_string(),
        query: req.query_string().to_string(),
        body: String::from_utf8_lossy(&body).into_owned(),
        content_type: header("content-type").unwrap_or_default(),
        authorization: header("authorization"),
    };
    shared.requests.lock().unwrap().push(recorded);

    let found = shared
        .canned
        .iter()
        .find(|canned| canned.method == req.method().as_str() && canned.path == req.path());
    match found {
        Some(canned) => HttpResponse::build(StatusCode::from_u16(canned.status).unwrap())
            .json(canned.body.clone()),
        None => HttpResponse::NotFound().json(json!({ "error": "not found" })),
    }
}

pub struct RunningBackend {
    pub url: String,
    shared: Arc<Shared>,
}

impl RunningBackend {
    pub fn requests(&self) -> Vec<Recorded> {
        self.shared.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method && request.path == path)
            .collect()
    }
}

pub fn test_config(api_url: &str) -> Config {
    Config {
        port: 0,
        api_url: api_url.to_string(),
        shop_offset: FixedOffset::west_opt(3 * 3600).unwrap(),
        booking_horizon_days: 60,
        api_timeout: Duration::from_secs(5),
        static_dir: "./static".to_string(),
    }
}

pub async fn spawn_app(
    backend: &RunningBackend,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    let state = AppState::new(test_config(&backend.url)).unwrap();
    test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure),
    )
    .await
}

/// Page text with askama's `&#x2f;` turned back into `/`.
pub async fn body_text(response: ServiceResponse<impl MessageBody>) -> String {
    let bytes = test::read_body(response).await;
    String::from_utf8_lossy(&bytes).replace("&#x2f;", "/")
}

pub fn location<B>(response: &ServiceResponse<B>) -> String {
    response
        .headers()
        .get(actix_web::http::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Value of a `Set-Cookie` for `name` on the response, if any.
pub fn set_cookie<B>(response: &ServiceResponse<B>, name: &str) -> Option<String> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

pub fn service_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": format!("{name} com acabamento"),
        "price": "45.00",
        "duration_minutes": 30,
        "icon_name": "scissors"
    })
}

pub fn barber_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "username": name.to_lowercase().replace(' ', "."),
        "role": "barber",
        "avatar_url": null,
        "is_featured": true
    })
}
