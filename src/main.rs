mod api;
mod auth;
mod booking;
mod config;
mod filters;
mod flash;
mod models;
mod routes;
mod schedule;
mod state;
mod templates;
mod validation;

use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};

use crate::{config::Config, state::AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env()?;
    let address = format!("0.0.0.0:{}", config.port);
    let static_dir = config.static_dir.clone();
    log::info!(
        "Starting Duarte Barbearia on http://{address} (backend {}, shop offset {})",
        config.api_url,
        config.shop_offset
    );

    let state = AppState::new(config)?;

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", &static_dir).prefer_utf8(true))
            .configure(routes::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
