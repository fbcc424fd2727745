use actix_web::HttpResponse;
use askama::Template;

use crate::flash::{self, Flash};

pub fn render<T: Template>(template: T) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(err) => {
            log::error!("Template render error: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Renders a page that displayed `shown` and expires the toast cookie.
pub fn render_with_flash<T: Template>(template: T, shown: &Option<Flash>) -> HttpResponse {
    let mut response = render(template);
    if response.status().is_success() {
        flash::consume(&mut response, shown);
    }
    response
}
