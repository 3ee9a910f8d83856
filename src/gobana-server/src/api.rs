use actix_files as fs;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use std::sync::Arc;

use gobana_rs::{to_json, Connection};

/// Shared application state
pub struct AppState {
    pub connection: Arc<Connection>,
}

/// GET /
pub async fn index() -> HttpResponse {
    HttpResponse::PermanentRedirect()
        .insert_header((header::LOCATION, "/static/index.html"))
        .finish()
}

/// GET /api/{path}
#[tracing::instrument(skip(req, state))]
pub async fn api_get(
    path: web::Path<String>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> HttpResponse {
    let endpoint = engine_path(&path, req.query_string());
    relay(&endpoint, state.connection.get(&endpoint).await)
}

/// POST /api/{path}
#[tracing::instrument(skip(req, body, state))]
pub async fn api_post(
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let endpoint = engine_path(&path, req.query_string());
    relay(&endpoint, state.connection.post(&endpoint, body.to_vec()).await)
}

/// PUT /api/{path}
#[tracing::instrument(skip(req, body, state))]
pub async fn api_put(
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let endpoint = engine_path(&path, req.query_string());
    relay(&endpoint, state.connection.put(&endpoint, body.to_vec()).await)
}

/// DELETE /api/{path}
#[tracing::instrument(skip(req, state))]
pub async fn api_delete(
    path: web::Path<String>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> HttpResponse {
    let endpoint = engine_path(&path, req.query_string());
    relay(&endpoint, state.connection.delete(&endpoint).await)
}

fn engine_path(path: &str, query: &str) -> String {
    if query.is_empty() {
        format!("/{}", path)
    } else {
        format!("/{}?{}", path, query)
    }
}

/// Pass the engine's body through when it is a JSON object.
///
/// Engine-reported errors keep their body but answer 400; transport
/// failures and non-object bodies answer an empty 400.
fn relay(endpoint: &str, result: gobana_rs::Result<Vec<u8>>) -> HttpResponse {
    let body = match result {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(endpoint = %endpoint, error = %e, "Request to Elasticsearch failed");
            return HttpResponse::BadRequest().finish();
        }
    };

    match to_json(&body) {
        Ok(map) if map.contains_key("error") => {
            tracing::warn!(endpoint = %endpoint, error = %map["error"], "Elasticsearch reported an error");
            HttpResponse::BadRequest()
                .content_type("application/json")
                .body(body)
        }
        Ok(_) => HttpResponse::Ok().content_type("application/json").body(body),
        Err(e) => {
            tracing::error!(endpoint = %endpoint, error = %e, "Invalid response from Elasticsearch");
            HttpResponse::BadRequest().finish()
        }
    }
}

/// Static front end under /static
pub fn static_files(dir: &str) -> fs::Files {
    fs::Files::new("/static", dir).index_file("index.html")
}

/// Configure routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index)).service(
        web::resource("/api/{path:.*}")
            .route(web::get().to(api_get))
            .route(web::post().to(api_post))
            .route(web::put().to(api_put))
            .route(web::delete().to(api_delete)),
    );
}
