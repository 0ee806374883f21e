use actix_web::{HttpResponse, Responder};
use serde_json::json;

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "OK",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
