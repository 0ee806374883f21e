use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddTargetRequest {
    pub url: String,
}

// List all registered targets
pub async fn list_targets(data: web::Data<AppState>) -> impl Responder {
    let targets = data.scheduler.targets().await;
    info!("Returning list of {} targets", targets.len());

    HttpResponse::Ok().json(targets)
}

// Register a new target to monitor
pub async fn add_target(data: web::Data<AppState>, request: web::Json<AddTargetRequest>) -> HttpResponse {
    info!("Request to register target: {}", request.url);

    match data.scheduler.add_target(&request.url).await {
        Ok(target) => HttpResponse::Created().json(target),
        Err(e) => error_response(&e),
    }
}

// Remove a target from monitoring
pub async fn remove_target(data: web::Data<AppState>, id: web::Path<Uuid>) -> HttpResponse {
    let id = id.into_inner();
    info!("Request to remove target: {}", id);

    match data.scheduler.remove_target(id).await {
        Ok(target) => HttpResponse::Ok().json(target),
        Err(e) => error_response(&e),
    }
}

// Remove every target
pub async fn clear_targets(data: web::Data<AppState>) -> impl Responder {
    let removed = data.scheduler.clear_targets().await;
    HttpResponse::Ok().json(json!({ "removed": removed }))
}

// Probe one target immediately
pub async fn ping_target(data: web::Data<AppState>, id: web::Path<Uuid>) -> HttpResponse {
    let id = id.into_inner();
    info!("Manual probe requested for target: {}", id);

    match data.scheduler.probe_now(id).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => error_response(&e),
    }
}
