use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRequest {
    pub interval_minutes: u32,
}

// Full persisted view: targets plus scheduler settings
pub async fn get_state(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.scheduler.snapshot().await)
}

// Activity log, newest first
pub async fn get_logs(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.scheduler.activity().await)
}

pub async fn clear_logs(data: web::Data<AppState>) -> impl Responder {
    let cleared = data.scheduler.clear_activity().await;
    HttpResponse::Ok().json(json!({ "cleared": cleared }))
}

pub async fn get_status(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.scheduler.status().await)
}

pub async fn start_monitoring(data: web::Data<AppState>) -> impl Responder {
    info!("Request to start monitoring");
    let outcome = data.scheduler.start().await;
    let state = data.scheduler.state().await;

    HttpResponse::Ok().json(json!({ "outcome": outcome, "state": state }))
}

pub async fn stop_monitoring(data: web::Data<AppState>) -> impl Responder {
    info!("Request to stop monitoring");
    let stopped = data.scheduler.stop().await;
    let state = data.scheduler.state().await;

    HttpResponse::Ok().json(json!({ "stopped": stopped, "state": state }))
}

pub async fn set_interval(data: web::Data<AppState>, request: web::Json<IntervalRequest>) -> HttpResponse {
    info!("Request to set interval to {} min", request.interval_minutes);

    match data.scheduler.set_interval(request.interval_minutes).await {
        Ok(()) => HttpResponse::Ok().json(data.scheduler.monitor_config().await),
        Err(e) => error_response(&e),
    }
}
