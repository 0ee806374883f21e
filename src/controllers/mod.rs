//! HTTP handlers for the prober service

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::errors::ProberError;

pub mod health;
pub mod monitor;
pub mod targets;
pub mod trigger;

/// Register every route on an actix `App`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/api/ping", web::get().to(trigger::trigger_round))
        .route("/api/ping", web::post().to(trigger::trigger_round))
        .route("/api/state", web::get().to(monitor::get_state))
        .route("/api/logs", web::get().to(monitor::get_logs))
        .route("/api/logs", web::delete().to(monitor::clear_logs))
        .route("/api/monitor/status", web::get().to(monitor::get_status))
        .route("/api/monitor/start", web::post().to(monitor::start_monitoring))
        .route("/api/monitor/stop", web::post().to(monitor::stop_monitoring))
        .route("/api/monitor/interval", web::put().to(monitor::set_interval))
        .route("/api/targets", web::get().to(targets::list_targets))
        .route("/api/targets", web::post().to(targets::add_target))
        .route("/api/targets", web::delete().to(targets::clear_targets))
        .route("/api/targets/{id}", web::delete().to(targets::remove_target))
        .route("/api/targets/{id}/ping", web::post().to(targets::ping_target));
}

pub(crate) fn error_response(err: &ProberError) -> HttpResponse {
    let body = json!({ "error": err.to_string() });
    match err {
        ProberError::Validation(_) => HttpResponse::BadRequest().json(body),
        ProberError::TargetNotFound(_) => HttpResponse::NotFound().json(body),
        ProberError::StoreUnavailable(_) => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}
