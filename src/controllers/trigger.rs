use actix_web::{web, HttpResponse, Responder};
use tracing::info;

use crate::state::AppState;

// Run one round through the scheduler; GET and POST share this handler
pub async fn trigger_round(data: web::Data<AppState>) -> impl Responder {
    info!("Round trigger received");
    let report = data.scheduler.trigger_round().await;

    HttpResponse::Ok().json(report)
}
