use actix::Addr;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::actors::{DeviceManagerActor, GetSystemHealth};

/// Start the metrics HTTP server.
///
/// Must run inside the actix system that owns `manager`.
pub async fn start_metrics_server(
    registry: Arc<Registry>,
    manager: Addr<DeviceManagerActor>,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(manager.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(manager: web::Data<Addr<DeviceManagerActor>>) -> impl Responder {
    match manager.send(GetSystemHealth).await {
        Ok(health) => {
            let unhealthy = health.overall_status.is_unhealthy();
            let body = serde_json::json!({
                "service": "device-registry",
                "health": health,
            });
            if unhealthy {
                HttpResponse::ServiceUnavailable().json(body)
            } else {
                HttpResponse::Ok().json(body)
            }
        }
        Err(e) => {
            tracing::error!("Failed to get system health: {}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "service": "device-registry",
                "error": e.to_string(),
            }))
        }
    }
}
