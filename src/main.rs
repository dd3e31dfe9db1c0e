use actix::prelude::*;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use device_registry::actors::{
    AllReadings, DeviceList, DeviceManagerActor, DeviceRegistered, GetSystemHealth, ListDevices,
    Passivate, QueryAllReadings, ReadingRecorded, RecordReading, RegisterDevice, ReplyChannel,
};
use device_registry::config::RegistryConfig;
use device_registry::metrics::{self, Metrics};

const GROUP: &str = "floor-1";

#[actix::main]
async fn main() -> anyhow::Result<()> {
    let config = RegistryConfig::load()?;

    // Structured logging, RUST_LOG overrides the configured filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
        )
        .init();

    tracing::info!("🚀 Starting device registry");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Device manager ===
    let manager = DeviceManagerActor::new(config.query_timeout(), metrics.clone()).start();

    if config.metrics_enabled {
        let registry = Arc::new(metrics.registry().clone());
        let server_manager = manager.clone();
        let port = config.metrics_port;
        actix::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(registry, server_manager, port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 3. Register a few sensors ===
    let (registered_to, mut registered) = ReplyChannel::<DeviceRegistered>::open();
    let mut sensors = Vec::new();
    for device_id in ["sensor-1", "sensor-2", "sensor-3"] {
        manager.do_send(RegisterDevice {
            group_id: GROUP.to_string(),
            device_id: device_id.to_string(),
            reply_to: registered_to.clone(),
        });
        let reply = registered
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("registration reply channel closed"))?;
        sensors.push(reply.device);
    }

    // === 4. Record readings on two of them ===
    let (recorded_to, mut recorded) = ReplyChannel::<ReadingRecorded>::open();
    for (request_id, (sensor, value)) in sensors.iter().zip([21.5, 22.75]).enumerate() {
        sensor.do_send(RecordReading {
            request_id: request_id as u64,
            value,
            reply_to: recorded_to.clone(),
        });
        if let Some(ack) = recorded.recv().await {
            tracing::info!(request_id = ack.request_id, "✅ Reading recorded");
        }
    }

    // === 5. List and query the group ===
    let (list_to, mut lists) = ReplyChannel::<DeviceList>::open();
    manager.do_send(ListDevices {
        request_id: 1,
        group_id: GROUP.to_string(),
        reply_to: list_to.clone(),
    });
    if let Some(list) = lists.recv().await {
        tracing::info!(request_id = list.request_id, devices = ?list.ids, "Devices in group");
    }

    let (readings_to, mut readings) = ReplyChannel::<AllReadings>::open();
    query_and_log(&manager, 2, readings_to.clone(), &mut readings).await?;

    // === 6. Stop one sensor and query again ===
    sensors[0].send(Passivate).await?;
    query_and_log(&manager, 3, readings_to, &mut readings).await?;

    let health = manager.send(GetSystemHealth).await?;
    tracing::info!(status = ?health.overall_status, "System health");

    if config.metrics_enabled {
        tracing::info!("⏳ Serving metrics, press Ctrl-C to exit");
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("🎉 Demo complete!");
    System::current().stop();

    Ok(())
}

async fn query_and_log(
    manager: &Addr<DeviceManagerActor>,
    request_id: u64,
    reply_to: Recipient<AllReadings>,
    replies: &mut tokio::sync::mpsc::UnboundedReceiver<AllReadings>,
) -> anyhow::Result<()> {
    manager.do_send(QueryAllReadings {
        request_id,
        group_id: GROUP.to_string(),
        reply_to,
        timeout: None,
    });

    let reply = replies
        .recv()
        .await
        .ok_or_else(|| anyhow::anyhow!("query reply channel closed"))?;

    tracing::info!(
        request_id = reply.request_id,
        readings = %serde_json::to_string(&reply.readings)?,
        "📥 Group readings"
    );
    Ok(())
}
