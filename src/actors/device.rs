use actix::prelude::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::actors::core::{Passivate, TerminationWatch};
use crate::metrics::Metrics;
use crate::models::{DeviceId, GroupId, RequestId};

// ============================================================================
// Device Actor - Holds the latest reading of one device
// ============================================================================
//
// Responsibilities:
// - Store the last recorded value
// - Answer point reads about its own state
// - Tell its group exactly once when it stops
//
// A device knows nothing about other devices or how its group stores it.
//
// ============================================================================

/// Address of a running device actor
pub type DeviceHandle = Addr<DeviceActor>;

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct RecordReading {
    pub request_id: RequestId,
    pub value: f64,
    pub reply_to: Recipient<ReadingRecorded>,
}

#[derive(Message, Debug, Clone, PartialEq)]
#[rtype(result = "()")]
pub struct ReadingRecorded {
    pub request_id: RequestId,
}

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "RespondReading")]
pub struct ReadReading {
    pub request_id: RequestId,
}

#[derive(MessageResponse, Debug, Clone, PartialEq)]
pub struct RespondReading {
    pub request_id: RequestId,
    pub device_id: DeviceId,
    pub value: Option<f64>,
}

// ============================================================================
// Device Actor
// ============================================================================

pub struct DeviceActor {
    group_id: GroupId,
    device_id: DeviceId,
    last_reading: Option<f64>,
    last_recorded_at: Option<DateTime<Utc>>,
    watch: TerminationWatch<DeviceActor>,
    metrics: Arc<Metrics>,
}

impl DeviceActor {
    pub fn new(
        group_id: impl Into<GroupId>,
        watch: TerminationWatch<DeviceActor>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            device_id: watch.key().to_string(),
            last_reading: None,
            last_recorded_at: None,
            watch,
            metrics,
        }
    }
}

impl Actor for DeviceActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            group_id = %self.group_id,
            device_id = %self.device_id,
            "DeviceActor started"
        );
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            group_id = %self.group_id,
            device_id = %self.device_id,
            "🛑 DeviceActor stopped"
        );
        self.watch.notify(ctx.address());
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<RecordReading> for DeviceActor {
    type Result = ();

    fn handle(&mut self, msg: RecordReading, _ctx: &mut Self::Context) {
        tracing::debug!(
            device_id = %self.device_id,
            request_id = msg.request_id,
            value = msg.value,
            "Recorded reading"
        );

        self.last_reading = Some(msg.value);
        self.last_recorded_at = Some(Utc::now());
        self.metrics.record_reading();

        msg.reply_to.do_send(ReadingRecorded {
            request_id: msg.request_id,
        });
    }
}

impl Handler<ReadReading> for DeviceActor {
    type Result = RespondReading;

    fn handle(&mut self, msg: ReadReading, _ctx: &mut Self::Context) -> Self::Result {
        tracing::trace!(
            device_id = %self.device_id,
            request_id = msg.request_id,
            recorded_at = ?self.last_recorded_at,
            "Answering reading query"
        );

        RespondReading {
            request_id: msg.request_id,
            device_id: self.device_id.clone(),
            value: self.last_reading,
        }
    }
}

impl Handler<Passivate> for DeviceActor {
    type Result = ();

    fn handle(&mut self, _: Passivate, ctx: &mut Self::Context) {
        tracing::debug!(device_id = %self.device_id, "DeviceActor received passivate");
        ctx.stop();
    }
}
