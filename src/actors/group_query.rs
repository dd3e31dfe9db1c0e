use actix::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::actors::device::{DeviceHandle, ReadReading, RespondReading};
use crate::actors::device_group::AllReadings;
use crate::metrics::Metrics;
use crate::models::{DeviceId, GroupId, QueryOutcome, Reading, RequestId, UnavailableReason};

// ============================================================================
// Device Group Query - One short-lived actor per group query
// ============================================================================
//
// Fans a point read out to every device in a snapshot and fans the answers
// back in to a single `AllReadings` reply.
//
// A device resolves when it answers, when its mailbox closes (it stopped
// before or while answering), or when the query deadline fires. The query
// replies exactly once and then stops itself.
//
// ============================================================================

/// Point-in-time copy of a group's devices, owned by exactly one query
pub struct Snapshot {
    targets: HashMap<DeviceId, Recipient<ReadReading>>,
}

impl Snapshot {
    pub fn new(targets: HashMap<DeviceId, Recipient<ReadReading>>) -> Self {
        Self { targets }
    }

    pub fn from_devices<'a, I>(devices: I) -> Self
    where
        I: IntoIterator<Item = (&'a DeviceId, &'a DeviceHandle)>,
    {
        Self::new(
            devices
                .into_iter()
                .map(|(id, handle)| (id.clone(), handle.clone().recipient()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

// ============================================================================
// Query Collector
// ============================================================================

/// Per-target bookkeeping of one query.
///
/// Every id starts pending and resolves at most once. Closing resolves
/// whatever is still pending to `Unavailable`; answers arriving after that are
/// ignored, so an answer recorded before the close always keeps its value.
#[derive(Debug)]
pub struct QueryCollector {
    readings: QueryOutcome,
    pending: HashSet<DeviceId>,
    closed: bool,
}

impl QueryCollector {
    pub fn new<I>(device_ids: I) -> Self
    where
        I: IntoIterator<Item = DeviceId>,
    {
        Self {
            readings: HashMap::new(),
            pending: device_ids.into_iter().collect(),
            closed: false,
        }
    }

    /// Record the reading for one pending device. Returns false if the device
    /// was not pending (unknown, already resolved, or the collector is closed).
    pub fn resolve(&mut self, device_id: &str, reading: Reading) -> bool {
        if self.closed || !self.pending.remove(device_id) {
            return false;
        }
        self.readings.insert(device_id.to_string(), reading);
        true
    }

    /// Resolve every pending device to `Unavailable` and return their ids
    pub fn close(&mut self) -> Vec<DeviceId> {
        self.closed = true;
        let expired: Vec<DeviceId> = self.pending.drain().collect();
        for device_id in &expired {
            self.readings.insert(device_id.clone(), Reading::Unavailable);
        }
        expired
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Take the finished outcome. Only meaningful once complete.
    pub fn take_outcome(&mut self) -> QueryOutcome {
        std::mem::take(&mut self.readings)
    }
}

// ============================================================================
// Device Group Query Actor
// ============================================================================

pub struct DeviceGroupQuery {
    query_id: Uuid,
    group_id: GroupId,
    request_id: RequestId,
    snapshot: Option<Snapshot>,
    collector: QueryCollector,
    reply_to: Recipient<AllReadings>,
    timeout: Duration,
    started_at: Instant,
    replied: bool,
    metrics: Arc<Metrics>,
}

impl DeviceGroupQuery {
    pub fn new(
        group_id: impl Into<GroupId>,
        request_id: RequestId,
        snapshot: Snapshot,
        reply_to: Recipient<AllReadings>,
        timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        let collector = QueryCollector::new(snapshot.targets.keys().cloned());
        Self {
            query_id: Uuid::new_v4(),
            group_id: group_id.into(),
            request_id,
            snapshot: Some(snapshot),
            collector,
            reply_to,
            timeout,
            started_at: Instant::now(),
            replied: false,
            metrics,
        }
    }

    fn on_answer(
        &mut self,
        device_id: DeviceId,
        answer: Result<RespondReading, MailboxError>,
        ctx: &mut Context<Self>,
    ) {
        let (reading, reason) = match answer {
            Ok(response) => {
                let reading = Reading::from(response.value);
                let reason = (!reading.is_available()).then_some(UnavailableReason::NoReading);
                (reading, reason)
            }
            Err(e) => {
                tracing::debug!(
                    query_id = %self.query_id,
                    device_id = %device_id,
                    error = %e,
                    "Device stopped before answering"
                );
                (Reading::Unavailable, Some(UnavailableReason::Terminated))
            }
        };

        if !self.collector.resolve(&device_id, reading) {
            tracing::trace!(
                query_id = %self.query_id,
                device_id = %device_id,
                "Ignoring late answer"
            );
            return;
        }

        if let Some(reason) = reason {
            self.metrics.record_unavailable(&self.group_id, reason);
        }

        if self.collector.is_complete() {
            self.reply(ctx);
        }
    }

    fn on_deadline(&mut self, ctx: &mut Context<Self>) {
        if self.replied {
            return;
        }

        tracing::debug!(
            query_id = %self.query_id,
            pending = self.collector.pending(),
            "Group query deadline reached"
        );

        // Yield once before closing: answers woken at the same instant as the
        // deadline are polled ahead of this future and keep their value.
        ctx.spawn(
            tokio::task::yield_now()
                .into_actor(self)
                .map(|_, act, ctx| act.close(ctx)),
        );
    }

    fn close(&mut self, ctx: &mut Context<Self>) {
        if self.replied {
            return;
        }

        let expired = self.collector.close();
        for device_id in &expired {
            self.metrics.record_unavailable(&self.group_id, UnavailableReason::Timeout);
            tracing::warn!(
                query_id = %self.query_id,
                group_id = %self.group_id,
                device_id = %device_id,
                timeout_ms = self.timeout.as_millis() as u64,
                "Device did not answer before the query deadline"
            );
        }

        self.reply(ctx);
    }

    fn reply(&mut self, ctx: &mut Context<Self>) {
        if self.replied {
            return;
        }
        self.replied = true;

        let readings = self.collector.take_outcome();
        let elapsed = self.started_at.elapsed();

        tracing::debug!(
            query_id = %self.query_id,
            group_id = %self.group_id,
            request_id = self.request_id,
            devices = readings.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Group query completed"
        );

        self.metrics.record_group_query(&self.group_id, elapsed.as_secs_f64());
        self.reply_to.do_send(AllReadings {
            request_id: self.request_id,
            readings,
        });

        ctx.stop();
    }
}

impl Actor for DeviceGroupQuery {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.started_at = Instant::now();
        let targets = self.snapshot.take().map(|s| s.targets).unwrap_or_default();

        tracing::debug!(
            query_id = %self.query_id,
            group_id = %self.group_id,
            request_id = self.request_id,
            devices = targets.len(),
            "DeviceGroupQuery started"
        );

        for (device_id, target) in targets {
            let request = ReadReading { request_id: self.request_id };
            ctx.spawn(
                target
                    .send(request)
                    .into_actor(self)
                    .map(move |answer, act, ctx| act.on_answer(device_id, answer, ctx)),
            );
        }

        ctx.run_later(self.timeout, |act, ctx| act.on_deadline(ctx));

        if self.collector.is_complete() {
            self.reply(ctx);
        }
    }
}
