use actix::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{
    ComponentHealth, HealthCheckable, HealthStatus, Passivate, Terminated, TerminationWatch,
};
use crate::actors::device::{DeviceActor, DeviceHandle};
use crate::actors::group_query::{DeviceGroupQuery, Snapshot};
use crate::metrics::Metrics;
use crate::models::{DeviceId, GroupId, QueryOutcome, RequestId};

// ============================================================================
// Device Group Actor - Registry of the devices in one group
// ============================================================================
//
// Responsibilities:
// - Create one DeviceActor per device id, lazily, on first registration
// - Hand back the existing actor on repeat registration
// - Drop a device's entry when its termination notice arrives
// - Start one DeviceGroupQuery per group query over a snapshot of devices
//
// Every create-or-lookup decision runs inside this actor's message loop, so
// racing registrations for a new id still produce a single device actor.
//
// Requests naming another group are dropped without a reply.
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct RegisterDevice {
    pub group_id: GroupId,
    pub device_id: DeviceId,
    pub reply_to: Recipient<DeviceRegistered>,
}

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct DeviceRegistered {
    pub device: DeviceHandle,
}

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct ListDevices {
    pub request_id: RequestId,
    pub group_id: GroupId,
    pub reply_to: Recipient<DeviceList>,
}

#[derive(Message, Debug, Clone, PartialEq)]
#[rtype(result = "()")]
pub struct DeviceList {
    pub request_id: RequestId,
    pub ids: HashSet<DeviceId>,
}

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct QueryAllReadings {
    pub request_id: RequestId,
    pub group_id: GroupId,
    pub reply_to: Recipient<AllReadings>,
    /// Deadline for this query; the group's default when `None`
    pub timeout: Option<Duration>,
}

#[derive(Message, Debug, Clone, PartialEq)]
#[rtype(result = "()")]
pub struct AllReadings {
    pub request_id: RequestId,
    pub readings: QueryOutcome,
}

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "ComponentHealth")]
pub struct GetGroupHealth;

// ============================================================================
// Device Group Actor
// ============================================================================

pub struct DeviceGroupActor {
    group_id: GroupId,
    devices: HashMap<DeviceId, DeviceHandle>,
    query_timeout: Duration,
    watch: TerminationWatch<DeviceGroupActor>,
    metrics: Arc<Metrics>,
}

impl DeviceGroupActor {
    pub fn new(group_id: impl Into<GroupId>, query_timeout: Duration, metrics: Arc<Metrics>) -> Self {
        let group_id = group_id.into();
        Self {
            watch: TerminationWatch::unwatched(group_id.clone()),
            group_id,
            devices: HashMap::new(),
            query_timeout,
            metrics,
        }
    }

    /// Report this group's termination to `supervisor`
    pub fn supervised_by(mut self, supervisor: Recipient<Terminated<DeviceGroupActor>>) -> Self {
        self.watch = TerminationWatch::new(self.group_id.clone(), supervisor);
        self
    }

    fn owns(&self, group_id: &str, request: &'static str) -> bool {
        if group_id == self.group_id {
            return true;
        }

        tracing::warn!(
            group_id = %self.group_id,
            requested_group = %group_id,
            request,
            "Ignoring request for a group this actor does not own"
        );
        self.metrics.record_routing_mismatch();
        false
    }

    fn start_device(&mut self, device_id: DeviceId, ctx: &mut Context<Self>) -> DeviceHandle {
        let watch = TerminationWatch::new(device_id.clone(), ctx.address().recipient());
        let device = DeviceActor::new(self.group_id.clone(), watch, self.metrics.clone()).start();

        if self.devices.insert(device_id.clone(), device.clone()).is_some() {
            tracing::debug!(
                group_id = %self.group_id,
                device_id = %device_id,
                "Replaced disconnected device actor"
            );
        }

        tracing::info!(
            group_id = %self.group_id,
            device_id = %device_id,
            devices = self.devices.len(),
            "📟 Created device actor"
        );
        self.metrics.record_device_registered(&self.group_id, self.devices.len());

        device
    }
}

impl Actor for DeviceGroupActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(group_id = %self.group_id, "DeviceGroupActor started");
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        tracing::info!(group_id = %self.group_id, "🛑 DeviceGroupActor stopped");
        self.watch.notify(ctx.address());
    }
}

impl HealthCheckable for DeviceGroupActor {
    fn check_health(&self) -> ComponentHealth {
        let stale = self.devices.values().filter(|d| !d.connected()).count();
        let status = if stale == 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded(format!("{} stopped devices awaiting cleanup", stale))
        };

        ComponentHealth::new(self.component_name(), status)
            .with_details(format!("{} devices", self.devices.len()))
    }

    fn component_name(&self) -> String {
        format!("device_group:{}", self.group_id)
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<RegisterDevice> for DeviceGroupActor {
    type Result = ();

    fn handle(&mut self, msg: RegisterDevice, ctx: &mut Self::Context) {
        if !self.owns(&msg.group_id, "register_device") {
            return;
        }

        let existing = self
            .devices
            .get(&msg.device_id)
            .filter(|device| device.connected())
            .cloned();

        let device = match existing {
            Some(device) => {
                tracing::debug!(
                    group_id = %self.group_id,
                    device_id = %msg.device_id,
                    "Device already registered"
                );
                device
            }
            None => self.start_device(msg.device_id, ctx),
        };

        msg.reply_to.do_send(DeviceRegistered { device });
    }
}

impl Handler<ListDevices> for DeviceGroupActor {
    type Result = ();

    fn handle(&mut self, msg: ListDevices, _ctx: &mut Self::Context) {
        if !self.owns(&msg.group_id, "list_devices") {
            return;
        }

        msg.reply_to.do_send(DeviceList {
            request_id: msg.request_id,
            ids: self.devices.keys().cloned().collect(),
        });
    }
}

impl Handler<QueryAllReadings> for DeviceGroupActor {
    type Result = ();

    fn handle(&mut self, msg: QueryAllReadings, _ctx: &mut Self::Context) {
        if !self.owns(&msg.group_id, "query_all_readings") {
            return;
        }

        let snapshot = Snapshot::from_devices(&self.devices);
        if snapshot.is_empty() {
            msg.reply_to.do_send(AllReadings {
                request_id: msg.request_id,
                readings: QueryOutcome::new(),
            });
            return;
        }

        tracing::debug!(
            group_id = %self.group_id,
            request_id = msg.request_id,
            devices = snapshot.len(),
            "Starting group query"
        );

        DeviceGroupQuery::new(
            self.group_id.clone(),
            msg.request_id,
            snapshot,
            msg.reply_to,
            msg.timeout.unwrap_or(self.query_timeout),
            self.metrics.clone(),
        )
        .start();
    }
}

impl Handler<Terminated<DeviceActor>> for DeviceGroupActor {
    type Result = ();

    fn handle(&mut self, msg: Terminated<DeviceActor>, _ctx: &mut Self::Context) {
        let is_current = self
            .devices
            .get(&msg.key)
            .map_or(false, |device| *device == msg.addr);

        if !is_current {
            tracing::debug!(
                group_id = %self.group_id,
                device_id = %msg.key,
                "Ignoring termination notice for a replaced device actor"
            );
            return;
        }

        self.devices.remove(&msg.key);
        tracing::info!(
            group_id = %self.group_id,
            device_id = %msg.key,
            devices = self.devices.len(),
            "Device actor terminated, removed from group"
        );
        self.metrics.record_device_terminated(&self.group_id, self.devices.len());
    }
}

impl Handler<GetGroupHealth> for DeviceGroupActor {
    type Result = MessageResult<GetGroupHealth>;

    fn handle(&mut self, _: GetGroupHealth, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.check_health())
    }
}

impl Handler<Passivate> for DeviceGroupActor {
    type Result = ();

    fn handle(&mut self, _: Passivate, ctx: &mut Self::Context) {
        tracing::info!(
            group_id = %self.group_id,
            devices = self.devices.len(),
            "DeviceGroupActor received passivate"
        );

        for device in self.devices.values() {
            device.do_send(Passivate);
        }
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::core::ReplyChannel;
    use crate::actors::device::{ReadingRecorded, RecordReading};
    use crate::models::Reading;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn start_group(group_id: &str) -> Addr<DeviceGroupActor> {
        DeviceGroupActor::new(group_id, Duration::from_secs(3), Arc::new(Metrics::new().unwrap())).start()
    }

    async fn register(group: &Addr<DeviceGroupActor>, device_id: &str) -> DeviceHandle {
        let (reply_to, mut replies): (_, UnboundedReceiver<DeviceRegistered>) = ReplyChannel::open();
        group.do_send(RegisterDevice {
            group_id: "group".to_string(),
            device_id: device_id.to_string(),
            reply_to,
        });
        timeout(WAIT, replies.recv()).await.unwrap().unwrap().device
    }

    async fn list(group: &Addr<DeviceGroupActor>, request_id: RequestId) -> DeviceList {
        let (reply_to, mut replies): (_, UnboundedReceiver<DeviceList>) = ReplyChannel::open();
        group.do_send(ListDevices {
            request_id,
            group_id: "group".to_string(),
            reply_to,
        });
        timeout(WAIT, replies.recv()).await.unwrap().unwrap()
    }

    async fn record(device: &DeviceHandle, request_id: RequestId, value: f64) {
        let (reply_to, mut replies): (_, UnboundedReceiver<ReadingRecorded>) = ReplyChannel::open();
        device.do_send(RecordReading { request_id, value, reply_to });
        let recorded = timeout(WAIT, replies.recv()).await.unwrap().unwrap();
        assert_eq!(recorded.request_id, request_id);
    }

    fn id_set(ids: &[&str]) -> HashSet<DeviceId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[actix::test]
    async fn test_reply_to_registration_requests() {
        let group = start_group("group");

        let device1 = register(&group, "device").await;
        let device2 = register(&group, "device3").await;
        assert!(device1 != device2);

        // Both device actors work
        record(&device1, 0, 1.0).await;
        record(&device2, 1, 2.0).await;
    }

    #[actix::test]
    async fn test_ignore_wrong_registration_requests() {
        let group = start_group("group");
        let (reply_to, mut replies): (_, UnboundedReceiver<DeviceRegistered>) = ReplyChannel::open();

        group.do_send(RegisterDevice {
            group_id: "wrongGroup".to_string(),
            device_id: "device1".to_string(),
            reply_to,
        });

        let reply = timeout(Duration::from_millis(300), replies.recv()).await;
        assert!(!matches!(reply, Ok(Some(_))));
        assert!(list(&group, 0).await.ids.is_empty());
    }

    #[actix::test]
    async fn test_return_same_actor_for_same_device_id() {
        let group = start_group("group");

        let device1 = register(&group, "device").await;
        let device2 = register(&group, "device").await;

        assert!(device1 == device2);
        assert_eq!(list(&group, 0).await.ids, id_set(&["device"]));
    }

    #[actix::test]
    async fn test_concurrent_registrations_create_one_device() {
        let group = start_group("group");
        let (reply_to, mut replies): (_, UnboundedReceiver<DeviceRegistered>) = ReplyChannel::open();

        let senders: Vec<_> = (0..8)
            .map(|_| {
                let group = group.clone();
                let reply_to = reply_to.clone();
                tokio::spawn(async move {
                    group
                        .send(RegisterDevice {
                            group_id: "group".to_string(),
                            device_id: "racer".to_string(),
                            reply_to,
                        })
                        .await
                })
            })
            .collect();
        for sender in senders {
            sender.await.unwrap().unwrap();
        }

        let first = timeout(WAIT, replies.recv()).await.unwrap().unwrap().device;
        for _ in 1..8 {
            let next = timeout(WAIT, replies.recv()).await.unwrap().unwrap().device;
            assert!(next == first);
        }
        assert_eq!(list(&group, 0).await.ids, id_set(&["racer"]));
    }

    #[actix::test]
    async fn test_list_active_devices() {
        let group = start_group("group");
        register(&group, "device1").await;
        register(&group, "device2").await;

        let reply = list(&group, 0).await;
        assert_eq!(reply.request_id, 0);
        assert_eq!(reply.ids, id_set(&["device1", "device2"]));
    }

    #[actix::test]
    async fn test_list_active_devices_after_one_shuts_down() {
        let group = start_group("group");
        let to_shut_down = register(&group, "device1").await;
        register(&group, "device2").await;

        assert_eq!(list(&group, 0).await.ids, id_set(&["device1", "device2"]));

        to_shut_down.do_send(Passivate);

        // The group sees the termination notice at some later point
        let mut converged = false;
        for attempt in 1..=50 {
            let reply = list(&group, attempt).await;
            assert_eq!(reply.request_id, attempt);
            if reply.ids == id_set(&["device2"]) {
                converged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(converged, "group never observed the device termination");

        // Registering again is a fresh device, not a revival
        let replacement = register(&group, "device1").await;
        assert!(replacement != to_shut_down);
        assert!(replacement.connected());
    }

    #[actix::test]
    async fn test_reregistration_after_stop_returns_new_device() {
        let group = start_group("group");
        let original = register(&group, "device").await;

        original.send(Passivate).await.unwrap();
        while original.connected() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let again = register(&group, "device").await;
        assert!(again != original);

        // The late notice for the original must not evict the replacement
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(list(&group, 0).await.ids, id_set(&["device"]));
        assert!(register(&group, "device").await == again);
    }

    #[actix::test]
    async fn test_stale_termination_notice_is_ignored() {
        let group = start_group("group");
        let device = register(&group, "device").await;

        let impostor = DeviceActor::new(
            "group",
            TerminationWatch::unwatched("device"),
            Arc::new(Metrics::new().unwrap()),
        )
        .start();
        group
            .send(Terminated { key: "device".to_string(), addr: impostor })
            .await
            .unwrap();

        assert_eq!(list(&group, 0).await.ids, id_set(&["device"]));
        assert!(register(&group, "device").await == device);
    }

    #[actix::test]
    async fn test_collect_readings_from_all_active_devices() {
        let group = start_group("group");
        let device1 = register(&group, "device1").await;
        let device2 = register(&group, "device2").await;
        register(&group, "device3").await;

        record(&device1, 0, 1.0).await;
        record(&device2, 1, 2.0).await;
        // No reading for device3

        let (reply_to, mut replies): (_, UnboundedReceiver<AllReadings>) = ReplyChannel::open();
        group.do_send(QueryAllReadings {
            request_id: 0,
            group_id: "group".to_string(),
            reply_to,
            timeout: None,
        });
        let response = timeout(WAIT, replies.recv()).await.unwrap().unwrap();

        let mut expected = QueryOutcome::new();
        expected.insert("device1".to_string(), Reading::Value(1.0));
        expected.insert("device2".to_string(), Reading::Value(2.0));
        expected.insert("device3".to_string(), Reading::Unavailable);

        assert_eq!(response.request_id, 0);
        assert_eq!(response.readings, expected);
    }

    #[actix::test]
    async fn test_device_registered_after_snapshot_is_excluded() {
        let group = start_group("group");
        let device1 = register(&group, "device1").await;
        record(&device1, 0, 1.0).await;

        let (reply_to, mut replies): (_, UnboundedReceiver<AllReadings>) = ReplyChannel::open();
        let (registered_to, mut registered): (_, UnboundedReceiver<DeviceRegistered>) =
            ReplyChannel::open();

        // Same sender, so the group handles the query first
        group.do_send(QueryAllReadings {
            request_id: 7,
            group_id: "group".to_string(),
            reply_to,
            timeout: Some(Duration::from_secs(1)),
        });
        group.do_send(RegisterDevice {
            group_id: "group".to_string(),
            device_id: "late".to_string(),
            reply_to: registered_to,
        });

        timeout(WAIT, registered.recv()).await.unwrap().unwrap();
        let response = timeout(WAIT, replies.recv()).await.unwrap().unwrap();

        assert_eq!(response.request_id, 7);
        assert_eq!(response.readings.len(), 1);
        assert_eq!(response.readings["device1"], Reading::Value(1.0));
        assert!(!response.readings.contains_key("late"));
    }

    #[actix::test]
    async fn test_query_on_empty_group_replies_immediately() {
        let group = start_group("group");
        let (reply_to, mut replies): (_, UnboundedReceiver<AllReadings>) = ReplyChannel::open();

        group.do_send(QueryAllReadings {
            request_id: 3,
            group_id: "group".to_string(),
            reply_to,
            timeout: None,
        });

        let response = timeout(Duration::from_millis(500), replies.recv()).await.unwrap().unwrap();
        assert_eq!(response.request_id, 3);
        assert!(response.readings.is_empty());
    }

    #[actix::test]
    async fn test_group_health_reports_device_count() {
        let group = start_group("group");
        register(&group, "device1").await;
        register(&group, "device2").await;

        let health = group.send(GetGroupHealth).await.unwrap();
        assert_eq!(health.name, "device_group:group");
        assert!(health.status.is_healthy());
        assert_eq!(health.details.as_deref(), Some("2 devices"));
    }

    #[actix::test]
    async fn test_passivate_stops_group_and_devices() {
        let (supervisor, mut notices): (_, UnboundedReceiver<Terminated<DeviceGroupActor>>) =
            ReplyChannel::open();
        let group = DeviceGroupActor::new("group", Duration::from_secs(3), Arc::new(Metrics::new().unwrap()))
            .supervised_by(supervisor)
            .start();
        let device = register(&group, "device").await;

        group.do_send(Passivate);

        let notice = timeout(WAIT, notices.recv()).await.unwrap().unwrap();
        assert_eq!(notice.key, "group");
        assert!(notice.addr == group);

        for _ in 0..50 {
            if !device.connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!device.connected());
    }
}
