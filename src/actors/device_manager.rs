use actix::prelude::*;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{
    ComponentHealth, HealthStatus, Passivate, SystemHealth, Terminated,
};
use crate::actors::device_group::{
    AllReadings, DeviceGroupActor, DeviceList, GetGroupHealth, ListDevices, QueryAllReadings,
    RegisterDevice,
};
use crate::metrics::Metrics;
use crate::models::{GroupId, QueryOutcome};

// ============================================================================
// Device Manager Actor - Routes requests to device groups
// ============================================================================
//
// Responsibilities:
// - Start a DeviceGroupActor the first time a group id is registered
// - Forward registrations, listings and group queries by group id
// - Forget a group once its termination notice arrives
// - Aggregate group health into one SystemHealth
//
// Actor Hierarchy:
//   DeviceManagerActor
//   └── DeviceGroupActor (one per group id)
//       ├── DeviceActor (one per device id)
//       └── DeviceGroupQuery (one per in-flight group query)
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "Vec<GroupId>")]
pub struct ListGroups;

#[derive(Message, Debug, Clone)]
#[rtype(result = "bool")]
pub struct PassivateGroup {
    pub group_id: GroupId,
}

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

// ============================================================================
// Device Manager Actor
// ============================================================================

pub struct DeviceManagerActor {
    groups: HashMap<GroupId, Addr<DeviceGroupActor>>,
    query_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl DeviceManagerActor {
    pub fn new(query_timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            groups: HashMap::new(),
            query_timeout,
            metrics,
        }
    }

    fn group(&mut self, group_id: &str, ctx: &mut Context<Self>) -> Addr<DeviceGroupActor> {
        if let Some(group) = self.groups.get(group_id).filter(|g| g.connected()) {
            return group.clone();
        }

        let group = DeviceGroupActor::new(group_id, self.query_timeout, self.metrics.clone())
            .supervised_by(ctx.address().recipient())
            .start();
        self.groups.insert(group_id.to_string(), group.clone());

        tracing::info!(
            group_id = %group_id,
            groups = self.groups.len(),
            "Created device group"
        );
        group
    }
}

impl Actor for DeviceManagerActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            query_timeout_ms = self.query_timeout.as_millis() as u64,
            "🎯 DeviceManagerActor started"
        );
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("🛑 DeviceManagerActor stopped");
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<RegisterDevice> for DeviceManagerActor {
    type Result = ();

    fn handle(&mut self, msg: RegisterDevice, ctx: &mut Self::Context) {
        let group = self.group(&msg.group_id, ctx);
        group.do_send(msg);
    }
}

impl Handler<ListDevices> for DeviceManagerActor {
    type Result = ();

    fn handle(&mut self, msg: ListDevices, _ctx: &mut Self::Context) {
        match self.groups.get(&msg.group_id) {
            Some(group) if group.connected() => group.do_send(msg),
            _ => msg.reply_to.do_send(DeviceList {
                request_id: msg.request_id,
                ids: Default::default(),
            }),
        }
    }
}

impl Handler<QueryAllReadings> for DeviceManagerActor {
    type Result = ();

    fn handle(&mut self, msg: QueryAllReadings, _ctx: &mut Self::Context) {
        match self.groups.get(&msg.group_id) {
            Some(group) if group.connected() => group.do_send(msg),
            _ => msg.reply_to.do_send(AllReadings {
                request_id: msg.request_id,
                readings: QueryOutcome::new(),
            }),
        }
    }
}

impl Handler<ListGroups> for DeviceManagerActor {
    type Result = MessageResult<ListGroups>;

    fn handle(&mut self, _: ListGroups, _ctx: &mut Self::Context) -> Self::Result {
        let mut ids: Vec<GroupId> = self.groups.keys().cloned().collect();
        ids.sort();
        MessageResult(ids)
    }
}

impl Handler<PassivateGroup> for DeviceManagerActor {
    type Result = bool;

    fn handle(&mut self, msg: PassivateGroup, _ctx: &mut Self::Context) -> Self::Result {
        match self.groups.get(&msg.group_id) {
            Some(group) => {
                group.do_send(Passivate);
                true
            }
            None => false,
        }
    }
}

impl Handler<Terminated<DeviceGroupActor>> for DeviceManagerActor {
    type Result = ();

    fn handle(&mut self, msg: Terminated<DeviceGroupActor>, _ctx: &mut Self::Context) {
        let is_current = self
            .groups
            .get(&msg.key)
            .map_or(false, |group| *group == msg.addr);

        if is_current {
            self.groups.remove(&msg.key);
            tracing::info!(group_id = %msg.key, "Device group terminated");
        }
    }
}

impl Handler<GetSystemHealth> for DeviceManagerActor {
    type Result = ResponseFuture<SystemHealth>;

    fn handle(&mut self, _: GetSystemHealth, _ctx: &mut Self::Context) -> Self::Result {
        let groups: Vec<(GroupId, Addr<DeviceGroupActor>)> = self
            .groups
            .iter()
            .map(|(id, addr)| (id.clone(), addr.clone()))
            .collect();

        Box::pin(async move {
            let checks = groups.into_iter().map(|(group_id, group)| async move {
                match group.send(GetGroupHealth).await {
                    Ok(health) => health,
                    Err(e) => ComponentHealth::new(
                        format!("device_group:{}", group_id),
                        HealthStatus::Unhealthy(e.to_string()),
                    ),
                }
            });

            let components = join_all(checks)
                .await
                .into_iter()
                .map(|health| (health.name.clone(), health))
                .collect();

            SystemHealth::from_components(components)
        })
    }
}
