// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based device tracking.
//
// Structure:
// - core/          - Reusable pieces (termination notices, health, reply channel)
// - device         - One actor per device, holding its latest reading
// - device_group   - Registry of the devices in one group
// - group_query    - Short-lived fan-out/fan-in actor behind each group query
// - device_manager - Routes requests to groups by group id
//
// ============================================================================

pub mod core;
mod device;
mod device_group;
mod device_manager;
mod group_query;

// Re-export for public API
pub use self::core::{
    ComponentHealth, HealthCheckable, HealthStatus, Passivate, ReplyChannel, SystemHealth,
    Terminated, TerminationWatch,
};
pub use device::{DeviceActor, DeviceHandle, ReadReading, ReadingRecorded, RecordReading, RespondReading};
pub use device_group::{
    AllReadings, DeviceGroupActor, DeviceList, DeviceRegistered, GetGroupHealth, ListDevices,
    QueryAllReadings, RegisterDevice,
};
pub use device_manager::{DeviceManagerActor, GetSystemHealth, ListGroups, PassivateGroup};
pub use group_query::{DeviceGroupQuery, QueryCollector, Snapshot};
