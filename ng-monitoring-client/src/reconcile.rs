//! Pure planning of monitored-item synchronization.
//!
//! The subscription takes snapshots of its handles and asks these functions
//! which operations to issue; nothing here touches the transport.

use crate::item::{HandleSnapshot, MonitoredItemState};
use opcua::types::{
    MonitoredItemCreateRequest, MonitoredItemModifyRequest, MonitoringMode, MonitoringParameters,
    StatusCode,
};

/// Order in which mode changes are issued.
const MODE_ORDER: [MonitoringMode; 3] = [
    MonitoringMode::Disabled,
    MonitoringMode::Sampling,
    MonitoringMode::Reporting,
];

/// Outcome of one item inside a batched operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredItemOperationResult {
    pub client_handle: u32,
    /// Result of the service call that carried the item.
    pub service_result: StatusCode,
    /// Per-item result reported by the server.
    pub operation_result: StatusCode,
}

impl MonitoredItemOperationResult {
    pub fn is_good(&self) -> bool {
        self.service_result.is_good() && self.operation_result.is_good()
    }
}

/// Operations needed to bring the server in line with the handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub creates: Vec<HandleSnapshot>,
    pub deletes: Vec<HandleSnapshot>,
    pub modifies: Vec<HandleSnapshot>,
    /// Target mode and the items moving to it; modes without items are
    /// omitted.
    pub mode_changes: Vec<(MonitoringMode, Vec<HandleSnapshot>)>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty()
            && self.deletes.is_empty()
            && self.modifies.is_empty()
            && self.mode_changes.is_empty()
    }
}

/// Handles never created (or whose creation failed).
pub fn plan_creates(active: &[HandleSnapshot]) -> Vec<HandleSnapshot> {
    active
        .iter()
        .filter(|h| h.state == MonitoredItemState::Initial)
        .cloned()
        .collect()
}

/// Removed handles still attached to a server item.
pub fn plan_deletes(removed: &[HandleSnapshot]) -> Vec<HandleSnapshot> {
    removed
        .iter()
        .filter(|h| h.state == MonitoredItemState::Synchronized && h.monitored_item_id.is_some())
        .cloned()
        .collect()
}

/// Synchronized handles whose requested parameters moved away from the ones
/// the server last accepted.
pub fn plan_modifies(active: &[HandleSnapshot]) -> Vec<HandleSnapshot> {
    active
        .iter()
        .filter(|h| h.state == MonitoredItemState::Synchronized)
        .filter(|h| {
            h.sent
                .as_ref()
                .map_or(true, |sent| h.requested.differs_for_modify(sent))
        })
        .cloned()
        .collect()
}

/// Synchronized handles whose requested mode differs, grouped by target mode.
pub fn plan_mode_changes(active: &[HandleSnapshot]) -> Vec<(MonitoringMode, Vec<HandleSnapshot>)> {
    let changed: Vec<&HandleSnapshot> = active
        .iter()
        .filter(|h| h.state == MonitoredItemState::Synchronized)
        .filter(|h| h.sent.as_ref().map(|s| s.monitoring_mode) != Some(h.requested.monitoring_mode))
        .collect();
    MODE_ORDER
        .iter()
        .filter_map(|mode| {
            let items: Vec<HandleSnapshot> = changed
                .iter()
                .filter(|h| h.requested.monitoring_mode == *mode)
                .map(|h| (*h).clone())
                .collect();
            (!items.is_empty()).then_some((*mode, items))
        })
        .collect()
}

pub fn plan_sync(active: &[HandleSnapshot], removed: &[HandleSnapshot]) -> SyncPlan {
    SyncPlan {
        creates: plan_creates(active),
        deletes: plan_deletes(removed),
        modifies: plan_modifies(active),
        mode_changes: plan_mode_changes(active),
    }
}

/// Splits `items` into batches of at most `max_per_call`; 0 means a single
/// batch.
pub fn partition<T>(items: &[T], max_per_call: usize) -> std::slice::Chunks<'_, T> {
    let size = if max_per_call == 0 {
        items.len().max(1)
    } else {
        max_per_call
    };
    items.chunks(size)
}

fn parameters(h: &HandleSnapshot) -> MonitoringParameters {
    MonitoringParameters {
        client_handle: h.client_handle,
        sampling_interval: h.requested.sampling_interval,
        filter: h.requested.filter.clone().into_extension_object(),
        queue_size: h.requested.queue_size,
        discard_oldest: h.requested.discard_oldest,
    }
}

pub fn create_request(h: &HandleSnapshot) -> MonitoredItemCreateRequest {
    MonitoredItemCreateRequest {
        item_to_monitor: h.target.clone(),
        monitoring_mode: h.requested.monitoring_mode,
        requested_parameters: parameters(h),
    }
}

/// `None` when the handle is not attached.
pub fn modify_request(h: &HandleSnapshot) -> Option<MonitoredItemModifyRequest> {
    Some(MonitoredItemModifyRequest {
        monitored_item_id: h.monitored_item_id?,
        requested_parameters: parameters(h),
    })
}
