//! Subscription records and result helpers shared by the subscription and
//! monitored-item services.

use opcua::types::{
    AttributeId, EventFieldList, ExtensionObject, MonitoredItemCreateResult,
    MonitoredItemModifyResult, MonitoredItemNotification, NodeId, ReadValueId, StatusCode,
};

const ATTRIBUTES: [AttributeId; 27] = [
    AttributeId::NodeId,
    AttributeId::NodeClass,
    AttributeId::BrowseName,
    AttributeId::DisplayName,
    AttributeId::Description,
    AttributeId::WriteMask,
    AttributeId::UserWriteMask,
    AttributeId::IsAbstract,
    AttributeId::Symmetric,
    AttributeId::InverseName,
    AttributeId::ContainsNoLoops,
    AttributeId::EventNotifier,
    AttributeId::Value,
    AttributeId::DataType,
    AttributeId::ValueRank,
    AttributeId::ArrayDimensions,
    AttributeId::AccessLevel,
    AttributeId::UserAccessLevel,
    AttributeId::MinimumSamplingInterval,
    AttributeId::Historizing,
    AttributeId::Executable,
    AttributeId::UserExecutable,
    AttributeId::DataTypeDefinition,
    AttributeId::RolePermissions,
    AttributeId::UserRolePermissions,
    AttributeId::AccessRestrictions,
    AttributeId::AccessLevelEx,
];

/// Attribute named by a wire attribute id.
pub fn attribute_id(id: u32) -> Option<AttributeId> {
    ATTRIBUTES.iter().copied().find(|a| *a as u32 == id)
}

/// EventNotifier attribute of `node_id`, the target of an event item.
pub fn event_notifier(node_id: NodeId) -> ReadValueId {
    let mut read = ReadValueId::new_value(node_id);
    read.attribute_id = AttributeId::EventNotifier as u32;
    read
}

pub fn failed_create(status_code: StatusCode) -> MonitoredItemCreateResult {
    MonitoredItemCreateResult {
        status_code,
        monitored_item_id: 0,
        revised_sampling_interval: 0.0,
        revised_queue_size: 0,
        filter_result: ExtensionObject::null(),
    }
}

pub fn failed_modify(status_code: StatusCode) -> MonitoredItemModifyResult {
    MonitoredItemModifyResult {
        status_code,
        revised_sampling_interval: 0.0,
        revised_queue_size: 0,
        filter_result: ExtensionObject::null(),
    }
}

/// Outcome of SetTriggering, one status per requested link.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SetTriggeringResult {
    pub add_results: Vec<StatusCode>,
    pub remove_results: Vec<StatusCode>,
}

/// Subscription parameters as requested by a client.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionParameters {
    /// Milliseconds between publish cycles.
    pub publishing_interval: f64,
    /// Publish cycles without a publish request before the subscription
    /// expires.
    pub lifetime_count: u32,
    /// Empty publish cycles before a keep-alive is sent.
    pub max_keep_alive_count: u32,
    /// 0 means no limit.
    pub max_notifications_per_publish: u32,
    pub publishing_enabled: bool,
    pub priority: u8,
}

/// Subscription parameters as confirmed by a server.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevisedSubscription {
    pub publishing_interval: f64,
    pub lifetime_count: u32,
    pub max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CreateSubscriptionResult {
    pub subscription_id: u32,
    pub revised: RevisedSubscription,
}

/// One entry drained from a monitored item's queue.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    DataChange(MonitoredItemNotification),
    Event(EventFieldList),
}

impl Notification {
    pub fn client_handle(&self) -> u32 {
        match self {
            Notification::DataChange(n) => n.client_handle,
            Notification::Event(e) => e.client_handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_ids_map_by_wire_number() {
        assert_eq!(attribute_id(13), Some(AttributeId::Value));
        assert_eq!(attribute_id(12), Some(AttributeId::EventNotifier));
        assert_eq!(attribute_id(1), Some(AttributeId::NodeId));
        assert_eq!(attribute_id(0), None);
        assert_eq!(attribute_id(28), None);
    }

    #[test]
    fn event_notifier_targets_attribute_12() {
        let read = event_notifier(NodeId::new(0, 2253u32));
        assert_eq!(read.attribute_id, 12);
        assert_eq!(read.node_id, NodeId::new(0, 2253u32));
    }

    #[test]
    fn failed_results_carry_no_filter_result() {
        let r = failed_create(StatusCode::BadNodeIdUnknown);
        assert_eq!(r.status_code, StatusCode::BadNodeIdUnknown);
        assert_eq!(r.monitored_item_id, 0);
        assert!(r.filter_result.is_null());
        assert!(failed_modify(StatusCode::BadMonitoredItemIdInvalid)
            .filter_result
            .is_null());
    }
}
