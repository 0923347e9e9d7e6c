#![allow(dead_code)]

use ng_monitoring_types::{event_field, event_notifier, MonitoringFilter, SubscriptionParameters};
use opcua::types::{
    ContentFilter, EventFilter, ExtensionObject, MonitoredItemCreateRequest, MonitoringMode,
    MonitoringParameters, NodeId, ReadValueId,
};
use std::sync::Once;
use tracing::Level;

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

pub fn subscription_params(publishing_interval: f64) -> SubscriptionParameters {
    SubscriptionParameters {
        publishing_interval,
        lifetime_count: 60,
        max_keep_alive_count: 20,
        max_notifications_per_publish: 0,
        publishing_enabled: true,
        priority: 0,
    }
}

pub fn value_item(
    name: &str,
    client_handle: u32,
    queue_size: u32,
    discard_oldest: bool,
) -> MonitoredItemCreateRequest {
    MonitoredItemCreateRequest {
        item_to_monitor: ReadValueId::new_value(NodeId::new(2, name.to_string())),
        monitoring_mode: MonitoringMode::Reporting,
        requested_parameters: MonitoringParameters {
            client_handle,
            sampling_interval: 250.0,
            filter: ExtensionObject::null(),
            queue_size,
            discard_oldest,
        },
    }
}

/// Event filter selecting BaseEventType fields by name.
pub fn event_filter(select: &[&str], where_clause: ContentFilter) -> EventFilter {
    EventFilter {
        select_clauses: Some(select.iter().map(|field| event_field(&[*field])).collect()),
        where_clause,
    }
}

pub fn event_item(notifier: NodeId, client_handle: u32, filter: EventFilter) -> MonitoredItemCreateRequest {
    MonitoredItemCreateRequest {
        item_to_monitor: event_notifier(notifier),
        monitoring_mode: MonitoringMode::Reporting,
        requested_parameters: MonitoringParameters {
            client_handle,
            sampling_interval: 0.0,
            filter: MonitoringFilter::Event(filter).into_extension_object(),
            queue_size: 100,
            discard_oldest: true,
        },
    }
}
