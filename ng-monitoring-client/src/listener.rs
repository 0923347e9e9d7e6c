use crate::item::MonitoredItemHandle;
use opcua::types::{DataValue, StatusCode, Variant};
use std::sync::Arc;

/// Callbacks a client subscription delivers to the application.
///
/// Callbacks run on the thread that feeds the subscription (or on the
/// watchdog task) and must not block. Every method defaults to a no-op.
pub trait SubscriptionListener: Send + Sync {
    fn on_keep_alive(&self, _subscription_id: u32) {}

    fn on_data_received(
        &self,
        _subscription_id: u32,
        _items: &[(Arc<MonitoredItemHandle>, DataValue)],
    ) {
    }

    fn on_events_received(
        &self,
        _subscription_id: u32,
        _items: &[(Arc<MonitoredItemHandle>, Vec<Variant>)],
    ) {
    }

    fn on_status_changed(&self, _subscription_id: u32, _status: StatusCode) {}

    /// No publish traffic arrived within the watchdog interval.
    fn on_watchdog_timer_elapsed(&self, _subscription_id: u32) {}
}
