//! Client side of the monitoring core: monitored item handles, the
//! reconciliation planner, the publish watchdog and the subscription that
//! ties them to a [`SubscriptionServices`] transport.

pub mod failure;
pub mod item;
pub mod listener;
pub mod reconcile;
pub mod services;
pub mod subscription;
pub mod watchdog;

pub use failure::MonitoredItemFailureKind;
pub use item::{
    HandleSnapshot, MonitoredItemHandle, MonitoredItemState, RequestedParameters,
    RevisedParameters,
};
pub use listener::SubscriptionListener;
pub use reconcile::{MonitoredItemOperationResult, SyncPlan};
pub use services::SubscriptionServices;
pub use subscription::{calculate_counts, Subscription, SyncState, DEFAULT_EVENT_QUEUE_SIZE};
pub use watchdog::{WatchdogState, WatchdogTimer};
