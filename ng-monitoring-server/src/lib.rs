//! Server half of the monitoring core: notification queues, data and event
//! monitored items, event filter evaluation and the subscription aggregate
//! that owns them.

pub mod event;
pub mod filter;
pub mod item;
pub mod manager;
pub mod queue;
pub mod revise;
pub mod subscription;

pub use event::{BaseEvent, EventSource};
pub use filter::{EventTypeTree, FilterEvaluator, TypeHierarchy};
pub use item::{MonitoredDataItem, MonitoredEventItem, MonitoredItem, MonitoredItemKind};
pub use manager::SubscriptionManager;
pub use queue::{NotificationQueue, QueueEntry, MAX_QUEUE_SIZE};
pub use revise::{revise_publishing_interval, revise_sampling_interval, revise_subscription};
pub use subscription::Subscription;
