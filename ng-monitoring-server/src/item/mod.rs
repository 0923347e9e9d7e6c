mod data;
mod event;

pub use data::MonitoredDataItem;
pub use event::MonitoredEventItem;

use ng_monitoring_types::Notification;
use opcua::types::{
    MonitoredItemModifyResult, MonitoringMode, MonitoringParameters, ReadValueId,
    TimestampsToReturn,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

/// Contract shared by data and event monitored items.
///
/// Each implementation keeps its mutable state behind its own mutex; the
/// `triggered` flag is atomic so a triggering item can set it on its
/// dependents without taking their locks.
pub trait MonitoredItem: Send + Sync {
    fn id(&self) -> u32;
    fn subscription_id(&self) -> u32;
    fn read_value_id(&self) -> &ReadValueId;
    fn client_handle(&self) -> u32;
    fn monitoring_mode(&self) -> MonitoringMode;
    fn set_monitoring_mode(&self, mode: MonitoringMode);
    fn sampling_interval(&self) -> f64;
    fn queue_size(&self) -> u32;
    fn discard_oldest(&self) -> bool;
    fn has_notifications(&self) -> bool;
    fn is_triggered(&self) -> bool;
    fn set_triggered(&self, triggered: bool);

    /// Removes up to `max` queued notifications. When anything was drained
    /// the `dependents` are marked triggered before the item lock is
    /// released; an item left empty clears its own triggered flag.
    fn drain(&self, max: usize, dependents: &[Arc<dyn MonitoredItem>]) -> Vec<Notification>;

    /// Re-validates the filter and applies the new parameters. A rejected
    /// filter leaves the item unchanged.
    fn modify(&self, sampling_interval: f64, params: &MonitoringParameters)
        -> MonitoredItemModifyResult;
}

/// Concrete item stored by a subscription.
#[derive(Debug, Clone)]
pub enum MonitoredItemKind {
    Data(Arc<MonitoredDataItem>),
    Event(Arc<MonitoredEventItem>),
}

impl MonitoredItemKind {
    pub fn as_item(&self) -> Arc<dyn MonitoredItem> {
        match self {
            MonitoredItemKind::Data(item) => item.clone(),
            MonitoredItemKind::Event(item) => item.clone(),
        }
    }

    pub fn as_data(&self) -> Option<&Arc<MonitoredDataItem>> {
        match self {
            MonitoredItemKind::Data(item) => Some(item),
            MonitoredItemKind::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&Arc<MonitoredEventItem>> {
        match self {
            MonitoredItemKind::Event(item) => Some(item),
            MonitoredItemKind::Data(_) => None,
        }
    }
}

/// Immutable identity plus the lock-free triggered flag.
#[derive(Debug)]
pub(crate) struct ItemBase {
    pub id: u32,
    pub subscription_id: u32,
    pub read_value_id: ReadValueId,
    pub timestamps: TimestampsToReturn,
    triggered: AtomicBool,
}

impl ItemBase {
    pub fn new(
        id: u32,
        subscription_id: u32,
        read_value_id: ReadValueId,
        timestamps: TimestampsToReturn,
    ) -> Self {
        Self {
            id,
            subscription_id,
            read_value_id,
            timestamps,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    pub fn set_triggered(&self, triggered: bool) {
        self.triggered.store(triggered, Ordering::Release);
    }

    /// Bookkeeping after a drain, run while the caller still holds its lock.
    pub fn after_drain(&self, drained: usize, now_empty: bool, dependents: &[Arc<dyn MonitoredItem>]) {
        if drained > 0 {
            for dependent in dependents {
                dependent.set_triggered(true);
            }
        }
        if now_empty {
            self.set_triggered(false);
        }
    }
}

/// Locks item state, recovering the data of a poisoned mutex.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
