#![allow(dead_code)]

use async_trait::async_trait;
use ng_monitoring_client::{MonitoredItemHandle, Subscription, SubscriptionListener, SubscriptionServices};
use ng_monitoring_error::{MonitoringError, MonitoringResult};
use ng_monitoring_server::SubscriptionManager;
use ng_monitoring_types::{
    CreateSubscriptionResult, Notification, RevisedSubscription, ServerLimits, SetTriggeringResult,
    SubscriptionParameters,
};
use opcua::types::{
    DataValue, MonitoredItemCreateRequest, MonitoredItemCreateResult, MonitoredItemModifyRequest,
    MonitoredItemModifyResult, MonitoringMode, StatusCode, TimestampsToReturn, Variant,
};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex, Once,
};
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

/// In-process services backed by the server crate's subscription manager.
/// Records the batch size of every monitored-item call.
pub struct LocalServices {
    pub manager: SubscriptionManager,
    calls: Mutex<Vec<(&'static str, usize)>>,
}

impl LocalServices {
    pub fn new(limits: ServerLimits) -> Arc<Self> {
        Arc::new(Self {
            manager: SubscriptionManager::new(limits),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Batch sizes of every call to `operation`, in call order.
    pub fn calls(&self, operation: &str) -> Vec<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, n)| *n)
            .collect()
    }

    fn record(&self, operation: &'static str, count: usize) {
        self.calls.lock().unwrap().push((operation, count));
    }
}

#[async_trait]
impl SubscriptionServices for LocalServices {
    async fn create_subscription(
        &self,
        params: &SubscriptionParameters,
    ) -> MonitoringResult<CreateSubscriptionResult> {
        Ok(self.manager.create_subscription(params))
    }

    async fn modify_subscription(
        &self,
        subscription_id: u32,
        params: &SubscriptionParameters,
    ) -> MonitoringResult<RevisedSubscription> {
        self.manager.modify_subscription(subscription_id, params)
    }

    async fn delete_subscriptions(
        &self,
        subscription_ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>> {
        self.record("delete_subscriptions", subscription_ids.len());
        self.manager.delete_subscriptions(subscription_ids)
    }

    async fn set_publishing_mode(
        &self,
        publishing_enabled: bool,
        subscription_ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>> {
        self.manager
            .set_publishing_mode(publishing_enabled, subscription_ids)
    }

    async fn create_monitored_items(
        &self,
        subscription_id: u32,
        timestamps: TimestampsToReturn,
        items: &[MonitoredItemCreateRequest],
    ) -> MonitoringResult<Vec<MonitoredItemCreateResult>> {
        self.record("create_monitored_items", items.len());
        self.manager
            .subscription(subscription_id)?
            .create_monitored_items(timestamps, items)
    }

    async fn modify_monitored_items(
        &self,
        subscription_id: u32,
        _timestamps: TimestampsToReturn,
        items: &[MonitoredItemModifyRequest],
    ) -> MonitoringResult<Vec<MonitoredItemModifyResult>> {
        self.record("modify_monitored_items", items.len());
        self.manager
            .subscription(subscription_id)?
            .modify_monitored_items(items)
    }

    async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>> {
        self.record("delete_monitored_items", monitored_item_ids.len());
        self.manager
            .subscription(subscription_id)?
            .delete_monitored_items(monitored_item_ids)
    }

    async fn set_monitoring_mode(
        &self,
        subscription_id: u32,
        mode: MonitoringMode,
        monitored_item_ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>> {
        self.record("set_monitoring_mode", monitored_item_ids.len());
        self.manager
            .subscription(subscription_id)?
            .set_monitoring_mode(mode, monitored_item_ids)
    }

    async fn set_triggering(
        &self,
        subscription_id: u32,
        triggering_item_id: u32,
        links_to_add: &[u32],
        links_to_remove: &[u32],
    ) -> MonitoringResult<SetTriggeringResult> {
        self.manager.subscription(subscription_id)?.set_triggering(
            triggering_item_id,
            links_to_add,
            links_to_remove,
        )
    }
}

/// Runs one publish cycle: drains the server subscription and feeds the
/// client. Sends a keep-alive when nothing is queued. Returns the number of
/// notifications delivered.
pub fn pump(services: &LocalServices, subscription: &Subscription) -> MonitoringResult<usize> {
    let id = subscription
        .subscription_id()
        .ok_or(MonitoringError::Service(StatusCode::BadNoSubscription))?;
    let notifications = services.manager.subscription(id)?.gather(0);
    let count = notifications.len();
    if count == 0 {
        subscription.on_keep_alive();
        return Ok(0);
    }

    let mut data = Vec::new();
    let mut events = Vec::new();
    for notification in notifications {
        match notification {
            Notification::DataChange(n) => data.push(n),
            Notification::Event(e) => events.push(e),
        }
    }
    if !data.is_empty() {
        subscription.on_data_change(data);
    }
    if !events.is_empty() {
        subscription.on_events(events);
    }
    Ok(count)
}

/// What a [`Recorder`] saw.
#[derive(Default)]
pub struct Recorded {
    pub keep_alives: AtomicU32,
    pub watchdog_fired: AtomicU32,
    pub data: Mutex<Vec<(u32, DataValue)>>,
    pub events: Mutex<Vec<(u32, Vec<Variant>)>>,
    pub statuses: Mutex<Vec<StatusCode>>,
}

impl Recorded {
    pub fn watchdog_count(&self) -> u32 {
        self.watchdog_fired.load(Ordering::SeqCst)
    }
}

pub struct Recorder(pub Arc<Recorded>);

impl Recorder {
    pub fn new() -> (Self, Arc<Recorded>) {
        let recorded = Arc::new(Recorded::default());
        (Self(Arc::clone(&recorded)), recorded)
    }
}

impl SubscriptionListener for Recorder {
    fn on_keep_alive(&self, _subscription_id: u32) {
        self.0.keep_alives.fetch_add(1, Ordering::SeqCst);
    }

    fn on_data_received(&self, _subscription_id: u32, items: &[(Arc<MonitoredItemHandle>, DataValue)]) {
        let mut data = self.0.data.lock().unwrap();
        data.extend(
            items
                .iter()
                .map(|(handle, value)| (handle.client_handle(), value.clone())),
        );
    }

    fn on_events_received(
        &self,
        _subscription_id: u32,
        items: &[(Arc<MonitoredItemHandle>, Vec<Variant>)],
    ) {
        let mut events = self.0.events.lock().unwrap();
        events.extend(
            items
                .iter()
                .map(|(handle, fields)| (handle.client_handle(), fields.clone())),
        );
    }

    fn on_status_changed(&self, _subscription_id: u32, status: StatusCode) {
        self.0.statuses.lock().unwrap().push(status);
    }

    fn on_watchdog_timer_elapsed(&self, _subscription_id: u32) {
        self.0.watchdog_fired.fetch_add(1, Ordering::SeqCst);
    }
}
