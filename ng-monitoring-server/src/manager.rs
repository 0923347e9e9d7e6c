use crate::{
    event::EventSource,
    filter::{EventTypeTree, TypeHierarchy},
    subscription::Subscription,
};
use dashmap::DashMap;
use ng_monitoring_error::{MonitoringError, MonitoringResult};
use ng_monitoring_types::{
    CreateSubscriptionResult, MonitoringSettings, RevisedSubscription, ServerLimits,
    SubscriptionParameters,
};
use opcua::types::{NodeId, StatusCode};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use tracing::info;

/// Registry of the subscriptions of a server session.
pub struct SubscriptionManager {
    limits: Arc<ServerLimits>,
    types: Arc<dyn TypeHierarchy>,
    subscriptions: DashMap<u32, Arc<Subscription>>,
    next_id: AtomicU32,
}

impl SubscriptionManager {
    /// Manager using the standard event type tree.
    pub fn new(limits: ServerLimits) -> Self {
        Self::with_type_hierarchy(limits, Arc::new(EventTypeTree::standard()))
    }

    pub fn with_type_hierarchy(limits: ServerLimits, types: Arc<dyn TypeHierarchy>) -> Self {
        Self {
            limits: Arc::new(limits),
            types,
            subscriptions: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn from_settings(settings: &MonitoringSettings) -> Self {
        Self::new(settings.server.clone())
    }

    #[inline]
    pub fn limits(&self) -> &ServerLimits {
        &self.limits
    }

    pub fn create_subscription(&self, params: &SubscriptionParameters) -> CreateSubscriptionResult {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscription = Arc::new(Subscription::new(
            id,
            params,
            Arc::clone(&self.limits),
            Arc::clone(&self.types),
        ));
        let revised = subscription.revised();
        self.subscriptions.insert(id, subscription);
        info!(
            subscription_id = id,
            publishing_interval = revised.publishing_interval,
            lifetime_count = revised.lifetime_count,
            max_keep_alive_count = revised.max_keep_alive_count,
            "subscription created"
        );
        CreateSubscriptionResult {
            subscription_id: id,
            revised,
        }
    }

    /// Looks up a subscription, failing with `BadSubscriptionIdInvalid`.
    pub fn subscription(&self, id: u32) -> MonitoringResult<Arc<Subscription>> {
        self.subscriptions
            .get(&id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(MonitoringError::Service(StatusCode::BadSubscriptionIdInvalid))
    }

    pub fn modify_subscription(
        &self,
        id: u32,
        params: &SubscriptionParameters,
    ) -> MonitoringResult<RevisedSubscription> {
        Ok(self.subscription(id)?.modify(params))
    }

    pub fn delete_subscriptions(&self, ids: &[u32]) -> MonitoringResult<Vec<StatusCode>> {
        if ids.is_empty() {
            return Err(MonitoringError::NothingToDo);
        }
        Ok(ids
            .iter()
            .map(|id| match self.subscriptions.remove(id) {
                Some(_) => {
                    info!(subscription_id = id, "subscription deleted");
                    StatusCode::Good
                }
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect())
    }

    pub fn set_publishing_mode(
        &self,
        enabled: bool,
        ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>> {
        if ids.is_empty() {
            return Err(MonitoringError::NothingToDo);
        }
        Ok(ids
            .iter()
            .map(|id| match self.subscription(*id) {
                Ok(subscription) => {
                    subscription.set_publishing_enabled(enabled);
                    StatusCode::Good
                }
                Err(e) => e.status_code(),
            })
            .collect())
    }

    pub fn subscription_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.subscriptions.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Dispatches an event to every subscription. Returns the number of
    /// items that queued it.
    pub fn on_event(&self, notifier: &NodeId, event: &dyn EventSource) -> usize {
        let subscriptions: Vec<Arc<Subscription>> = self
            .subscriptions
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        subscriptions
            .iter()
            .map(|s| s.on_event(notifier, event))
            .sum()
    }
}
