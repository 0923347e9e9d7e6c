use crate::{
    event::EventSource,
    filter::TypeHierarchy,
    item::{lock, MonitoredDataItem, MonitoredEventItem, MonitoredItem, MonitoredItemKind},
    revise::{revise_sampling_interval, revise_subscription},
};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use ng_monitoring_error::{MonitoringError, MonitoringResult};
use ng_monitoring_types::{
    attribute_id, failed_create, failed_modify, Notification, RevisedSubscription, ServerLimits,
    SetTriggeringResult, SubscriptionParameters,
};
use opcua::types::{
    AttributeId, DataValue, ExtensionObject, MonitoredItemCreateRequest, MonitoredItemCreateResult,
    MonitoredItemModifyRequest, MonitoredItemModifyResult, MonitoringMode, MonitoringParameters,
    NodeId, ObjectId, StatusCode, TimestampsToReturn,
};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tracing::{debug, info, trace};

/// Server-side subscription: owns its monitored items and the triggering
/// links between them.
///
/// Items are stored in a `DashMap` and each keeps its own lock, so sampling
/// and event dispatch never serialize on the subscription. Triggering links
/// are kept here rather than on the items.
pub struct Subscription {
    id: u32,
    limits: Arc<ServerLimits>,
    /// Event type hierarchy handed to every event item's filter.
    types: Arc<dyn TypeHierarchy>,
    /// Parameters as last revised against `limits`.
    revised: ArcSwap<RevisedSubscription>,
    publishing_enabled: AtomicBool,
    priority: AtomicU8,
    /// Next monitored item id; ids are never reused.
    next_item_id: AtomicU32,
    items: DashMap<u32, MonitoredItemKind>,
    /// triggering item id -> linked item ids
    triggers: Mutex<HashMap<u32, BTreeSet<u32>>>,
    /// Rotating start position for `gather`.
    cursor: AtomicUsize,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("revised", &self.revised())
            .field("publishing_enabled", &self.publishing_enabled())
            .field("items", &self.items.len())
            .finish()
    }
}

impl Subscription {
    pub fn new(
        id: u32,
        params: &SubscriptionParameters,
        limits: Arc<ServerLimits>,
        types: Arc<dyn TypeHierarchy>,
    ) -> Self {
        let revised = revise_subscription(params, &limits);
        Self {
            id,
            limits,
            types,
            revised: ArcSwap::from_pointee(revised),
            publishing_enabled: AtomicBool::new(params.publishing_enabled),
            priority: AtomicU8::new(params.priority),
            next_item_id: AtomicU32::new(1),
            items: DashMap::new(),
            triggers: Mutex::new(HashMap::new()),
            cursor: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn revised(&self) -> RevisedSubscription {
        **self.revised.load()
    }

    #[inline]
    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled.load(Ordering::Acquire)
    }

    pub fn set_publishing_enabled(&self, enabled: bool) {
        self.publishing_enabled.store(enabled, Ordering::Release);
        debug!(subscription_id = self.id, enabled, "publishing mode set");
    }

    pub fn priority(&self) -> u8 {
        self.priority.load(Ordering::Relaxed)
    }

    /// Re-revises the subscription parameters. Sampling intervals of existing
    /// items are left as they are.
    pub fn modify(&self, params: &SubscriptionParameters) -> RevisedSubscription {
        let revised = revise_subscription(params, &self.limits);
        self.revised.store(Arc::new(revised));
        self.priority.store(params.priority, Ordering::Relaxed);
        info!(
            subscription_id = self.id,
            publishing_interval = revised.publishing_interval,
            lifetime_count = revised.lifetime_count,
            max_keep_alive_count = revised.max_keep_alive_count,
            "subscription modified"
        );
        revised
    }

    pub fn item(&self, id: u32) -> Option<MonitoredItemKind> {
        self.items.get(&id).map(|e| e.value().clone())
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Items linked to `triggering_id`, in id order.
    pub fn triggered_by(&self, triggering_id: u32) -> Vec<u32> {
        lock(&self.triggers)
            .get(&triggering_id)
            .map(|links| links.iter().copied().collect())
            .unwrap_or_default()
    }

    fn check_batch(&self, len: usize) -> MonitoringResult<()> {
        if len == 0 {
            return Err(MonitoringError::NothingToDo);
        }
        let max = self.limits.max_monitored_items_per_call as usize;
        if max > 0 && len > max {
            return Err(MonitoringError::TooManyOperations {
                requested: len,
                max,
            });
        }
        Ok(())
    }

    fn bounded(&self, mut params: MonitoringParameters) -> MonitoringParameters {
        params.queue_size = params.queue_size.min(self.limits.max_queue_size);
        params
    }

    pub fn create_monitored_items(
        &self,
        timestamps: TimestampsToReturn,
        requests: &[MonitoredItemCreateRequest],
    ) -> MonitoringResult<Vec<MonitoredItemCreateResult>> {
        self.check_batch(requests.len())?;
        let publishing_interval = self.revised().publishing_interval;
        let results: Vec<MonitoredItemCreateResult> = requests
            .iter()
            .map(|request| self.create_item(request, timestamps, publishing_interval))
            .collect();
        debug!(
            subscription_id = self.id,
            requested = requests.len(),
            created = results.iter().filter(|r| r.status_code.is_good()).count(),
            "create monitored items"
        );
        Ok(results)
    }

    fn create_item(
        &self,
        request: &MonitoredItemCreateRequest,
        timestamps: TimestampsToReturn,
        publishing_interval: f64,
    ) -> MonitoredItemCreateResult {
        let target = &request.item_to_monitor;
        if target.node_id.is_null() {
            return failed_create(StatusCode::BadNodeIdInvalid);
        }
        let Some(attribute) = attribute_id(target.attribute_id) else {
            return failed_create(StatusCode::BadAttributeIdInvalid);
        };

        let request = MonitoredItemCreateRequest {
            requested_parameters: self.bounded(request.requested_parameters.clone()),
            ..request.clone()
        };
        let id = self.next_item_id.fetch_add(1, Ordering::Relaxed);

        let (kind, sampling_interval, filter_result) = if attribute == AttributeId::EventNotifier {
            match MonitoredEventItem::new(id, self.id, &request, Arc::clone(&self.types)) {
                Ok(item) => {
                    let filter_result = item.filter_result();
                    let filter_result = ExtensionObject::from_message(filter_result);
                    (MonitoredItemKind::Event(Arc::new(item)), 0.0, filter_result)
                }
                Err((status, filter_result)) => {
                    return MonitoredItemCreateResult {
                        filter_result: filter_result
                            .map(ExtensionObject::from_message)
                            .unwrap_or_else(ExtensionObject::null),
                        ..failed_create(status)
                    }
                }
            }
        } else {
            let sampling_interval = revise_sampling_interval(
                request.requested_parameters.sampling_interval,
                publishing_interval,
                &self.limits,
            );
            match MonitoredDataItem::new(id, self.id, &request, sampling_interval, timestamps) {
                Ok(item) => (
                    MonitoredItemKind::Data(Arc::new(item)),
                    sampling_interval,
                    ExtensionObject::null(),
                ),
                Err(status) => return failed_create(status),
            }
        };

        let revised_queue_size = kind.as_item().queue_size();
        self.items.insert(id, kind);
        trace!(
            subscription_id = self.id,
            monitored_item_id = id,
            node_id = %target.node_id,
            "monitored item created"
        );
        MonitoredItemCreateResult {
            status_code: StatusCode::Good,
            monitored_item_id: id,
            revised_sampling_interval: sampling_interval,
            revised_queue_size,
            filter_result,
        }
    }

    pub fn modify_monitored_items(
        &self,
        requests: &[MonitoredItemModifyRequest],
    ) -> MonitoringResult<Vec<MonitoredItemModifyResult>> {
        self.check_batch(requests.len())?;
        let publishing_interval = self.revised().publishing_interval;
        let results = requests
            .iter()
            .map(|request| {
                let Some(kind) = self.item(request.monitored_item_id) else {
                    return failed_modify(StatusCode::BadMonitoredItemIdInvalid);
                };
                let params = self.bounded(request.requested_parameters.clone());
                let sampling_interval = match kind {
                    MonitoredItemKind::Event(_) => 0.0,
                    MonitoredItemKind::Data(_) => revise_sampling_interval(
                        params.sampling_interval,
                        publishing_interval,
                        &self.limits,
                    ),
                };
                kind.as_item().modify(sampling_interval, &params)
            })
            .collect();
        debug!(
            subscription_id = self.id,
            requested = requests.len(),
            "modify monitored items"
        );
        Ok(results)
    }

    /// Removes items and every triggering link that mentions them.
    pub fn delete_monitored_items(&self, item_ids: &[u32]) -> MonitoringResult<Vec<StatusCode>> {
        self.check_batch(item_ids.len())?;
        let results = item_ids
            .iter()
            .map(|id| match self.items.remove(id) {
                Some(_) => StatusCode::Good,
                None => StatusCode::BadMonitoredItemIdInvalid,
            })
            .collect();

        let mut triggers = lock(&self.triggers);
        for id in item_ids {
            triggers.remove(id);
        }
        triggers.retain(|_, links| {
            for id in item_ids {
                links.remove(id);
            }
            !links.is_empty()
        });
        drop(triggers);

        debug!(
            subscription_id = self.id,
            requested = item_ids.len(),
            "delete monitored items"
        );
        Ok(results)
    }

    pub fn set_monitoring_mode(
        &self,
        mode: MonitoringMode,
        item_ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>> {
        self.check_batch(item_ids.len())?;
        Ok(item_ids
            .iter()
            .map(|id| match self.item(*id) {
                Some(kind) => {
                    kind.as_item().set_monitoring_mode(mode);
                    StatusCode::Good
                }
                None => StatusCode::BadMonitoredItemIdInvalid,
            })
            .collect())
    }

    /// Adds and removes triggering links of `triggering_id`. Removals are
    /// applied before additions.
    pub fn set_triggering(
        &self,
        triggering_id: u32,
        links_to_add: &[u32],
        links_to_remove: &[u32],
    ) -> MonitoringResult<SetTriggeringResult> {
        self.check_batch(links_to_add.len() + links_to_remove.len())?;
        if !self.items.contains_key(&triggering_id) {
            return Err(MonitoringError::Service(StatusCode::BadMonitoredItemIdInvalid));
        }

        let mut triggers = lock(&self.triggers);
        let links = triggers.entry(triggering_id).or_default();
        let remove_results = links_to_remove
            .iter()
            .map(|id| {
                if links.remove(id) {
                    StatusCode::Good
                } else {
                    StatusCode::BadMonitoredItemIdInvalid
                }
            })
            .collect();
        let add_results = links_to_add
            .iter()
            .map(|id| {
                if self.items.contains_key(id) {
                    links.insert(*id);
                    StatusCode::Good
                } else {
                    StatusCode::BadMonitoredItemIdInvalid
                }
            })
            .collect();
        if links.is_empty() {
            triggers.remove(&triggering_id);
        }

        Ok(SetTriggeringResult {
            add_results,
            remove_results,
        })
    }

    /// Feeds a sampled value to a data item. Returns `true` when it was
    /// queued.
    pub fn on_data_value(&self, item_id: u32, value: DataValue) -> bool {
        match self.item(item_id) {
            Some(MonitoredItemKind::Data(item)) => item.set_value(value),
            _ => false,
        }
    }

    pub fn on_quality(&self, item_id: u32, status: StatusCode) -> bool {
        match self.item(item_id) {
            Some(MonitoredItemKind::Data(item)) => item.set_quality(status),
            _ => false,
        }
    }

    /// Offers an event raised by `notifier` to the event items watching it.
    /// Items on the Server object see every event. Returns how many items
    /// queued it.
    pub fn on_event(&self, notifier: &NodeId, event: &dyn EventSource) -> usize {
        let server = NodeId::from(ObjectId::Server);
        let targets: Vec<Arc<MonitoredEventItem>> = self
            .items
            .iter()
            .filter_map(|e| e.value().as_event().cloned())
            .filter(|item| {
                let watched = &item.read_value_id().node_id;
                watched == notifier || *watched == server
            })
            .collect();
        targets.iter().filter(|item| item.on_event(event)).count()
    }

    /// Collects up to `max` notifications for one publish (0 uses the
    /// revised per-publish limit).
    ///
    /// Reporting items are drained first, starting at a rotating position so
    /// a small `max` does not starve the same items every cycle. Draining a
    /// triggering item marks its linked items, and triggered Sampling items
    /// are drained in a second pass.
    pub fn gather(&self, max: usize) -> Vec<Notification> {
        if !self.publishing_enabled() {
            return Vec::new();
        }
        let limit = match max {
            0 => self.revised().max_notifications_per_publish as usize,
            n => n,
        };
        let limit = if limit == 0 { usize::MAX } else { limit };

        let mut ids: Vec<u32> = self.items.iter().map(|e| *e.key()).collect();
        if ids.is_empty() {
            return Vec::new();
        }
        ids.sort_unstable();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % ids.len();
        ids.rotate_left(start);

        let items: Vec<Arc<dyn MonitoredItem>> = ids
            .iter()
            .filter_map(|id| self.items.get(id).map(|e| e.value().as_item()))
            .collect();
        let triggers = lock(&self.triggers).clone();

        let mut out = Vec::new();
        for item in items
            .iter()
            .filter(|item| item.monitoring_mode() == MonitoringMode::Reporting)
        {
            if out.len() >= limit {
                break;
            }
            let dependents: Vec<Arc<dyn MonitoredItem>> = triggers
                .get(&item.id())
                .map(|links| {
                    links
                        .iter()
                        .filter_map(|id| self.items.get(id).map(|e| e.value().as_item()))
                        .collect()
                })
                .unwrap_or_default();
            out.extend(item.drain(limit - out.len(), &dependents));
        }

        for item in items.iter().filter(|item| {
            item.monitoring_mode() == MonitoringMode::Sampling && item.is_triggered()
        }) {
            if out.len() >= limit {
                break;
            }
            out.extend(item.drain(limit - out.len(), &[]));
        }

        trace!(
            subscription_id = self.id,
            notifications = out.len(),
            "notifications gathered"
        );
        out
    }
}
