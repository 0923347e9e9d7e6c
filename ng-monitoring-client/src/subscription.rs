use crate::{
    failure::MonitoredItemFailureKind,
    item::{HandleSnapshot, MonitoredItemHandle, RequestedParameters, RevisedParameters},
    listener::SubscriptionListener,
    reconcile::{
        create_request, modify_request, partition, plan_creates, plan_deletes, plan_modifies,
        plan_mode_changes, plan_sync, MonitoredItemOperationResult,
    },
    services::SubscriptionServices,
    watchdog::{WatchdogState, WatchdogTimer},
};
use arc_swap::ArcSwapOption;
use ng_monitoring_error::{MonitoringError, MonitoringResult};
use ng_monitoring_types::{
    event_notifier, ClientSubscriptionConfig, MonitoringFilter, ReturnedTimestamps,
    RevisedSubscription, SetTriggeringResult, StatusCodeExt, SubscriptionParameters,
};
use opcua::types::{
    DataValue, EventFieldList, EventFilter, EventFilterResult, ExtensionObject,
    MonitoredItemNotification, MonitoringMode, NodeId, ReadValueId, StatusCode,
    TimestampsToReturn, Variant,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tracing::{debug, info, trace, warn};

/// Queue size requested for event items created through `add_event_item`.
pub const DEFAULT_EVENT_QUEUE_SIZE: u32 = 100;

/// Synchronization state of a client subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not created on the server.
    Initial,
    /// Server holds the requested parameters.
    Synchronized,
    /// Requested parameters changed since the last create/modify.
    Unsynchronized,
}

type SharedListener = Arc<ArcSwapOption<Box<dyn SubscriptionListener>>>;

struct SubState {
    sync_state: SyncState,
    /// Server id; `None` until created and after delete.
    subscription_id: Option<u32>,
    /// Parameters sent by the next create or modify.
    requested: SubscriptionParameters,
    /// Parameters the server last confirmed.
    revised: Option<RevisedSubscription>,
    config: ClientSubscriptionConfig,
    /// Live handles keyed by client handle.
    handles: BTreeMap<u32, Arc<MonitoredItemHandle>>,
    /// Removed handles whose server item still has to be deleted.
    pending_removes: BTreeMap<u32, Arc<MonitoredItemHandle>>,
}

impl SubState {
    fn mark_dirty(&mut self) {
        if self.sync_state == SyncState::Synchronized {
            self.sync_state = SyncState::Unsynchronized;
        }
    }

    fn recalculate_counts(&mut self) {
        if !self.config.lifetime_and_keep_alive_calculated {
            return;
        }
        let (lifetime, keep_alive) =
            calculate_counts(self.requested.publishing_interval, &self.config);
        self.requested.lifetime_count = lifetime;
        self.requested.max_keep_alive_count = keep_alive;
    }
}

/// Inputs of one reconciliation round, captured under the state lock.
struct Batch {
    subscription_id: u32,
    /// Largest batch per service call, 0 for no limit.
    max_per_call: usize,
    timestamps: TimestampsToReturn,
    /// Live and pending-remove handles, for mapping results back.
    handles: BTreeMap<u32, Arc<MonitoredItemHandle>>,
}

impl Batch {
    fn handle(&self, client_handle: u32) -> Option<&Arc<MonitoredItemHandle>> {
        self.handles.get(&client_handle)
    }
}

/// Derives `(lifetime_count, max_keep_alive_count)` from a publishing
/// interval so keep-alives arrive roughly every `target_keep_alive_interval`
/// and the lifetime stays within `[min_lifetime, max_lifetime]`.
pub fn calculate_counts(publishing_interval: f64, config: &ClientSubscriptionConfig) -> (u32, u32) {
    if !publishing_interval.is_finite() || publishing_interval <= 0.0 {
        return (config.lifetime_count, config.max_keep_alive_count);
    }
    let max_lifetime = floor_count(config.max_lifetime_ms / publishing_interval).max(3);
    // lifetime >= 3 * keep_alive must survive the max_lifetime cap
    let keep_alive = ceil_count(config.target_keep_alive_interval_ms / publishing_interval)
        .clamp(1, max_lifetime / 3);
    let lifetime = keep_alive
        .saturating_mul(3)
        .max(ceil_count(config.min_lifetime_ms / publishing_interval))
        .min(max_lifetime);
    (lifetime, keep_alive)
}

fn floor_count(ratio: f64) -> u32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio.floor().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn ceil_count(ratio: f64) -> u32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio.ceil().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn requested_from(config: &ClientSubscriptionConfig) -> SubscriptionParameters {
    SubscriptionParameters {
        publishing_interval: config.publishing_interval_ms,
        lifetime_count: config.lifetime_count,
        max_keep_alive_count: config.max_keep_alive_count,
        max_notifications_per_publish: config.max_notifications_per_publish,
        publishing_enabled: config.publishing_enabled,
        priority: config.priority,
    }
}

/// Client view of one subscription.
///
/// Requested subscription parameters and monitored item handles are edited
/// locally and pushed to the server by `create`, `modify` and
/// `synchronize_monitored_items`. Those async operations are serialized per
/// subscription; the intake methods (`on_keep_alive`, `on_data_change`, ...)
/// are synchronous and may run concurrently with them.
pub struct Subscription {
    services: Arc<dyn SubscriptionServices>,
    op_lock: tokio::sync::Mutex<()>,
    state: Mutex<SubState>,
    listener: SharedListener,
    /// Mirrors the server id for the watchdog callback, 0 while not created.
    id: Arc<AtomicU32>,
    watchdog: WatchdogTimer,
    next_client_handle: AtomicU32,
}

impl Subscription {
    pub fn new(services: Arc<dyn SubscriptionServices>, config: ClientSubscriptionConfig) -> Self {
        let listener: SharedListener = Arc::new(ArcSwapOption::empty());
        let id = Arc::new(AtomicU32::new(0));
        let watchdog = {
            let listener = Arc::clone(&listener);
            let id = Arc::clone(&id);
            WatchdogTimer::new(move || {
                let subscription_id = id.load(Ordering::Acquire);
                warn!(subscription_id, "publish watchdog elapsed without traffic");
                if let Some(listener) = &*listener.load() {
                    listener.on_watchdog_timer_elapsed(subscription_id);
                }
            })
        };

        let mut state = SubState {
            sync_state: SyncState::Initial,
            subscription_id: None,
            requested: requested_from(&config),
            revised: None,
            config,
            handles: BTreeMap::new(),
            pending_removes: BTreeMap::new(),
        };
        state.recalculate_counts();

        Self {
            services,
            op_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(state),
            listener,
            id,
            watchdog,
            next_client_handle: AtomicU32::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_listener(&self, listener: impl SubscriptionListener + 'static) {
        let listener: Box<dyn SubscriptionListener> = Box::new(listener);
        self.listener.store(Some(Arc::new(listener)));
    }

    pub fn clear_listener(&self) {
        self.listener.store(None);
    }

    // ----- subscription lifecycle -----

    /// Creates the subscription on the server and arms the watchdog.
    pub async fn create(&self) -> MonitoringResult<u32> {
        let _op = self.op_lock.lock().await;
        let params = {
            let state = self.lock();
            if state.sync_state != SyncState::Initial {
                return Err(MonitoringError::InvalidState(
                    "subscription already created".to_string(),
                ));
            }
            state.requested.clone()
        };

        let result = self.services.create_subscription(&params).await?;
        let subscription_id = result.subscription_id;
        {
            let mut state = self.lock();
            state.subscription_id = Some(subscription_id);
            state.revised = Some(result.revised);
            state.sync_state = SyncState::Synchronized;
        }
        self.id.store(subscription_id, Ordering::Release);
        self.arm_watchdog(&result.revised);

        info!(
            subscription_id,
            publishing_interval = result.revised.publishing_interval,
            lifetime_count = result.revised.lifetime_count,
            max_keep_alive_count = result.revised.max_keep_alive_count,
            "subscription created"
        );
        Ok(subscription_id)
    }

    /// Sends the requested parameters to the server and re-arms the watchdog
    /// with the revised ones.
    pub async fn modify(&self) -> MonitoringResult<RevisedSubscription> {
        let _op = self.op_lock.lock().await;
        let (subscription_id, params) = {
            let state = self.lock();
            let Some(subscription_id) = state.subscription_id else {
                return Err(MonitoringError::InvalidState(
                    "subscription not created".to_string(),
                ));
            };
            (subscription_id, state.requested.clone())
        };

        let revised = self
            .services
            .modify_subscription(subscription_id, &params)
            .await?;
        {
            let mut state = self.lock();
            state.revised = Some(revised);
            state.sync_state = SyncState::Synchronized;
        }
        self.arm_watchdog(&revised);

        info!(
            subscription_id,
            publishing_interval = revised.publishing_interval,
            lifetime_count = revised.lifetime_count,
            max_keep_alive_count = revised.max_keep_alive_count,
            "subscription modified"
        );
        Ok(revised)
    }

    /// Deletes the subscription on the server. Local state returns to
    /// `Initial` whatever the server answers; a transport failure is still
    /// reported to the caller.
    pub async fn delete(&self) -> MonitoringResult<()> {
        let _op = self.op_lock.lock().await;
        let Some(subscription_id) = self.lock().subscription_id else {
            return Ok(());
        };

        let result = self.services.delete_subscriptions(&[subscription_id]).await;

        self.watchdog.cancel();
        self.id.store(0, Ordering::Release);
        {
            let mut state = self.lock();
            state.sync_state = SyncState::Initial;
            state.subscription_id = None;
            state.revised = None;
            for handle in state.handles.values() {
                handle.detach();
            }
            for handle in state.pending_removes.values() {
                handle.detach();
            }
            state.pending_removes.clear();
        }

        match result {
            Ok(statuses) => {
                let status = statuses
                    .first()
                    .copied()
                    .unwrap_or(StatusCode::BadUnexpectedError);
                if status.is_good() {
                    info!(subscription_id, "subscription deleted");
                } else {
                    warn!(subscription_id, %status, "server rejected subscription delete");
                }
                Ok(())
            }
            Err(e) => {
                warn!(subscription_id, error = %e, "subscription delete failed");
                Err(e)
            }
        }
    }

    /// Enables or disables publishing. Before `create` this only updates the
    /// requested value.
    pub async fn set_publishing_mode(&self, publishing_enabled: bool) -> MonitoringResult<()> {
        let _op = self.op_lock.lock().await;
        let subscription_id = {
            let mut state = self.lock();
            state.requested.publishing_enabled = publishing_enabled;
            state.subscription_id
        };
        let Some(subscription_id) = subscription_id else {
            return Ok(());
        };

        let statuses = self
            .services
            .set_publishing_mode(publishing_enabled, &[subscription_id])
            .await?;
        let status = statuses
            .first()
            .copied()
            .unwrap_or(StatusCode::BadUnexpectedError);
        if !status.is_good() {
            warn!(subscription_id, %status, "set publishing mode rejected");
            return Err(MonitoringError::Service(status));
        }
        debug!(subscription_id, publishing_enabled, "publishing mode set");
        Ok(())
    }

    fn arm_watchdog(&self, revised: &RevisedSubscription) {
        let multiplier = self.lock().config.watchdog_multiplier;
        let interval_ms =
            revised.publishing_interval * f64::from(revised.max_keep_alive_count) * multiplier;
        if interval_ms.is_finite() && interval_ms > 0.0 {
            self.watchdog
                .arm(Duration::from_secs_f64(interval_ms / 1_000.0));
        } else {
            warn!(interval_ms, "watchdog disabled, interval out of range");
            self.watchdog.cancel();
        }
    }

    // ----- monitored item handles -----

    /// Registers a handle; it is created on the server by the next
    /// synchronization.
    pub fn add_monitored_item(
        &self,
        target: ReadValueId,
        requested: RequestedParameters,
    ) -> Arc<MonitoredItemHandle> {
        let client_handle = self.next_client_handle.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(MonitoredItemHandle::new(client_handle, target, requested));
        self.lock()
            .handles
            .insert(client_handle, Arc::clone(&handle));
        trace!(client_handle, "monitored item handle added");
        handle
    }

    /// Value attribute of `node_id` with the configured sampling defaults.
    pub fn add_data_item(&self, node_id: NodeId) -> Arc<MonitoredItemHandle> {
        let requested = {
            let state = self.lock();
            RequestedParameters {
                sampling_interval: state.config.default_sampling_interval_ms,
                queue_size: state.config.default_queue_size,
                discard_oldest: true,
                filter: MonitoringFilter::None,
                monitoring_mode: MonitoringMode::Reporting,
            }
        };
        self.add_monitored_item(ReadValueId::new_value(node_id), requested)
    }

    pub fn add_event_item(&self, notifier: NodeId, filter: EventFilter) -> Arc<MonitoredItemHandle> {
        self.add_monitored_item(
            event_notifier(notifier),
            RequestedParameters {
                sampling_interval: 0.0,
                queue_size: DEFAULT_EVENT_QUEUE_SIZE,
                discard_oldest: true,
                filter: MonitoringFilter::Event(filter),
                monitoring_mode: MonitoringMode::Reporting,
            },
        )
    }

    /// Unregisters a handle. A handle attached to a server item is deleted
    /// there by the next synchronization.
    pub fn remove_monitored_item(&self, client_handle: u32) -> Option<Arc<MonitoredItemHandle>> {
        let mut state = self.lock();
        let handle = state.handles.remove(&client_handle)?;
        if handle.monitored_item_id().is_some() {
            state
                .pending_removes
                .insert(client_handle, Arc::clone(&handle));
        }
        trace!(client_handle, "monitored item handle removed");
        Some(handle)
    }

    pub fn monitored_item(&self, client_handle: u32) -> Option<Arc<MonitoredItemHandle>> {
        self.lock().handles.get(&client_handle).cloned()
    }

    pub fn monitored_items(&self) -> Vec<Arc<MonitoredItemHandle>> {
        self.lock().handles.values().cloned().collect()
    }

    pub fn monitored_item_count(&self) -> usize {
        self.lock().handles.len()
    }

    // ----- reconciliation -----

    fn batch(&self) -> MonitoringResult<(Batch, Vec<HandleSnapshot>, Vec<HandleSnapshot>)> {
        let state = self.lock();
        let Some(subscription_id) = state.subscription_id else {
            return Err(MonitoringError::InvalidState(
                "subscription not created".to_string(),
            ));
        };
        let active: Vec<HandleSnapshot> = state.handles.values().map(|h| h.snapshot()).collect();
        let removed: Vec<HandleSnapshot> = state
            .pending_removes
            .values()
            .map(|h| h.snapshot())
            .collect();
        let handles = state
            .handles
            .iter()
            .chain(state.pending_removes.iter())
            .map(|(k, v)| (*k, Arc::clone(v)))
            .collect();
        Ok((
            Batch {
                subscription_id,
                max_per_call: state.config.max_monitored_items_per_call,
                timestamps: TimestampsToReturn::from(state.config.timestamps_to_return),
                handles,
            },
            active,
            removed,
        ))
    }

    /// Brings the server in line with the handles: deletes removed items,
    /// creates new ones, modifies changed ones and applies monitoring mode
    /// changes. Returns the number of items successfully affected.
    pub async fn synchronize_monitored_items(&self) -> MonitoringResult<usize> {
        let _op = self.op_lock.lock().await;
        let (batch, active, removed) = self.batch()?;
        let plan = plan_sync(&active, &removed);
        if plan.is_empty() {
            trace!(subscription_id = batch.subscription_id, "monitored items in sync");
            return Ok(0);
        }

        let mut results = self.delete_batch(&batch, &plan.deletes).await;
        results.extend(self.create_batch(&batch, &plan.creates).await);
        results.extend(self.modify_batch(&batch, &plan.modifies).await);
        for (mode, items) in &plan.mode_changes {
            results.extend(self.mode_batch(&batch, *mode, items).await);
        }

        let affected: BTreeSet<u32> = results
            .iter()
            .filter(|r| r.is_good())
            .map(|r| r.client_handle)
            .collect();
        debug!(
            subscription_id = batch.subscription_id,
            creates = plan.creates.len(),
            deletes = plan.deletes.len(),
            modifies = plan.modifies.len(),
            affected = affected.len(),
            "monitored items synchronized"
        );
        Ok(affected.len())
    }

    /// Creates every handle not yet attached to a server item.
    pub async fn create_monitored_items(
        &self,
    ) -> MonitoringResult<Vec<MonitoredItemOperationResult>> {
        let _op = self.op_lock.lock().await;
        let (batch, active, _) = self.batch()?;
        Ok(self.create_batch(&batch, &plan_creates(&active)).await)
    }

    /// Pushes changed parameters of attached handles, monitoring mode
    /// included.
    pub async fn modify_monitored_items(
        &self,
    ) -> MonitoringResult<Vec<MonitoredItemOperationResult>> {
        let _op = self.op_lock.lock().await;
        let (batch, active, _) = self.batch()?;
        let mut results = self.modify_batch(&batch, &plan_modifies(&active)).await;
        for (mode, items) in &plan_mode_changes(&active) {
            results.extend(self.mode_batch(&batch, *mode, items).await);
        }
        Ok(results)
    }

    /// Deletes the server items of removed handles.
    pub async fn delete_monitored_items(
        &self,
    ) -> MonitoringResult<Vec<MonitoredItemOperationResult>> {
        let _op = self.op_lock.lock().await;
        let (batch, _, removed) = self.batch()?;
        Ok(self.delete_batch(&batch, &plan_deletes(&removed)).await)
    }

    /// Links `links_to_add` to (and unlinks `links_to_remove` from) the
    /// triggering item. Every handle involved must be attached.
    pub async fn set_triggering(
        &self,
        triggering: &MonitoredItemHandle,
        links_to_add: &[Arc<MonitoredItemHandle>],
        links_to_remove: &[Arc<MonitoredItemHandle>],
    ) -> MonitoringResult<SetTriggeringResult> {
        let _op = self.op_lock.lock().await;
        let Some(subscription_id) = self.lock().subscription_id else {
            return Err(MonitoringError::InvalidState(
                "subscription not created".to_string(),
            ));
        };
        let attached = |h: &MonitoredItemHandle| {
            h.monitored_item_id().ok_or_else(|| {
                MonitoringError::InvalidState(format!(
                    "monitored item {} not created",
                    h.client_handle()
                ))
            })
        };
        let triggering_id = attached(triggering)?;
        let add = links_to_add
            .iter()
            .map(|h| attached(h.as_ref()))
            .collect::<MonitoringResult<Vec<u32>>>()?;
        let remove = links_to_remove
            .iter()
            .map(|h| attached(h.as_ref()))
            .collect::<MonitoringResult<Vec<u32>>>()?;

        let result = self
            .services
            .set_triggering(subscription_id, triggering_id, &add, &remove)
            .await?;
        debug!(
            subscription_id,
            triggering_item_id = triggering_id,
            added = add.len(),
            removed = remove.len(),
            "triggering links updated"
        );
        Ok(result)
    }

    async fn create_batch(
        &self,
        batch: &Batch,
        items: &[HandleSnapshot],
    ) -> Vec<MonitoredItemOperationResult> {
        let subscription_id = batch.subscription_id;
        let mut out = Vec::with_capacity(items.len());
        for chunk in partition(items, batch.max_per_call) {
            let requests: Vec<_> = chunk.iter().map(create_request).collect();
            debug!(subscription_id, count = requests.len(), "creating monitored items");
            let results = match self
                .services
                .create_monitored_items(subscription_id, batch.timestamps, &requests)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    out.extend(service_failure(batch, chunk.iter(), &e, "create"));
                    continue;
                }
            };

            for (i, snap) in chunk.iter().enumerate() {
                let Some(result) = results.get(i) else {
                    out.push(missing_result(subscription_id, snap, batch));
                    continue;
                };
                let status = result.status_code;
                if let Some(handle) = batch.handle(snap.client_handle) {
                    if status.is_good() {
                        handle.apply_created(
                            result.monitored_item_id,
                            snap.requested.clone(),
                            RevisedParameters {
                                sampling_interval: result.revised_sampling_interval,
                                queue_size: result.revised_queue_size,
                                filter_result: event_filter_result(&result.filter_result),
                                monitoring_mode: snap.requested.monitoring_mode,
                            },
                        );
                        self.keep_for_delete_if_removed(handle);
                        trace!(
                            subscription_id,
                            client_handle = snap.client_handle,
                            monitored_item_id = result.monitored_item_id,
                            "monitored item created"
                        );
                    } else {
                        handle.set_last_status(status);
                        log_item_failure(subscription_id, snap.client_handle, status, "create");
                    }
                }
                out.push(MonitoredItemOperationResult {
                    client_handle: snap.client_handle,
                    service_result: StatusCode::Good,
                    operation_result: status,
                });
            }
        }
        out
    }

    /// A handle removed while its create was in flight still owns a server
    /// item; queue it for deletion.
    fn keep_for_delete_if_removed(&self, handle: &Arc<MonitoredItemHandle>) {
        let mut state = self.lock();
        let client_handle = handle.client_handle();
        if !state.handles.contains_key(&client_handle) {
            state
                .pending_removes
                .insert(client_handle, Arc::clone(handle));
        }
    }

    async fn modify_batch(
        &self,
        batch: &Batch,
        items: &[HandleSnapshot],
    ) -> Vec<MonitoredItemOperationResult> {
        let subscription_id = batch.subscription_id;
        let (snaps, requests): (Vec<&HandleSnapshot>, Vec<_>) = items
            .iter()
            .filter_map(|snap| Some((snap, modify_request(snap)?)))
            .unzip();
        let mut out = Vec::with_capacity(snaps.len());
        for (snap_chunk, request_chunk) in partition(&snaps, batch.max_per_call)
            .zip(partition(&requests, batch.max_per_call))
        {
            debug!(subscription_id, count = request_chunk.len(), "modifying monitored items");
            let results = match self
                .services
                .modify_monitored_items(subscription_id, batch.timestamps, request_chunk)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    out.extend(service_failure(batch, snap_chunk.iter().copied(), &e, "modify"));
                    continue;
                }
            };

            for (i, snap) in snap_chunk.iter().enumerate() {
                let Some(result) = results.get(i) else {
                    out.push(missing_result(subscription_id, snap, batch));
                    continue;
                };
                let status = result.status_code;
                if let Some(handle) = batch.handle(snap.client_handle) {
                    if status.is_good() {
                        handle.apply_modified(
                            &snap.requested,
                            result.revised_sampling_interval,
                            result.revised_queue_size,
                            event_filter_result(&result.filter_result),
                        );
                    } else {
                        self.apply_item_failure(handle, status);
                        log_item_failure(subscription_id, snap.client_handle, status, "modify");
                    }
                }
                out.push(MonitoredItemOperationResult {
                    client_handle: snap.client_handle,
                    service_result: StatusCode::Good,
                    operation_result: status,
                });
            }
        }
        out
    }

    async fn delete_batch(
        &self,
        batch: &Batch,
        items: &[HandleSnapshot],
    ) -> Vec<MonitoredItemOperationResult> {
        let subscription_id = batch.subscription_id;
        let mut out = Vec::with_capacity(items.len());
        for chunk in partition(items, batch.max_per_call) {
            let ids: Vec<u32> = chunk.iter().filter_map(|s| s.monitored_item_id).collect();
            debug!(subscription_id, count = ids.len(), "deleting monitored items");
            let statuses = match self
                .services
                .delete_monitored_items(subscription_id, &ids)
                .await
            {
                Ok(statuses) => statuses,
                Err(e) => {
                    out.extend(service_failure(batch, chunk.iter(), &e, "delete"));
                    continue;
                }
            };

            for (i, snap) in chunk.iter().enumerate() {
                let Some(status) = statuses.get(i).copied() else {
                    out.push(missing_result(subscription_id, snap, batch));
                    continue;
                };
                // an unknown id means the server item is already gone
                let gone = status.is_good() || status.without_info_bits() == StatusCode::BadMonitoredItemIdInvalid;
                if let Some(handle) = batch.handle(snap.client_handle) {
                    if gone {
                        handle.detach();
                        handle.set_last_status(status);
                        self.lock().pending_removes.remove(&snap.client_handle);
                    } else {
                        handle.set_last_status(status);
                        log_item_failure(subscription_id, snap.client_handle, status, "delete");
                    }
                }
                out.push(MonitoredItemOperationResult {
                    client_handle: snap.client_handle,
                    service_result: StatusCode::Good,
                    operation_result: status,
                });
            }
        }
        out
    }

    async fn mode_batch(
        &self,
        batch: &Batch,
        mode: MonitoringMode,
        items: &[HandleSnapshot],
    ) -> Vec<MonitoredItemOperationResult> {
        let subscription_id = batch.subscription_id;
        let mut out = Vec::with_capacity(items.len());
        for chunk in partition(items, batch.max_per_call) {
            let ids: Vec<u32> = chunk.iter().filter_map(|s| s.monitored_item_id).collect();
            debug!(subscription_id, count = ids.len(), ?mode, "setting monitoring mode");
            let statuses = match self
                .services
                .set_monitoring_mode(subscription_id, mode, &ids)
                .await
            {
                Ok(statuses) => statuses,
                Err(e) => {
                    out.extend(service_failure(batch, chunk.iter(), &e, "set_monitoring_mode"));
                    continue;
                }
            };

            for (i, snap) in chunk.iter().enumerate() {
                let Some(status) = statuses.get(i).copied() else {
                    out.push(missing_result(subscription_id, snap, batch));
                    continue;
                };
                if let Some(handle) = batch.handle(snap.client_handle) {
                    if status.is_good() {
                        handle.apply_mode(mode);
                    } else {
                        self.apply_item_failure(handle, status);
                        log_item_failure(
                            subscription_id,
                            snap.client_handle,
                            status,
                            "set_monitoring_mode",
                        );
                    }
                }
                out.push(MonitoredItemOperationResult {
                    client_handle: snap.client_handle,
                    service_result: StatusCode::Good,
                    operation_result: status,
                });
            }
        }
        out
    }

    /// Records a failed modify or mode change. A server that no longer knows
    /// the item detaches the handle so the next synchronization recreates it.
    fn apply_item_failure(&self, handle: &MonitoredItemHandle, status: StatusCode) {
        if status.without_info_bits() == StatusCode::BadMonitoredItemIdInvalid {
            handle.detach();
        }
        handle.set_last_status(status);
    }

    // ----- notification intake -----

    pub fn on_keep_alive(&self) {
        self.watchdog.reset();
        let subscription_id = self.id.load(Ordering::Acquire);
        trace!(subscription_id, "keep-alive");
        if let Some(listener) = &*self.listener.load() {
            listener.on_keep_alive(subscription_id);
        }
    }

    /// Applies data change notifications to their handles and forwards them
    /// to the listener. Unknown client handles are skipped.
    pub fn on_data_change(&self, notifications: Vec<MonitoredItemNotification>) {
        self.watchdog.reset();
        let subscription_id = self.id.load(Ordering::Acquire);
        let items: Vec<(Arc<MonitoredItemHandle>, DataValue)> = {
            let state = self.lock();
            notifications
                .into_iter()
                .filter_map(|n| match state.handles.get(&n.client_handle) {
                    Some(handle) => Some((Arc::clone(handle), n.value)),
                    None => {
                        trace!(subscription_id, client_handle = n.client_handle, "unknown handle");
                        None
                    }
                })
                .collect()
        };
        for (handle, value) in &items {
            handle.set_last_value(value.clone());
        }
        if items.is_empty() {
            return;
        }
        if let Some(listener) = &*self.listener.load() {
            listener.on_data_received(subscription_id, &items);
        }
    }

    pub fn on_events(&self, events: Vec<EventFieldList>) {
        self.watchdog.reset();
        let subscription_id = self.id.load(Ordering::Acquire);
        let items: Vec<(Arc<MonitoredItemHandle>, Vec<Variant>)> = {
            let state = self.lock();
            events
                .into_iter()
                .filter_map(|e| match state.handles.get(&e.client_handle) {
                    Some(handle) => Some((Arc::clone(handle), e.event_fields.unwrap_or_default())),
                    None => {
                        trace!(subscription_id, client_handle = e.client_handle, "unknown handle");
                        None
                    }
                })
                .collect()
        };
        for (handle, fields) in &items {
            handle.set_last_event(fields.clone());
        }
        if items.is_empty() {
            return;
        }
        if let Some(listener) = &*self.listener.load() {
            listener.on_events_received(subscription_id, &items);
        }
    }

    pub fn on_status_change(&self, status: StatusCode) {
        self.watchdog.reset();
        let subscription_id = self.id.load(Ordering::Acquire);
        if status.is_good() {
            debug!(subscription_id, %status, "subscription status changed");
        } else {
            warn!(subscription_id, %status, "subscription status changed");
        }
        if let Some(listener) = &*self.listener.load() {
            listener.on_status_changed(subscription_id, status);
        }
    }

    // ----- accessors -----

    pub fn subscription_id(&self) -> Option<u32> {
        self.lock().subscription_id
    }

    pub fn sync_state(&self) -> SyncState {
        self.lock().sync_state
    }

    /// Requested parameters as they would be sent by the next create/modify.
    pub fn requested(&self) -> SubscriptionParameters {
        self.lock().requested.clone()
    }

    pub fn revised(&self) -> Option<RevisedSubscription> {
        self.lock().revised
    }

    pub fn publishing_interval(&self) -> f64 {
        self.lock().requested.publishing_interval
    }

    pub fn revised_publishing_interval(&self) -> Option<f64> {
        self.lock().revised.map(|r| r.publishing_interval)
    }

    /// Sets the requested publishing interval; with lifetime and keep-alive
    /// calculation enabled the counts follow it.
    pub fn set_publishing_interval(&self, publishing_interval: f64) {
        let mut state = self.lock();
        state.requested.publishing_interval = publishing_interval;
        state.recalculate_counts();
        state.mark_dirty();
    }

    pub fn lifetime_count(&self) -> u32 {
        self.lock().requested.lifetime_count
    }

    pub fn revised_lifetime_count(&self) -> Option<u32> {
        self.lock().revised.map(|r| r.lifetime_count)
    }

    pub fn set_lifetime_count(&self, lifetime_count: u32) {
        let mut state = self.lock();
        state.requested.lifetime_count = lifetime_count;
        state.mark_dirty();
    }

    pub fn max_keep_alive_count(&self) -> u32 {
        self.lock().requested.max_keep_alive_count
    }

    pub fn revised_max_keep_alive_count(&self) -> Option<u32> {
        self.lock().revised.map(|r| r.max_keep_alive_count)
    }

    pub fn set_max_keep_alive_count(&self, max_keep_alive_count: u32) {
        let mut state = self.lock();
        state.requested.max_keep_alive_count = max_keep_alive_count;
        state.mark_dirty();
    }

    pub fn max_notifications_per_publish(&self) -> u32 {
        self.lock().requested.max_notifications_per_publish
    }

    pub fn set_max_notifications_per_publish(&self, max: u32) {
        let mut state = self.lock();
        state.requested.max_notifications_per_publish = max;
        state.mark_dirty();
    }

    pub fn priority(&self) -> u8 {
        self.lock().requested.priority
    }

    pub fn set_priority(&self, priority: u8) {
        let mut state = self.lock();
        state.requested.priority = priority;
        state.mark_dirty();
    }

    pub fn publishing_enabled(&self) -> bool {
        self.lock().requested.publishing_enabled
    }

    pub fn lifetime_and_keep_alive_calculated(&self) -> bool {
        self.lock().config.lifetime_and_keep_alive_calculated
    }

    /// Turning the calculation on recomputes the counts immediately.
    pub fn set_lifetime_and_keep_alive_calculated(&self, calculated: bool) {
        let mut state = self.lock();
        state.config.lifetime_and_keep_alive_calculated = calculated;
        if calculated {
            state.recalculate_counts();
            state.mark_dirty();
        }
    }

    pub fn max_monitored_items_per_call(&self) -> usize {
        self.lock().config.max_monitored_items_per_call
    }

    /// 0 sends every batch in a single call.
    pub fn set_max_monitored_items_per_call(&self, max: usize) {
        self.lock().config.max_monitored_items_per_call = max;
    }

    pub fn set_timestamps_to_return(&self, timestamps: ReturnedTimestamps) {
        self.lock().config.timestamps_to_return = timestamps;
    }

    pub fn watchdog_state(&self) -> WatchdogState {
        self.watchdog.state()
    }

    pub fn watchdog_interval(&self) -> Option<Duration> {
        self.watchdog.interval()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.watchdog.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Subscription")
            .field("subscription_id", &state.subscription_id)
            .field("sync_state", &state.sync_state)
            .field("requested", &state.requested)
            .field("revised", &state.revised)
            .field("handles", &state.handles.len())
            .field("pending_removes", &state.pending_removes.len())
            .finish()
    }
}

fn event_filter_result(filter_result: &ExtensionObject) -> Option<EventFilterResult> {
    filter_result.inner_as::<EventFilterResult>().cloned()
}

fn log_item_failure(subscription_id: u32, client_handle: u32, status: StatusCode, operation: &str) {
    let failure_kind = MonitoredItemFailureKind::from(status);
    warn!(
        subscription_id,
        client_handle,
        %status,
        operation,
        failure_kind = failure_kind.as_str(),
        "monitored item operation failed"
    );
}

/// Records a failed service call as the result of every item it carried.
fn service_failure<'a>(
    batch: &Batch,
    chunk: impl ExactSizeIterator<Item = &'a HandleSnapshot>,
    error: &MonitoringError,
    operation: &str,
) -> Vec<MonitoredItemOperationResult> {
    let status = error.status_code();
    warn!(
        subscription_id = batch.subscription_id,
        operation,
        count = chunk.len(),
        error = %error,
        failure_kind = MonitoredItemFailureKind::from(status).as_str(),
        "monitored item service call failed"
    );
    chunk
        .map(|snap| {
            if let Some(handle) = batch.handle(snap.client_handle) {
                handle.set_last_status(status);
            }
            MonitoredItemOperationResult {
                client_handle: snap.client_handle,
                service_result: status,
                operation_result: status,
            }
        })
        .collect()
}

/// The server answered with fewer results than requests.
fn missing_result(
    subscription_id: u32,
    snap: &HandleSnapshot,
    batch: &Batch,
) -> MonitoredItemOperationResult {
    let status = StatusCode::BadUnexpectedError;
    if let Some(handle) = batch.handle(snap.client_handle) {
        handle.set_last_status(status);
    }
    warn!(
        subscription_id,
        client_handle = snap.client_handle,
        "service returned fewer results than requests"
    );
    MonitoredItemOperationResult {
        client_handle: snap.client_handle,
        service_result: status,
        operation_result: status,
    }
}
