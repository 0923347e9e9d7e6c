use ng_monitoring_types::MonitoringFilter;
use opcua::types::{
    DataValue, EventFilterResult, MonitoringMode, ReadValueId, StatusCode, Variant,
};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Synchronization state of a monitored item handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoredItemState {
    /// Not created on the server (never created, failed, or deleted).
    Initial,
    /// Created on the server.
    Synchronized,
}

/// Parameters the application wants for an item.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedParameters {
    /// Milliseconds; negative asks for the publishing interval.
    pub sampling_interval: f64,
    pub queue_size: u32,
    /// Which end of a full server queue is discarded.
    pub discard_oldest: bool,
    pub filter: MonitoringFilter,
    /// Sent through SetMonitoringMode, not ModifyMonitoredItems.
    pub monitoring_mode: MonitoringMode,
}

impl RequestedParameters {
    /// Whether anything sent through ModifyMonitoredItems differs.
    pub fn differs_for_modify(&self, other: &RequestedParameters) -> bool {
        self.sampling_interval != other.sampling_interval
            || self.queue_size != other.queue_size
            || self.discard_oldest != other.discard_oldest
            || self.filter != other.filter
    }
}

/// Parameters as confirmed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisedParameters {
    /// Sampling interval the server chose, in milliseconds.
    pub sampling_interval: f64,
    /// Queue size the server chose.
    pub queue_size: u32,
    /// Per-clause validation of an event filter; `None` for data items.
    pub filter_result: Option<EventFilterResult>,
    /// Mode last acknowledged by the server.
    pub monitoring_mode: MonitoringMode,
}

/// Immutable view of a handle used for planning.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleSnapshot {
    pub client_handle: u32,
    /// Node and attribute being monitored.
    pub target: ReadValueId,
    pub state: MonitoredItemState,
    /// Server-assigned id; `None` while the item is not created.
    pub monitored_item_id: Option<u32>,
    /// Parameters the application currently wants.
    pub requested: RequestedParameters,
    /// Requested parameters last accepted by the server.
    pub sent: Option<RequestedParameters>,
}

/// Client-side description of one monitored item.
///
/// The target and client handle are fixed for the life of the handle; the
/// requested parameters may be changed at any time and are pushed to the
/// server by the next synchronization.
#[derive(Debug)]
pub struct MonitoredItemHandle {
    client_handle: u32,
    target: ReadValueId,
    state: Mutex<HandleState>,
}

#[derive(Debug)]
struct HandleState {
    requested: RequestedParameters,
    sent: Option<RequestedParameters>,
    revised: Option<RevisedParameters>,
    sync_state: MonitoredItemState,
    monitored_item_id: Option<u32>,
    last_status: StatusCode,
    last_value: Option<DataValue>,
    last_event: Option<Vec<Variant>>,
}

impl MonitoredItemHandle {
    pub(crate) fn new(
        client_handle: u32,
        target: ReadValueId,
        requested: RequestedParameters,
    ) -> Self {
        Self {
            client_handle,
            target,
            state: Mutex::new(HandleState {
                requested,
                sent: None,
                revised: None,
                sync_state: MonitoredItemState::Initial,
                monitored_item_id: None,
                last_status: StatusCode::Good,
                last_value: None,
                last_event: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    #[inline]
    pub fn target(&self) -> &ReadValueId {
        &self.target
    }

    pub fn state(&self) -> MonitoredItemState {
        self.lock().sync_state
    }

    pub fn monitored_item_id(&self) -> Option<u32> {
        self.lock().monitored_item_id
    }

    pub fn requested(&self) -> RequestedParameters {
        self.lock().requested.clone()
    }

    /// Server-confirmed parameters; `None` until the item is synchronized.
    pub fn revised(&self) -> Option<RevisedParameters> {
        self.lock().revised.clone()
    }

    pub fn sampling_interval(&self) -> f64 {
        self.lock().requested.sampling_interval
    }

    pub fn revised_sampling_interval(&self) -> Option<f64> {
        self.lock().revised.as_ref().map(|r| r.sampling_interval)
    }

    pub fn set_sampling_interval(&self, sampling_interval: f64) {
        self.lock().requested.sampling_interval = sampling_interval;
    }

    pub fn set_queue_size(&self, queue_size: u32) {
        self.lock().requested.queue_size = queue_size;
    }

    pub fn set_discard_oldest(&self, discard_oldest: bool) {
        self.lock().requested.discard_oldest = discard_oldest;
    }

    pub fn set_filter(&self, filter: MonitoringFilter) {
        self.lock().requested.filter = filter;
    }

    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.lock().requested.monitoring_mode
    }

    pub fn set_monitoring_mode(&self, mode: MonitoringMode) {
        self.lock().requested.monitoring_mode = mode;
    }

    /// Status of the last operation applied to this item.
    pub fn last_status(&self) -> StatusCode {
        self.lock().last_status
    }

    pub fn last_value(&self) -> Option<DataValue> {
        self.lock().last_value.clone()
    }

    pub fn last_event(&self) -> Option<Vec<Variant>> {
        self.lock().last_event.clone()
    }

    pub fn snapshot(&self) -> HandleSnapshot {
        let state = self.lock();
        HandleSnapshot {
            client_handle: self.client_handle,
            target: self.target.clone(),
            state: state.sync_state,
            monitored_item_id: state.monitored_item_id,
            requested: state.requested.clone(),
            sent: state.sent.clone(),
        }
    }

    pub(crate) fn apply_created(
        &self,
        monitored_item_id: u32,
        sent: RequestedParameters,
        revised: RevisedParameters,
    ) {
        let mut state = self.lock();
        state.sync_state = MonitoredItemState::Synchronized;
        state.monitored_item_id = Some(monitored_item_id);
        state.sent = Some(sent);
        state.revised = Some(revised);
        state.last_status = StatusCode::Good;
    }

    /// Applies a successful modify; the monitoring mode is untouched.
    pub(crate) fn apply_modified(
        &self,
        sent: &RequestedParameters,
        sampling_interval: f64,
        queue_size: u32,
        filter_result: Option<EventFilterResult>,
    ) {
        let mut state = self.lock();
        let mode = state
            .sent
            .as_ref()
            .map(|s| s.monitoring_mode)
            .unwrap_or(sent.monitoring_mode);
        state.sent = Some(RequestedParameters {
            monitoring_mode: mode,
            ..sent.clone()
        });
        if let Some(revised) = state.revised.as_mut() {
            revised.sampling_interval = sampling_interval;
            revised.queue_size = queue_size;
            revised.filter_result = filter_result;
        }
        state.last_status = StatusCode::Good;
    }

    pub(crate) fn apply_mode(&self, mode: MonitoringMode) {
        let mut state = self.lock();
        if let Some(sent) = state.sent.as_mut() {
            sent.monitoring_mode = mode;
        }
        if let Some(revised) = state.revised.as_mut() {
            revised.monitoring_mode = mode;
        }
        state.last_status = StatusCode::Good;
    }

    /// Drops the server-side linkage; the handle can be created again.
    pub(crate) fn detach(&self) {
        let mut state = self.lock();
        state.sync_state = MonitoredItemState::Initial;
        state.monitored_item_id = None;
        state.sent = None;
        state.revised = None;
    }

    pub(crate) fn set_last_status(&self, status: StatusCode) {
        self.lock().last_status = status;
    }

    pub(crate) fn set_last_value(&self, value: DataValue) {
        self.lock().last_value = Some(value);
    }

    pub(crate) fn set_last_event(&self, fields: Vec<Variant>) {
        self.lock().last_event = Some(fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua::types::NodeId;

    fn requested() -> RequestedParameters {
        RequestedParameters {
            sampling_interval: 1_000.0,
            queue_size: 1,
            discard_oldest: true,
            filter: MonitoringFilter::None,
            monitoring_mode: MonitoringMode::Reporting,
        }
    }

    fn handle(client_handle: u32) -> MonitoredItemHandle {
        MonitoredItemHandle::new(
            client_handle,
            ReadValueId::new_value(NodeId::new(2, 1u32)),
            requested(),
        )
    }

    fn revised() -> RevisedParameters {
        RevisedParameters {
            sampling_interval: 1_000.0,
            queue_size: 1,
            filter_result: None,
            monitoring_mode: MonitoringMode::Reporting,
        }
    }

    #[test]
    fn lifecycle_tracks_linkage() {
        let handle = handle(5);
        assert_eq!(handle.state(), MonitoredItemState::Initial);
        assert!(handle.revised().is_none());

        handle.apply_created(40, requested(), revised());
        assert_eq!(handle.state(), MonitoredItemState::Synchronized);
        assert_eq!(handle.monitored_item_id(), Some(40));

        handle.detach();
        assert_eq!(handle.state(), MonitoredItemState::Initial);
        assert_eq!(handle.monitored_item_id(), None);
        assert_eq!(handle.client_handle(), 5);
    }

    #[test]
    fn modify_keeps_sent_mode() {
        let handle = handle(1);
        handle.apply_created(1, requested(), revised());

        handle.set_sampling_interval(5_000.0);
        handle.set_monitoring_mode(MonitoringMode::Sampling);
        let snapshot = handle.snapshot();
        assert!(snapshot.requested.differs_for_modify(snapshot.sent.as_ref().unwrap()));

        handle.apply_modified(&snapshot.requested, 5_000.0, 1, None);
        let snapshot = handle.snapshot();
        let sent = snapshot.sent.unwrap();
        assert!(!snapshot.requested.differs_for_modify(&sent));
        assert_eq!(sent.monitoring_mode, MonitoringMode::Reporting);
        assert_eq!(handle.revised_sampling_interval(), Some(5_000.0));
    }
}
