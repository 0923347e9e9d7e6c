use super::{lock, ItemBase, MonitoredItem};
use crate::{
    filter::{install_data_change_filter, passes},
    queue::NotificationQueue,
};
use ng_monitoring_types::{attribute_id, failed_modify, DataValueExt, MonitoringFilter, Notification};
use opcua::types::{
    AttributeId, DataChangeFilter, DataValue, DateTime, ExtensionObject,
    MonitoredItemCreateRequest, MonitoredItemModifyResult, MonitoredItemNotification,
    MonitoringMode, MonitoringParameters, ReadValueId, StatusCode, TimestampsToReturn,
};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Monitored item sampling a node attribute.
#[derive(Debug)]
pub struct MonitoredDataItem {
    base: ItemBase,
    attribute: AttributeId,
    state: Mutex<DataState>,
}

#[derive(Debug)]
struct DataState {
    client_handle: u32,
    mode: MonitoringMode,
    sampling_interval: f64,
    queue: NotificationQueue<MonitoredItemNotification>,
    filter: DataChangeFilter,
    last_value: Option<DataValue>,
}

impl MonitoredDataItem {
    /// Creates the item, failing with the filter status if the requested
    /// filter cannot be installed for the target attribute.
    pub fn new(
        id: u32,
        subscription_id: u32,
        request: &MonitoredItemCreateRequest,
        sampling_interval: f64,
        timestamps: TimestampsToReturn,
    ) -> Result<Self, StatusCode> {
        let target = &request.item_to_monitor;
        let attribute = attribute_id(target.attribute_id).ok_or(StatusCode::BadAttributeIdInvalid)?;
        let params = &request.requested_parameters;
        let filter =
            install_data_change_filter(&MonitoringFilter::decode(&params.filter), attribute)?;

        Ok(Self {
            base: ItemBase::new(id, subscription_id, target.clone(), timestamps),
            attribute,
            state: Mutex::new(DataState {
                client_handle: params.client_handle,
                mode: request.monitoring_mode,
                sampling_interval,
                queue: NotificationQueue::new(params.queue_size, params.discard_oldest),
                filter,
                last_value: None,
            }),
        })
    }

    /// Offers a sampled value. Returns `true` when it passed the filter and
    /// was queued.
    pub fn set_value(&self, value: DataValue) -> bool {
        let mut state = lock(&self.state);
        if state.mode == MonitoringMode::Disabled {
            return false;
        }
        if !passes(&state.filter, state.last_value.as_ref(), &value) {
            return false;
        }

        let notification = MonitoredItemNotification {
            client_handle: state.client_handle,
            value: value.keep_timestamps(self.base.timestamps),
        };
        let overflowed = state.queue.enqueue(notification);
        state.last_value = Some(value);
        trace!(
            subscription_id = self.base.subscription_id,
            monitored_item_id = self.base.id,
            queued = state.queue.len(),
            overflowed,
            "data value enqueued"
        );
        true
    }

    /// Reports a status change without a new sample, reusing the last known
    /// payload.
    pub fn set_quality(&self, status: StatusCode) -> bool {
        let last = lock(&self.state).last_value.clone().unwrap_or_default();
        let now = DateTime::now();
        self.set_value(DataValue {
            value: last.value,
            status: Some(status),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        })
    }

    pub fn last_value(&self) -> Option<DataValue> {
        lock(&self.state).last_value.clone()
    }

    pub fn filter(&self) -> DataChangeFilter {
        lock(&self.state).filter.clone()
    }

    pub fn attribute(&self) -> AttributeId {
        self.attribute
    }
}

impl MonitoredItem for MonitoredDataItem {
    fn id(&self) -> u32 {
        self.base.id
    }

    fn subscription_id(&self) -> u32 {
        self.base.subscription_id
    }

    fn read_value_id(&self) -> &ReadValueId {
        &self.base.read_value_id
    }

    fn client_handle(&self) -> u32 {
        lock(&self.state).client_handle
    }

    fn monitoring_mode(&self) -> MonitoringMode {
        lock(&self.state).mode
    }

    fn set_monitoring_mode(&self, mode: MonitoringMode) {
        let mut state = lock(&self.state);
        state.mode = mode;
        if mode == MonitoringMode::Disabled {
            state.queue.clear();
            state.last_value = None;
        }
    }

    fn sampling_interval(&self) -> f64 {
        lock(&self.state).sampling_interval
    }

    fn queue_size(&self) -> u32 {
        lock(&self.state).queue.capacity() as u32
    }

    fn discard_oldest(&self) -> bool {
        lock(&self.state).queue.discard_oldest()
    }

    fn has_notifications(&self) -> bool {
        !lock(&self.state).queue.is_empty()
    }

    fn is_triggered(&self) -> bool {
        self.base.is_triggered()
    }

    fn set_triggered(&self, triggered: bool) {
        self.base.set_triggered(triggered)
    }

    fn drain(&self, max: usize, dependents: &[Arc<dyn MonitoredItem>]) -> Vec<Notification> {
        let mut state = lock(&self.state);
        let (drained, empty) = state.queue.drain(max);
        self.base.after_drain(drained.len(), empty, dependents);
        drained.into_iter().map(Notification::DataChange).collect()
    }

    fn modify(
        &self,
        sampling_interval: f64,
        params: &MonitoringParameters,
    ) -> MonitoredItemModifyResult {
        let requested = MonitoringFilter::decode(&params.filter);
        let filter = match install_data_change_filter(&requested, self.attribute) {
            Ok(filter) => filter,
            Err(status) => return failed_modify(status),
        };

        let mut state = lock(&self.state);
        state.client_handle = params.client_handle;
        state.sampling_interval = sampling_interval;
        state.filter = filter;
        state.queue.set_discard_oldest(params.discard_oldest);
        state.queue.resize(params.queue_size);

        MonitoredItemModifyResult {
            status_code: StatusCode::Good,
            revised_sampling_interval: sampling_interval,
            revised_queue_size: state.queue.capacity() as u32,
            filter_result: ExtensionObject::null(),
        }
    }
}
