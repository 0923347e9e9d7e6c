use super::{lock, ItemBase, MonitoredItem};
use crate::{
    event::{BaseEvent, EventSource},
    filter::{FilterEvaluator, TypeHierarchy},
    queue::NotificationQueue,
};
use ng_monitoring_types::{failed_modify, MonitoringFilter, Notification};
use opcua::types::{
    EventFieldList, EventFilterResult, ExtensionObject, MonitoredItemCreateRequest,
    MonitoredItemModifyResult, MonitoringMode, MonitoringParameters, ReadValueId, StatusCode,
    TimestampsToReturn,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Monitored item subscribed to the events of a notifier node.
#[derive(Debug)]
pub struct MonitoredEventItem {
    base: ItemBase,
    types: Arc<dyn TypeHierarchy>,
    state: Mutex<EventState>,
}

#[derive(Debug)]
struct EventState {
    client_handle: u32,
    mode: MonitoringMode,
    queue: NotificationQueue<EventFieldList>,
    evaluator: FilterEvaluator,
    filter_result: EventFilterResult,
}

/// Rejected event filter: overall status plus the per-clause result when
/// one was produced.
pub type EventFilterRejection = (StatusCode, Option<EventFilterResult>);

impl MonitoredEventItem {
    pub fn new(
        id: u32,
        subscription_id: u32,
        request: &MonitoredItemCreateRequest,
        types: Arc<dyn TypeHierarchy>,
    ) -> Result<Self, EventFilterRejection> {
        let params = &request.requested_parameters;
        let filter = MonitoringFilter::decode(&params.filter);
        let (evaluator, filter_result) = install_event_filter(&filter, &types)?;

        Ok(Self {
            base: ItemBase::new(
                id,
                subscription_id,
                request.item_to_monitor.clone(),
                TimestampsToReturn::Neither,
            ),
            types,
            state: Mutex::new(EventState {
                client_handle: params.client_handle,
                mode: request.monitoring_mode,
                queue: NotificationQueue::new(params.queue_size, params.discard_oldest),
                evaluator,
                filter_result,
            }),
        })
    }

    /// Offers an event. Returns `true` when it matched the where clause and
    /// was queued.
    pub fn on_event(&self, event: &dyn EventSource) -> bool {
        let mut state = lock(&self.state);
        if state.mode == MonitoringMode::Disabled {
            return false;
        }
        match state.evaluator.matches(event) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                debug!(
                    subscription_id = self.base.subscription_id,
                    monitored_item_id = self.base.id,
                    error = %e,
                    "event filter evaluation failed, event dropped"
                );
                return false;
            }
        }

        let fields = EventFieldList {
            client_handle: state.client_handle,
            event_fields: Some(state.evaluator.select(event)),
        };

        if state.queue.is_full() && state.queue.capacity() > 1 {
            let overflow = EventFieldList {
                client_handle: state.client_handle,
                event_fields: Some(state.evaluator.select(&BaseEvent::queue_overflow())),
            };
            if state.queue.discard_oldest() {
                state.queue.enqueue(fields);
                state.queue.replace_front(overflow);
            } else {
                state.queue.replace_back(overflow);
            }
            trace!(
                subscription_id = self.base.subscription_id,
                monitored_item_id = self.base.id,
                "event queue overflow"
            );
        } else {
            state.queue.enqueue(fields);
        }
        true
    }

    /// Validation result of the installed filter.
    pub fn filter_result(&self) -> EventFilterResult {
        lock(&self.state).filter_result.clone()
    }
}

fn install_event_filter(
    filter: &MonitoringFilter,
    types: &Arc<dyn TypeHierarchy>,
) -> Result<(FilterEvaluator, EventFilterResult), EventFilterRejection> {
    let filter = match filter {
        MonitoringFilter::Event(f) => f.clone(),
        MonitoringFilter::None | MonitoringFilter::Unknown => {
            return Err((StatusCode::BadMonitoredItemFilterInvalid, None))
        }
        MonitoringFilter::DataChange(_) | MonitoringFilter::Aggregate(_) => {
            return Err((StatusCode::BadFilterNotAllowed, None))
        }
    };
    let result = crate::filter::validate_event_filter(&filter, types.as_ref());
    FilterEvaluator::new(filter, Arc::clone(types))
        .map(|evaluator| (evaluator, result))
        .map_err(|(status, result)| (status, Some(result)))
}

impl MonitoredItem for MonitoredEventItem {
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
        lock(&self.state).mode = mode;
    }

    /// Event items are not sampled.
    fn sampling_interval(&self) -> f64 {
        0.0
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
        drained.into_iter().map(Notification::Event).collect()
    }

    fn modify(
        &self,
        _sampling_interval: f64,
        params: &MonitoringParameters,
    ) -> MonitoredItemModifyResult {
        let requested = MonitoringFilter::decode(&params.filter);
        let (evaluator, filter_result) = match install_event_filter(&requested, &self.types) {
            Ok(installed) => installed,
            Err((status, filter_result)) => {
                return MonitoredItemModifyResult {
                    filter_result: filter_result
                        .map(ExtensionObject::from_message)
                        .unwrap_or_else(ExtensionObject::null),
                    ..failed_modify(status)
                }
            }
        };

        let mut state = lock(&self.state);
        state.client_handle = params.client_handle;
        state.evaluator = evaluator;
        state.filter_result = filter_result.clone();
        state.queue.set_discard_oldest(params.discard_oldest);
        state.queue.resize(params.queue_size);

        MonitoredItemModifyResult {
            status_code: StatusCode::Good,
            revised_sampling_interval: 0.0,
            revised_queue_size: state.queue.capacity() as u32,
            filter_result: ExtensionObject::from_message(filter_result),
        }
    }
}
