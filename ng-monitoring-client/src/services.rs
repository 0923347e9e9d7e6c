use async_trait::async_trait;
use ng_monitoring_error::MonitoringResult;
use ng_monitoring_types::{
    CreateSubscriptionResult, RevisedSubscription, SetTriggeringResult, SubscriptionParameters,
};
use opcua::types::{
    MonitoredItemCreateRequest, MonitoredItemCreateResult, MonitoredItemModifyRequest,
    MonitoredItemModifyResult, MonitoringMode, StatusCode, TimestampsToReturn,
};

/// Batched subscription and monitored-item services offered by a session.
///
/// Every batched call answers with one result per input, in input order. A
/// call that fails as a whole (empty batch, too many operations, transport
/// fault) returns an error instead.
#[async_trait]
pub trait SubscriptionServices: Send + Sync {
    async fn create_subscription(
        &self,
        params: &SubscriptionParameters,
    ) -> MonitoringResult<CreateSubscriptionResult>;

    async fn modify_subscription(
        &self,
        subscription_id: u32,
        params: &SubscriptionParameters,
    ) -> MonitoringResult<RevisedSubscription>;

    async fn delete_subscriptions(&self, subscription_ids: &[u32])
        -> MonitoringResult<Vec<StatusCode>>;

    async fn set_publishing_mode(
        &self,
        publishing_enabled: bool,
        subscription_ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>>;

    async fn create_monitored_items(
        &self,
        subscription_id: u32,
        timestamps: TimestampsToReturn,
        items: &[MonitoredItemCreateRequest],
    ) -> MonitoringResult<Vec<MonitoredItemCreateResult>>;

    async fn modify_monitored_items(
        &self,
        subscription_id: u32,
        timestamps: TimestampsToReturn,
        items: &[MonitoredItemModifyRequest],
    ) -> MonitoringResult<Vec<MonitoredItemModifyResult>>;

    async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>>;

    async fn set_monitoring_mode(
        &self,
        subscription_id: u32,
        mode: MonitoringMode,
        monitored_item_ids: &[u32],
    ) -> MonitoringResult<Vec<StatusCode>>;

    async fn set_triggering(
        &self,
        subscription_id: u32,
        triggering_item_id: u32,
        links_to_add: &[u32],
        links_to_remove: &[u32],
    ) -> MonitoringResult<SetTriggeringResult>;
}
