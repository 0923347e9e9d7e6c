//! Settings and thin adapters over the `opcua` type model shared by the
//! monitoring server and client.

pub mod data_value;
pub mod filter;
pub mod service;
pub mod settings;
pub mod status;
pub mod variant;

pub use data_value::DataValueExt;
pub use filter::{
    event_field, event_filter_result_is_good, operator_min_operands, type_field, FilterOperand,
    MonitoringFilter, WhereClauseBuilder,
};
pub use service::{
    attribute_id, event_notifier, failed_create, failed_modify, CreateSubscriptionResult, Notification,
    RevisedSubscription, SetTriggeringResult, SubscriptionParameters,
};
pub use settings::{
    ClientSubscriptionConfig, MonitoringSettings, ReturnedTimestamps, ServerLimits, SettingsInner,
};
pub use status::StatusCodeExt;
pub use variant::{BuiltinType, VariantExt};
