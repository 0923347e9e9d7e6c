use ng_monitoring_types::StatusCodeExt;
use opcua::types::StatusCode;

/// Classification of per-item monitored item failures.
///
/// Groups low-level `StatusCode` values into a few categories used
/// consistently in logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoredItemFailureKind {
    /// Too many items or operations, or the server ran out of resources.
    CapacityOrResources,
    /// Invalid or unknown node, attribute or index range.
    Configuration,
    /// Rejected data-change or event filter.
    Filter,
    PermissionOrAuth,
    /// The item or subscription no longer exists on the server.
    Stale,
    Other,
}

impl MonitoredItemFailureKind {
    /// Stable label for structured logging.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            MonitoredItemFailureKind::CapacityOrResources => "capacity_or_resources",
            MonitoredItemFailureKind::Configuration => "configuration",
            MonitoredItemFailureKind::Filter => "filter",
            MonitoredItemFailureKind::PermissionOrAuth => "permission_or_auth",
            MonitoredItemFailureKind::Stale => "stale",
            MonitoredItemFailureKind::Other => "other",
        }
    }
}

impl From<StatusCode> for MonitoredItemFailureKind {
    #[inline]
    fn from(status: StatusCode) -> Self {
        match status.without_info_bits() {
            s if s == StatusCode::BadTooManyMonitoredItems
                || s == StatusCode::BadTooManyOperations
                || s == StatusCode::BadOutOfMemory
                || s == StatusCode::BadResourceUnavailable =>
            {
                MonitoredItemFailureKind::CapacityOrResources
            }
            s if s == StatusCode::BadNodeIdInvalid
                || s == StatusCode::BadNodeIdUnknown
                || s == StatusCode::BadAttributeIdInvalid
                || s == StatusCode::BadIndexRangeInvalid
                || s == StatusCode::BadNotReadable
                || s == StatusCode::BadMonitoringModeInvalid =>
            {
                MonitoredItemFailureKind::Configuration
            }
            s if s == StatusCode::BadMonitoredItemFilterInvalid
                || s == StatusCode::BadMonitoredItemFilterUnsupported
                || s == StatusCode::BadFilterNotAllowed
                || s == StatusCode::BadEventFilterInvalid
                || s == StatusCode::BadDeadbandFilterInvalid =>
            {
                MonitoredItemFailureKind::Filter
            }
            s if s == StatusCode::BadUserAccessDenied => MonitoredItemFailureKind::PermissionOrAuth,
            s if s == StatusCode::BadMonitoredItemIdInvalid
                || s == StatusCode::BadSubscriptionIdInvalid =>
            {
                MonitoredItemFailureKind::Stale
            }
            _ => MonitoredItemFailureKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_grouped() {
        let kind = |s| MonitoredItemFailureKind::from(s).as_str();
        assert_eq!(kind(StatusCode::BadTooManyOperations), "capacity_or_resources");
        assert_eq!(kind(StatusCode::BadNodeIdUnknown), "configuration");
        assert_eq!(kind(StatusCode::BadDeadbandFilterInvalid), "filter");
        assert_eq!(kind(StatusCode::BadUserAccessDenied), "permission_or_auth");
        assert_eq!(kind(StatusCode::BadSubscriptionIdInvalid), "stale");
        assert_eq!(kind(StatusCode::BadTimeout), "other");
    }
}
