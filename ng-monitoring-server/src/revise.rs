use ng_monitoring_types::{RevisedSubscription, ServerLimits, SubscriptionParameters};

/// Keep-alive count used when a client asks for zero.
pub const DEFAULT_KEEP_ALIVE_COUNT: u32 = 3;

/// Fits requested subscription parameters into the server limits.
///
/// The publishing interval is clamped first; keep-alive and lifetime counts
/// are then bounded in units of the revised interval so that
/// `lifetime >= 3 * keep_alive` always holds.
pub fn revise_subscription(
    params: &SubscriptionParameters,
    limits: &ServerLimits,
) -> RevisedSubscription {
    let interval = revise_publishing_interval(params.publishing_interval, limits);

    let mut keep_alive = match params.max_keep_alive_count {
        0 => DEFAULT_KEEP_ALIVE_COUNT,
        n => n,
    };
    if keep_alive as f64 * interval > limits.max_lifetime_ms {
        keep_alive = ceil_count(limits.max_lifetime_ms, interval);
    }
    if keep_alive as f64 * interval > limits.max_publishing_interval_ms {
        keep_alive = ceil_count(limits.max_publishing_interval_ms, interval);
    }
    let keep_alive = keep_alive.max(1);

    let mut lifetime = params.lifetime_count;
    if lifetime as f64 * interval > limits.max_lifetime_ms {
        lifetime = ceil_count(limits.max_lifetime_ms, interval);
    }
    lifetime = lifetime.max(keep_alive.saturating_mul(3));
    if lifetime as f64 * interval < limits.min_lifetime_ms && limits.min_lifetime_ms > interval {
        lifetime = ceil_count(limits.min_lifetime_ms, interval);
    }

    let max_notifications = match params.max_notifications_per_publish {
        0 => limits.max_notifications_per_publish,
        n if n > limits.max_notifications_per_publish => limits.max_notifications_per_publish,
        n => n,
    };

    RevisedSubscription {
        publishing_interval: interval,
        lifetime_count: lifetime,
        max_keep_alive_count: keep_alive,
        max_notifications_per_publish: max_notifications,
    }
}

pub fn revise_publishing_interval(requested: f64, limits: &ServerLimits) -> f64 {
    if !requested.is_finite() || requested < limits.min_publishing_interval_ms {
        limits.min_publishing_interval_ms
    } else if requested > limits.max_publishing_interval_ms {
        limits.max_publishing_interval_ms
    } else {
        requested
    }
}

/// Negative or NaN requests inherit the publishing interval; the result is
/// clamped to the sampling bounds.
pub fn revise_sampling_interval(
    requested: f64,
    publishing_interval: f64,
    limits: &ServerLimits,
) -> f64 {
    let interval = if requested.is_nan() || requested < 0.0 {
        publishing_interval
    } else {
        requested
    };
    interval
        .max(limits.min_sampling_interval_ms)
        .min(limits.max_sampling_interval_ms)
}

fn ceil_count(total_ms: f64, interval_ms: f64) -> u32 {
    (total_ms / interval_ms).ceil().min(u32::MAX as f64) as u32
}
