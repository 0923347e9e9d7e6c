use ng_monitoring_types::{
    status::{INFO_TYPE_DATA_VALUE, OVERFLOW},
    DataValueExt, MonitoringFilter, VariantExt,
};
use opcua::types::{
    AttributeId, DataChangeFilter, DataChangeTrigger, DataValue, DeadbandType, StatusCode, Variant,
};

/// Filter applied when a data item is created without one.
pub fn default_data_change_filter() -> DataChangeFilter {
    DataChangeFilter {
        trigger: DataChangeTrigger::StatusValue,
        deadband_type: DeadbandType::None as u32,
        deadband_value: 0.0,
    }
}

/// Resolves the filter a data item installs for `attribute`.
///
/// No filter means the default StatusValue trigger. Percent deadband is not
/// supported and absolute deadband only applies to the Value attribute.
pub fn install_data_change_filter(
    filter: &MonitoringFilter,
    attribute: AttributeId,
) -> Result<DataChangeFilter, StatusCode> {
    match filter {
        MonitoringFilter::None => Ok(default_data_change_filter()),
        MonitoringFilter::DataChange(f) => {
            let absolute = f.deadband_type == DeadbandType::Absolute as u32;
            if f.deadband_type == DeadbandType::Percent as u32 {
                Err(StatusCode::BadDeadbandFilterInvalid)
            } else if absolute && attribute != AttributeId::Value {
                Err(StatusCode::BadFilterNotAllowed)
            } else if absolute && (f.deadband_value.is_nan() || f.deadband_value < 0.0) {
                Err(StatusCode::BadDeadbandFilterInvalid)
            } else if !absolute && f.deadband_type != DeadbandType::None as u32 {
                Err(StatusCode::BadDeadbandFilterInvalid)
            } else {
                Ok(f.clone())
            }
        }
        MonitoringFilter::Event(_) | MonitoringFilter::Aggregate(_) => {
            Err(StatusCode::BadFilterNotAllowed)
        }
        MonitoringFilter::Unknown => Err(StatusCode::BadMonitoredItemFilterInvalid),
    }
}

/// Whether `current` should be reported given the last accepted value.
pub fn passes(filter: &DataChangeFilter, last: Option<&DataValue>, current: &DataValue) -> bool {
    let Some(last) = last else {
        return true;
    };
    let status_changed = significant(last.status_code()) != significant(current.status_code());
    match filter.trigger {
        DataChangeTrigger::Status => status_changed,
        DataChangeTrigger::StatusValueTimestamp => {
            status_changed
                || value_changed(filter, last, current)
                || last.source_timestamp != current.source_timestamp
        }
        _ => status_changed || value_changed(filter, last, current),
    }
}

/// Status bits that count as a change; overflow info is a queue artefact.
fn significant(status: StatusCode) -> u32 {
    status.bits() & !(INFO_TYPE_DATA_VALUE | OVERFLOW)
}

fn value_changed(filter: &DataChangeFilter, last: &DataValue, current: &DataValue) -> bool {
    if filter.deadband_type != DeadbandType::Absolute as u32 {
        return last.value != current.value;
    }
    match (&last.value, &current.value) {
        (Some(x), Some(y)) => exceeds_deadband(x, y, filter.deadband_value),
        (x, y) => x != y,
    }
}

fn exceeds_deadband(last: &Variant, current: &Variant, deadband: f64) -> bool {
    match (last, current) {
        (Variant::Array(a), Variant::Array(b)) => {
            a.values.len() != b.values.len()
                || a.dimensions != b.dimensions
                || a.values
                    .iter()
                    .zip(&b.values)
                    .any(|(x, y)| exceeds_deadband(x, y, deadband))
        }
        _ => match (last.numeric(), current.numeric()) {
            (Some(x), Some(y)) => (x - y).abs() > deadband,
            _ => last != current,
        },
    }
}
