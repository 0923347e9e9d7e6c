//! Typed views over the extension-object encoded filters and operands of
//! the monitored item services.

use opcua::types::{
    AggregateFilter, AttributeId, AttributeOperand, ContentFilter, ContentFilterElement,
    ContentFilterResult, DataChangeFilter, ElementOperand, EventFilter, EventFilterResult,
    ExtensionObject, FilterOperator, LiteralOperand, NodeId, ObjectTypeId, QualifiedName,
    SimpleAttributeOperand, Variant,
};

/// Monitoring filter carried by `MonitoringParameters::filter`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum MonitoringFilter {
    #[default]
    None,
    DataChange(DataChangeFilter),
    Event(EventFilter),
    Aggregate(AggregateFilter),
    /// Body of a type no monitored item understands.
    Unknown,
}

impl MonitoringFilter {
    pub fn decode(filter: &ExtensionObject) -> Self {
        if filter.is_null() {
            MonitoringFilter::None
        } else if let Some(f) = filter.inner_as::<DataChangeFilter>() {
            MonitoringFilter::DataChange(f.clone())
        } else if let Some(f) = filter.inner_as::<EventFilter>() {
            MonitoringFilter::Event(f.clone())
        } else if let Some(f) = filter.inner_as::<AggregateFilter>() {
            MonitoringFilter::Aggregate(f.clone())
        } else {
            MonitoringFilter::Unknown
        }
    }

    pub fn into_extension_object(self) -> ExtensionObject {
        match self {
            MonitoringFilter::None | MonitoringFilter::Unknown => ExtensionObject::null(),
            MonitoringFilter::DataChange(f) => ExtensionObject::from_message(f),
            MonitoringFilter::Event(f) => ExtensionObject::from_message(f),
            MonitoringFilter::Aggregate(f) => ExtensionObject::from_message(f),
        }
    }
}

impl From<DataChangeFilter> for MonitoringFilter {
    fn from(f: DataChangeFilter) -> Self {
        MonitoringFilter::DataChange(f)
    }
}

impl From<EventFilter> for MonitoringFilter {
    fn from(f: EventFilter) -> Self {
        MonitoringFilter::Event(f)
    }
}

/// Decoded content filter operand.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOperand {
    /// Index of another element in the same content filter.
    Element(u32),
    Literal(Variant),
    /// Attribute of an arbitrary node; not usable in event filters.
    Attribute(AttributeOperand),
    SimpleAttribute(SimpleAttributeOperand),
}

impl FilterOperand {
    /// `None` when the body is not one of the four operand types.
    pub fn decode(operand: &ExtensionObject) -> Option<Self> {
        if let Some(o) = operand.inner_as::<ElementOperand>() {
            Some(FilterOperand::Element(o.index))
        } else if let Some(o) = operand.inner_as::<LiteralOperand>() {
            Some(FilterOperand::Literal(o.value.clone()))
        } else if let Some(o) = operand.inner_as::<SimpleAttributeOperand>() {
            Some(FilterOperand::SimpleAttribute(o.clone()))
        } else {
            operand
                .inner_as::<AttributeOperand>()
                .map(|o| FilterOperand::Attribute(o.clone()))
        }
    }

    pub fn into_extension_object(self) -> ExtensionObject {
        match self {
            FilterOperand::Element(index) => ExtensionObject::from_message(ElementOperand { index }),
            FilterOperand::Literal(value) => ExtensionObject::from_message(LiteralOperand { value }),
            FilterOperand::Attribute(o) => ExtensionObject::from_message(o),
            FilterOperand::SimpleAttribute(o) => ExtensionObject::from_message(o),
        }
    }
}

impl From<Variant> for FilterOperand {
    fn from(v: Variant) -> Self {
        FilterOperand::Literal(v)
    }
}

impl From<SimpleAttributeOperand> for FilterOperand {
    fn from(v: SimpleAttributeOperand) -> Self {
        FilterOperand::SimpleAttribute(v)
    }
}

/// Fewest operands an element with `operator` may carry.
pub fn operator_min_operands(operator: FilterOperator) -> usize {
    match operator {
        FilterOperator::IsNull
        | FilterOperator::Not
        | FilterOperator::OfType
        | FilterOperator::InView => 1,
        FilterOperator::Between => 3,
        FilterOperator::RelatedTo => 6,
        _ => 2,
    }
}

/// Builds a where clause element by element; element 0 is the root.
#[derive(Clone, Debug, Default)]
pub struct WhereClauseBuilder {
    elements: Vec<ContentFilterElement>,
}

impl WhereClauseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element and returns its index.
    pub fn push(&mut self, operator: FilterOperator, operands: Vec<FilterOperand>) -> u32 {
        let filter_operands = operands
            .into_iter()
            .map(FilterOperand::into_extension_object)
            .collect();
        self.elements.push(ContentFilterElement {
            filter_operator: operator,
            filter_operands: Some(filter_operands),
        });
        (self.elements.len() - 1) as u32
    }

    pub fn with(mut self, operator: FilterOperator, operands: Vec<FilterOperand>) -> Self {
        self.push(operator, operands);
        self
    }

    pub fn build(self) -> ContentFilter {
        ContentFilter {
            elements: (!self.elements.is_empty()).then_some(self.elements),
        }
    }
}

/// Value attribute of a BaseEventType field, e.g. `["Severity"]`.
pub fn event_field(path: &[&str]) -> SimpleAttributeOperand {
    type_field(ObjectTypeId::BaseEventType.into(), path)
}

/// Value attribute of a field declared by `type_definition_id`.
pub fn type_field(type_definition_id: NodeId, path: &[&str]) -> SimpleAttributeOperand {
    SimpleAttributeOperand {
        type_definition_id,
        browse_path: Some(path.iter().map(|p| QualifiedName::new(0, *p)).collect()),
        attribute_id: AttributeId::Value as u32,
        index_range: Default::default(),
    }
}

fn content_filter_is_good(result: &ContentFilterResult) -> bool {
    result.element_results.iter().flatten().all(|r| {
        r.status_code.is_good() && r.operand_status_codes.iter().flatten().all(|s| s.is_good())
    })
}

/// Whether every select clause and where element of a filter result is Good.
pub fn event_filter_result_is_good(result: &EventFilterResult) -> bool {
    result.select_clause_results.iter().flatten().all(|s| s.is_good())
        && content_filter_is_good(&result.where_clause_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua::types::{ContentFilterElementResult, StatusCode};

    #[test]
    fn push_returns_element_index() {
        let mut builder = WhereClauseBuilder::new();
        assert_eq!(builder.push(FilterOperator::And, vec![]), 0);
        assert_eq!(builder.push(FilterOperator::IsNull, vec![]), 1);
        let filter = builder.build();
        assert_eq!(filter.elements.map(|e| e.len()), Some(2));
        assert_eq!(WhereClauseBuilder::new().build().elements, None);
    }

    #[test]
    fn operands_survive_extension_object_encoding() {
        let operands = vec![
            FilterOperand::Element(3),
            FilterOperand::Literal(Variant::UInt16(500)),
            event_field(&["Severity"]).into(),
        ];
        for operand in operands {
            let encoded = operand.clone().into_extension_object();
            assert_eq!(FilterOperand::decode(&encoded), Some(operand));
        }
        assert_eq!(FilterOperand::decode(&ExtensionObject::null()), None);
    }

    #[test]
    fn monitoring_filter_decodes_by_body_type() {
        let data_change = DataChangeFilter {
            trigger: opcua::types::DataChangeTrigger::StatusValue,
            deadband_type: 1,
            deadband_value: 0.5,
        };
        let encoded = MonitoringFilter::from(data_change.clone()).into_extension_object();
        assert_eq!(
            MonitoringFilter::decode(&encoded),
            MonitoringFilter::DataChange(data_change)
        );
        assert_eq!(
            MonitoringFilter::decode(&ExtensionObject::null()),
            MonitoringFilter::None
        );
        let operand = ExtensionObject::from_message(ElementOperand { index: 1 });
        assert_eq!(MonitoringFilter::decode(&operand), MonitoringFilter::Unknown);
    }

    #[test]
    fn filter_result_goodness_considers_operands() {
        let mut r = EventFilterResult {
            select_clause_results: Some(vec![StatusCode::Good]),
            where_clause_result: ContentFilterResult {
                element_results: Some(vec![ContentFilterElementResult {
                    status_code: StatusCode::Good,
                    operand_status_codes: Some(vec![StatusCode::Good]),
                    operand_diagnostic_infos: None,
                }]),
                element_diagnostic_infos: None,
            },
            select_clause_diagnostic_infos: None,
        };
        assert!(event_filter_result_is_good(&r));
        if let Some(results) = r.where_clause_result.element_results.as_mut() {
            results[0].operand_status_codes = Some(vec![StatusCode::BadFilterOperandInvalid]);
        }
        assert!(!event_filter_result_is_good(&r));
    }
}
