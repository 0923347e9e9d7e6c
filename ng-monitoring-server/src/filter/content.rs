use super::{
    conversion::{
        coerce_pair, compare_numeric, explicit_convert, integer_bits, integer_of_type, local_node,
    },
    type_tree::TypeHierarchy,
};
use crate::event::EventSource;
use ng_monitoring_error::{FilterError, FilterResult};
use ng_monitoring_types::{
    attribute_id, event_filter_result_is_good, operator_min_operands, BuiltinType,
    FilterOperand, VariantExt,
};
use opcua::types::{
    AttributeId, ContentFilter, ContentFilterElementResult, ContentFilterResult, EventFilter,
    EventFilterResult, FilterOperator, NodeId, ObjectTypeId, SimpleAttributeOperand, StatusCode,
    Variant,
};
use std::{cmp::Ordering, sync::Arc};

/// Where clause element with its operands decoded. `None` marks an operand
/// whose body is not a filter operand type.
#[derive(Clone, Debug)]
struct Element {
    operator: FilterOperator,
    operands: Vec<Option<FilterOperand>>,
}

fn decode_where(filter: &ContentFilter) -> Vec<Element> {
    filter
        .elements
        .iter()
        .flatten()
        .map(|e| Element {
            operator: e.filter_operator,
            operands: e
                .filter_operands
                .iter()
                .flatten()
                .map(FilterOperand::decode)
                .collect(),
        })
        .collect()
}

/// Validated event filter able to match and project events.
///
/// Construction validates every select clause and where element; an
/// evaluator only exists for a filter whose statuses are all Good.
///
/// Besides the comparison, `Not`, `IsNull`, `OfType` and `Cast` operators,
/// the evaluator implements `And`, `Or`, `Between`, `InList`, `BitwiseAnd`
/// and `BitwiseOr`, so filters using them validate as Good rather than
/// `BadFilterOperatorUnsupported`. `Like`, `InView` and `RelatedTo` are
/// rejected.
#[derive(Debug)]
pub struct FilterEvaluator {
    filter: EventFilter,
    elements: Vec<Element>,
    types: Arc<dyn TypeHierarchy>,
}

impl FilterEvaluator {
    /// Validates `filter`. On failure the per-clause result explains which
    /// clauses were rejected.
    pub fn new(
        filter: EventFilter,
        types: Arc<dyn TypeHierarchy>,
    ) -> Result<Self, (StatusCode, EventFilterResult)> {
        let result = validate_event_filter(&filter, types.as_ref());
        let no_select = filter.select_clauses.as_deref().map_or(true, <[_]>::is_empty);
        if no_select || !event_filter_result_is_good(&result) {
            return Err((StatusCode::BadEventFilterInvalid, result));
        }
        let elements = decode_where(&filter.where_clause);
        Ok(Self {
            filter,
            elements,
            types,
        })
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Evaluates the where clause against `event`. An empty clause matches
    /// everything and a null root result does not match.
    pub fn matches(&self, event: &dyn EventSource) -> FilterResult<bool> {
        if self.elements.is_empty() {
            return Ok(true);
        }
        let ctx = EvalContext {
            elements: &self.elements,
            event,
            types: self.types.as_ref(),
        };
        match ctx.element(0)? {
            Variant::Boolean(b) => Ok(b),
            Variant::Empty => Ok(false),
            other => Err(FilterError::ContentFilterInvalid(format!(
                "where clause evaluated to {other:?}"
            ))),
        }
    }

    /// Projects the select clauses of `event`; unresolvable fields are null.
    pub fn select(&self, event: &dyn EventSource) -> Vec<Variant> {
        self.filter
            .select_clauses
            .iter()
            .flatten()
            .map(|op| read_simple_operand(op, event, self.types.as_ref()).unwrap_or(Variant::Empty))
            .collect()
    }
}

/// Per-clause validation of an event filter.
pub fn validate_event_filter(filter: &EventFilter, types: &dyn TypeHierarchy) -> EventFilterResult {
    EventFilterResult {
        select_clause_results: filter.select_clauses.as_ref().map(|clauses| {
            clauses
                .iter()
                .map(|op| validate_select_clause(op, types))
                .collect()
        }),
        select_clause_diagnostic_infos: None,
        where_clause_result: validate_where_clause(&filter.where_clause, types),
    }
}

fn validate_select_clause(op: &SimpleAttributeOperand, types: &dyn TypeHierarchy) -> StatusCode {
    if !types.is_known(&op.type_definition_id) {
        return StatusCode::BadTypeDefinitionInvalid;
    }
    let path = op.browse_path.as_deref().unwrap_or_default();
    if path.is_empty() || path.iter().any(|q| q.name.is_null() || q.name.as_ref().is_empty()) {
        return StatusCode::BadBrowseNameInvalid;
    }
    match attribute_id(op.attribute_id) {
        Some(AttributeId::Value | AttributeId::NodeId) => StatusCode::Good,
        _ => StatusCode::BadAttributeIdInvalid,
    }
}

pub fn validate_where_clause(filter: &ContentFilter, types: &dyn TypeHierarchy) -> ContentFilterResult {
    let elements = decode_where(filter);
    let count = elements.len();
    let element_results = elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let operand_status_codes: Vec<StatusCode> = element
                .operands
                .iter()
                .map(|operand| match operand {
                    Some(operand) => validate_operand(operand, index, count, types),
                    None => StatusCode::BadFilterOperandInvalid,
                })
                .collect();

            let status_code = if is_unsupported(element.operator) {
                StatusCode::BadFilterOperatorUnsupported
            } else if element.operands.is_empty()
                || element.operands.len() < operator_min_operands(element.operator)
            {
                StatusCode::BadFilterOperandCountMismatch
            } else if operand_status_codes.iter().any(|s| s.is_bad()) {
                StatusCode::BadFilterOperandInvalid
            } else {
                StatusCode::Good
            };

            ContentFilterElementResult {
                status_code,
                operand_status_codes: Some(operand_status_codes),
                operand_diagnostic_infos: None,
            }
        })
        .collect::<Vec<_>>();
    ContentFilterResult {
        element_results: (!element_results.is_empty()).then_some(element_results),
        element_diagnostic_infos: None,
    }
}

fn validate_operand(
    operand: &FilterOperand,
    index: usize,
    count: usize,
    types: &dyn TypeHierarchy,
) -> StatusCode {
    match operand {
        FilterOperand::Element(target) => {
            let target = *target as usize;
            if target <= index || target >= count {
                StatusCode::BadFilterOperandInvalid
            } else {
                StatusCode::Good
            }
        }
        FilterOperand::Literal(_) => StatusCode::Good,
        FilterOperand::SimpleAttribute(op) => {
            if !types.is_known(&op.type_definition_id) {
                StatusCode::BadTypeDefinitionInvalid
            } else if attribute_id(op.attribute_id).is_none() {
                StatusCode::BadAttributeIdInvalid
            } else {
                StatusCode::Good
            }
        }
        FilterOperand::Attribute(_) => StatusCode::BadFilterOperandInvalid,
    }
}

fn is_unsupported(op: FilterOperator) -> bool {
    matches!(
        op,
        FilterOperator::Like | FilterOperator::InView | FilterOperator::RelatedTo
    )
}

fn read_simple_operand(
    op: &SimpleAttributeOperand,
    event: &dyn EventSource,
    types: &dyn TypeHierarchy,
) -> Option<Variant> {
    let base = op.type_definition_id == NodeId::from(ObjectTypeId::BaseEventType);
    if !base && !types.is_subtype_of(event.event_type(), &op.type_definition_id) {
        return None;
    }
    let attribute = attribute_id(op.attribute_id)?;
    event.read(op.browse_path.as_deref().unwrap_or_default(), attribute)
}

struct EvalContext<'a> {
    elements: &'a [Element],
    event: &'a dyn EventSource,
    types: &'a dyn TypeHierarchy,
}

impl EvalContext<'_> {
    fn element(&self, index: usize) -> FilterResult<Variant> {
        let element = self.elements.get(index).ok_or_else(|| {
            FilterError::OperandInvalid(format!("element index {index} out of range"))
        })?;
        let operator = element.operator;
        let operands = &element.operands;
        let expected = operator_min_operands(operator);
        if operands.len() < expected {
            return Err(FilterError::OperandCountMismatch {
                operator,
                expected,
                actual: operands.len(),
            });
        }
        let arg = |i: usize| self.operand(operands[i].as_ref(), index);

        Ok(match operator {
            FilterOperator::Equals => equals(&arg(0)?, &arg(1)?),
            FilterOperator::GreaterThan => ordering(&arg(0)?, &arg(1)?, |o| o.is_gt()),
            FilterOperator::LessThan => ordering(&arg(0)?, &arg(1)?, |o| o.is_lt()),
            FilterOperator::GreaterThanOrEqual => ordering(&arg(0)?, &arg(1)?, |o| o.is_ge()),
            FilterOperator::LessThanOrEqual => ordering(&arg(0)?, &arg(1)?, |o| o.is_le()),
            FilterOperator::IsNull => Variant::Boolean(arg(0)?.is_null_value()),
            FilterOperator::Not => match arg(0)? {
                Variant::Boolean(b) => Variant::Boolean(!b),
                _ => Variant::Empty,
            },
            FilterOperator::And => and(&arg(0)?, &arg(1)?),
            FilterOperator::Or => or(&arg(0)?, &arg(1)?),
            FilterOperator::Between => {
                let (x, lo, hi) = (arg(0)?, arg(1)?, arg(2)?);
                and(
                    &ordering(&x, &lo, |o| o.is_ge()),
                    &ordering(&x, &hi, |o| o.is_le()),
                )
            }
            FilterOperator::InList => {
                let x = arg(0)?;
                if x.is_null_value() {
                    Variant::Empty
                } else {
                    let mut found = false;
                    for i in 1..operands.len() {
                        if equals(&x, &arg(i)?) == Variant::Boolean(true) {
                            found = true;
                            break;
                        }
                    }
                    Variant::Boolean(found)
                }
            }
            FilterOperator::Cast => cast(&arg(0)?, &arg(1)?),
            FilterOperator::OfType => match type_node(&arg(0)?) {
                Some(type_id) => {
                    Variant::Boolean(self.types.is_subtype_of(self.event.event_type(), &type_id))
                }
                None => Variant::Boolean(false),
            },
            FilterOperator::BitwiseAnd => bitwise(&arg(0)?, &arg(1)?, |a, b| a & b),
            FilterOperator::BitwiseOr => bitwise(&arg(0)?, &arg(1)?, |a, b| a | b),
            _ => return Err(FilterError::OperatorUnsupported(operator)),
        })
    }

    fn operand(&self, operand: Option<&FilterOperand>, current: usize) -> FilterResult<Variant> {
        match operand {
            None => Err(FilterError::OperandInvalid(format!(
                "element {current} carries an undecodable operand"
            ))),
            Some(FilterOperand::Literal(v)) => Ok(v.clone()),
            Some(FilterOperand::Element(target)) => {
                let target = *target as usize;
                if target <= current {
                    return Err(FilterError::OperandInvalid(format!(
                        "element {current} refers back to element {target}"
                    )));
                }
                self.element(target)
            }
            Some(FilterOperand::SimpleAttribute(op)) => {
                Ok(read_simple_operand(op, self.event, self.types).unwrap_or(Variant::Empty))
            }
            Some(FilterOperand::Attribute(_)) => Err(FilterError::OperandInvalid(
                "attribute operands are not allowed in event filters".to_string(),
            )),
        }
    }
}

fn equals(a: &Variant, b: &Variant) -> Variant {
    if a.is_null_value() || b.is_null_value() {
        return Variant::Empty;
    }
    match coerce_pair(a, b) {
        Some((x, y)) => Variant::Boolean(x == y),
        None => Variant::Boolean(false),
    }
}

fn ordering(a: &Variant, b: &Variant, accept: impl Fn(Ordering) -> bool) -> Variant {
    if a.is_null_value() || b.is_null_value() {
        return Variant::Empty;
    }
    let result = coerce_pair(a, b)
        .and_then(|(x, y)| compare_numeric(&x, &y))
        .map(accept)
        .unwrap_or(false);
    Variant::Boolean(result)
}

fn and(a: &Variant, b: &Variant) -> Variant {
    match (a.boolean(), b.boolean()) {
        (Some(false), _) | (_, Some(false)) => Variant::Boolean(false),
        (Some(true), Some(true)) => Variant::Boolean(true),
        _ => Variant::Empty,
    }
}

fn or(a: &Variant, b: &Variant) -> Variant {
    match (a.boolean(), b.boolean()) {
        (Some(true), _) | (_, Some(true)) => Variant::Boolean(true),
        (Some(false), Some(false)) => Variant::Boolean(false),
        _ => Variant::Empty,
    }
}

fn cast(value: &Variant, target: &Variant) -> Variant {
    type_node(target)
        .and_then(|id| BuiltinType::from_data_type(&id))
        .and_then(|t| explicit_convert(value, t))
        .unwrap_or(Variant::Empty)
}

fn bitwise(a: &Variant, b: &Variant, op: impl Fn(i128, i128) -> i128) -> Variant {
    let Some((x, y)) = coerce_pair(a, b) else {
        return Variant::Empty;
    };
    let (Some(t), Some(xi), Some(yi)) = (x.builtin_type(), integer_bits(&x), integer_bits(&y))
    else {
        return Variant::Empty;
    };
    integer_of_type(op(xi, yi), t).unwrap_or(Variant::Empty)
}

fn type_node(v: &Variant) -> Option<NodeId> {
    match v {
        Variant::NodeId(n) => Some(n.as_ref().clone()),
        Variant::ExpandedNodeId(e) => local_node(e),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event::BaseEvent, filter::type_tree::EventTypeTree};
    use ng_monitoring_types::{event_field, type_field, WhereClauseBuilder};
    use opcua::types::{ExpandedNodeId, QualifiedName};

    fn types() -> Arc<dyn TypeHierarchy> {
        Arc::new(EventTypeTree::standard())
    }

    fn lit(v: impl Into<Variant>) -> FilterOperand {
        FilterOperand::Literal(v.into())
    }

    fn node_lit(n: impl Into<NodeId>) -> FilterOperand {
        FilterOperand::Literal(Variant::NodeId(Box::new(n.into())))
    }

    fn severity() -> FilterOperand {
        event_field(&["Severity"]).into()
    }

    fn base_event() -> BaseEvent {
        BaseEvent::new(ObjectTypeId::BaseEventType.into())
    }

    fn evaluator(where_clause: ContentFilter) -> FilterEvaluator {
        let filter = EventFilter {
            select_clauses: Some(vec![event_field(&["Severity"])]),
            where_clause,
        };
        FilterEvaluator::new(filter, types()).expect("valid filter")
    }

    fn eval(op: FilterOperator, operands: Vec<FilterOperand>) -> FilterResult<Variant> {
        let elements = decode_where(&WhereClauseBuilder::new().with(op, operands).build());
        let event = base_event();
        let types = EventTypeTree::standard();
        EvalContext {
            elements: &elements,
            event: &event,
            types: &types,
        }
        .element(0)
    }

    fn element_statuses(result: &EventFilterResult) -> Vec<StatusCode> {
        result
            .where_clause_result
            .element_results
            .iter()
            .flatten()
            .map(|r| r.status_code)
            .collect()
    }

    #[test]
    fn greater_than_coerces_signed_to_unsigned() {
        let r = eval(
            FilterOperator::GreaterThan,
            vec![lit(Variant::Int32(5)), lit(Variant::UInt64(3))],
        );
        assert_eq!(r, Ok(Variant::Boolean(true)));
    }

    #[test]
    fn null_operand_yields_null() {
        for op in [
            FilterOperator::Equals,
            FilterOperator::GreaterThan,
            FilterOperator::LessThanOrEqual,
        ] {
            let r = eval(op, vec![lit(Variant::Empty), lit(1i32)]);
            assert_eq!(r, Ok(Variant::Empty), "{op:?}");
        }
    }

    #[test]
    fn non_numeric_ordering_is_false() {
        let r = eval(FilterOperator::LessThan, vec![lit("a"), lit("b")]);
        assert_eq!(r, Ok(Variant::Boolean(false)));
        let r = eval(FilterOperator::Equals, vec![lit("a"), lit("a")]);
        assert_eq!(r, Ok(Variant::Boolean(true)));
    }

    #[test]
    fn not_of_non_boolean_is_unknown() {
        assert_eq!(eval(FilterOperator::Not, vec![lit(1i32)]), Ok(Variant::Empty));
        assert_eq!(
            eval(FilterOperator::Not, vec![lit(false)]),
            Ok(Variant::Boolean(true))
        );
    }

    #[test]
    fn three_valued_logic() {
        assert_eq!(
            eval(FilterOperator::And, vec![lit(Variant::Empty), lit(false)]),
            Ok(Variant::Boolean(false))
        );
        assert_eq!(
            eval(FilterOperator::And, vec![lit(Variant::Empty), lit(true)]),
            Ok(Variant::Empty)
        );
        assert_eq!(
            eval(FilterOperator::Or, vec![lit(Variant::Empty), lit(true)]),
            Ok(Variant::Boolean(true))
        );
    }

    #[test]
    fn cast_uses_data_type_node() {
        let r = eval(
            FilterOperator::Cast,
            vec![lit("12"), node_lit(BuiltinType::Int32.node_id())],
        );
        assert_eq!(r, Ok(Variant::Int32(12)));

        let expanded = ExpandedNodeId::from(BuiltinType::Double.node_id());
        let r = eval(
            FilterOperator::Cast,
            vec![lit(3i32), lit(Variant::ExpandedNodeId(Box::new(expanded)))],
        );
        assert_eq!(r, Ok(Variant::Double(3.0)));

        let r = eval(FilterOperator::Cast, vec![lit(3i32), node_lit(NodeId::new(0, 9999u32))]);
        assert_eq!(r, Ok(Variant::Empty));
    }

    #[test]
    fn between_in_list_and_bitwise() {
        assert_eq!(
            eval(FilterOperator::Between, vec![lit(5i32), lit(1u8), lit(10.0f64)]),
            Ok(Variant::Boolean(true))
        );
        assert_eq!(
            eval(FilterOperator::InList, vec![lit(3i32), lit(1i32), lit(3i64)]),
            Ok(Variant::Boolean(true))
        );
        assert_eq!(
            eval(FilterOperator::BitwiseAnd, vec![lit(0b1100u16), lit(0b1010u16)]),
            Ok(Variant::UInt16(0b1000))
        );
        assert_eq!(
            eval(FilterOperator::BitwiseOr, vec![lit(1.5f64), lit(1i32)]),
            Ok(Variant::Empty)
        );
    }

    #[test]
    fn extended_operators_validate_as_supported() {
        let operators = [
            (FilterOperator::And, vec![lit(true), lit(false)]),
            (FilterOperator::Or, vec![lit(true), lit(false)]),
            (FilterOperator::Between, vec![severity(), lit(1u16), lit(9u16)]),
            (FilterOperator::InList, vec![severity(), lit(1u16), lit(2u16)]),
            (FilterOperator::BitwiseAnd, vec![lit(1u16), lit(3u16)]),
            (FilterOperator::BitwiseOr, vec![lit(1u16), lit(3u16)]),
        ];
        for (op, operands) in operators {
            let where_clause = WhereClauseBuilder::new().with(op, operands).build();
            let result = validate_where_clause(&where_clause, &EventTypeTree::standard());
            let statuses: Vec<StatusCode> =
                result.element_results.iter().flatten().map(|r| r.status_code).collect();
            assert_eq!(statuses, vec![StatusCode::Good], "{op:?}");
        }
    }

    #[test]
    fn unsupported_operator_errors_at_evaluation() {
        let r = eval(FilterOperator::Like, vec![lit("a"), lit("a%")]);
        assert_eq!(r, Err(FilterError::OperatorUnsupported(FilterOperator::Like)));
    }

    #[test]
    fn undecodable_operand_is_invalid() {
        let mut where_clause = WhereClauseBuilder::new()
            .with(FilterOperator::IsNull, vec![lit(1i32)])
            .build();
        if let Some(elements) = where_clause.elements.as_mut() {
            elements[0].filter_operands = Some(vec![opcua::types::ExtensionObject::null()]);
        }
        let result = validate_where_clause(&where_clause, &EventTypeTree::standard());
        let element = &result.element_results.unwrap_or_default()[0];
        assert_eq!(element.status_code, StatusCode::BadFilterOperandInvalid);
        assert_eq!(
            element.operand_status_codes,
            Some(vec![StatusCode::BadFilterOperandInvalid])
        );
    }

    #[test]
    fn where_clause_with_nested_elements() {
        // Severity >= 500 AND OfType(SystemEventType)
        let mut where_clause = WhereClauseBuilder::new();
        where_clause.push(
            FilterOperator::And,
            vec![FilterOperand::Element(1), FilterOperand::Element(2)],
        );
        where_clause.push(FilterOperator::GreaterThanOrEqual, vec![severity(), lit(500u16)]);
        where_clause.push(
            FilterOperator::OfType,
            vec![node_lit(ObjectTypeId::SystemEventType)],
        );
        let ev = evaluator(where_clause.build());

        let system = || BaseEvent::new(ObjectTypeId::SystemEventType.into());
        let hit = system().with("Severity", 700u16);
        let low = system().with("Severity", 100u16);
        let other = BaseEvent::new(ObjectTypeId::AuditEventType.into()).with("Severity", 700u16);
        assert_eq!(ev.matches(&hit), Ok(true));
        assert_eq!(ev.matches(&low), Ok(false));
        assert_eq!(ev.matches(&other), Ok(false));
    }

    #[test]
    fn empty_where_matches_and_null_root_does_not() {
        let empty = WhereClauseBuilder::new().build();
        assert_eq!(evaluator(empty).matches(&base_event()), Ok(true));
        let missing = event_field(&["NoSuchField"]);
        let ev = evaluator(
            WhereClauseBuilder::new()
                .with(FilterOperator::Equals, vec![missing.into(), lit(1i32)])
                .build(),
        );
        assert_eq!(ev.matches(&base_event()), Ok(false));
    }

    #[test]
    fn non_boolean_root_is_content_filter_invalid() {
        let ev = evaluator(
            WhereClauseBuilder::new()
                .with(
                    FilterOperator::Cast,
                    vec![lit(1i32), node_lit(BuiltinType::Double.node_id())],
                )
                .build(),
        );
        let r = ev.matches(&base_event());
        assert!(matches!(r, Err(FilterError::ContentFilterInvalid(_))));
    }

    #[test]
    fn select_maps_unresolvable_fields_to_null() {
        let filter = EventFilter {
            select_clauses: Some(vec![
                event_field(&["Severity"]),
                event_field(&["Missing"]),
                type_field(ObjectTypeId::AuditEventType.into(), &["Severity"]),
            ]),
            where_clause: WhereClauseBuilder::new().build(),
        };
        let ev = FilterEvaluator::new(filter, types()).unwrap();
        let event = BaseEvent::new(ObjectTypeId::SystemEventType.into()).with("Severity", 300u16);
        assert_eq!(
            ev.select(&event),
            vec![Variant::UInt16(300), Variant::Empty, Variant::Empty]
        );
    }

    #[test]
    fn validation_reports_each_clause() {
        let mut bad_attr = event_field(&["Message"]);
        bad_attr.attribute_id = AttributeId::DisplayName as u32;
        let filter = EventFilter {
            select_clauses: Some(vec![
                event_field(&["Severity"]),
                type_field(NodeId::new(7, 1u32), &["Severity"]),
                event_field(&[]),
                bad_attr,
            ]),
            where_clause: WhereClauseBuilder::new()
                .with(FilterOperator::Equals, vec![lit(1i32)])
                .with(FilterOperator::Not, vec![FilterOperand::Element(0)])
                .with(FilterOperator::Like, vec![lit("a"), lit("b")])
                .with(FilterOperator::IsNull, vec![])
                .build(),
        };

        let (status, result) = FilterEvaluator::new(filter, types()).unwrap_err();
        assert_eq!(status, StatusCode::BadEventFilterInvalid);
        assert_eq!(
            result.select_clause_results,
            Some(vec![
                StatusCode::Good,
                StatusCode::BadTypeDefinitionInvalid,
                StatusCode::BadBrowseNameInvalid,
                StatusCode::BadAttributeIdInvalid,
            ])
        );
        assert_eq!(
            element_statuses(&result),
            vec![
                StatusCode::BadFilterOperandCountMismatch,
                StatusCode::BadFilterOperandInvalid,
                StatusCode::BadFilterOperatorUnsupported,
                StatusCode::BadFilterOperandCountMismatch,
            ]
        );
    }

    #[test]
    fn empty_select_clause_list_is_rejected() {
        let filter = EventFilter {
            select_clauses: None,
            where_clause: WhereClauseBuilder::new().build(),
        };
        let (status, result) = FilterEvaluator::new(filter, types()).unwrap_err();
        assert_eq!(status, StatusCode::BadEventFilterInvalid);
        assert!(result.select_clause_results.is_none());
    }

    #[test]
    fn null_browse_segment_is_rejected() {
        let mut op = event_field(&["Severity"]);
        if let Some(path) = op.browse_path.as_mut() {
            path.push(QualifiedName::new(0, ""));
        }
        assert_eq!(
            validate_select_clause(&op, &EventTypeTree::standard()),
            StatusCode::BadBrowseNameInvalid
        );
    }
}
