mod common;

use common::{event_filter, event_item, init_tracing, subscription_params, value_item};
use ng_monitoring_server::{BaseEvent, SubscriptionManager};
use ng_monitoring_types::{
    event_field, type_field, DataValueExt, FilterOperand, Notification, ServerLimits,
    StatusCodeExt, WhereClauseBuilder,
};
use opcua::types::{
    DataValue, EventFilterResult, FilterOperator, LocalizedText, NodeId, ObjectId, ObjectTypeId,
    StatusCode, TimestampsToReturn, Variant,
};

fn drained_ints(notes: &[Notification]) -> Vec<(i32, bool)> {
    notes
        .iter()
        .map(|n| match n {
            Notification::DataChange(n) => match n.value.value {
                Some(Variant::Int32(v)) => (v, n.value.status_code().queue_overflow()),
                ref other => panic!("unexpected value {other:?}"),
            },
            Notification::Event(_) => panic!("unexpected event"),
        })
        .collect()
}

#[test]
fn queue_policies_through_a_subscription() {
    init_tracing();
    let manager = SubscriptionManager::new(ServerLimits::default());
    let id = manager
        .create_subscription(&subscription_params(1_000.0))
        .subscription_id;
    let subscription = manager.subscription(id).unwrap();

    let results = subscription
        .create_monitored_items(
            TimestampsToReturn::Both,
            &[
                value_item("oldest", 1, 3, true),
                value_item("newest", 2, 3, false),
                value_item("single", 3, 1, true),
            ],
        )
        .unwrap();
    let item_ids: Vec<u32> = results.iter().map(|r| r.monitored_item_id).collect();

    for v in 0..5i32 {
        for item_id in &item_ids {
            assert!(subscription.on_data_value(*item_id, DataValue::new_now(Variant::Int32(v))));
        }
    }

    let notes = subscription.gather(0);
    let by_handle = |handle: u32| -> Vec<Notification> {
        notes
            .iter()
            .filter(|n| n.client_handle() == handle)
            .cloned()
            .collect()
    };

    assert_eq!(
        drained_ints(&by_handle(1)),
        vec![(2, false), (3, true), (4, true)]
    );
    assert_eq!(
        drained_ints(&by_handle(2)),
        vec![(0, false), (1, false), (4, true)]
    );
    assert_eq!(drained_ints(&by_handle(3)), vec![(4, false)]);
}

#[test]
fn event_where_clause_selects_matching_events() {
    init_tracing();
    let manager = SubscriptionManager::new(ServerLimits::default());
    let id = manager
        .create_subscription(&subscription_params(500.0))
        .subscription_id;
    let subscription = manager.subscription(id).unwrap();

    let severe = WhereClauseBuilder::new()
        .with(
            FilterOperator::GreaterThan,
            vec![
                event_field(&["Severity"]).into(),
                FilterOperand::Literal(Variant::UInt16(500)),
            ],
        )
        .build();
    let results = subscription
        .create_monitored_items(
            TimestampsToReturn::Neither,
            &[event_item(
                ObjectId::Server.into(),
                10,
                event_filter(&["Severity", "Message"], severe),
            )],
        )
        .unwrap();
    assert!(results[0].status_code.is_good());

    let source = NodeId::new(2, "Boiler");
    for severity in [100u16, 700] {
        let event = BaseEvent::new(ObjectTypeId::SystemEventType.into())
            .with("Severity", severity)
            .with(
                "Message",
                Variant::LocalizedText(Box::new(LocalizedText::new("", "pressure"))),
            );
        manager.on_event(&source, &event);
    }

    let notes = subscription.gather(0);
    assert_eq!(notes.len(), 1);
    let Notification::Event(fields) = &notes[0] else {
        panic!("expected event");
    };
    assert_eq!(fields.client_handle, 10);
    assert_eq!(
        fields.event_fields,
        Some(vec![
            Variant::UInt16(700),
            Variant::LocalizedText(Box::new(LocalizedText::new("", "pressure")))
        ])
    );
}

#[test]
fn invalid_event_filter_reports_each_clause() {
    init_tracing();
    let manager = SubscriptionManager::new(ServerLimits::default());
    let id = manager
        .create_subscription(&subscription_params(500.0))
        .subscription_id;
    let subscription = manager.subscription(id).unwrap();

    let mut filter = event_filter(
        &["Severity"],
        WhereClauseBuilder::new()
            .with(FilterOperator::Not, vec![FilterOperand::Element(0)])
            .build(),
    );
    if let Some(clauses) = filter.select_clauses.as_mut() {
        clauses.push(type_field(NodeId::new(7, 1u32), &["X"]));
    }
    let request = event_item(ObjectId::Server.into(), 1, filter);

    let result = subscription
        .create_monitored_items(TimestampsToReturn::Both, &[request])
        .unwrap()
        .remove(0);
    assert_eq!(result.status_code, StatusCode::BadEventFilterInvalid);
    let filter_result = result.filter_result.inner_as::<EventFilterResult>().unwrap();
    assert_eq!(
        filter_result.select_clause_results,
        Some(vec![StatusCode::Good, StatusCode::BadTypeDefinitionInvalid])
    );
    let element = &filter_result
        .where_clause_result
        .element_results
        .as_ref()
        .unwrap()[0];
    assert_eq!(element.status_code, StatusCode::BadFilterOperandInvalid);
    assert_eq!(subscription.item_count(), 0);
}

#[test]
fn deleted_subscription_is_gone() {
    init_tracing();
    let manager = SubscriptionManager::new(ServerLimits::default());
    let id = manager
        .create_subscription(&subscription_params(500.0))
        .subscription_id;
    manager.delete_subscriptions(&[id]).unwrap();
    assert!(manager.is_empty());
    assert_eq!(
        manager.subscription(id).err().map(|e| e.status_code()),
        Some(StatusCode::BadSubscriptionIdInvalid)
    );
}
